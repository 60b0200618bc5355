//! CLI configuration loading
//!
//! Layered the usual way: CLI flags override the TOML file, which overrides
//! the defaults. The resulting [`MeshConfig`] is passed down explicitly;
//! nothing here is global.

use std::path::Path;

use serde::{Deserialize, Serialize};

use meshchat_core::MeshConfig;

use crate::error::Result;

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the demo CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Core mesh configuration
    pub mesh: MeshConfig,

    /// Demo-run behavior
    pub demo: DemoConfig,
}

/// Demo-run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Number of in-process peers to spawn
    pub peers: usize,

    /// How long to let discovery and delivery settle, in milliseconds
    pub settle_ms: u64,

    /// Default message broadcast by the first peer
    pub message: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            peers: 2,
            settle_ms: 500,
            message: "hello from the mesh".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
