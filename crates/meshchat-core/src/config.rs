//! Mesh configuration
//!
//! Configuration is constructed explicitly at the process entry point and
//! passed down to the connection and service; there is no ambient global.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Mesh Configuration
// ----------------------------------------------------------------------------

/// Configuration for a peer connection and the network service above it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Short service name shared by every peer of the same mesh
    pub service_name: String,

    /// Local peer name; a random identity is generated when unset
    pub display_name: Option<String>,

    /// How long an outstanding peer invitation may wait before it lapses
    pub invite_timeout_secs: u64,
}

impl MeshConfig {
    /// Invitation timeout as a [`Duration`]
    pub fn invite_timeout(&self) -> Duration {
        Duration::from_secs(self.invite_timeout_secs)
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            service_name: "meshchat".to_string(),
            display_name: None,
            invite_timeout_secs: 30,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MeshConfig::default();
        assert_eq!(config.service_name, "meshchat");
        assert_eq!(config.invite_timeout(), Duration::from_secs(30));
        assert!(config.display_name.is_none());
    }
}
