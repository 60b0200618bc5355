//! Core identifier types for the mesh layer
//!
//! Newtype wrappers keep peer names and handler registrations from being
//! confused with ordinary strings.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Opaque string uniquely naming a mesh participant.
///
/// One per device, chosen at connection construction: caller-supplied via
/// [`MeshConfig`](crate::MeshConfig), or random when no name is given.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer identifier from a caller-supplied name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    /// Generate a random peer identifier
    pub fn random() -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self(format!("peer-{}", &id[..8]))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ----------------------------------------------------------------------------
// Handler Token
// ----------------------------------------------------------------------------

/// Opaque handle addressing a single handler registration.
///
/// Tokens are unique for the lifetime of the owning service; removal with an
/// unknown token is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(Uuid);

impl HandlerToken {
    /// Mint a fresh, unique token
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
