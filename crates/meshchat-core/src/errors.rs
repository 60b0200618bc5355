//! Error types for the mesh layer
//!
//! Errors are reported once through `Result` or dropped with a diagnostic
//! trace; nothing here is fatal to the process.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Transport-boundary errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("advertising or browsing could not start: {reason}")]
    StartFailed { reason: String },
    #[error("send to {peer_count} peer(s) failed: {reason}")]
    SendFailed { peer_count: usize, reason: String },
    #[error("invitation to peer {peer} failed: {reason}")]
    InviteFailed { peer: String, reason: String },
    #[error("transport is not running")]
    NotRunning,
    #[error("transport event stream closed")]
    EventStreamClosed,
}

/// Wire frame codec errors
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unsupported frame version: expected {expected}, got {actual}")]
    UnsupportedVersion { expected: u8, actual: u8 },
    #[error("frame codec error: {0}")]
    Codec(#[from] bincode::Error),
}

// ----------------------------------------------------------------------------
// Top-Level Error Type
// ----------------------------------------------------------------------------

/// Core error type for the mesh layer
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel communication error (internal plumbing)
    #[error("channel error: {message}")]
    Channel { message: String },
}

impl From<bincode::Error> for MeshError {
    fn from(err: bincode::Error) -> Self {
        MeshError::Frame(FrameError::Codec(err))
    }
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl MeshError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        MeshError::Channel {
            message: message.into(),
        }
    }

    /// Create a transport start failure with a reason
    pub fn start_failed<T: Into<String>>(reason: T) -> Self {
        MeshError::Transport(TransportError::StartFailed {
            reason: reason.into(),
        })
    }

    /// Create a send failure covering a whole broadcast call
    pub fn send_failed<T: Into<String>>(peer_count: usize, reason: T) -> Self {
        MeshError::Transport(TransportError::SendFailed {
            peer_count,
            reason: reason.into(),
        })
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, MeshError>;
