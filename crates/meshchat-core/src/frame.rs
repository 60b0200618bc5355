//! Wire frame and broadcast payloads
//!
//! A [`NetworkFrame`] is the envelope exchanged between peers. It carries at
//! most one typed payload; the payload set is a closed tagged variant, so
//! dispatch is an explicit match rather than a runtime type test. Encoding
//! is bincode and must stay byte-stable across peers running the same
//! protocol version (there is no version negotiation).

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionStatus;
use crate::errors::FrameError;
use crate::types::PeerId;
use crate::Result;

// ----------------------------------------------------------------------------
// Text Message
// ----------------------------------------------------------------------------

/// A chat message broadcast across the mesh.
///
/// Created by the caller without an originator; the network service stamps
/// the originator exactly once at broadcast time, after which the message is
/// treated as immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// Peer that broadcast the message; unset until broadcast
    pub originator: Option<PeerId>,
    /// Message body
    pub text: String,
}

impl TextMessage {
    /// Create a message that has not been broadcast yet
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            originator: None,
            text: text.into(),
        }
    }

    /// Whether this message was broadcast by the given peer
    pub fn is_from(&self, peer: &PeerId) -> bool {
        self.originator.as_ref() == Some(peer)
    }
}

// ----------------------------------------------------------------------------
// Status Event
// ----------------------------------------------------------------------------

/// A single peer's connection status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub peer: PeerId,
    pub status: ConnectionStatus,
}

// ----------------------------------------------------------------------------
// Frame Payload
// ----------------------------------------------------------------------------

/// The closed set of payload kinds a frame (or local dispatch) can carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramePayload {
    Text(TextMessage),
    Status(StatusEvent),
}

// ----------------------------------------------------------------------------
// Network Frame
// ----------------------------------------------------------------------------

/// Wire-level envelope carrying zero or one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkFrame {
    /// Protocol version (currently 1)
    pub version: u8,
    /// At most one typed broadcast payload
    pub payload: Option<FramePayload>,
}

impl NetworkFrame {
    /// Current protocol version
    pub const CURRENT_VERSION: u8 = 1;

    /// Create an empty frame
    pub fn empty() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            payload: None,
        }
    }

    /// Create a frame carrying one payload
    pub fn with_payload(payload: FramePayload) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            payload: Some(payload),
        }
    }

    /// Encode the frame to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self).map_err(FrameError::from)?)
    }

    /// Decode a frame from wire bytes, rejecting unknown versions
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame: NetworkFrame = bincode::deserialize(bytes).map_err(FrameError::from)?;
        if frame.version != Self::CURRENT_VERSION {
            return Err(FrameError::UnsupportedVersion {
                expected: Self::CURRENT_VERSION,
                actual: frame.version,
            }
            .into());
        }
        Ok(frame)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
