//! Transport boundary for the mesh layer
//!
//! The core does not implement discovery or delivery itself; it drives a
//! transport's advertise/browse/invite/send surface through the [`Transport`]
//! trait and consumes its event stream. [`memory`] provides an in-process
//! implementation used by tests and demos.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::types::PeerId;
use crate::Result;

pub mod memory;

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Session state reported by the underlying transport for a single peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotConnected,
    Connecting,
    Connected,
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Events emitted by a transport
#[derive(Debug)]
pub enum TransportEvent {
    /// A nearby peer became discoverable
    PeerFound { peer: PeerId },
    /// A previously discoverable peer went away
    PeerLost { peer: PeerId },
    /// A peer's session state changed
    SessionChanged { peer: PeerId, state: SessionState },
    /// Raw bytes arrived from a connected peer
    DataReceived { peer: PeerId, bytes: Vec<u8> },
    /// A peer invited us into its session; answer on `reply`
    InvitationReceived {
        peer: PeerId,
        reply: oneshot::Sender<bool>,
    },
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Interface the peer connection drives on the underlying mesh transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin simultaneous peer advertisement and discovery
    async fn start(&mut self) -> Result<()>;

    /// Stop advertising and browsing and tear down sessions
    async fn stop(&mut self) -> Result<()>;

    /// Invite a discovered peer into the shared session.
    ///
    /// The invitation lapses after `timeout` with no follow-up event.
    async fn invite(&mut self, peer: &PeerId, timeout: Duration) -> Result<()>;

    /// Reliably send bytes to the given peers.
    ///
    /// Success or failure covers the whole call; there is no per-peer
    /// delivery reporting.
    async fn send(&mut self, peers: &[PeerId], bytes: &[u8]) -> Result<()>;

    /// Take the transport's event stream; yields `None` after the first call
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Whether the transport is currently running
    fn is_active(&self) -> bool;
}
