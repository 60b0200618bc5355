//! In-memory transport
//!
//! A [`MemoryHub`] links any number of in-process endpoints into one mesh:
//! endpoints discover each other on start, invitations are delivered with a
//! reply channel, and sends fan out to connected endpoints. Used by the
//! integration tests and the demo CLI in place of a radio.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use super::{SessionState, Transport, TransportEvent};
use crate::errors::{MeshError, TransportError};
use crate::types::PeerId;
use crate::Result;

// ----------------------------------------------------------------------------
// Hub
// ----------------------------------------------------------------------------

#[derive(Default)]
struct HubInner {
    endpoints: HashMap<PeerId, mpsc::UnboundedSender<TransportEvent>>,
    /// Established sessions, keyed by normalized peer pair
    sessions: HashSet<(PeerId, PeerId)>,
}

/// Shared in-process mesh linking [`MemoryTransport`] endpoints
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

fn session_key(a: &PeerId, b: &PeerId) -> (PeerId, PeerId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint for the given peer; it joins the mesh on `start`
    pub fn endpoint(&self, peer: PeerId) -> MemoryTransport {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        MemoryTransport {
            peer,
            hub: self.clone(),
            active: false,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Establish a session between two endpoints after an accepted invitation
    async fn establish(&self, inviter: &PeerId, invitee: &PeerId) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if !inner.sessions.insert(session_key(inviter, invitee)) {
            return; // already connected
        }
        for (local, remote) in [(inviter, invitee), (invitee, inviter)] {
            if let Some(tx) = inner.endpoints.get(local) {
                let _ = tx.send(TransportEvent::SessionChanged {
                    peer: remote.clone(),
                    state: SessionState::Connecting,
                });
                let _ = tx.send(TransportEvent::SessionChanged {
                    peer: remote.clone(),
                    state: SessionState::Connected,
                });
            }
        }
        debug!(%inviter, %invitee, "session established");
    }
}

// ----------------------------------------------------------------------------
// Endpoint
// ----------------------------------------------------------------------------

/// One peer's attachment to a [`MemoryHub`]
pub struct MemoryTransport {
    peer: PeerId,
    hub: MemoryHub,
    active: bool,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn start(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        let mut guard = self.hub.inner.lock().await;
        let inner = &mut *guard;

        // Discovery is mutual and immediate on an in-process mesh.
        for (other, tx) in inner.endpoints.iter() {
            let _ = tx.send(TransportEvent::PeerFound {
                peer: self.peer.clone(),
            });
            let _ = self.events_tx.send(TransportEvent::PeerFound {
                peer: other.clone(),
            });
        }
        inner.endpoints.insert(self.peer.clone(), self.events_tx.clone());
        self.active = true;
        debug!(peer = %self.peer, "memory transport started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let mut guard = self.hub.inner.lock().await;
        let inner = &mut *guard;

        inner.endpoints.remove(&self.peer);

        let mut dropped = Vec::new();
        inner.sessions.retain(|(a, b)| {
            let involved = *a == self.peer || *b == self.peer;
            if involved {
                dropped.push(if *a == self.peer { b.clone() } else { a.clone() });
            }
            !involved
        });
        for other in dropped {
            if let Some(tx) = inner.endpoints.get(&other) {
                let _ = tx.send(TransportEvent::SessionChanged {
                    peer: self.peer.clone(),
                    state: SessionState::NotConnected,
                });
            }
        }
        for tx in inner.endpoints.values() {
            let _ = tx.send(TransportEvent::PeerLost {
                peer: self.peer.clone(),
            });
        }
        self.active = false;
        debug!(peer = %self.peer, "memory transport stopped");
        Ok(())
    }

    async fn invite(&mut self, peer: &PeerId, timeout: Duration) -> Result<()> {
        if !self.active {
            return Err(TransportError::NotRunning.into());
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let inner = self.hub.inner.lock().await;
            let target =
                inner
                    .endpoints
                    .get(peer)
                    .ok_or_else(|| TransportError::InviteFailed {
                        peer: peer.to_string(),
                        reason: "peer not reachable".to_string(),
                    })?;
            let _ = target.send(TransportEvent::InvitationReceived {
                peer: self.peer.clone(),
                reply: reply_tx,
            });
        }

        let hub = self.hub.clone();
        let inviter = self.peer.clone();
        let invitee = peer.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, reply_rx).await {
                Ok(Ok(true)) => hub.establish(&inviter, &invitee).await,
                Ok(Ok(false)) => debug!(peer = %invitee, "invitation declined"),
                Ok(Err(_)) => debug!(peer = %invitee, "invitation reply dropped"),
                // An un-accepted invitation simply lapses, no follow-up.
                Err(_) => debug!(peer = %invitee, "invitation lapsed"),
            }
        });
        Ok(())
    }

    async fn send(&mut self, peers: &[PeerId], bytes: &[u8]) -> Result<()> {
        if !self.active {
            return Err(TransportError::NotRunning.into());
        }
        let inner = self.hub.inner.lock().await;

        // All-or-nothing: verify every recipient before delivering to any.
        for peer in peers {
            let reachable = inner.endpoints.contains_key(peer)
                && inner.sessions.contains(&session_key(&self.peer, peer));
            if !reachable {
                return Err(MeshError::send_failed(
                    peers.len(),
                    format!("no session with {peer}"),
                ));
            }
        }
        for peer in peers {
            if let Some(tx) = inner.endpoints.get(peer) {
                let _ = tx.send(TransportEvent::DataReceived {
                    peer: self.peer.clone(),
                    bytes: bytes.to_vec(),
                });
            }
        }
        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.take()
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
