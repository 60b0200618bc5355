//! Peer connection: discovery, session establishment, binary broadcast
//!
//! [`PeerConnection`] drives a [`Transport`]'s advertise/browse/invite/send
//! surface and normalizes its session events into the three-state
//! [`ConnectionStatus`] model. Inbound bytes are forwarded verbatim; the
//! connection never interprets payload content.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::MeshConfig;
use crate::errors::TransportError;
use crate::frame::StatusEvent;
use crate::protected::Protected;
use crate::transport::{SessionState, Transport, TransportEvent};
use crate::types::PeerId;
use crate::Result;

// ----------------------------------------------------------------------------
// Connection Status
// ----------------------------------------------------------------------------

/// Aggregate discoverability/session state for one remote peer.
///
/// Every newly-seen peer starts `Disconnected`; transitions follow
/// `Disconnected -> Advertising -> Connected` and back to `Disconnected`
/// on loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Advertising,
    Connected,
}

impl ConnectionStatus {
    /// Rendered description of the transition, if it has one.
    ///
    /// Only joins and leaves are worth showing; the transitional state
    /// carries no text.
    pub fn display_text(&self) -> Option<&'static str> {
        match self {
            ConnectionStatus::Connected => Some("joined"),
            ConnectionStatus::Disconnected => Some("left"),
            ConnectionStatus::Advertising => None,
        }
    }

    fn from_session(state: SessionState) -> Self {
        match state {
            SessionState::NotConnected => ConnectionStatus::Disconnected,
            SessionState::Connecting => ConnectionStatus::Advertising,
            SessionState::Connected => ConnectionStatus::Connected,
        }
    }
}

// ----------------------------------------------------------------------------
// Inbound Data
// ----------------------------------------------------------------------------

/// Raw bytes received from a connected peer, forwarded verbatim
#[derive(Debug)]
pub struct InboundData {
    pub peer: PeerId,
    pub bytes: Vec<u8>,
}

// ----------------------------------------------------------------------------
// Peer Connection
// ----------------------------------------------------------------------------

struct ConnectionState {
    /// Last known status per seen peer
    statuses: HashMap<PeerId, ConnectionStatus>,
    /// Status observers; a dead receiver is dropped on next emit
    observers: Vec<mpsc::UnboundedSender<StatusEvent>>,
}

/// Owns peer discovery/advertisement and the logical session with currently
/// connected peers.
///
/// Created once per process session; lives for the lifetime of the owning
/// network service. Must be created inside a tokio runtime.
pub struct PeerConnection {
    local_peer: PeerId,
    invite_timeout: Duration,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    shared: Protected<ConnectionState>,
    inbound_tx: mpsc::UnboundedSender<InboundData>,
    inbound_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<InboundData>>>,
    started: AtomicBool,
}

impl PeerConnection {
    /// Create a connection over the given transport.
    ///
    /// The local peer identifier comes from `config.display_name`, or is
    /// random when unset.
    pub fn new(config: MeshConfig, transport: Box<dyn Transport>) -> Self {
        let local_peer = config
            .display_name
            .clone()
            .map(PeerId::new)
            .unwrap_or_else(PeerId::random);
        debug!(peer = %local_peer, service = %config.service_name, "created connection");

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            local_peer,
            invite_timeout: config.invite_timeout(),
            transport: Arc::new(Mutex::new(transport)),
            shared: Protected::new(ConnectionState {
                statuses: HashMap::new(),
                observers: Vec::new(),
            }),
            inbound_tx,
            inbound_rx: std::sync::Mutex::new(Some(inbound_rx)),
            started: AtomicBool::new(false),
        }
    }

    /// This device's peer identifier
    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    /// Begin simultaneous peer advertisement and discovery.
    ///
    /// Idempotent: a second call is a traced no-op.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(peer = %self.local_peer, "start called on a running connection");
            return Ok(());
        }

        let events = {
            let mut transport = self.transport.lock().await;
            match transport.start().await {
                Ok(()) => transport.take_events(),
                Err(error) => {
                    // A failed start must leave the connection startable.
                    self.started.store(false, Ordering::SeqCst);
                    return Err(error);
                }
            }
        };
        let events = match events {
            Some(events) => events,
            None => {
                self.started.store(false, Ordering::SeqCst);
                return Err(TransportError::EventStreamClosed.into());
            }
        };

        tokio::spawn(run_event_loop(
            self.local_peer.clone(),
            self.invite_timeout,
            Arc::clone(&self.transport),
            self.shared.clone(),
            self.inbound_tx.clone(),
            events,
        ));
        info!(peer = %self.local_peer, "connection started");
        Ok(())
    }

    /// Stop advertising, browsing, and all sessions
    pub async fn stop(&self) -> Result<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut transport = self.transport.lock().await;
        transport.stop().await
    }

    /// Register a status observer.
    ///
    /// Every session transition for any peer is delivered exactly once per
    /// observer. Observers hold a non-owning relation to the connection;
    /// dropping the receiver ends the registration.
    pub async fn subscribe_status(&self) -> mpsc::UnboundedReceiver<StatusEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .write(move |state| state.observers.push(tx))
            .await;
        rx
    }

    /// Take the inbound data stream; yields `None` after the first call
    pub fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<InboundData>> {
        self.inbound_rx.lock().expect("inbound receiver lock").take()
    }

    /// Send bytes to every currently connected peer.
    ///
    /// Completes successfully with the payload echoed back when no peers
    /// are connected; a transport failure surfaces once per call, without
    /// retry or per-peer reporting.
    pub async fn broadcast(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let peers = self.connected_peers().await;
        if peers.is_empty() {
            debug!(peer = %self.local_peer, "broadcast with no connected peers");
            return Ok(bytes);
        }
        let mut transport = self.transport.lock().await;
        transport.send(&peers, &bytes).await?;
        debug!(peer = %self.local_peer, count = peers.len(), "broadcast sent");
        Ok(bytes)
    }

    /// Peers currently in the `Connected` state
    pub async fn connected_peers(&self) -> SmallVec<[PeerId; 8]> {
        self.shared
            .read(|state| {
                state
                    .statuses
                    .iter()
                    .filter(|(_, status)| **status == ConnectionStatus::Connected)
                    .map(|(peer, _)| peer.clone())
                    .collect()
            })
            .await
    }

    /// Last known status for a peer; `Disconnected` when never seen
    pub async fn status_of(&self, peer: &PeerId) -> ConnectionStatus {
        self.shared
            .read(|state| {
                state
                    .statuses
                    .get(peer)
                    .copied()
                    .unwrap_or(ConnectionStatus::Disconnected)
            })
            .await
    }
}

// ----------------------------------------------------------------------------
// Event Loop
// ----------------------------------------------------------------------------

async fn run_event_loop(
    local_peer: PeerId,
    invite_timeout: Duration,
    transport: Arc<Mutex<Box<dyn Transport>>>,
    shared: Protected<ConnectionState>,
    inbound: mpsc::UnboundedSender<InboundData>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::PeerFound { peer } => {
                let seen = shared
                    .read(|state| state.statuses.contains_key(&peer))
                    .await;
                if seen {
                    continue;
                }
                // First sight: record the initial state and invite the peer
                // into the shared session.
                let recorded = peer.clone();
                shared
                    .write(move |state| {
                        state
                            .statuses
                            .insert(recorded, ConnectionStatus::Disconnected);
                    })
                    .await;
                debug!(local = %local_peer, %peer, "found peer, inviting");
                let mut transport = transport.lock().await;
                if let Err(error) = transport.invite(&peer, invite_timeout).await {
                    warn!(local = %local_peer, %peer, %error, "invitation failed");
                }
            }
            TransportEvent::PeerLost { peer } => {
                debug!(local = %local_peer, %peer, "lost peer");
            }
            TransportEvent::InvitationReceived { peer, reply } => {
                // Trust-all policy: every invitation on the local mesh is
                // accepted. Known limitation, there is no authorization step.
                info!(local = %local_peer, %peer, "accepting invitation");
                let _ = reply.send(true);
            }
            TransportEvent::SessionChanged { peer, state } => {
                let status = ConnectionStatus::from_session(state);
                let recorded = peer.clone();
                shared
                    .write(move |state| {
                        state.statuses.insert(recorded, status);
                    })
                    .await;
                // Emitted after the write is visible, once per transition
                // and observer.
                let observers = shared.read(|state| state.observers.clone()).await;
                let event = StatusEvent { peer, status };
                let mut any_closed = false;
                for observer in &observers {
                    if observer.send(event.clone()).is_err() {
                        any_closed = true;
                    }
                }
                if any_closed {
                    shared
                        .write(|state| state.observers.retain(|tx| !tx.is_closed()))
                        .await;
                }
            }
            TransportEvent::DataReceived { peer, bytes } => {
                let _ = inbound.send(InboundData { peer, bytes });
            }
        }
    }
    debug!(local = %local_peer, "connection event loop ended");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
