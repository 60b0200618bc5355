//! Network service: typed pub/sub over a peer connection
//!
//! [`NetworkService`] keeps a registry of handlers keyed by opaque tokens,
//! decodes inbound frames, fans each decoded payload out to every handler
//! whose mapper recognizes it, and exposes a typed broadcast that stamps the
//! sender identity. Local status transitions from the connection are
//! dispatched through the same registry as status payloads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MeshConfig;
use crate::connection::{InboundData, PeerConnection};
use crate::errors::MeshError;
use crate::frame::{FramePayload, NetworkFrame, StatusEvent, TextMessage};
use crate::handlers::{self, HandlerMap};
use crate::protected::Protected;
use crate::transport::Transport;
use crate::types::{HandlerToken, PeerId};
use crate::Result;

// ----------------------------------------------------------------------------
// Network Service
// ----------------------------------------------------------------------------

/// Typed pub/sub over a single [`PeerConnection`].
///
/// Created once per active chat surface and torn down with it; handlers
/// should be removed no later than teardown so no frame is dispatched into
/// a dead consumer.
pub struct NetworkService {
    connection: Arc<PeerConnection>,
    registry: Protected<HandlerMap>,
    started: AtomicBool,
}

impl NetworkService {
    /// Create a service owning a fresh connection over the given transport
    pub fn new(config: MeshConfig, transport: Box<dyn Transport>) -> Self {
        Self::with_connection(Arc::new(PeerConnection::new(config, transport)))
    }

    /// Create a service over an existing connection
    pub fn with_connection(connection: Arc<PeerConnection>) -> Self {
        Self {
            connection,
            registry: Protected::new(HandlerMap::new()),
            started: AtomicBool::new(false),
        }
    }

    /// This device's peer identifier
    pub fn local_peer(&self) -> &PeerId {
        self.connection.local_peer()
    }

    /// The underlying peer connection
    pub fn connection(&self) -> &Arc<PeerConnection> {
        &self.connection
    }

    /// Start the connection and begin dispatching inbound frames.
    ///
    /// Idempotent: a second call is a traced no-op.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(peer = %self.local_peer(), "start called on a running service");
            return Ok(());
        }
        if let Err(error) = self.connection.start().await {
            // A failed start must leave the service startable.
            self.started.store(false, Ordering::SeqCst);
            return Err(error);
        }

        let inbound = match self.connection.take_inbound() {
            Some(inbound) => inbound,
            None => {
                self.started.store(false, Ordering::SeqCst);
                return Err(MeshError::channel_error("inbound stream already taken"));
            }
        };
        let statuses = self.connection.subscribe_status().await;
        tokio::spawn(run_dispatch_loop(self.registry.clone(), inbound, statuses));
        info!(peer = %self.local_peer(), "network service started");
        Ok(())
    }

    /// Stop the underlying connection
    pub async fn stop(&self) -> Result<()> {
        self.connection.stop().await
    }

    /// Register a handler; returns its token and the typed delivery channel.
    ///
    /// The registration is live for every frame dispatched after this call
    /// returns. The mapper must be a pure function of the payload.
    pub async fn add_handler<T, M>(
        &self,
        mapper: M,
    ) -> (HandlerToken, mpsc::UnboundedReceiver<Result<T>>)
    where
        T: Send + 'static,
        M: Fn(&FramePayload) -> Option<Result<T>> + Send + Sync + 'static,
    {
        let token = HandlerToken::mint();
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = handlers::adapt(mapper, tx);
        self.registry
            .write(move |map| {
                map.insert(token, handler);
            })
            .await;
        debug!(%token, "handler registered");
        (token, rx)
    }

    /// Deregister a handler; unknown tokens are a no-op
    pub async fn remove_handler(&self, token: HandlerToken) {
        self.registry
            .write(move |map| {
                map.remove(&token);
            })
            .await;
        debug!(%token, "handler removed");
    }

    /// Register a handler for incoming text messages
    pub async fn subscribe_text_messages(
        &self,
    ) -> (HandlerToken, mpsc::UnboundedReceiver<Result<TextMessage>>) {
        self.add_handler(handlers::text_message_mapper).await
    }

    /// Register a handler for peer status transitions
    pub async fn subscribe_status_events(
        &self,
    ) -> (HandlerToken, mpsc::UnboundedReceiver<Result<StatusEvent>>) {
        self.add_handler(handlers::status_event_mapper).await
    }

    /// Broadcast a text message to every connected peer.
    ///
    /// Stamps the message's originator with this service's peer identifier
    /// exactly once, encodes it into a frame, and hands it to the
    /// connection. On success the caller gets the original typed message
    /// back, never raw bytes; a transport failure surfaces unchanged, with
    /// no retry.
    pub async fn broadcast(&self, mut message: TextMessage) -> Result<TextMessage> {
        message.originator = Some(self.local_peer().clone());
        let frame = NetworkFrame::with_payload(FramePayload::Text(message.clone()));
        let bytes = frame.encode()?;
        self.connection.broadcast(bytes).await?;
        Ok(message)
    }
}

// ----------------------------------------------------------------------------
// Dispatch Loop
// ----------------------------------------------------------------------------

async fn run_dispatch_loop(
    registry: Protected<HandlerMap>,
    mut inbound: mpsc::UnboundedReceiver<InboundData>,
    mut statuses: mpsc::UnboundedReceiver<StatusEvent>,
) {
    loop {
        let payload = tokio::select! {
            data = inbound.recv() => match data {
                Some(InboundData { peer, bytes }) => match NetworkFrame::decode(&bytes) {
                    Ok(NetworkFrame { payload: Some(payload), .. }) => payload,
                    Ok(_) => {
                        debug!(%peer, "empty frame, nothing to dispatch");
                        continue;
                    }
                    Err(error) => {
                        // Hard stop for this frame only; later frames and
                        // other handlers are unaffected.
                        warn!(%peer, %error, "dropping undecodable frame");
                        continue;
                    }
                },
                None => break,
            },
            status = statuses.recv() => match status {
                Some(event) => FramePayload::Status(event),
                None => break,
            },
        };

        let matched = registry
            .read(|map| {
                let mut matched = 0usize;
                for handler in map.values() {
                    if handler(&payload) {
                        matched += 1;
                    }
                }
                matched
            })
            .await;
        debug!(matched, "dispatched payload");
    }
    debug!("dispatch loop ended");
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
