//! Demo application wiring an in-process mesh

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use meshchat_core::transport::memory::MemoryHub;
use meshchat_core::{MeshConfig, NetworkService, PeerId, TextMessage};

use crate::config::AppConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// Demo Application
// ----------------------------------------------------------------------------

pub struct DemoApp {
    config: AppConfig,
}

impl DemoApp {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Spin up `peer_count` peers on one hub, let them connect, broadcast
    /// `message` from the first peer, and tear everything down.
    pub async fn run(
        &self,
        peer_count: usize,
        first_name: Option<String>,
        message: String,
    ) -> Result<()> {
        let hub = MemoryHub::new();
        let base = first_name.unwrap_or_else(|| "peer".to_string());

        let mut services = Vec::with_capacity(peer_count);
        for index in 0..peer_count {
            let name = if index == 0 {
                base.clone()
            } else {
                format!("{base}-{index}")
            };
            let service = self.spawn_peer(&hub, name).await?;
            services.push(service);
        }

        // Let discovery and the invitation handshake settle.
        let settle = Duration::from_millis(self.config.demo.settle_ms);
        sleep(settle).await;

        let sender = &services[0];
        let sent = sender.broadcast(TextMessage::new(message)).await?;
        info!(from = %sender.local_peer(), text = %sent.text, "broadcast");

        sleep(settle).await;
        for service in &services {
            service.stop().await?;
        }
        Ok(())
    }

    /// Create, subscribe, and start one peer
    async fn spawn_peer(&self, hub: &MemoryHub, name: String) -> Result<NetworkService> {
        let transport = Box::new(hub.endpoint(PeerId::new(name.clone())));
        let mesh = MeshConfig {
            display_name: Some(name),
            ..self.config.mesh.clone()
        };
        let service = NetworkService::new(mesh, transport);

        let (_token, mut texts) = service.subscribe_text_messages().await;
        let local = service.local_peer().clone();
        tokio::spawn(async move {
            while let Some(result) = texts.recv().await {
                match result {
                    Ok(message) => {
                        let from = message
                            .originator
                            .as_ref()
                            .map(PeerId::to_string)
                            .unwrap_or_else(|| "?".to_string());
                        info!(peer = %local, %from, text = %message.text, "received");
                    }
                    Err(error) => warn!(peer = %local, %error, "handler error"),
                }
            }
        });

        let (_token, mut statuses) = service.subscribe_status_events().await;
        let local = service.local_peer().clone();
        tokio::spawn(async move {
            while let Some(result) = statuses.recv().await {
                if let Ok(event) = result {
                    // Only joins and leaves render; the transitional state
                    // has no text.
                    if let Some(text) = event.status.display_text() {
                        info!(peer = %local, "{} {}", event.peer, text);
                    }
                }
            }
        });

        service.start().await?;
        Ok(service)
    }
}
