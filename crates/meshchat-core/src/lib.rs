//! MeshChat Core Networking Layer
//!
//! This crate implements the peer-to-peer mesh layer that carries chat
//! messages between nearby devices: peer discovery and session establishment
//! ([`connection`]), typed broadcast and handler dispatch ([`service`]), the
//! wire frame codec ([`frame`]), and a protected state container for shared
//! mutable state touched from concurrent I/O tasks ([`protected`]).
//!
//! The crate does not render, persist, or authenticate anything. It moves
//! typed payloads between peers and delivers them to registered consumers
//! exactly once per received frame; everything above it is a collaborator
//! that constructs a [`NetworkService`], registers handlers, and renders
//! what comes out.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod connection;
pub mod errors;
pub mod frame;
pub mod handlers;
pub mod protected;
pub mod service;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::MeshConfig;
pub use connection::{ConnectionStatus, InboundData, PeerConnection};
pub use errors::{FrameError, MeshError, Result, TransportError};
pub use frame::{FramePayload, NetworkFrame, StatusEvent, TextMessage};
pub use protected::{Protected, WriteReceipt};
pub use service::NetworkService;
pub use types::{HandlerToken, PeerId};
