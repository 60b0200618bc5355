//! MeshChat demonstration CLI
//!
//! Wires N in-process peers over the in-memory transport and exchanges a
//! message, printing received traffic and membership changes.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
