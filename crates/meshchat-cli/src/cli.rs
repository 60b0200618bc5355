//! Command line interface definition

use std::path::PathBuf;

use clap::Parser;

/// MeshChat demo: an in-process mesh of chatting peers
#[derive(Debug, Parser)]
#[command(name = "meshchat", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of in-process peers to spawn (overrides config)
    #[arg(long)]
    pub peers: Option<usize>,

    /// Name of the first peer; the rest derive from it
    #[arg(long)]
    pub name: Option<String>,

    /// Message broadcast by the first peer once the mesh is up
    #[arg(short, long)]
    pub message: Option<String>,
}
