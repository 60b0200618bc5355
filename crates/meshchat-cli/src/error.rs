//! CLI error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("mesh error: {0}")]
    Mesh(#[from] meshchat_core::MeshError),
}

pub type Result<T> = std::result::Result<T, CliError>;
