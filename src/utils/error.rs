// src/utils/error.rs
use crate::network::pool::Submission;
use serde_json;
use std::io;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use url;

/// Main error type for the mining application
///
/// This enum represents all possible error conditions that can occur
/// during mining operations, including configuration, network, protocol
/// and collaborator failures.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Errors related to network connectivity
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// WebSocket communication errors
    #[error("WebSocket error: {0}")]
    WsError(#[from] tungstenite::Error),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// The job source failed to produce work
    #[error("Job source error: {0}")]
    JobSourceError(String),

    /// A share could not be handed to the pool
    #[error("Share submission error: {0}")]
    SubmitError(String),

    /// Thread pool setup errors
    #[error("Task execution error: {0}")]
    TaskError(String),
}

/// Converts submission queue send errors into MinerError
///
/// Raised when a worker thread hands a share to the pool connection
/// after the connection loop has gone away.
impl From<tokio::sync::mpsc::error::SendError<Submission>> for MinerError {
    fn from(e: tokio::sync::mpsc::error::SendError<Submission>) -> Self {
        MinerError::SubmitError(format!("Share queue closed: {}", e))
    }
}

/// Converts hex decoding errors into MinerError
///
/// Used when invalid hex data is encountered in pool messages
/// or command line arguments.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::InputError(format!("Hex conversion failed: {}", e))
    }
}

/// Converts TOML parse errors into MinerError
///
/// Raised while loading the configuration file.
impl From<toml::de::Error> for MinerError {
    fn from(e: toml::de::Error) -> Self {
        MinerError::ConfigError(format!("Invalid config format: {}", e))
    }
}
