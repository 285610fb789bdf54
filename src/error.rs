//! # Error Types
//!
//! Custom error types for the OBC communication core using `thiserror`.

use thiserror::Error;

use crate::shake::ShakeError;

/// Main error type for the OBC communication core
#[derive(Debug, Error)]
pub enum CommsError {
    /// Port index outside the driver's port table
    #[error("Invalid UART port {0}")]
    InvalidPort(u8),

    /// Baud rate not in the supported set
    #[error("Unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// Operation on a port that was never initialised
    #[error("UART port {0} has not been initialised")]
    PortNotInitialised(u8),

    /// Driver buffer sizing rejected
    #[error("Invalid driver settings: {0}")]
    InvalidSettings(String),

    /// Hardware backend failure
    #[error("UART hardware error: {0}")]
    Hardware(String),

    /// SHAKE misuse
    #[error("SHAKE error: {0}")]
    Shake(#[from] ShakeError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the OBC communication core
pub type Result<T> = std::result::Result<T, CommsError>;
