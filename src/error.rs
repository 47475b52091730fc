//! Error types for the VNC slots server.

use std::io;
use thiserror::Error;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, VncError>;

/// Errors that can occur while serving the game.
#[derive(Debug, Error)]
pub enum VncError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Client sent a message type we do not understand.
    #[error("unknown client message type {0:#04x}")]
    UnknownMessage(u8),

    /// An image asset was truncated or malformed.
    #[error("bad image data in {0}")]
    BadImage(String),

    /// No listening socket could be bound at startup.
    #[error("failed to bind any listening socket")]
    NoListeners,
}
