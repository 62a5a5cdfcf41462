//! Error types
//!
//! One enum per layer. Handlers never let these escape a single session;
//! only startup errors reach `main`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::Handle;

/// Errors produced while splitting a byte stream into frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("frame exceeds {0} bytes without a terminator")]
    TooLong(usize),

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,
}

/// Registry refusals. Neither variant alters existing entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry is full ({capacity} sessions)")]
    Full { capacity: usize },

    #[error("handle {0} is already registered")]
    DuplicateHandle(Handle),
}

/// Fatal server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Fatal client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not resolve hostname: {0}")]
    Resolve(String),

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("render thread failed: {0}")]
    Render(String),

    #[error("session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
