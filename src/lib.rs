//! linechat - line-oriented TCP chat
//!
//! A small chat system in two halves.
//!
//! # Overview
//!
//! linechat provides:
//! - A server that registers each connection under a short display name and
//!   broadcasts every message to all other registered users
//! - A client that sends typed lines and shows incoming traffic at the same
//!   time, drawing through a single render thread
//! - A newline-framed text protocol with fixed-column broadcast lines
//!
//! # Example
//!
//! ```no_run
//! use linechat::{ServerConfig, Server};
//!
//! # async fn demo() -> Result<(), linechat::error::ServerError> {
//! let config = ServerConfig { shutdown_on_empty: false, ..ServerConfig::default() };
//! Server::new(config).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod render;
pub mod server;
pub mod shutdown;

// Re-export commonly used types
pub use client::{connect, ChatSession, SessionEnd};
pub use config::{ClientConfig, ServerConfig};
pub use protocol::{format_line, Direction, DisplayName, Handle};
pub use render::{AnsiSurface, MemorySurface, RenderHandle, RenderSurface, Renderer};
pub use server::{BoundServer, Registry, Server};
pub use shutdown::ShutdownSignal;
