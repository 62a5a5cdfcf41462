//! Chat server
//!
//! - [`Registry`]: bounded, lock-protected list of live sessions
//! - [`broadcast`]: fan-out of one sender's message to everyone else
//! - [`ClientHandler`]: lifecycle of one connection
//! - [`Server`]: accept loop

pub mod broadcast;
pub mod handler;
pub mod listener;
pub mod registry;

pub use broadcast::{broadcast, Delivery};
pub use handler::{ClientHandler, HandlerContext, HandlerExit, HandlerState};
pub use listener::{BoundServer, Server};
pub use registry::{Registry, Removal, Session};
