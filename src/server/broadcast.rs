//! Broadcast fan-out
//!
//! The registry lock is held from sender lookup to the last delivery, so
//! broadcasts never interleave with each other or with membership changes.

use log::debug;

use super::registry::Registry;
use crate::codec::encode_frame;
use crate::protocol::{format_line, Direction, DisplayName, Handle};

/// Per-broadcast delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Sessions the line was queued for
    pub delivered: usize,
    /// Sessions whose connection was already closed
    pub gone: usize,
}

/// Format `message` as sent by `sender` and queue it for every other session.
///
/// An unknown sender (already deregistered) is formatted with an empty
/// identity. Sessions that are gone are skipped, not removed; their own
/// handler deregisters them.
pub async fn broadcast(registry: &Registry, sender: Handle, message: &str) -> Delivery {
    registry
        .with_sessions(|sessions| {
            let anonymous = DisplayName::anonymous();
            let (address, name) = sessions
                .iter()
                .find(|s| s.handle == sender)
                .map(|s| (s.remote_address.as_str(), &s.display_name))
                .unwrap_or(("", &anonymous));

            let frame = encode_frame(&format_line(address, name, Direction::Incoming, message));

            let mut report = Delivery::default();
            for session in sessions.iter().filter(|s| s.handle != sender) {
                if session.deliver(frame.clone()) {
                    report.delivered += 1;
                } else {
                    debug!("Session {} gone, skipping", session.handle);
                    report.gone += 1;
                }
            }
            report
        })
        .await
}
