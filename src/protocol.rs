//! Chat wire protocol
//!
//! Newline-delimited UTF-8 text frames over TCP.
//!
//! ## Client -> server
//! - `USER:<name>` registration, first frame only; name truncated to 5 chars
//! - `bye` disconnect request, never broadcast
//! - anything else is chat content
//!
//! ## Server -> client
//! - fixed-column broadcast lines (see [`format_line`])
//! - `SERVER:FULL` when the registry refused the connection
//!
//! Example broadcast line:
//! ```text
//! 127.0.0.1       [alice] << hi
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed server port
pub const DEFAULT_PORT: u16 = 8080;

/// Column width of the sender address field
pub const ADDRESS_WIDTH: usize = 15;
/// Column width of the display name field
pub const NAME_WIDTH: usize = 5;
/// Column width of the message field
pub const MESSAGE_WIDTH: usize = 40;

/// Longest line a user can type
pub const MAX_INPUT_LEN: usize = 80;
/// Longest frame accepted from the wire, terminator excluded. Fits a full
/// input line of 4-byte characters.
pub const MAX_FRAME_LEN: usize = 4 * MAX_INPUT_LEN;
/// Longest line handed to the render surface
pub const DISPLAY_LINE_LEN: usize = 88;

pub const REGISTRATION_PREFIX: &str = "USER:";
pub const QUIT_SENTINEL: &str = "bye";
pub const REJECT_FULL: &str = "SERVER:FULL";

/// Opaque connection handle, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// Allocate a fresh handle
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Handle(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user's display name, at most [`NAME_WIDTH`] characters
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    /// Build a name, truncating to [`NAME_WIDTH`] characters
    pub fn new(raw: &str) -> Self {
        DisplayName(truncate_chars(raw, NAME_WIDTH).to_string())
    }

    /// The identity used when a client never registered
    pub fn anonymous() -> Self {
        DisplayName(String::new())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which way a formatted line travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from another user
    Incoming,
    /// Typed locally
    Outgoing,
}

impl Direction {
    pub fn marker(&self) -> &'static str {
        match self {
            Direction::Incoming => "<<",
            Direction::Outgoing => ">>",
        }
    }
}

/// Longest prefix of `s` holding at most `max` characters
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Format one display line.
///
/// Layout is `{address:<15} [{name:<5}] {marker} {message:<40} `, every field
/// truncated to its width, so the line is always 68 characters. Clients rely
/// on these columns.
pub fn format_line(address: &str, name: &DisplayName, direction: Direction, message: &str) -> String {
    format!(
        "{:<aw$} [{:<nw$}] {} {:<mw$} ",
        truncate_chars(address, ADDRESS_WIDTH),
        name.as_str(),
        direction.marker(),
        truncate_chars(message, MESSAGE_WIDTH),
        aw = ADDRESS_WIDTH,
        nw = NAME_WIDTH,
        mw = MESSAGE_WIDTH,
    )
}

/// Build the registration frame for `name`
pub fn registration_frame(name: &DisplayName) -> String {
    format!("{}{}", REGISTRATION_PREFIX, name)
}

/// Parse a first frame. `None` means the client did not register.
pub fn parse_registration(frame: &str) -> Option<DisplayName> {
    frame.strip_prefix(REGISTRATION_PREFIX).map(DisplayName::new)
}

/// True if typed `text` is the quit sentinel
pub fn is_quit_sentinel(text: &str) -> bool {
    text.trim() == QUIT_SENTINEL
}

/// Split a typed line into message frames of at most [`MESSAGE_WIDTH`]
/// characters, so nothing is cut off by [`format_line`].
///
/// A tail that would read as the quit sentinel takes the last character of
/// the chunk before it.
pub fn split_message(line: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;
    while offset < line.len() {
        starts.push(offset);
        offset += truncate_chars(&line[offset..], MESSAGE_WIDTH).len();
    }

    if let [.., prev, last] = starts.as_mut_slice() {
        if &line[*last..] == QUIT_SENTINEL {
            if let Some((idx, _)) = line[*prev..*last].char_indices().last() {
                *last = *prev + idx;
            }
        }
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(line.len());
            &line[start..end]
        })
        .collect()
}

/// A frame received by the server after registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFrame<'a> {
    /// Disconnect request
    Quit,
    /// Chat content to broadcast
    Message(&'a str),
}

impl<'a> ChatFrame<'a> {
    pub fn parse(frame: &'a str) -> Self {
        if frame == QUIT_SENTINEL {
            ChatFrame::Quit
        } else {
            ChatFrame::Message(frame)
        }
    }
}

/// A frame received by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFrame<'a> {
    /// The server refused the connection
    Rejected,
    /// A formatted broadcast line
    Line(&'a str),
}

impl<'a> ServerFrame<'a> {
    pub fn parse(frame: &'a str) -> Self {
        if frame == REJECT_FULL {
            ServerFrame::Rejected
        } else {
            ServerFrame::Line(frame)
        }
    }
}
