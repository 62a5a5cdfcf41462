//! Render surfaces
//!
//! A surface is an append-only, fixed-height text region. It knows nothing
//! about the protocol or about threads: the [`Renderer`] is its only writer.

pub mod ansi;
pub mod memory;
pub mod renderer;

use std::io;

pub use ansi::AnsiSurface;
pub use memory::MemorySurface;
pub use renderer::{timestamped, RenderHandle, RenderRequest, Renderer};

/// Trait for render surfaces
pub trait RenderSurface {
    /// Number of message rows before wrapping
    fn height(&self) -> usize;

    /// Write `text` at logical `row`, blanking the surface first if asked
    fn append_line(&mut self, text: &str, row: usize, clear_first: bool) -> io::Result<()>;

    /// Blank every row
    fn clear(&mut self) -> io::Result<()>;

    /// Called once before the first line
    fn init(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Called once after the last line
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Reset the input prompt after the user submitted a line
    fn prompt(&mut self) -> io::Result<()> {
        Ok(())
    }
}
