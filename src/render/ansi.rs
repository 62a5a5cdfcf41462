//! ANSI terminal surface
//!
//! Two panes on a plain ANSI terminal:
//! - a boxed message pane, `height` rows tall
//! - a `>> ` prompt line under it, where the terminal echoes typed input
//!
//! The row below the prompt is left free so the newline of a submitted
//! line never scrolls the screen.

use std::io::{self, Write};

use super::RenderSurface;
use crate::protocol::truncate_chars;

/// ANSI escape sequences
const CSI: &str = "\x1b[";

const PROMPT: &str = ">> ";

// Single-line box drawing
const TL: char = '┌';
const TR: char = '┐';
const BL: char = '└';
const BR: char = '┘';
const H: char = '─';
const V: char = '│';

/// Surface drawing to an ANSI terminal
pub struct AnsiSurface<W: Write> {
    out: W,
    /// Total width including the box
    cols: usize,
    /// Message rows inside the box
    rows: usize,
}

impl<W: Write> AnsiSurface<W> {
    pub fn new(out: W, cols: usize, rows: usize) -> Self {
        Self {
            out,
            cols: cols.max(3),
            rows: rows.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn inner_width(&self) -> usize {
        self.cols - 2
    }

    /// Screen row (0-based) of the prompt line
    fn prompt_row(&self) -> usize {
        self.rows + 2
    }

    /// Generate cursor move sequence (0-based in, 1-based out)
    fn move_cursor(&self, x: usize, y: usize) -> String {
        format!("{}{};{}H", CSI, y + 1, x + 1)
    }

    fn draw_box(&mut self) -> io::Result<()> {
        let horizontal: String = std::iter::repeat(H).take(self.inner_width()).collect();
        let mut output = String::new();

        output.push_str(&self.move_cursor(0, 0));
        output.push(TL);
        output.push_str(&horizontal);
        output.push(TR);

        for y in 1..=self.rows {
            output.push_str(&self.move_cursor(0, y));
            output.push(V);
            output.push_str(&self.move_cursor(self.cols - 1, y));
            output.push(V);
        }

        output.push_str(&self.move_cursor(0, self.rows + 1));
        output.push(BL);
        output.push_str(&horizontal);
        output.push(BR);

        self.out.write_all(output.as_bytes())
    }

    /// Write one row of the message pane, padded to the box width
    fn write_row(&mut self, y: usize, text: &str) -> io::Result<()> {
        let width = self.inner_width();
        let text: String = truncate_chars(text, width)
            .chars()
            // Control characters would corrupt the display
            .map(|ch| if ch < ' ' || ch == '\x7f' { ' ' } else { ch })
            .collect();
        let output = format!("{}{:<width$}", self.move_cursor(1, y + 1), text, width = width);
        self.out.write_all(output.as_bytes())
    }

    /// Put the cursor back at the end of the prompt
    fn park_cursor(&mut self) -> io::Result<()> {
        let output = self.move_cursor(PROMPT.len(), self.prompt_row());
        self.out.write_all(output.as_bytes())?;
        self.out.flush()
    }
}

impl<W: Write> RenderSurface for AnsiSurface<W> {
    fn height(&self) -> usize {
        self.rows
    }

    fn append_line(&mut self, text: &str, row: usize, clear_first: bool) -> io::Result<()> {
        if clear_first {
            self.clear()?;
        }
        self.write_row(row % self.rows, text)?;
        self.park_cursor()
    }

    fn clear(&mut self) -> io::Result<()> {
        for y in 0..self.rows {
            self.write_row(y, "")?;
        }
        self.park_cursor()
    }

    fn init(&mut self) -> io::Result<()> {
        let output = format!("{}0m{}2J{}H", CSI, CSI, CSI);
        self.out.write_all(output.as_bytes())?;
        self.draw_box()?;
        self.prompt()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        // Reset attributes, show cursor, clear screen, home cursor
        let output = format!("{}0m{}?25h{}2J{}H", CSI, CSI, CSI, CSI);
        self.out.write_all(output.as_bytes())?;
        self.out.flush()
    }

    fn prompt(&mut self) -> io::Result<()> {
        let output = format!("{}{}2K{}", self.move_cursor(0, self.prompt_row()), CSI, PROMPT);
        self.out.write_all(output.as_bytes())?;
        // The submitted line's newline landed on the row below
        let below = format!("{}{}2K", self.move_cursor(0, self.prompt_row() + 1), CSI);
        self.out.write_all(below.as_bytes())?;
        self.park_cursor()
    }
}
