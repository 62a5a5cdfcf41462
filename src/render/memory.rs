//! In-memory surface, for tests and headless runs

use std::io;

use super::RenderSurface;

/// Row buffer that also keeps every line ever appended
#[derive(Debug, Clone)]
pub struct MemorySurface {
    rows: Vec<String>,
    history: Vec<String>,
    clears: usize,
}

impl MemorySurface {
    pub fn new(height: usize) -> Self {
        Self {
            rows: vec![String::new(); height.max(1)],
            history: Vec::new(),
            clears: 0,
        }
    }

    /// Current visible rows
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Every appended line, in order
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// How many times the surface was blanked
    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl RenderSurface for MemorySurface {
    fn height(&self) -> usize {
        self.rows.len()
    }

    fn append_line(&mut self, text: &str, row: usize, clear_first: bool) -> io::Result<()> {
        if clear_first {
            self.clear()?;
        }
        let height = self.rows.len();
        self.rows[row % height] = text.to_string();
        self.history.push(text.to_string());
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.rows.iter_mut().for_each(String::clear);
        self.clears += 1;
        Ok(())
    }
}
