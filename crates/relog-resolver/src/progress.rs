//! Per-host progress glyphs.
//!
//! One glyph per resolved host on standard error: `.` for a nameserver PTR,
//! `r` for recursion, `d` for a store hit. Fifty glyphs per row, each row
//! prefixed with the running count.

use std::io::{self, Write};

/// Glyphs per output row.
const ROW_WIDTH: u64 = 50;

/// The progress emitter.
#[derive(Debug, Default)]
pub struct Progress {
    emitted: u64,
}

impl Progress {
    /// Creates a fresh emitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one glyph to standard error.
    pub fn glyph(&mut self, glyph: char) {
        let chunk = self.render(glyph);
        let mut err = io::stderr().lock();
        let _ = err.write_all(chunk.as_bytes());
        let _ = err.flush();
    }

    /// Terminates the last row, if anything was emitted.
    pub fn finish(&mut self) {
        if self.emitted > 0 {
            let mut err = io::stderr().lock();
            let _ = err.write_all(b"\n");
            let _ = err.flush();
        }
    }

    fn render(&mut self, glyph: char) -> String {
        let mut chunk = String::new();
        if self.emitted % ROW_WIDTH == 0 {
            if self.emitted > 0 {
                chunk.push('\n');
            }
            chunk.push_str(&format!("{:>8} ", self.emitted));
        }
        chunk.push(glyph);
        self.emitted += 1;
        chunk
    }
}
