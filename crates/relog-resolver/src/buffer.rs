//! The bounded line buffer.
//!
//! An ordered window of input lines, each tagged with the address literals
//! it mentions (in scan order, with multiplicity). The committer releases
//! lines strictly from the head.

use std::collections::VecDeque;

/// One buffered input line.
#[derive(Debug)]
pub struct LineRecord {
    /// The raw line text.
    pub text: String,
    /// Address literals in scan order; duplicates appear as often as they
    /// occur in the text.
    pub hosts: Vec<String>,
}

/// The bounded window of lines awaiting resolution.
pub struct LineBuffer {
    window: VecDeque<LineRecord>,
    capacity: usize,
}

impl LineBuffer {
    /// Creates a buffer holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    /// Returns true when no more lines fit.
    pub fn is_full(&self) -> bool {
        self.window.len() >= self.capacity
    }

    /// Returns true when the window is empty.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Number of buffered lines.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Appends a line to the tail.
    pub fn push(&mut self, record: LineRecord) {
        debug_assert!(!self.is_full());
        self.window.push_back(record);
    }

    /// Looks at the head line.
    pub fn head(&self) -> Option<&LineRecord> {
        self.window.front()
    }

    /// Removes and returns the head line.
    pub fn pop_head(&mut self) -> Option<LineRecord> {
        self.window.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> LineRecord {
        LineRecord {
            text: text.to_string(),
            hosts: Vec::new(),
        }
    }

    #[test]
    fn fifo_order() {
        let mut buffer = LineBuffer::new(3);
        buffer.push(record("a"));
        buffer.push(record("b"));
        assert_eq!(buffer.head().unwrap().text, "a");
        assert_eq!(buffer.pop_head().unwrap().text, "a");
        assert_eq!(buffer.pop_head().unwrap().text, "b");
        assert!(buffer.pop_head().is_none());
    }

    #[test]
    fn capacity_bound() {
        let mut buffer = LineBuffer::new(2);
        assert!(!buffer.is_full());
        buffer.push(record("a"));
        buffer.push(record("b"));
        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 2);
    }
}
