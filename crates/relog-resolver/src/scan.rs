//! Address-literal scanning.
//!
//! Finds dotted-quad IPv4 literals in a line of text. In anchored mode only
//! a literal at the very start of the line counts; in anywhere mode every
//! occurrence is reported, in order, with multiplicity.

use regex::Regex;

/// Scans lines for IPv4 address literals.
pub struct AddressScanner {
    candidates: Regex,
    anywhere: bool,
}

impl AddressScanner {
    /// Creates a scanner. `anywhere` switches from anchored to
    /// scan-the-whole-line mode.
    pub fn new(anywhere: bool) -> Self {
        // Candidate shape only; octet ranges and boundaries are checked in
        // code so "260.1.2.3" and digits glued to a quad never match.
        let candidates = Regex::new(r"(?:\d{1,3}\.){3}\d{1,3}").expect("static pattern");
        Self {
            candidates,
            anywhere,
        }
    }

    /// Returns every address literal on the line, in scan order. A literal
    /// occurring twice is reported twice.
    pub fn scan(&self, line: &str) -> Vec<String> {
        let mut found = Vec::new();

        for m in self.candidates.find_iter(line) {
            if !self.anywhere && m.start() != 0 {
                break;
            }
            if Self::accept(line, m.start(), m.end()) {
                found.push(m.as_str().to_string());
            }
            if !self.anywhere {
                break;
            }
        }

        found
    }

    fn accept(line: &str, start: usize, end: usize) -> bool {
        let bytes = line.as_bytes();

        // Part of a longer dotted run on the left.
        if start > 0 {
            let before = bytes[start - 1];
            if before.is_ascii_digit() || before == b'.' {
                return false;
            }
        }

        // A digit glued on the right, or a dot continuing into more digits
        // ("10.1.2.3.4"). A plain trailing dot (sentence end) is fine.
        match (bytes.get(end), bytes.get(end + 1)) {
            (Some(b), _) if b.is_ascii_digit() => return false,
            (Some(b'.'), Some(n)) if n.is_ascii_digit() => return false,
            _ => {}
        }

        line[start..end]
            .split('.')
            .all(|octet| octet.parse::<u8>().is_ok())
    }
}
