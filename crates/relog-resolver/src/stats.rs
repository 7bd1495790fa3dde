//! Run statistics.
//!
//! Plain fields, not atomics: the whole pipeline runs on one task, and the
//! driver owns this struct like everything else.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Counters for one run.
#[derive(Debug)]
pub struct Stats {
    /// Lines read from input.
    pub lines_read: u64,
    /// Lines written to output.
    pub lines_written: u64,
    /// Distinct hosts seen (pending entries created).
    pub hosts: u64,
    /// Queries sent (hosts and classes).
    pub queries_sent: u64,
    /// Replies received and accepted.
    pub responses: u64,
    /// Replies with nothing usable in them, unparsable datagrams included.
    pub bogus: u64,
    /// Queries that hit the per-query deadline.
    pub timeouts: u64,
    /// Hosts resolved by a nameserver PTR.
    pub resolved_ns: u64,
    /// Hosts resolved through class recursion.
    pub resolved_recursion: u64,
    /// Hosts resolved from the persistent store.
    pub resolved_store: u64,
    /// Hosts that ended unresolved.
    pub failed: u64,
    /// Slowest accepted reply.
    pub max_response: Duration,
    /// The unresolved addresses, when tracking is enabled.
    pub unresolved: Vec<String>,
    started: Instant,
}

impl Stats {
    /// Creates zeroed statistics, clock started.
    pub fn new() -> Self {
        Self {
            lines_read: 0,
            lines_written: 0,
            hosts: 0,
            queries_sent: 0,
            responses: 0,
            bogus: 0,
            timeouts: 0,
            resolved_ns: 0,
            resolved_recursion: 0,
            resolved_store: 0,
            failed: 0,
            max_response: Duration::ZERO,
            unresolved: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Records an accepted reply and its round-trip time.
    pub fn record_response(&mut self, elapsed: Duration) {
        self.responses += 1;
        if elapsed > self.max_response {
            self.max_response = elapsed;
        }
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Writes the end-of-run summary block.
    pub fn write_summary(
        &self,
        out: &mut impl Write,
        store_write_errors: Option<u64>,
    ) -> io::Result<()> {
        writeln!(out, "relog statistics:")?;
        writeln!(out, "  elapsed:               {:>10.1?}", self.elapsed())?;
        writeln!(out, "  lines read:            {:>10}", self.lines_read)?;
        writeln!(out, "  lines written:         {:>10}", self.lines_written)?;
        writeln!(out, "  distinct hosts:        {:>10}", self.hosts)?;
        writeln!(out, "  queries sent:          {:>10}", self.queries_sent)?;
        writeln!(out, "  replies received:      {:>10}", self.responses)?;
        writeln!(out, "  bogus replies:         {:>10}", self.bogus)?;
        writeln!(out, "  timeouts:              {:>10}", self.timeouts)?;
        writeln!(out, "  resolved (nameserver): {:>10}", self.resolved_ns)?;
        writeln!(out, "  resolved (recursion):  {:>10}", self.resolved_recursion)?;
        writeln!(out, "  resolved (database):   {:>10}", self.resolved_store)?;
        writeln!(out, "  unresolved:            {:>10}", self.failed)?;
        writeln!(out, "  slowest reply:         {:>10.1?}", self.max_response)?;
        if let Some(errors) = store_write_errors {
            if errors > 0 {
                writeln!(out, "  database write errors: {:>10}", errors)?;
            }
        }
        Ok(())
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
