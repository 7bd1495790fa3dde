//! # relog-resolver
//!
//! The asynchronous resolver pipeline: reads a log stream, finds IPv4
//! literals, resolves them to hostnames over a bounded pool of concurrent
//! reverse-DNS queries, and re-emits the stream in input order with the
//! addresses rewritten in place.
//!
//! The core is single-threaded cooperative: one [`Resolver`] owns the line
//! buffer, the two-tier pending table, the work queue, the slot table, and
//! the statistics, and interleaves refill / dispatch / react / sweep /
//! commit on one task. Apparent concurrency comes from many in-flight UDP
//! queries multiplexed by a bounded readiness wait.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub mod buffer;
mod commit;
pub mod driver;
pub mod pending;
pub mod progress;
mod reactor;
pub mod recurse;
pub mod scan;
pub mod slots;
pub mod stats;

pub use driver::Resolver;
pub use recurse::NameMask;
pub use scan::AddressScanner;
pub use stats::Stats;

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Resolver pipeline errors.
///
/// Per-query failures never surface here; they are counted and routed
/// through the fallback chain. These are the failures of the pipeline's own
/// plumbing: the input stream, the output stream, the store.
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The resolution database failed fatally (open or compact).
    #[error(transparent)]
    Store(#[from] relog_store::StoreError),
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable the class-recursion fallback when a direct PTR fails.
    pub recursive: bool,

    /// Scan addresses anywhere on a line, not only at line start.
    pub anywhere: bool,

    /// Per-query deadline.
    pub timeout: Duration,

    /// Concurrent query slot bound.
    pub sockets: usize,

    /// Line buffer bound.
    pub line_cache: usize,

    /// Name mask template for recursion-synthesized names.
    pub mask: String,

    /// Consult the store before issuing a query.
    pub db_first: bool,

    /// Never issue queries; answer from the store or fail.
    pub db_only: bool,

    /// Emit a per-host status glyph to standard error.
    pub progress: bool,

    /// Collect the addresses that end up unresolved.
    pub track_unresolved: bool,

    /// Nameserver to query.
    pub server: SocketAddr,

    /// Ceiling on one reactor readiness wait. Not user-facing; tests
    /// tighten it so timeout paths run quickly.
    pub reactor_wait: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recursive: false,
            anywhere: false,
            timeout: Duration::from_secs(30),
            sockets: 64,
            line_cache: 10_000,
            mask: "%i.%c".to_string(),
            db_first: false,
            db_only: false,
            progress: false,
            track_unresolved: false,
            server: "127.0.0.1:53".parse().expect("literal address"),
            reactor_wait: Duration::from_secs(5),
        }
    }
}
