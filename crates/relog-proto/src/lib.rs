//! # relog-proto
//!
//! A deliberately small DNS wire codec: exactly the slice of the protocol a
//! reverse-resolving log rewriter needs. Queries are built for PTR and NS
//! lookups under `in-addr.arpa`; replies are parsed with full compression
//! pointer support, with typed data for PTR, NS, and SOA records and raw
//! bytes for everything else.
//!
//! No EDNS, no DNSSEC, no zone-file formats. Unknown record types parse and
//! re-serialize untouched, so a cluttered reply never kills a lookup.

pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod question;
pub mod record;
pub mod rtype;

pub use error::{Error, Result};
pub use header::{Header, HeaderFlags, HEADER_SIZE};
pub use message::Message;
pub use name::{Name, NameParser, MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
pub use question::Question;
pub use record::{RData, ResourceRecord, SoaData};
pub use rtype::{RecordClass, RecordType, ResponseCode};

/// Largest datagram the resolver will accept from a nameserver.
pub const MAX_UDP_PAYLOAD: usize = 4096;
