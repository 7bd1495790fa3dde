//! DNS message header.
//!
//! The fixed 12-byte structure at the start of every DNS message.

use crate::error::{Error, Result};
use crate::rtype::ResponseCode;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Size of the DNS header in bytes.
pub const HEADER_SIZE: usize = 12;

bitflags! {
    /// DNS header flag bits.
    ///
    /// The opcode (bits 0x7800) and response code (bits 0x000F) live in the
    /// same wire word but are carried as separate [`Header`] fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct HeaderFlags: u16 {
        /// Query/Response: 0 = query, 1 = response.
        const QR = 0x8000;
        /// Authoritative Answer.
        const AA = 0x0400;
        /// Truncation.
        const TC = 0x0200;
        /// Recursion Desired.
        const RD = 0x0100;
        /// Recursion Available.
        const RA = 0x0080;
        /// Authentic Data (DNSSEC).
        const AD = 0x0020;
        /// Checking Disabled (DNSSEC).
        const CD = 0x0010;
    }
}

/// DNS message header.
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ANCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    NSCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Message identifier, matching requests to responses.
    pub id: u16,
    /// Flag bits.
    pub flags: HeaderFlags,
    /// Operation code (0 = standard query).
    pub opcode: u8,
    /// Response code.
    pub rcode: ResponseCode,
    /// Number of questions.
    pub qd_count: u16,
    /// Number of answer records.
    pub an_count: u16,
    /// Number of authority records.
    pub ns_count: u16,
    /// Number of additional records.
    pub ar_count: u16,
}

impl Header {
    /// Creates a query header with recursion desired.
    pub fn query(id: u16) -> Self {
        Self {
            id,
            flags: HeaderFlags::RD,
            opcode: 0,
            rcode: ResponseCode::NoError,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// Creates a response header answering `query`.
    pub fn response_to(query: &Header) -> Self {
        Self {
            id: query.id,
            flags: HeaderFlags::QR | HeaderFlags::RA | (query.flags & HeaderFlags::RD),
            opcode: query.opcode,
            rcode: ResponseCode::NoError,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        }
    }

    /// Returns true if the QR bit marks this as a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.flags.contains(HeaderFlags::QR)
    }

    /// Parses a header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::buffer_too_short(HEADER_SIZE, data.len()));
        }

        let word = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        let flag_word = word(2);

        Ok(Self {
            id: word(0),
            flags: HeaderFlags::from_bits_truncate(flag_word),
            opcode: ((flag_word >> 11) & 0x0F) as u8,
            rcode: ResponseCode::from_u8((flag_word & 0x0F) as u8),
            qd_count: word(4),
            an_count: word(6),
            ns_count: word(8),
            ar_count: word(10),
        })
    }

    /// Writes the header in wire format.
    pub fn write_to(&self, buf: &mut bytes::BytesMut) {
        use bytes::BufMut;

        let flag_word = self.flags.bits()
            | (u16::from(self.opcode & 0x0F) << 11)
            | u16::from(self.rcode.to_u8() & 0x0F);

        buf.put_u16(self.id);
        buf.put_u16(flag_word);
        buf.put_u16(self.qd_count);
        buf.put_u16(self.an_count);
        buf.put_u16(self.ns_count);
        buf.put_u16(self.ar_count);
    }
}
