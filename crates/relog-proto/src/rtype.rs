//! Record types, classes, and response codes.
//!
//! Only the record types the resolver actually queries for (PTR, NS) or
//! inspects in replies (SOA) get named variants; everything else is carried
//! as its raw type code so unknown records can be skipped, not rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A DNS record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// NS - authoritative name server (RFC 1035).
    Ns,
    /// SOA - start of authority (RFC 1035).
    Soa,
    /// PTR - domain name pointer (RFC 1035).
    Ptr,
    /// Any other type, by raw code.
    Other(u16),
}

impl RecordType {
    /// Decodes a record type from its wire code.
    pub fn from_u16(code: u16) -> Self {
        match code {
            2 => Self::Ns,
            6 => Self::Soa,
            12 => Self::Ptr,
            other => Self::Other(other),
        }
    }

    /// Returns the wire code for this type.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Ns => 2,
            Self::Soa => 6,
            Self::Ptr => 12,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ns => write!(f, "NS"),
            Self::Soa => write!(f, "SOA"),
            Self::Ptr => write!(f, "PTR"),
            Self::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

/// A DNS record class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordClass {
    /// IN - the Internet class.
    In,
    /// Any other class, by raw code.
    Other(u16),
}

impl RecordClass {
    /// Decodes a record class from its wire code.
    pub fn from_u16(code: u16) -> Self {
        match code {
            1 => Self::In,
            other => Self::Other(other),
        }
    }

    /// Returns the wire code for this class.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::In => 1,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Other(code) => write!(f, "CLASS{}", code),
        }
    }
}

/// A DNS response code (4-bit header RCODE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseCode {
    /// No error.
    NoError,
    /// Format error - the server could not interpret the query.
    FormErr,
    /// Server failure.
    ServFail,
    /// Name error - the queried name does not exist.
    NxDomain,
    /// Not implemented.
    NotImp,
    /// Query refused.
    Refused,
    /// Any other code.
    Other(u8),
}

impl ResponseCode {
    /// Decodes a response code from the low header nibble.
    pub fn from_u8(code: u8) -> Self {
        match code {
            0 => Self::NoError,
            1 => Self::FormErr,
            2 => Self::ServFail,
            3 => Self::NxDomain,
            4 => Self::NotImp,
            5 => Self::Refused,
            other => Self::Other(other),
        }
    }

    /// Returns the wire nibble for this code.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoError => 0,
            Self::FormErr => 1,
            Self::ServFail => 2,
            Self::NxDomain => 3,
            Self::NotImp => 4,
            Self::Refused => 5,
            Self::Other(code) => code,
        }
    }

    /// Returns true for NOERROR.
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Self::NoError)
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "NOERROR"),
            Self::FormErr => write!(f, "FORMERR"),
            Self::ServFail => write!(f, "SERVFAIL"),
            Self::NxDomain => write!(f, "NXDOMAIN"),
            Self::NotImp => write!(f, "NOTIMP"),
            Self::Refused => write!(f, "REFUSED"),
            Self::Other(code) => write!(f, "RCODE{}", code),
        }
    }
}
