//! DNS resource records.
//!
//! Records carry typed data for the three types the resolver looks at
//! (PTR, NS, SOA); everything else keeps its raw bytes so a reply full of
//! unrelated records still parses.

use crate::error::Result;
use crate::name::{Name, NameParser};
use crate::question::{read_u16, read_u32};
use crate::rtype::{RecordClass, RecordType};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SOA record data (RFC 1035 §3.3.13).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SoaData {
    /// Primary name server for the zone.
    pub mname: Name,
    /// Mailbox of the responsible person.
    pub rname: Name,
    /// Zone serial number.
    pub serial: u32,
    /// Refresh interval in seconds.
    pub refresh: u32,
    /// Retry interval in seconds.
    pub retry: u32,
    /// Expire time in seconds.
    pub expire: u32,
    /// Negative-caching TTL in seconds.
    pub minimum: u32,
}

impl SoaData {
    /// Creates SOA data with zeroed timers, enough for testing and for
    /// synthesizing negative responses.
    pub fn new(mname: Name, rname: Name, serial: u32) -> Self {
        Self {
            mname,
            rname,
            serial,
            refresh: 0,
            retry: 0,
            expire: 0,
            minimum: 0,
        }
    }
}

/// Typed record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RData {
    /// PTR - the domain name an address points back to.
    Ptr(Name),
    /// NS - an authoritative name server.
    Ns(Name),
    /// SOA - start of authority.
    Soa(SoaData),
    /// Any other record type, raw and uninterpreted.
    Other(Vec<u8>),
}

impl RData {
    /// Returns the PTR target, if this is a PTR record.
    #[inline]
    pub fn as_ptr(&self) -> Option<&Name> {
        match self {
            Self::Ptr(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the name server name, if this is an NS record.
    #[inline]
    pub fn as_ns(&self) -> Option<&Name> {
        match self {
            Self::Ns(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the SOA data, if this is an SOA record.
    #[inline]
    pub fn as_soa(&self) -> Option<&SoaData> {
        match self {
            Self::Soa(soa) => Some(soa),
            _ => None,
        }
    }

    fn wire_len(&self) -> usize {
        match self {
            Self::Ptr(name) | Self::Ns(name) => name.wire_len(),
            Self::Soa(soa) => soa.mname.wire_len() + soa.rname.wire_len() + 20,
            Self::Other(data) => data.len(),
        }
    }

    fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::Ptr(name) | Self::Ns(name) => name.write_wire(buf),
            Self::Soa(soa) => {
                soa.mname.write_wire(buf);
                soa.rname.write_wire(buf);
                buf.put_u32(soa.serial);
                buf.put_u32(soa.refresh);
                buf.put_u32(soa.retry);
                buf.put_u32(soa.expire);
                buf.put_u32(soa.minimum);
            }
            Self::Other(data) => buf.extend_from_slice(data),
        }
    }
}

/// A complete resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// The name this record belongs to.
    pub name: Name,
    /// The record type.
    pub rtype: RecordType,
    /// The record class.
    pub rclass: RecordClass,
    /// Time to live in seconds.
    pub ttl: u32,
    /// The record data.
    pub rdata: RData,
}

impl ResourceRecord {
    /// Creates a PTR record.
    pub fn ptr(name: Name, ttl: u32, target: Name) -> Self {
        Self {
            name,
            rtype: RecordType::Ptr,
            rclass: RecordClass::In,
            ttl,
            rdata: RData::Ptr(target),
        }
    }

    /// Creates an NS record.
    pub fn ns(name: Name, ttl: u32, nsdname: Name) -> Self {
        Self {
            name,
            rtype: RecordType::Ns,
            rclass: RecordClass::In,
            ttl,
            rdata: RData::Ns(nsdname),
        }
    }

    /// Creates an SOA record.
    pub fn soa(name: Name, ttl: u32, soa: SoaData) -> Self {
        Self {
            name,
            rtype: RecordType::Soa,
            rclass: RecordClass::In,
            ttl,
            rdata: RData::Soa(soa),
        }
    }

    /// Parses a record at `offset`; returns it and the bytes consumed.
    ///
    /// `message` must be the complete message buffer, since rdata names may
    /// point back into earlier sections.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let parser = NameParser::new(message);
        let (name, name_len) = parser.parse_name(offset)?;

        let fixed = offset + name_len;
        let rtype = RecordType::from_u16(read_u16(message, fixed)?);
        let rclass = RecordClass::from_u16(read_u16(message, fixed + 2)?);
        let ttl = read_u32(message, fixed + 4)?;
        let rdlen = read_u16(message, fixed + 8)? as usize;

        let rdata_start = fixed + 10;
        let rdata_bytes = message
            .get(rdata_start..rdata_start + rdlen)
            .ok_or(crate::error::Error::UnexpectedEof {
                offset: rdata_start + rdlen,
            })?;

        let rdata = match rtype {
            RecordType::Ptr => RData::Ptr(parser.parse_name(rdata_start)?.0),
            RecordType::Ns => RData::Ns(parser.parse_name(rdata_start)?.0),
            RecordType::Soa => {
                let (mname, mname_len) = parser.parse_name(rdata_start)?;
                let (rname, rname_len) = parser.parse_name(rdata_start + mname_len)?;
                let timers = rdata_start + mname_len + rname_len;
                RData::Soa(SoaData {
                    mname,
                    rname,
                    serial: read_u32(message, timers)?,
                    refresh: read_u32(message, timers + 4)?,
                    retry: read_u32(message, timers + 8)?,
                    expire: read_u32(message, timers + 12)?,
                    minimum: read_u32(message, timers + 16)?,
                })
            }
            _ => RData::Other(rdata_bytes.to_vec()),
        };

        Ok((
            Self {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            name_len + 10 + rdlen,
        ))
    }

    /// Returns the wire length of this record (uncompressed).
    pub fn wire_len(&self) -> usize {
        self.name.wire_len() + 10 + self.rdata.wire_len()
    }

    /// Writes the record in wire format (no compression).
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.put_u16(self.rtype.to_u16());
        buf.put_u16(self.rclass.to_u16());
        buf.put_u32(self.ttl);
        buf.put_u16(self.rdata.wire_len() as u16);
        self.rdata.write_to(buf);
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.name, self.ttl, self.rclass, self.rtype
        )
    }
}
