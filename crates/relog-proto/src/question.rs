//! DNS question section entries.

use crate::error::Result;
use crate::name::{Name, NameParser};
use crate::rtype::{RecordClass, RecordType};
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single question: a name, a type, and a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Question {
    /// The name being queried.
    pub name: Name,
    /// The record type being queried.
    pub rtype: RecordType,
    /// The record class (IN for everything this crate does).
    pub rclass: RecordClass,
}

impl Question {
    /// Creates an IN-class question.
    pub fn new(name: Name, rtype: RecordType) -> Self {
        Self {
            name,
            rtype,
            rclass: RecordClass::In,
        }
    }

    /// Parses a question at `offset`; returns it and the bytes consumed.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, name_len) = NameParser::new(message).parse_name(offset)?;

        let fixed = offset + name_len;
        let rtype = read_u16(message, fixed)?;
        let rclass = read_u16(message, fixed + 2)?;

        Ok((
            Self {
                name,
                rtype: RecordType::from_u16(rtype),
                rclass: RecordClass::from_u16(rclass),
            },
            name_len + 4,
        ))
    }

    /// Returns the wire length of this question.
    pub fn wire_len(&self) -> usize {
        self.name.wire_len() + 4
    }

    /// Writes the question in wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.put_u16(self.rtype.to_u16());
        buf.put_u16(self.rclass.to_u16());
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.rclass, self.rtype)
    }
}

pub(crate) fn read_u16(message: &[u8], offset: usize) -> Result<u16> {
    message
        .get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(crate::error::Error::UnexpectedEof { offset: offset + 2 })
}

pub(crate) fn read_u32(message: &[u8], offset: usize) -> Result<u32> {
    message
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(crate::error::Error::UnexpectedEof { offset: offset + 4 })
}
