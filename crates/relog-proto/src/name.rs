//! Domain names and wire-format name parsing.
//!
//! Names are stored in uncompressed wire format (length-prefixed labels,
//! terminated by the root label), inline for the common case. Parsing from a
//! message buffer follows compression pointers (RFC 1035 §4.1.4) with
//! backward-only and jump-count guards.
//!
//! Comparison and hashing are case-insensitive per RFC 1035.

use crate::error::{Error, Result};
use bytes::BytesMut;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Maximum length of a single label in bytes.
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum wire length of a name, including length bytes and the root label.
pub const MAX_NAME_LENGTH: usize = 255;

/// Pointer-jump ceiling during parsing; anything deeper is a loop.
const MAX_POINTER_JUMPS: usize = 32;

/// A DNS domain name.
///
/// The wire representation always includes the terminating root label, so
/// the root name is the single byte `0`.
#[derive(Clone)]
pub struct Name {
    /// Uncompressed wire format, terminating zero included.
    wire: SmallVec<[u8; 64]>,
    /// Number of labels, excluding the root.
    labels: u8,
}

impl Name {
    /// Returns the root name.
    pub fn root() -> Self {
        Self {
            wire: SmallVec::from_slice(&[0]),
            labels: 0,
        }
    }

    /// Builds a name from an iterator of text labels.
    pub fn from_labels<I, L>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let mut wire = SmallVec::new();
        let mut count = 0u8;

        for label in labels {
            let label = label.as_ref();
            if label.is_empty() {
                return Err(Error::EmptyLabel {
                    position: count as usize,
                });
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: label.len() });
            }
            if wire.len() + 1 + label.len() + 1 > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong {
                    length: wire.len() + 1 + label.len() + 1,
                });
            }
            wire.push(label.len() as u8);
            wire.extend_from_slice(label);
            count += 1;
        }

        wire.push(0);
        Ok(Self {
            wire,
            labels: count,
        })
    }

    /// Builds the reverse-lookup name `d.c.b.a.in-addr.arpa.` for an address.
    pub fn reverse_ipv4(addr: Ipv4Addr) -> Self {
        let octets = addr.octets();
        Self::reverse_octets(&octets)
    }

    /// Builds the reverse-lookup name for a prefix of one to four octets,
    /// e.g. `[1, 2, 3]` becomes `3.2.1.in-addr.arpa.`.
    pub fn reverse_octets(octets: &[u8]) -> Self {
        debug_assert!((1..=4).contains(&octets.len()));

        let mut parts: SmallVec<[String; 6]> = octets
            .iter()
            .rev()
            .map(|o| o.to_string())
            .collect();
        parts.push("in-addr".to_string());
        parts.push("arpa".to_string());

        // Octet strings and the fixed suffix always fit the limits.
        Self::from_labels(parts.iter().map(|s| s.as_bytes()))
            .expect("reverse name within limits")
    }

    /// Returns the uncompressed wire representation.
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the wire length, terminating zero included.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Returns the number of labels, excluding the root.
    #[inline]
    pub fn label_count(&self) -> usize {
        self.labels as usize
    }

    /// Returns true for the root name.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.labels == 0
    }

    /// Iterates over the labels as byte slices, root excluded.
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter {
            wire: &self.wire,
            pos: 0,
        }
    }

    /// Appends the wire representation to `buf` (no compression).
    pub fn write_wire(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.wire);
    }

    /// Returns the textual form without the trailing root dot.
    ///
    /// The `Display` impl keeps the trailing dot; this form is what string
    /// manipulation (class-name derivation, masks) works on.
    pub fn to_dotless_string(&self) -> String {
        let mut out = String::with_capacity(self.wire.len());
        for label in self.labels() {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&String::from_utf8_lossy(label));
        }
        out
    }
}

/// Iterator over the labels of a [`Name`].
pub struct LabelIter<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = *self.wire.get(self.pos)? as usize;
        if len == 0 {
            return None;
        }
        let start = self.pos + 1;
        self.pos = start + len;
        self.wire.get(start..start + len)
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses a dotted name; a single trailing dot is accepted and ignored.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_suffix('.').unwrap_or(s);
        if s.is_empty() {
            return Ok(Self::root());
        }
        Self::from_labels(s.split('.').map(str::as_bytes))
    }
}

impl fmt::Display for Name {
    /// Writes the absolute form, trailing root dot included.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for label in self.labels() {
            write!(f, "{}.", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{}\")", self)
    }
}

impl PartialEq for Name {
    /// Case-insensitive comparison per DNS semantics.
    fn eq(&self, other: &Self) -> bool {
        // Length bytes are never ASCII letters, so a byte-wise
        // case-insensitive comparison is exact.
        self.wire.len() == other.wire.len()
            && self
                .wire
                .iter()
                .zip(other.wire.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in &self.wire {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parser for names embedded in a DNS message buffer.
///
/// Holds the complete message so compression pointers can be resolved.
#[derive(Debug, Clone, Copy)]
pub struct NameParser<'a> {
    message: &'a [u8],
}

impl<'a> NameParser<'a> {
    /// Creates a parser over the complete message buffer.
    #[inline]
    pub const fn new(message: &'a [u8]) -> Self {
        Self { message }
    }

    /// Parses a name starting at `offset`.
    ///
    /// Returns the name and the number of bytes consumed at the starting
    /// position (pointers count as two bytes; their targets are not
    /// consumed).
    pub fn parse_name(&self, offset: usize) -> Result<(Name, usize)> {
        let mut wire: SmallVec<[u8; 64]> = SmallVec::new();
        let mut labels = 0u8;
        let mut pos = offset;
        let mut consumed = 0;
        let mut jumped = false;
        let mut jumps = 0;

        loop {
            let len_byte = *self
                .message
                .get(pos)
                .ok_or(Error::UnexpectedEof { offset: pos })?;

            // Compression pointer: top two bits set.
            if len_byte & 0xC0 == 0xC0 {
                let low = *self
                    .message
                    .get(pos + 1)
                    .ok_or(Error::UnexpectedEof { offset: pos + 1 })?;
                let target = usize::from(u16::from_be_bytes([len_byte & 0x3F, low]));

                if target >= pos {
                    return Err(Error::InvalidPointer {
                        offset: pos,
                        target,
                    });
                }
                if !jumped {
                    consumed = pos - offset + 2;
                    jumped = true;
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(Error::TooManyPointerJumps {
                        max_jumps: MAX_POINTER_JUMPS,
                    });
                }
                pos = target;
                continue;
            }

            // Reserved label types (01 / 10 in the top bits).
            if len_byte & 0xC0 != 0 {
                return Err(Error::InvalidLabelType {
                    offset: pos,
                    label_type: len_byte,
                });
            }

            let len = len_byte as usize;
            if len == 0 {
                wire.push(0);
                if !jumped {
                    consumed = pos - offset + 1;
                }
                break;
            }

            let label = self
                .message
                .get(pos + 1..pos + 1 + len)
                .ok_or(Error::UnexpectedEof {
                    offset: pos + 1 + len,
                })?;

            if wire.len() + 1 + len + 1 > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong {
                    length: wire.len() + 1 + len + 1,
                });
            }

            wire.push(len_byte);
            wire.extend_from_slice(label);
            labels += 1;
            pos += 1 + len;
        }

        Ok((Name { wire, labels }, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_and_display() {
        let name: Name = "www.Example.COM".parse().unwrap();
        assert_eq!(name.label_count(), 3);
        assert_eq!(name.to_string(), "www.Example.COM.");
        assert_eq!(name.to_dotless_string(), "www.Example.COM");

        let dotted: Name = "www.example.com.".parse().unwrap();
        assert_eq!(name, dotted);
    }

    #[test]
    fn root_name() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), ".");
        assert_eq!(root.wire_len(), 1);
        assert_eq!("".parse::<Name>().unwrap(), root);
    }

    #[test]
    fn case_insensitive_eq_and_hash() {
        use std::collections::HashSet;

        let a: Name = "NS.Example.net".parse().unwrap();
        let b: Name = "ns.example.NET".parse().unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn reverse_names() {
        let host = Name::reverse_ipv4(Ipv4Addr::new(1, 2, 3, 4));
        assert_eq!(host.to_string(), "4.3.2.1.in-addr.arpa.");

        let class = Name::reverse_octets(&[1, 2, 3]);
        assert_eq!(class.to_string(), "3.2.1.in-addr.arpa.");

        let net = Name::reverse_octets(&[10]);
        assert_eq!(net.to_string(), "10.in-addr.arpa.");
    }

    #[test]
    fn label_limits() {
        let long = "a".repeat(64);
        assert!(matches!(
            long.parse::<Name>(),
            Err(Error::LabelTooLong { .. })
        ));

        let label = "a".repeat(63);
        let too_long = [label.as_str(); 5].join(".");
        assert!(matches!(
            too_long.parse::<Name>(),
            Err(Error::NameTooLong { .. })
        ));
    }

    #[test]
    fn parse_uncompressed() {
        let wire = b"\x04host\x07example\x00rest";
        let (name, consumed) = NameParser::new(wire).parse_name(0).unwrap();
        assert_eq!(name.to_string(), "host.example.");
        assert_eq!(consumed, 14);
    }

    #[test]
    fn parse_with_pointer() {
        // "example." at 0, then "host" + pointer to 0 at offset 9.
        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x07example\x00");
        buf.extend_from_slice(b"\x04host\xC0\x00");

        let parser = NameParser::new(&buf);
        let (name, consumed) = parser.parse_name(9).unwrap();
        assert_eq!(name.to_string(), "host.example.");
        assert_eq!(consumed, 7); // "host" label + 2-byte pointer
    }

    #[test]
    fn forward_pointer_rejected() {
        let buf = b"\xC0\x05\x00\x00\x00\x00";
        assert!(matches!(
            NameParser::new(buf).parse_name(0),
            Err(Error::InvalidPointer { .. })
        ));
    }

    #[test]
    fn self_referential_pointer_rejected() {
        // Pointer at 2 targets 0, which is a pointer targeting itself.
        let buf = b"\xC0\x00\xC0\x00";
        assert!(NameParser::new(buf).parse_name(2).is_err());
    }
}
