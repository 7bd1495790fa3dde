//! DNS message parse and build.

use crate::error::Result;
use crate::header::{Header, HEADER_SIZE};
use crate::question::Question;
use crate::record::ResourceRecord;
use crate::rtype::ResponseCode;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// A complete DNS message: header, questions, and three record sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The message header.
    header: Header,
    /// The question section.
    questions: Vec<Question>,
    /// The answer section.
    answers: Vec<ResourceRecord>,
    /// The authority section.
    authority: Vec<ResourceRecord>,
    /// The additional section.
    additional: Vec<ResourceRecord>,
}

impl Message {
    /// Creates a query message for a single question.
    pub fn query(id: u16, question: Question) -> Self {
        let mut header = Header::query(id);
        header.qd_count = 1;
        Self {
            header,
            questions: vec![question],
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Creates an empty response answering `query`, question echoed.
    pub fn response_to(query: &Message) -> Self {
        Self {
            header: Header::response_to(&query.header),
            questions: query.questions.clone(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Returns the header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the message id.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Sets the message id.
    #[inline]
    pub fn set_id(&mut self, id: u16) {
        self.header.id = id;
    }

    /// Returns the response code.
    #[inline]
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    /// Sets the response code.
    #[inline]
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode;
    }

    /// Returns the first question, if any.
    pub fn first_question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the answer section.
    #[inline]
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Returns the authority section.
    #[inline]
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Appends an answer record.
    pub fn push_answer(&mut self, record: ResourceRecord) {
        self.answers.push(record);
    }

    /// Appends an authority record.
    pub fn push_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
    }

    /// Parses a message from wire format.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        let mut offset = HEADER_SIZE;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            let (question, consumed) = Question::parse(data, offset)?;
            questions.push(question);
            offset += consumed;
        }

        let mut parse_section = |count: u16, offset: &mut usize| -> Result<Vec<ResourceRecord>> {
            let mut records = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let (record, consumed) = ResourceRecord::parse(data, *offset)?;
                records.push(record);
                *offset += consumed;
            }
            Ok(records)
        };

        let answers = parse_section(header.an_count, &mut offset)?;
        let authority = parse_section(header.ns_count, &mut offset)?;
        let additional = parse_section(header.ar_count, &mut offset)?;

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }

    /// Serializes the message, fixing up section counts.
    pub fn to_bytes(&self) -> BytesMut {
        let mut header = self.header.clone();
        header.qd_count = self.questions.len() as u16;
        header.an_count = self.answers.len() as u16;
        header.ns_count = self.authority.len() as u16;
        header.ar_count = self.additional.len() as u16;

        let mut buf = BytesMut::with_capacity(self.wire_len());
        header.write_to(&mut buf);
        for q in &self.questions {
            q.write_to(&mut buf);
        }
        for r in &self.answers {
            r.write_to(&mut buf);
        }
        for r in &self.authority {
            r.write_to(&mut buf);
        }
        for r in &self.additional {
            r.write_to(&mut buf);
        }
        buf
    }

    /// Returns the serialized length (uncompressed).
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE
            + self.questions.iter().map(Question::wire_len).sum::<usize>()
            + self
                .answers
                .iter()
                .chain(&self.authority)
                .chain(&self.additional)
                .map(ResourceRecord::wire_len)
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;
    use crate::rtype::RecordType;
    use std::str::FromStr;

    #[test]
    fn query_round_trip() {
        let question = Question::new(
            Name::reverse_ipv4([192, 0, 2, 7].into()),
            RecordType::Ptr,
        );
        let query = Message::query(0xBEEF, question);

        let parsed = Message::parse(&query.to_bytes()).unwrap();
        assert_eq!(parsed, query);
        assert_eq!(parsed.id(), 0xBEEF);
        assert_eq!(
            parsed.first_question().unwrap().name.to_string(),
            "7.2.0.192.in-addr.arpa."
        );
    }

    #[test]
    fn response_round_trip() {
        let question = Question::new(
            Name::reverse_ipv4([1, 2, 3, 4].into()),
            RecordType::Ptr,
        );
        let query = Message::query(1, question);

        let mut response = Message::response_to(&query);
        response.push_answer(ResourceRecord::ptr(
            Name::reverse_ipv4([1, 2, 3, 4].into()),
            3600,
            Name::from_str("host.example.").unwrap(),
        ));

        let parsed = Message::parse(&response.to_bytes()).unwrap();
        assert_eq!(parsed.id(), 1);
        assert!(parsed.header().is_response());
        assert_eq!(parsed.answers().len(), 1);
        assert_eq!(
            parsed.answers()[0].rdata.as_ptr().unwrap().to_string(),
            "host.example."
        );
    }

    #[test]
    fn nxdomain_with_soa_authority() {
        let question = Question::new(Name::reverse_octets(&[1, 2, 3]), RecordType::Ns);
        let query = Message::query(9, question);

        let mut response = Message::response_to(&query);
        response.set_rcode(ResponseCode::NxDomain);
        response.push_authority(ResourceRecord::soa(
            Name::reverse_octets(&[1, 2]),
            300,
            crate::record::SoaData::new(
                Name::from_str("ns.net.example.").unwrap(),
                Name::from_str("hostmaster.net.example.").unwrap(),
                1,
            ),
        ));

        let parsed = Message::parse(&response.to_bytes()).unwrap();
        assert_eq!(parsed.rcode(), ResponseCode::NxDomain);
        assert!(parsed.answers().is_empty());
        assert_eq!(parsed.authority().len(), 1);
    }
}
