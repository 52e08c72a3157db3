//! Full DNS message parsing and serialization

use authdns_core::{DnsError, DnsResult};
use bytes::BytesMut;

use crate::edns::{OptRecord, OPT_TYPE};
use crate::header::{Header, HEADER_LEN};
use crate::name::decode_name;
use crate::question::Question;
use crate::record::ResourceRecord;

/// A parsed DNS message
///
/// The OPT pseudo-RR is held apart from the plain additional records: at
/// most one is accepted, and only in the additional section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
    pub opt: Option<OptRecord>,
}

/// Record type at `offset` without consuming the record
fn peek_type(message: &[u8], offset: usize) -> DnsResult<u16> {
    let (_, after_name) = decode_name(message, offset)?;
    if after_name + 2 > message.len() {
        return Err(DnsError::wire("record truncated after name"));
    }
    Ok(u16::from_be_bytes([message[after_name], message[after_name + 1]]))
}

impl Message {
    /// Parse a complete message, rejecting trailing bytes
    pub fn decode(data: &[u8]) -> DnsResult<Message> {
        let header = Header::decode(data)?;
        let mut offset = HEADER_LEN;

        let mut questions = Vec::new();
        for _ in 0..header.qdcount {
            let (question, next) = Question::decode(data, offset)?;
            questions.push(question);
            offset = next;
        }

        let mut answers = Vec::new();
        for _ in 0..header.ancount {
            if peek_type(data, offset)? == OPT_TYPE {
                return Err(DnsError::wire("OPT record outside the additional section"));
            }
            let (record, next) = ResourceRecord::decode(data, offset)?;
            answers.push(record);
            offset = next;
        }

        let mut authorities = Vec::new();
        for _ in 0..header.nscount {
            if peek_type(data, offset)? == OPT_TYPE {
                return Err(DnsError::wire("OPT record outside the additional section"));
            }
            let (record, next) = ResourceRecord::decode(data, offset)?;
            authorities.push(record);
            offset = next;
        }

        let mut additionals = Vec::new();
        let mut opt = None;
        for _ in 0..header.arcount {
            if peek_type(data, offset)? == OPT_TYPE {
                if opt.is_some() {
                    return Err(DnsError::wire("more than one OPT record"));
                }
                let (record, next) = OptRecord::decode(data, offset)?;
                opt = Some(record);
                offset = next;
            } else {
                let (record, next) = ResourceRecord::decode(data, offset)?;
                additionals.push(record);
                offset = next;
            }
        }

        if offset != data.len() {
            return Err(DnsError::wire(format!(
                "{} trailing bytes after declared sections",
                data.len() - offset
            )));
        }

        Ok(Message { header, questions, answers, authorities, additionals, opt })
    }

    /// Serialize, deriving the section counts from the section contents
    pub fn encode(&self) -> DnsResult<Vec<u8>> {
        let mut buf = BytesMut::new();

        let mut header = self.header.clone();
        header.qdcount = self.questions.len() as u16;
        header.ancount = self.answers.len() as u16;
        header.nscount = self.authorities.len() as u16;
        header.arcount = (self.additionals.len() + usize::from(self.opt.is_some())) as u16;
        header.encode(&mut buf);

        for question in &self.questions {
            question.encode(&mut buf)?;
        }
        for record in self.answers.iter().chain(&self.authorities).chain(&self.additionals) {
            record.encode(&mut buf)?;
        }
        if let Some(opt) = &self.opt {
            opt.encode(&mut buf);
        }

        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edns::EdnsOption;
    use crate::record::Rdata;

    fn sample_message() -> Message {
        Message {
            header: Header {
                id: 0x1234,
                qr: true,
                aa: true,
                rd: true,
                ..Header::default()
            },
            questions: vec![Question { name: "hello.test".into(), qtype: 1, qclass: 1 }],
            answers: vec![ResourceRecord {
                name: "hello.test".into(),
                class: 1,
                ttl: 300,
                rdata: Rdata::A("1.2.3.4".parse().unwrap()),
            }],
            authorities: vec![],
            additionals: vec![],
            opt: Some(OptRecord {
                udp_payload_size: 4096,
                extended_rcode: 0,
                version: 0,
                dnssec_ok: false,
                z: 0,
                options: vec![EdnsOption::Cookie {
                    client: [0x1A, 0x60, 0x9B, 0x45, 0x3C, 0xE6, 0x9B, 0x6B],
                    server: None,
                }],
            }),
        }
    }

    #[test]
    fn full_message_roundtrip() {
        let message = sample_message();
        let wire = message.encode().unwrap();
        let decoded = Message::decode(&wire).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut wire = sample_message().encode().unwrap();
        wire.push(0x00);
        assert!(Message::decode(&wire).is_err());
    }

    #[test]
    fn rejects_opt_in_answer_section() {
        // Hand-build: one "answer" that is an OPT record
        let mut buf = BytesMut::new();
        Header { ancount: 1, ..Header::default() }.encode(&mut buf);
        OptRecord {
            udp_payload_size: 512,
            extended_rcode: 0,
            version: 0,
            dnssec_ok: false,
            z: 0,
            options: vec![],
        }
        .encode(&mut buf);

        let err = Message::decode(&buf).unwrap_err();
        assert!(err.to_string().contains("additional"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_duplicate_opt() {
        let mut buf = BytesMut::new();
        Header { arcount: 2, ..Header::default() }.encode(&mut buf);
        let opt = OptRecord {
            udp_payload_size: 512,
            extended_rcode: 0,
            version: 0,
            dnssec_ok: false,
            z: 0,
            options: vec![],
        };
        opt.encode(&mut buf);
        opt.encode(&mut buf);

        let err = Message::decode(&buf).unwrap_err();
        assert!(err.to_string().contains("more than one OPT"), "unexpected error: {err}");
    }

    #[test]
    fn parses_cookie_query_vector() {
        // Query for hello.net A/IN with an OPT carrying a client-only DNS
        // cookie, captured off the wire.
        let hex = "C94E012000010000000000010568656C6C6F036E65740000010001000029100000000000000C000A00081A609B453CE69B6B";
        let raw: Vec<u8> = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect();

        let message = Message::decode(&raw).unwrap();
        assert_eq!(message.header.id, 0xC94E);
        assert_eq!(message.questions.len(), 1);
        assert_eq!(message.questions[0].name, "hello.net");
        assert_eq!(message.questions[0].qtype, 1);
        assert_eq!(message.questions[0].qclass, 1);

        let opt = message.opt.as_ref().unwrap();
        assert_eq!(opt.udp_payload_size, 4096);
        assert_eq!(
            opt.options,
            vec![EdnsOption::Cookie {
                client: [0x1A, 0x60, 0x9B, 0x45, 0x3C, 0xE6, 0x9B, 0x6B],
                server: None,
            }]
        );
        assert!(message.answers.is_empty());
        assert!(message.additionals.is_empty());
    }
}
