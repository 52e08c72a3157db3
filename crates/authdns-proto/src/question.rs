//! DNS question section entries

use authdns_core::{DnsError, DnsResult};
use bytes::{BufMut, BytesMut};

use crate::name::{decode_name, encode_name};

/// A single question: `QNAME, QTYPE, QCLASS`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl Question {
    /// Decode the question at `offset`, returning it and the next offset
    pub fn decode(message: &[u8], offset: usize) -> DnsResult<(Question, usize)> {
        let (name, offset) = decode_name(message, offset)?;
        if offset + 4 > message.len() {
            return Err(DnsError::wire("question truncated after name"));
        }
        let qtype = u16::from_be_bytes([message[offset], message[offset + 1]]);
        let qclass = u16::from_be_bytes([message[offset + 2], message[offset + 3]]);
        Ok((Question { name, qtype, qclass }, offset + 4))
    }

    pub fn encode(&self, buf: &mut BytesMut) -> DnsResult<()> {
        encode_name(&self.name, buf)?;
        buf.put_u16(self.qtype);
        buf.put_u16(self.qclass);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips() {
        let question = Question { name: "hello.test".into(), qtype: 1, qclass: 1 };
        let mut buf = BytesMut::new();
        question.encode(&mut buf).unwrap();

        let (decoded, next) = Question::decode(&buf, 0).unwrap();
        assert_eq!(decoded, question);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn rejects_truncation() {
        let mut buf = BytesMut::new();
        Question { name: "a.test".into(), qtype: 1, qclass: 1 }.encode(&mut buf).unwrap();
        assert!(Question::decode(&buf[..buf.len() - 2], 0).is_err());
    }
}
