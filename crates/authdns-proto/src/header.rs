//! DNS message header

use authdns_core::{DnsError, DnsResult};
use bytes::{BufMut, BytesMut};

/// Wire length of the header
pub const HEADER_LEN: usize = 12;

pub const OPCODE_QUERY: u8 = 0;
pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_NXDOMAIN: u8 = 3;

/// The 12-byte DNS header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl Header {
    /// Decode and validate the header at the front of `message`
    pub fn decode(message: &[u8]) -> DnsResult<Header> {
        if message.len() < HEADER_LEN {
            return Err(DnsError::wire(format!(
                "message too short for header: {} bytes",
                message.len()
            )));
        }

        let id = u16::from_be_bytes([message[0], message[1]]);
        let flags = u16::from_be_bytes([message[2], message[3]]);

        let opcode = ((flags >> 11) & 0x0F) as u8;
        if opcode > 2 {
            return Err(DnsError::wire(format!("unsupported opcode {opcode}")));
        }

        Ok(Header {
            id,
            qr: (flags & 0x8000) != 0,
            opcode,
            aa: (flags & 0x0400) != 0,
            tc: (flags & 0x0200) != 0,
            rd: (flags & 0x0100) != 0,
            ra: (flags & 0x0080) != 0,
            z: ((flags >> 4) & 0x07) as u8,
            rcode: (flags & 0x000F) as u8,
            qdcount: u16::from_be_bytes([message[4], message[5]]),
            ancount: u16::from_be_bytes([message[6], message[7]]),
            nscount: u16::from_be_bytes([message[8], message[9]]),
            arcount: u16::from_be_bytes([message[10], message[11]]),
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.id);

        let mut flags = 0u16;
        if self.qr {
            flags |= 0x8000;
        }
        flags |= ((self.opcode & 0x0F) as u16) << 11;
        if self.aa {
            flags |= 0x0400;
        }
        if self.tc {
            flags |= 0x0200;
        }
        if self.rd {
            flags |= 0x0100;
        }
        if self.ra {
            flags |= 0x0080;
        }
        flags |= ((self.z & 0x07) as u16) << 4;
        flags |= (self.rcode & 0x0F) as u16;

        buf.put_u16(flags);
        buf.put_u16(self.qdcount);
        buf.put_u16(self.ancount);
        buf.put_u16(self.nscount);
        buf.put_u16(self.arcount);
    }
}
