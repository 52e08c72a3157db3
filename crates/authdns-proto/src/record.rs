//! Resource records and rdata wire formats
//!
//! Covers the record types this server is authoritative for: A, NS, CNAME,
//! SOA, PTR, MX, TXT, and AAAA. Name-bearing rdata accepts compression
//! pointers on decode and must consume exactly the declared RDLENGTH;
//! anything else rejects the record. Unknown types are carried opaquely.

use std::net::{Ipv4Addr, Ipv6Addr};

use authdns_core::{DnsError, DnsResult, RecordType};
use bytes::{BufMut, BytesMut};

use crate::name::{decode_name, encode_name};

/// Decoded rdata for a resource record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rdata {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(String),
    Cname(String),
    Ptr(String),
    Mx { preference: u16, exchange: String },
    Txt(Vec<String>),
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Other { rtype: u16, data: Vec<u8> },
}

impl Rdata {
    pub fn rtype(&self) -> u16 {
        match self {
            Rdata::A(_) => RecordType::A.to_u16(),
            Rdata::Aaaa(_) => RecordType::AAAA.to_u16(),
            Rdata::Ns(_) => RecordType::NS.to_u16(),
            Rdata::Cname(_) => RecordType::CNAME.to_u16(),
            Rdata::Ptr(_) => RecordType::PTR.to_u16(),
            Rdata::Mx { .. } => RecordType::MX.to_u16(),
            Rdata::Txt(_) => RecordType::TXT.to_u16(),
            Rdata::Soa { .. } => RecordType::SOA.to_u16(),
            Rdata::Other { rtype, .. } => *rtype,
        }
    }

    /// Encode this rdata in canonical (uncompressed) form
    pub fn encode(&self, buf: &mut BytesMut) -> DnsResult<()> {
        match self {
            Rdata::A(addr) => buf.put_slice(&addr.octets()),
            Rdata::Aaaa(addr) => buf.put_slice(&addr.octets()),
            Rdata::Ns(host) | Rdata::Cname(host) | Rdata::Ptr(host) => {
                encode_name(host, buf)?;
            }
            Rdata::Mx { preference, exchange } => {
                buf.put_u16(*preference);
                encode_name(exchange, buf)?;
            }
            Rdata::Txt(chunks) => {
                for chunk in chunks {
                    let bytes = chunk.as_bytes();
                    if bytes.len() > 255 {
                        return Err(DnsError::wire(format!(
                            "TXT chunk exceeds 255 bytes ({})",
                            bytes.len()
                        )));
                    }
                    buf.put_u8(bytes.len() as u8);
                    buf.put_slice(bytes);
                }
            }
            Rdata::Soa { mname, rname, serial, refresh, retry, expire, minimum } => {
                encode_name(mname, buf)?;
                encode_name(rname, buf)?;
                buf.put_u32(*serial);
                buf.put_u32(*refresh);
                buf.put_u32(*retry);
                buf.put_u32(*expire);
                buf.put_u32(*minimum);
            }
            Rdata::Other { data, .. } => buf.put_slice(data),
        }
        Ok(())
    }

    /// Decode rdata of `rtype` occupying `message[start..start + rdlength]`
    ///
    /// The full message is required because name-bearing rdata may point
    /// back into earlier sections.
    pub fn decode(message: &[u8], start: usize, rdlength: usize, rtype: u16) -> DnsResult<Rdata> {
        let end = start + rdlength;
        if end > message.len() {
            return Err(DnsError::wire(format!(
                "rdata range {start}..{end} outside message of {} bytes",
                message.len()
            )));
        }
        let raw = &message[start..end];

        let rdata = match RecordType::from_u16(rtype) {
            Some(RecordType::A) => {
                let octets: [u8; 4] = raw
                    .try_into()
                    .map_err(|_| DnsError::wire(format!("A rdata must be 4 bytes, got {rdlength}")))?;
                Rdata::A(Ipv4Addr::from(octets))
            }
            Some(RecordType::AAAA) => {
                let octets: [u8; 16] = raw.try_into().map_err(|_| {
                    DnsError::wire(format!("AAAA rdata must be 16 bytes, got {rdlength}"))
                })?;
                Rdata::Aaaa(Ipv6Addr::from(octets))
            }
            Some(RecordType::NS) | Some(RecordType::CNAME) | Some(RecordType::PTR) => {
                let (host, next) = decode_name(message, start)?;
                if next != end {
                    return Err(DnsError::wire("rdata name does not fill RDLENGTH"));
                }
                match RecordType::from_u16(rtype) {
                    Some(RecordType::NS) => Rdata::Ns(host),
                    Some(RecordType::CNAME) => Rdata::Cname(host),
                    _ => Rdata::Ptr(host),
                }
            }
            Some(RecordType::MX) => {
                if rdlength < 3 {
                    return Err(DnsError::wire(format!("MX rdata too short: {rdlength} bytes")));
                }
                let preference = u16::from_be_bytes([raw[0], raw[1]]);
                let (exchange, next) = decode_name(message, start + 2)?;
                if next != end {
                    return Err(DnsError::wire("MX rdata does not fill RDLENGTH"));
                }
                Rdata::Mx { preference, exchange }
            }
            Some(RecordType::TXT) => {
                let mut chunks = Vec::new();
                let mut pos = 0usize;
                while pos < raw.len() {
                    let len = raw[pos] as usize;
                    if pos + 1 + len > raw.len() {
                        return Err(DnsError::wire("TXT chunk overruns RDLENGTH"));
                    }
                    let chunk = std::str::from_utf8(&raw[pos + 1..pos + 1 + len])
                        .map_err(|_| DnsError::wire("non-UTF-8 TXT chunk"))?;
                    chunks.push(chunk.to_string());
                    pos += 1 + len;
                }
                if chunks.is_empty() {
                    return Err(DnsError::wire("empty TXT rdata"));
                }
                Rdata::Txt(chunks)
            }
            Some(RecordType::SOA) => {
                let (mname, after_mname) = decode_name(message, start)?;
                let (rname, after_rname) = decode_name(message, after_mname)?;
                if after_rname + 20 != end {
                    return Err(DnsError::wire("SOA rdata does not fill RDLENGTH"));
                }
                let fields = &message[after_rname..after_rname + 20];
                let word =
                    |i: usize| u32::from_be_bytes([fields[i], fields[i + 1], fields[i + 2], fields[i + 3]]);
                Rdata::Soa {
                    mname,
                    rname,
                    serial: word(0),
                    refresh: word(4),
                    retry: word(8),
                    expire: word(12),
                    minimum: word(16),
                }
            }
            None => Rdata::Other { rtype, data: raw.to_vec() },
        };
        Ok(rdata)
    }
}

/// A resource record in the answer, authority, or additional section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub class: u16,
    pub ttl: u32,
    pub rdata: Rdata,
}

impl ResourceRecord {
    pub fn rtype(&self) -> u16 {
        self.rdata.rtype()
    }

    /// Decode the record at `offset`, returning it and the next offset
    pub fn decode(message: &[u8], offset: usize) -> DnsResult<(ResourceRecord, usize)> {
        let (name, offset) = decode_name(message, offset)?;
        if offset + 10 > message.len() {
            return Err(DnsError::wire("record truncated after name"));
        }
        let rtype = u16::from_be_bytes([message[offset], message[offset + 1]]);
        let class = u16::from_be_bytes([message[offset + 2], message[offset + 3]]);
        let ttl = u32::from_be_bytes([
            message[offset + 4],
            message[offset + 5],
            message[offset + 6],
            message[offset + 7],
        ]);
        let rdlength = u16::from_be_bytes([message[offset + 8], message[offset + 9]]) as usize;
        let rdata_start = offset + 10;
        if rdata_start + rdlength > message.len() {
            return Err(DnsError::wire(format!(
                "rdata truncated: declared {rdlength} bytes at offset {rdata_start}"
            )));
        }

        let rdata = Rdata::decode(message, rdata_start, rdlength, rtype)?;
        Ok((ResourceRecord { name, class, ttl, rdata }, rdata_start + rdlength))
    }

    pub fn encode(&self, buf: &mut BytesMut) -> DnsResult<()> {
        encode_name(&self.name, buf)?;
        buf.put_u16(self.rtype());
        buf.put_u16(self.class);
        buf.put_u32(self.ttl);

        let mut rdata = BytesMut::new();
        self.rdata.encode(&mut rdata)?;
        if rdata.len() > u16::MAX as usize {
            return Err(DnsError::wire(format!("rdata exceeds 65535 bytes ({})", rdata.len())));
        }
        buf.put_u16(rdata.len() as u16);
        buf.put_slice(&rdata);
        Ok(())
    }
}
