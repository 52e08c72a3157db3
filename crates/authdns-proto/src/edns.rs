//! EDNS(0) OPT pseudo-RR and DNS Cookies
//!
//! The OPT record (RFC 6891) rides in the additional section with an empty
//! root name. Its CLASS field carries the requestor's UDP payload size and
//! its TTL field packs `extended_rcode:8, version:8, DO:1, Z:15`. The rdata
//! is a sequence of option TLVs; option code 10 is the DNS Cookie
//! (RFC 7873): a mandatory 8-byte client cookie plus an optional server
//! cookie of 8 to 32 bytes.

use authdns_core::{DnsError, DnsResult};
use bytes::{BufMut, BytesMut};

/// Resource record type of the OPT pseudo-RR
pub const OPT_TYPE: u16 = 41;
/// EDNS option code for DNS Cookies
pub const OPTION_COOKIE: u16 = 10;

/// A single EDNS option TLV
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdnsOption {
    /// DNS Cookie: 8-byte client cookie, optional 8–32 byte server cookie
    Cookie { client: [u8; 8], server: Option<Vec<u8>> },
    /// Any other option, carried opaquely
    Unknown { code: u16, data: Vec<u8> },
}

impl EdnsOption {
    pub fn code(&self) -> u16 {
        match self {
            EdnsOption::Cookie { .. } => OPTION_COOKIE,
            EdnsOption::Unknown { code, .. } => *code,
        }
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_u16(self.code());
        match self {
            EdnsOption::Cookie { client, server } => {
                let len = 8 + server.as_ref().map_or(0, |s| s.len());
                buf.put_u16(len as u16);
                buf.put_slice(client);
                if let Some(server) = server {
                    buf.put_slice(server);
                }
            }
            EdnsOption::Unknown { data, .. } => {
                buf.put_u16(data.len() as u16);
                buf.put_slice(data);
            }
        }
    }

    fn parse(code: u16, data: &[u8]) -> DnsResult<EdnsOption> {
        if code != OPTION_COOKIE {
            return Ok(EdnsOption::Unknown { code, data: data.to_vec() });
        }
        if data.len() < 8 {
            return Err(DnsError::wire(format!(
                "DNS cookie shorter than the 8-byte client cookie ({} bytes)",
                data.len()
            )));
        }
        let mut client = [0u8; 8];
        client.copy_from_slice(&data[..8]);
        let server = match data.len() - 8 {
            0 => None,
            8..=32 => Some(data[8..].to_vec()),
            n => {
                return Err(DnsError::wire(format!("invalid server cookie length {n}")));
            }
        };
        Ok(EdnsOption::Cookie { client, server })
    }
}

/// The OPT pseudo-RR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptRecord {
    pub udp_payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    pub dnssec_ok: bool,
    pub z: u16,
    pub options: Vec<EdnsOption>,
}

impl OptRecord {
    /// Decode the OPT record at `offset`, returning it and the next offset
    ///
    /// The caller has already established that the record at `offset` has
    /// type 41; this re-reads the fixed fields and parses the option TLVs.
    pub fn decode(message: &[u8], offset: usize) -> DnsResult<(OptRecord, usize)> {
        let root = *message
            .get(offset)
            .ok_or_else(|| DnsError::wire("OPT record truncated"))?;
        if root != 0 {
            return Err(DnsError::wire("OPT record name must be the root"));
        }

        let fixed = offset + 1;
        if fixed + 10 > message.len() {
            return Err(DnsError::wire("OPT record truncated after name"));
        }
        let rtype = u16::from_be_bytes([message[fixed], message[fixed + 1]]);
        if rtype != OPT_TYPE {
            return Err(DnsError::wire(format!("expected OPT record, got type {rtype}")));
        }
        let udp_payload_size = u16::from_be_bytes([message[fixed + 2], message[fixed + 3]]);
        let extended_rcode = message[fixed + 4];
        let version = message[fixed + 5];
        let flags = u16::from_be_bytes([message[fixed + 6], message[fixed + 7]]);
        let rdlength = u16::from_be_bytes([message[fixed + 8], message[fixed + 9]]) as usize;

        let rdata_start = fixed + 10;
        if rdata_start + rdlength > message.len() {
            return Err(DnsError::wire("OPT rdata truncated"));
        }
        let rdata = &message[rdata_start..rdata_start + rdlength];

        let mut options = Vec::new();
        let mut pos = 0usize;
        while pos < rdata.len() {
            if pos + 4 > rdata.len() {
                return Err(DnsError::wire("truncated EDNS option header"));
            }
            let code = u16::from_be_bytes([rdata[pos], rdata[pos + 1]]);
            let len = u16::from_be_bytes([rdata[pos + 2], rdata[pos + 3]]) as usize;
            if pos + 4 + len > rdata.len() {
                return Err(DnsError::wire(format!("EDNS option {code} overruns rdata")));
            }
            options.push(EdnsOption::parse(code, &rdata[pos + 4..pos + 4 + len])?);
            pos += 4 + len;
        }

        Ok((
            OptRecord {
                udp_payload_size,
                extended_rcode,
                version,
                dnssec_ok: (flags & 0x8000) != 0,
                z: flags & 0x7FFF,
                options,
            },
            rdata_start + rdlength,
        ))
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(0); // root name
        buf.put_u16(OPT_TYPE);
        buf.put_u16(self.udp_payload_size);
        buf.put_u8(self.extended_rcode);
        buf.put_u8(self.version);
        let mut flags = self.z & 0x7FFF;
        if self.dnssec_ok {
            flags |= 0x8000;
        }
        buf.put_u16(flags);

        let mut rdata = BytesMut::new();
        for option in &self.options {
            option.write(&mut rdata);
        }
        buf.put_u16(rdata.len() as u16);
        buf.put_slice(&rdata);
    }

    /// The DNS Cookie option, if present
    pub fn cookie(&self) -> Option<&EdnsOption> {
        self.options.iter().find(|o| o.code() == OPTION_COOKIE)
    }
}
