//! Domain name wire encoding and decoding
//!
//! Names are encoded as `<len><label>` sequences terminated by a zero
//! length byte. Decoding follows compression pointers (RFC 1035 §4.1.4);
//! encoding never emits them. Pointer traversal is bounded by a jump
//! counter and a visited set, so hostile messages cannot make a single
//! name parse quadratic or cyclic.

use std::collections::HashSet;

use authdns_core::{DnsError, DnsResult};
use bytes::{BufMut, BytesMut};

/// Maximum bytes in a single label
pub const MAX_LABEL_LENGTH: usize = 63;
/// Maximum bytes in a full encoded name, terminator included
pub const MAX_NAME_LENGTH: usize = 255;
/// Maximum compression pointer follows per name parse
pub const MAX_POINTER_JUMPS: usize = 50;

/// Encode `name` onto `buf` in uncompressed wire format
///
/// A trailing dot is trimmed; the root name (`"."` or `""`) encodes to a
/// single zero byte.
pub fn encode_name(name: &str, buf: &mut BytesMut) -> DnsResult<()> {
    let name = name.trim_end_matches('.');
    if name.is_empty() {
        buf.put_u8(0);
        return Ok(());
    }

    let mut encoded_len = 1usize; // terminator
    for label in name.split('.') {
        if label.is_empty() {
            return Err(DnsError::wire(format!("empty label in name {name:?}")));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(DnsError::wire(format!(
                "label exceeds {MAX_LABEL_LENGTH} bytes in name {name:?}"
            )));
        }
        encoded_len += 1 + label.len();
        if encoded_len > MAX_NAME_LENGTH {
            return Err(DnsError::wire(format!("name {name:?} exceeds {MAX_NAME_LENGTH} bytes")));
        }
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
    buf.put_u8(0);
    Ok(())
}

/// Decode the name starting at `offset` within `message`
///
/// Returns the lowercased dotted name and the offset of the first byte
/// after the name at the outer call site, regardless of any pointer jumps
/// taken along the way.
pub fn decode_name(message: &[u8], offset: usize) -> DnsResult<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = offset;
    let mut next: Option<usize> = None;
    let mut jumps = 0usize;
    let mut visited: HashSet<usize> = HashSet::new();
    let mut encoded_len = 1usize;

    loop {
        let len_byte = *message
            .get(pos)
            .ok_or_else(|| DnsError::wire(format!("name truncated at offset {pos}")))?;

        match len_byte & 0xC0 {
            0xC0 => {
                let low = *message.get(pos + 1).ok_or_else(|| {
                    DnsError::wire(format!("truncated compression pointer at offset {pos}"))
                })?;
                let target = (((len_byte & 0x3F) as usize) << 8) | low as usize;

                if next.is_none() {
                    next = Some(pos + 2);
                }
                jumps += 1;
                if jumps > MAX_POINTER_JUMPS {
                    return Err(DnsError::wire(format!(
                        "more than {MAX_POINTER_JUMPS} compression jumps in one name"
                    )));
                }
                if !visited.insert(target) {
                    return Err(DnsError::wire(format!(
                        "compression pointer loop at offset {target}"
                    )));
                }
                if target >= message.len() {
                    return Err(DnsError::wire(format!(
                        "compression pointer outside message: offset {target}"
                    )));
                }
                pos = target;
            }
            0x40 | 0x80 => {
                return Err(DnsError::wire(format!("invalid label type byte {len_byte:#04x}")));
            }
            _ => {
                let len = len_byte as usize;
                if len == 0 {
                    if next.is_none() {
                        next = Some(pos + 1);
                    }
                    break;
                }
                if pos + 1 + len > message.len() {
                    return Err(DnsError::wire(format!("label truncated at offset {pos}")));
                }
                encoded_len += 1 + len;
                if encoded_len > MAX_NAME_LENGTH {
                    return Err(DnsError::wire(format!(
                        "decoded name exceeds {MAX_NAME_LENGTH} bytes"
                    )));
                }
                let label = std::str::from_utf8(&message[pos + 1..pos + 1 + len])
                    .map_err(|_| DnsError::wire(format!("non-UTF-8 label at offset {pos}")))?;
                labels.push(label.to_ascii_lowercase());
                pos += 1 + len;
            }
        }
    }

    // `next` is always set before the loop exits
    let next = next.unwrap_or(pos + 1);
    Ok((labels.join("."), next))
}
