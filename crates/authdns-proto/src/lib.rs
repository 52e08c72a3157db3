//! DNS wire codec
//!
//! Transport-agnostic encoding and decoding of DNS messages: the 12-byte
//! header, questions, resource records for the answer/authority/additional
//! sections, and the OPT pseudo-RR carrying EDNS(0) options including DNS
//! Cookies. Name decoding accepts compression pointers; encoding always
//! emits uncompressed names.

pub mod edns;
pub mod header;
pub mod message;
pub mod name;
pub mod question;
pub mod record;

pub use edns::{EdnsOption, OptRecord, OPTION_COOKIE, OPT_TYPE};
pub use header::{Header, HEADER_LEN, OPCODE_QUERY, RCODE_NOERROR, RCODE_NXDOMAIN};
pub use message::Message;
pub use name::{decode_name, encode_name, MAX_LABEL_LENGTH, MAX_NAME_LENGTH, MAX_POINTER_JUMPS};
pub use question::Question;
pub use record::{Rdata, ResourceRecord};

/// Query type matching any record type in a question
pub const QTYPE_ANY: u16 = 255;
