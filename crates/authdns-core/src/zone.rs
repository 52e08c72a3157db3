//! Zone data model and record type registry
//!
//! A zone is a JSON document: a name, a monotonically increasing version,
//! and an ordered list of record specifications. The same structure is
//! stored on disk, held in memory by the zone holders, and exchanged with
//! peers during replication.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DnsError, DnsResult};

/// Default TTL applied when neither the record nor the zone supplies one
pub const DEFAULT_TTL: u32 = 60;

/// Record types served by this server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordType {
    A = 1,
    NS = 2,
    CNAME = 5,
    SOA = 6,
    PTR = 12,
    MX = 15,
    TXT = 16,
    AAAA = 28,
}

impl RecordType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::A),
            2 => Some(Self::NS),
            5 => Some(Self::CNAME),
            6 => Some(Self::SOA),
            12 => Some(Self::PTR),
            15 => Some(Self::MX),
            16 => Some(Self::TXT),
            28 => Some(Self::AAAA),
            _ => None,
        }
    }

    /// Map a string tag (normalized to uppercase) to its type code
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "NS" => Some(Self::NS),
            "CNAME" => Some(Self::CNAME),
            "SOA" => Some(Self::SOA),
            "PTR" => Some(Self::PTR),
            "MX" => Some(Self::MX),
            "TXT" => Some(Self::TXT),
            "AAAA" => Some(Self::AAAA),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Record `type` field: a string tag or a raw numeric code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    Code(u16),
    Tag(String),
}

impl TypeSpec {
    /// Resolve against the type registry; unsupported types are rejected
    pub fn record_type(&self) -> DnsResult<RecordType> {
        match self {
            TypeSpec::Code(code) => RecordType::from_u16(*code)
                .ok_or_else(|| DnsError::validation(format!("unsupported record type {code}"))),
            TypeSpec::Tag(tag) => RecordType::from_tag(tag)
                .ok_or_else(|| DnsError::validation(format!("unsupported record type {tag:?}"))),
        }
    }
}

/// Record `class` field: `"IN"` or a raw numeric code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassSpec {
    Code(u16),
    Tag(String),
}

impl ClassSpec {
    pub fn class_code(&self) -> DnsResult<u16> {
        match self {
            ClassSpec::Code(code) => Ok(*code),
            ClassSpec::Tag(tag) if tag.eq_ignore_ascii_case("IN") => Ok(1),
            ClassSpec::Tag(tag) => {
                Err(DnsError::validation(format!("unsupported record class {tag:?}")))
            }
        }
    }
}

/// A single record specification inside a zone document
///
/// The `data` field is type-specific JSON: a string or list of strings for
/// the host/address types, an object (or list of objects) for MX, and a
/// full field object for SOA. It is validated on write and interpreted by
/// the resolver when answers are encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub rtype: TypeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<ClassSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub data: Value,
}

impl RecordSpec {
    /// Fully qualified owner name of this record within `zone`
    ///
    /// Absent, `""`, and `"@"` all mean the zone apex. An unqualified label
    /// becomes `<label>.<zone>`; a dotted value is taken as-is.
    pub fn owner(&self, zone: &str) -> String {
        let zone = normalize_domain(zone);
        match self.name.as_deref() {
            None | Some("") | Some("@") => zone,
            Some(name) => {
                let name = normalize_domain(name);
                if name.contains('.') {
                    name
                } else {
                    format!("{name}.{zone}")
                }
            }
        }
    }

    pub fn class_code(&self) -> DnsResult<u16> {
        match &self.class {
            Some(class) => class.class_code(),
            None => Ok(1),
        }
    }
}

/// An authoritative zone: the unit of storage, caching, and replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub records: Vec<RecordSpec>,
}

impl Zone {
    /// Effective TTL for a record: record-level, else zone-level, else 60
    pub fn effective_ttl(&self, record: &RecordSpec) -> u32 {
        record.ttl.or(self.ttl).unwrap_or(DEFAULT_TTL)
    }
}

/// Canonical form of a domain: lowercased, trailing dot stripped
pub fn normalize_domain(domain: &str) -> String {
    domain.trim_end_matches('.').to_ascii_lowercase()
}
