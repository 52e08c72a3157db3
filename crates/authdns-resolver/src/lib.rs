//! Authoritative query resolution
//!
//! For each question the resolver walks the qname's suffixes until the
//! cache produces an owning zone, matches that zone's records against the
//! expanded owner name and query type, and encodes one answer RR per rdata
//! entry. The response copies the request header (qr/aa set), echoes any
//! OPT pseudo-RR unchanged, and reports NXDOMAIN only when no question had
//! an owning zone at all.

use std::net::{Ipv4Addr, Ipv6Addr};

use authdns_core::{normalize_domain, DnsError, DnsResult, RecordType, Zone};
use authdns_proto::{
    Message, Rdata, ResourceRecord, QTYPE_ANY, RCODE_NOERROR, RCODE_NXDOMAIN,
};
use authdns_zone::ZoneCache;
use serde_json::Value;
use tracing::{debug, warn};

/// Resolve `request` into a response message
pub async fn resolve(cache: &ZoneCache, request: &Message) -> Message {
    let mut answers = Vec::new();
    let mut owned_questions = 0usize;

    for question in &request.questions {
        let qname = normalize_domain(&question.name);
        if let Some((zone_domain, zone)) = find_zone(cache, &qname).await {
            owned_questions += 1;
            answers.extend(match_records(&zone_domain, &zone, &qname, question.qtype));
        } else {
            debug!(%qname, "no owning zone");
        }
    }

    let mut header = request.header.clone();
    header.qr = true;
    header.aa = true;
    header.tc = false;
    header.ra = false;
    header.rcode = if !request.questions.is_empty() && owned_questions == 0 {
        RCODE_NXDOMAIN
    } else {
        RCODE_NOERROR
    };

    Message {
        header,
        questions: request.questions.clone(),
        answers,
        authorities: Vec::new(),
        additionals: Vec::new(),
        opt: request.opt.clone(),
    }
}

/// Walk `qname` and its parent suffixes until the cache yields a zone
async fn find_zone(cache: &ZoneCache, qname: &str) -> Option<(String, Zone)> {
    for suffix in suffixes(qname) {
        match cache.fetch(&suffix).await {
            Ok(zone) => return Some((suffix, zone)),
            Err(DnsError::NotFound) => {}
            Err(err) => {
                warn!(%suffix, %err, "zone lookup failed");
            }
        }
    }
    None
}

/// `a.b.c` yields `["a.b.c", "b.c", "c"]`
fn suffixes(qname: &str) -> Vec<String> {
    if qname.is_empty() {
        return Vec::new();
    }
    let mut out = vec![qname.to_string()];
    let mut rest = qname;
    while let Some((_, parent)) = rest.split_once('.') {
        out.push(parent.to_string());
        rest = parent;
    }
    out
}

/// Answer records for `qname`/`qtype` out of the owning zone
fn match_records(zone_domain: &str, zone: &Zone, qname: &str, qtype: u16) -> Vec<ResourceRecord> {
    let mut answers = Vec::new();

    for record in &zone.records {
        let rtype = match record.rtype.record_type() {
            Ok(rtype) => rtype,
            // Unsupported types contribute no answers
            Err(_) => continue,
        };
        if qtype != QTYPE_ANY && rtype.to_u16() != qtype {
            continue;
        }
        if record.owner(zone_domain) != qname {
            continue;
        }

        let entries = match rdata_entries(rtype, &record.data) {
            Ok(entries) => entries,
            Err(err) => {
                debug!(%qname, %err, "skipping record with malformed data");
                continue;
            }
        };
        let class = record.class_code().unwrap_or(1);
        let ttl = zone.effective_ttl(record);
        answers.extend(entries.into_iter().map(|rdata| ResourceRecord {
            name: qname.to_string(),
            class,
            ttl,
            rdata,
        }));
    }

    answers
}

/// Interpret a record's JSON `data` as one rdata entry per value
///
/// List-valued data produces multiple entries (one RR each); any malformed
/// entry rejects the whole record.
fn rdata_entries(rtype: RecordType, data: &Value) -> DnsResult<Vec<Rdata>> {
    let scalars: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    scalars.into_iter().map(|value| rdata_entry(rtype, value)).collect()
}

fn rdata_entry(rtype: RecordType, value: &Value) -> DnsResult<Rdata> {
    let malformed = || DnsError::validation(format!("malformed {rtype:?} data"));

    match rtype {
        RecordType::A => {
            let addr: Ipv4Addr =
                value.as_str().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
            Ok(Rdata::A(addr))
        }
        RecordType::AAAA => {
            let addr: Ipv6Addr =
                value.as_str().ok_or_else(malformed)?.parse().map_err(|_| malformed())?;
            Ok(Rdata::Aaaa(addr))
        }
        RecordType::NS => Ok(Rdata::Ns(host_string(value).ok_or_else(malformed)?)),
        RecordType::CNAME => Ok(Rdata::Cname(host_string(value).ok_or_else(malformed)?)),
        RecordType::PTR => Ok(Rdata::Ptr(host_string(value).ok_or_else(malformed)?)),
        RecordType::TXT => {
            let text = value.as_str().ok_or_else(malformed)?;
            Ok(Rdata::Txt(vec![text.to_string()]))
        }
        RecordType::MX => {
            let object = value.as_object().ok_or_else(malformed)?;
            let preference = object
                .get("preference")
                .and_then(Value::as_u64)
                .filter(|p| *p <= u16::MAX as u64)
                .ok_or_else(malformed)?;
            let exchange = object
                .get("exchange")
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty())
                .ok_or_else(malformed)?;
            Ok(Rdata::Mx { preference: preference as u16, exchange: exchange.to_string() })
        }
        RecordType::SOA => {
            let object = value.as_object().ok_or_else(malformed)?;
            let name = |field: &str| {
                object.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(malformed)
            };
            let number = |field: &str| {
                object
                    .get(field)
                    .and_then(Value::as_u64)
                    .filter(|n| *n <= u32::MAX as u64)
                    .map(|n| n as u32)
                    .ok_or_else(malformed)
            };
            Ok(Rdata::Soa {
                mname: name("mname")?,
                rname: name("rname")?,
                serial: number("serial")?,
                refresh: number("refresh")?,
                retry: number("retry")?,
                expire: number("expire")?,
                minimum: number("minimum")?,
            })
        }
    }
}

fn host_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}
