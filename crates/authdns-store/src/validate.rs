//! Zone document schema validation
//!
//! Applied on every write and during the startup scan. Errors carry the
//! record index so operators can locate the offending entry in the JSON.

use authdns_core::{DnsError, DnsResult, RecordSpec, RecordType, Zone};
use serde_json::Value;

/// Validate a zone document against the schema
pub fn validate_zone(zone: &Zone) -> DnsResult<()> {
    if let Some(version) = zone.version {
        if version < 1 {
            return Err(DnsError::validation("version must be a positive integer"));
        }
    }

    for (index, record) in zone.records.iter().enumerate() {
        validate_record(record).map_err(|err| match err {
            DnsError::Validation { message } => {
                DnsError::validation(format!("record {index}: {message}"))
            }
            other => other,
        })?;
    }

    Ok(())
}

fn validate_record(record: &RecordSpec) -> DnsResult<()> {
    if let Some(name) = &record.name {
        if name.is_empty() {
            return Err(DnsError::validation("name must be a non-empty string"));
        }
    }

    let rtype = record.rtype.record_type()?;
    record.class_code()?;

    match rtype {
        RecordType::A
        | RecordType::AAAA
        | RecordType::NS
        | RecordType::CNAME
        | RecordType::PTR
        | RecordType::TXT => validate_string_data(&record.data),
        RecordType::MX => validate_mx_data(&record.data),
        RecordType::SOA => validate_soa_data(&record.data),
    }
}

fn validate_string_data(data: &Value) -> DnsResult<()> {
    match data {
        Value::String(s) if !s.is_empty() => Ok(()),
        Value::String(_) => Err(DnsError::validation("data must be a non-empty string")),
        Value::Array(items) if !items.is_empty() => {
            for item in items {
                match item {
                    Value::String(s) if !s.is_empty() => {}
                    _ => {
                        return Err(DnsError::validation(
                            "data list entries must be non-empty strings",
                        ));
                    }
                }
            }
            Ok(())
        }
        Value::Array(_) => Err(DnsError::validation("data list must not be empty")),
        _ => Err(DnsError::validation("data must be a string or a list of strings")),
    }
}

fn validate_mx_data(data: &Value) -> DnsResult<()> {
    match data {
        Value::Object(_) => validate_mx_entry(data),
        Value::Array(items) if !items.is_empty() => {
            items.iter().try_for_each(validate_mx_entry)
        }
        Value::Array(_) => Err(DnsError::validation("MX data list must not be empty")),
        _ => Err(DnsError::validation("MX data must be an object or a list of objects")),
    }
}

fn validate_mx_entry(entry: &Value) -> DnsResult<()> {
    let object = entry
        .as_object()
        .ok_or_else(|| DnsError::validation("MX data must be an object"))?;

    match object.get("preference").and_then(Value::as_u64) {
        Some(preference) if preference <= u16::MAX as u64 => {}
        _ => {
            return Err(DnsError::validation(
                "MX preference must be an integer between 0 and 65535",
            ));
        }
    }
    match object.get("exchange").and_then(Value::as_str) {
        Some(exchange) if !exchange.is_empty() => Ok(()),
        _ => Err(DnsError::validation("MX exchange must be a non-empty string")),
    }
}

fn validate_soa_data(data: &Value) -> DnsResult<()> {
    let object = data
        .as_object()
        .ok_or_else(|| DnsError::validation("SOA data must be an object"))?;

    for field in ["mname", "rname"] {
        if object.get(field).and_then(Value::as_str).is_none() {
            return Err(DnsError::validation(format!("SOA {field} must be a string")));
        }
    }
    for field in ["serial", "refresh", "retry", "expire", "minimum"] {
        if object.get(field).and_then(Value::as_u64).is_none() {
            return Err(DnsError::validation(format!("SOA {field} must be an integer")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone_from(doc: Value) -> Zone {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn accepts_a_representative_zone() {
        let zone = zone_from(json!({
            "name": "hello.test",
            "version": 2,
            "ttl": 300,
            "records": [
                {"type": "A", "data": ["1.2.3.4", "5.6.7.8"]},
                {"name": "www", "type": "CNAME", "data": "hello.test"},
                {"type": "MX", "data": [
                    {"preference": 10, "exchange": "mx1.hello.test"},
                    {"preference": 20, "exchange": "mx2.hello.test"}
                ]},
                {"type": "TXT", "data": "v=spf1 -all"},
                {"type": "SOA", "data": {
                    "mname": "ns1.hello.test", "rname": "hostmaster.hello.test",
                    "serial": 1, "refresh": 7200, "retry": 3600,
                    "expire": 1209600, "minimum": 3600
                }}
            ]
        }));
        assert!(validate_zone(&zone).is_ok());
    }

    #[test]
    fn rejects_zero_version() {
        let zone = zone_from(json!({"version": 0, "records": []}));
        assert!(validate_zone(&zone).is_err());
    }

    #[test]
    fn rejects_unsupported_type_with_record_index() {
        let zone = zone_from(json!({
            "records": [
                {"type": "A", "data": "1.2.3.4"},
                {"type": 252, "data": "x"}
            ]
        }));
        let err = validate_zone(&zone).unwrap_err();
        assert!(err.to_string().contains("record 1"), "unexpected error: {err}");
    }

    #[test]
    fn rejects_empty_name_and_empty_data() {
        let zone = zone_from(json!({
            "records": [{"name": "", "type": "A", "data": "1.2.3.4"}]
        }));
        assert!(validate_zone(&zone).is_err());

        let zone = zone_from(json!({"records": [{"type": "A", "data": ""}]}));
        assert!(validate_zone(&zone).is_err());

        let zone = zone_from(json!({"records": [{"type": "TXT", "data": []}]}));
        assert!(validate_zone(&zone).is_err());
    }

    #[test]
    fn rejects_malformed_mx_and_soa() {
        let zone = zone_from(json!({
            "records": [{"type": "MX", "data": {"preference": 70000, "exchange": "mx"}}]
        }));
        assert!(validate_zone(&zone).is_err());

        let zone = zone_from(json!({
            "records": [{"type": "MX", "data": {"preference": 10, "exchange": ""}}]
        }));
        assert!(validate_zone(&zone).is_err());

        let zone = zone_from(json!({
            "records": [{"type": "SOA", "data": {"mname": "ns1", "rname": "host"}}]
        }));
        assert!(validate_zone(&zone).is_err());
    }

    #[test]
    fn rejects_bad_class() {
        let zone = zone_from(json!({
            "records": [{"type": "A", "class": "CH", "data": "1.2.3.4"}]
        }));
        assert!(validate_zone(&zone).is_err());

        let zone = zone_from(json!({
            "records": [{"type": "A", "class": 255, "data": "1.2.3.4"}]
        }));
        assert!(validate_zone(&zone).is_ok());
    }
}
