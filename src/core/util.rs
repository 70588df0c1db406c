//! Common utilities

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// ISO-8601 layout used for `cached_at` (local time, microseconds, no offset)
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Format a local timestamp as ISO-8601
pub fn iso_timestamp(at: DateTime<Local>) -> String {
    at.format(ISO_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp, with or without offset or fractional seconds.
/// Values without an offset are interpreted as local time.
pub fn parse_iso_timestamp(value: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Parse `key=value` pairs; the value is read as JSON when possible, else kept as a string
pub fn parse_key_value(pair: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", pair))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", pair));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    #[test]
    fn test_iso_timestamp_roundtrip() {
        let now = Local::now().with_nanosecond(123_456_000).unwrap();
        let formatted = iso_timestamp(now);
        assert!(formatted.contains('T'));
        assert!(formatted.ends_with(".123456"));

        let parsed = parse_iso_timestamp(&formatted).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn test_parse_iso_timestamp_variants() {
        assert!(parse_iso_timestamp("2024-01-01T12:00:00").is_some());
        assert!(parse_iso_timestamp("2024-01-01T12:00:00.5").is_some());
        assert!(parse_iso_timestamp("2024-01-01T12:00:00+02:00").is_some());
        assert!(parse_iso_timestamp("2024-01-01T12:00:00Z").is_some());
        assert!(parse_iso_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("top=1000").unwrap(), ("top".to_string(), json!(1000)));
        assert_eq!(
            parse_key_value("filter=state eq 'Active'").unwrap(),
            ("filter".to_string(), json!("state eq 'Active'"))
        );
        assert_eq!(
            parse_key_value("expand=[\"users\"]").unwrap(),
            ("expand".to_string(), json!(["users"]))
        );
        assert_eq!(parse_key_value("empty=").unwrap().1, json!(""));
    }

    #[test]
    fn test_parse_key_value_rejects_malformed() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
