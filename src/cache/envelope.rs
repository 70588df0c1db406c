//! Cache envelope - the record persisted for every cache entry

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::util::{iso_timestamp, parse_iso_timestamp};

/// On-disk shape of a cache entry. Field order is part of the file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    /// Logical dataset name
    pub cache_key: String,

    /// ISO-8601 write time
    pub cached_at: String,

    /// Version label or synthetic timestamp
    pub version: String,

    /// Caller annotations, stored as-is
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// The cached payload
    #[serde(default)]
    pub data: Value,
}

impl CacheEnvelope {
    pub fn new(
        cache_key: &str,
        version: &str,
        cached_at: DateTime<Local>,
        metadata: Map<String, Value>,
        data: Value,
    ) -> Self {
        Self {
            cache_key: cache_key.to_string(),
            cached_at: iso_timestamp(cached_at),
            version: version.to_string(),
            metadata,
            data,
        }
    }

    /// Write time, if `cached_at` parses
    pub fn cached_at_time(&self) -> Option<DateTime<Local>> {
        parse_iso_timestamp(&self.cached_at)
    }

    /// Time elapsed since the entry was written
    pub fn age(&self, now: DateTime<Local>) -> Option<Duration> {
        self.cached_at_time().map(|at| now - at)
    }

    /// An entry is stale when older than `max_age` or when its write time is unreadable
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Local>) -> bool {
        match self.age(now) {
            Some(age) => age > max_age,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(cached_at: DateTime<Local>) -> CacheEnvelope {
        let mut metadata = Map::new();
        metadata.insert("top".to_string(), json!(1000));
        CacheEnvelope::new(
            "workspaces",
            "20240101_120000",
            cached_at,
            metadata,
            json!({"value": [{"id": "123"}]}),
        )
    }

    #[test]
    fn test_serialized_field_order() {
        let json = serde_json::to_string(&envelope(Local::now())).unwrap();
        let positions: Vec<usize> = ["\"cache_key\"", "\"cached_at\"", "\"version\"", "\"metadata\"", "\"data\""]
            .iter()
            .map(|field| json.find(field).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn test_deserialize_without_metadata() {
        let raw = r#"{"cache_key":"k","cached_at":"2024-01-01T00:00:00","version":"v","data":[1,2]}"#;
        let parsed: CacheEnvelope = serde_json::from_str(raw).unwrap();
        assert!(parsed.metadata.is_empty());
        assert_eq!(parsed.data, json!([1, 2]));
    }

    #[test]
    fn test_age_and_staleness() {
        let written = Local::now() - Duration::minutes(90);
        let entry = envelope(written);
        let now = Local::now();

        let age = entry.age(now).unwrap();
        assert!(age >= Duration::minutes(89));
        assert!(entry.is_stale(Duration::hours(1), now));
        assert!(!entry.is_stale(Duration::hours(2), now));
    }

    #[test]
    fn test_unbounded_max_age_is_never_stale() {
        let now = Local::now();
        let entry = CacheEnvelope::new("k", "v1", now - Duration::days(3650), Map::new(), json!(null));
        assert!(!entry.is_stale(Duration::MAX, now));
    }

    #[test]
    fn test_unparsable_cached_at_is_stale() {
        let mut entry = envelope(Local::now());
        entry.cached_at = "not a date".to_string();
        assert!(entry.age(Local::now()).is_none());
        assert!(entry.is_stale(Duration::days(365), Local::now()));
    }
}
