//! Timestamp value object for immutable points in time.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// RFC 3339 rendering with second precision, e.g. `2024-05-01T12:00:00Z`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Creates a timestamp from Unix milliseconds.
    ///
    /// Out-of-range values clamp to the Unix epoch.
    pub fn from_unix_millis(millis: i64) -> Self {
        Self(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    /// Returns the timestamp as Unix milliseconds.
    pub fn as_unix_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now().timestamp_millis();
        let ts = Timestamp::now();
        let after = Utc::now().timestamp_millis();

        assert!(ts.as_unix_millis() >= before);
        assert!(ts.as_unix_millis() <= after);
    }

    #[test]
    fn rfc3339_uses_second_precision_and_z_suffix() {
        let ts = Timestamp::from_unix_millis(1_714_566_605_123);
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:05Z");
    }

    #[test]
    fn unix_millis_survive_conversion() {
        let ts = Timestamp::from_unix_millis(1_714_566_605_123);
        assert_eq!(ts.as_unix_millis(), 1_714_566_605_123);
    }

    #[test]
    fn orders_chronologically() {
        let earlier = Timestamp::from_unix_millis(1_000);
        let later = Timestamp::from_unix_millis(3_000);
        assert!(earlier < later);
    }

    #[test]
    fn serializes_as_string() {
        let ts = Timestamp::from_unix_millis(1_714_521_600_000);
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.starts_with("\"2024-05-01T00:00:00"));
    }
}
