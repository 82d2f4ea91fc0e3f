//! Conversions between domain models and the store's JSON/text columns.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use infantry_db::StoreError;

use crate::error::EngineError;

pub fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_time(raw: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

pub fn decode_id(raw: &str) -> Result<Uuid, EngineError> {
    raw.parse()
        .map_err(|e| corrupt(format!("bad id '{}': {}", raw, e)))
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string(value).map_err(|e| corrupt(e.to_string()))
}

pub fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, EngineError> {
    serde_json::from_str(raw).map_err(|e| corrupt(e.to_string()))
}

pub fn corrupt(msg: String) -> EngineError {
    EngineError::Store(StoreError::Corrupt(msg))
}

/// Trimmed input, or `None` when it is absent or blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_survives_encoding() {
        let now = Utc::now();
        let decoded = decode_time(&encode_time(now)).unwrap();
        assert_eq!(decoded.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        assert!(matches!(
            decode_time("yesterday"),
            Err(EngineError::Store(StoreError::Corrupt(_)))
        ));
        assert!(matches!(
            from_json::<Vec<String>>("{"),
            Err(EngineError::Store(StoreError::Corrupt(_)))
        ));
    }

    #[test]
    fn blank_input_is_none() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(Some(" bob ")), Some("bob"));
    }
}
