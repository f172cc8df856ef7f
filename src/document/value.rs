//! Typed field values

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Map;

use super::facet::Facet;

/// JSON object stored in a json field
pub type JsonObject = Map<String, serde_json::Value>;

/// A single value of a document field
///
/// Every value belongs to exactly one of the kinds a schema field can
/// declare.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    I64(i64),
    U64(u64),
    /// UTC timestamp, microsecond precision
    Date(DateTime<Utc>),
    Facet(Facet),
    Bytes(Vec<u8>),
    Json(JsonObject),
}

impl Value {
    /// Kind name, matching [`crate::schema::FieldType::kind_name`]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "text",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::Date(_) => "date",
            Value::Facet(_) => "facet",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_facet(&self) -> Option<&Facet> {
        match self {
            Value::Facet(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonObject> {
        match self {
            Value::Json(o) => Some(o),
            _ => None,
        }
    }

    /// Interchange (JSON) form of this value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::I64(v) => serde_json::Value::from(*v),
            Value::U64(v) => serde_json::Value::from(*v),
            Value::Date(d) => serde_json::Value::String(format_date(d)),
            Value::Facet(f) => serde_json::Value::String(f.to_path_str()),
            Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
            Value::Json(o) => serde_json::Value::Object(o.clone()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(truncate_to_micros(d))
    }
}

impl From<Facet> for Value {
    fn from(f: Facet) -> Self {
        Value::Facet(f)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<JsonObject> for Value {
    fn from(o: JsonObject) -> Self {
        Value::Json(o)
    }
}

/// Drop sub-microsecond precision so dates survive the interchange format
pub fn truncate_to_micros(date: DateTime<Utc>) -> DateTime<Utc> {
    micros_to_date(date.timestamp_micros()).unwrap_or(date)
}

pub fn micros_to_date(micros: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(micros).single()
}

/// RFC 3339 with microseconds, always `Z`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC)
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(truncate_to_micros(d.with_timezone(&Utc)));
    }
    let day = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    let midnight = day.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

/// Decode the base64 interchange form of a bytes value
pub fn decode_bytes(text: &str) -> Option<Vec<u8>> {
    STANDARD.decode(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::from("a").kind_name(), "text");
        assert_eq!(Value::from(1i64).kind_name(), "i64");
        assert_eq!(Value::from(1u64).kind_name(), "u64");
        assert_eq!(Value::Facet(Facet::root()).kind_name(), "facet");
    }

    #[test]
    fn test_date_format_round_trip() {
        let date = parse_date("2024-03-01T12:30:45.123456Z").unwrap();
        assert_eq!(format_date(&date), "2024-03-01T12:30:45.123456Z");
        assert_eq!(parse_date(&format_date(&date)).unwrap(), date);
    }

    #[test]
    fn test_date_only() {
        let date = parse_date("2023-01-30").unwrap();
        assert_eq!(format_date(&date), "2023-01-30T00:00:00.000000Z");
        assert!(parse_date("30/01/2023").is_none());
    }

    #[test]
    fn test_truncation() {
        let date = Utc.timestamp_nanos(1_700_000_000_123_456_789);
        let truncated = truncate_to_micros(date);
        assert_eq!(truncated.timestamp_micros(), 1_700_000_000_123_456);
        assert_eq!(Value::from(date), Value::Date(truncated));
    }

    #[test]
    fn test_bytes_json() {
        let value = Value::Bytes(vec![0, 1, 254, 255]);
        let json = value.to_json();
        let text = json.as_str().unwrap();
        assert_eq!(decode_bytes(text).unwrap(), vec![0, 1, 254, 255]);
    }
}
