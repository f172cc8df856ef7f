//! Index term encoding
//!
//! A term is the field id (big-endian u32) followed by the value bytes, so
//! all terms of one field are contiguous in the term dictionary. Integers
//! are encoded big-endian in an order-preserving way, which lets range
//! queries run as plain byte ranges over the dictionary.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::document::Facet;
use crate::schema::Field;

/// Separator between a json path and the token in json terms
pub const JSON_PATH_SEP: u8 = 1u8;

/// Map an i64 onto u64 preserving order
pub fn i64_to_u64(value: i64) -> u64 {
    (value as u64) ^ (1u64 << 63)
}

pub fn u64_to_i64(value: u64) -> i64 {
    (value ^ (1u64 << 63)) as i64
}

/// Sortable u64 form of a date (microseconds since the epoch)
pub fn date_to_u64(date: &DateTime<Utc>) -> u64 {
    i64_to_u64(date.timestamp_micros())
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term(Vec<u8>);

impl Term {
    fn with_value(field: Field, value: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(4 + value.len());
        bytes.extend_from_slice(&field.field_id().to_be_bytes());
        bytes.extend_from_slice(value);
        Term(bytes)
    }

    pub fn from_field_text(field: Field, text: &str) -> Self {
        Self::with_value(field, text.as_bytes())
    }

    pub fn from_field_u64(field: Field, value: u64) -> Self {
        Self::with_value(field, &value.to_be_bytes())
    }

    pub fn from_field_i64(field: Field, value: i64) -> Self {
        Self::from_field_u64(field, i64_to_u64(value))
    }

    pub fn from_field_date(field: Field, date: &DateTime<Utc>) -> Self {
        Self::from_field_u64(field, date_to_u64(date))
    }

    pub fn from_field_facet(field: Field, facet: &Facet) -> Self {
        Self::with_value(field, &facet.encoded())
    }

    pub fn from_field_bytes(field: Field, bytes: &[u8]) -> Self {
        Self::with_value(field, bytes)
    }

    /// Term for a token found under a dotted path of a json field
    pub fn from_json_path(field: Field, path: &str, token: &str) -> Self {
        let mut value = Vec::with_capacity(path.len() + 1 + token.len());
        value.extend_from_slice(path.as_bytes());
        value.push(JSON_PATH_SEP);
        value.extend_from_slice(token.as_bytes());
        Self::with_value(field, &value)
    }

    /// Smallest key of a field, for range scans
    pub fn field_start(field: Field) -> Self {
        Self::with_value(field, &[])
    }

    pub(crate) fn from_key(key: &[u8]) -> Option<Self> {
        (key.len() >= 4).then(|| Term(key.to_vec()))
    }

    pub fn field(&self) -> Field {
        let mut id = [0u8; 4];
        id.copy_from_slice(&self.0[..4]);
        Field::from_field_id(u32::from_be_bytes(id))
    }

    pub fn value_bytes(&self) -> &[u8] {
        &self.0[4..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.value_bytes()) {
            Ok(text) => write!(f, "Term(field={}, {:?})", self.field().field_id(), text),
            Err(_) => write!(
                f,
                "Term(field={}, {:?})",
                self.field().field_id(),
                self.value_bytes()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i64_order_preserved() {
        let values = [i64::MIN, -100, -1, 0, 1, 100, i64::MAX];
        let encoded: Vec<u64> = values.iter().map(|v| i64_to_u64(*v)).collect();
        assert!(encoded.windows(2).all(|w| w[0] < w[1]));
        for v in values {
            assert_eq!(u64_to_i64(i64_to_u64(v)), v);
        }

        let field = Field::from_field_id(0);
        assert!(Term::from_field_i64(field, -5) < Term::from_field_i64(field, 3));
    }

    #[test]
    fn test_field_prefix() {
        let term = Term::from_field_text(Field::from_field_id(258), "apple");
        assert_eq!(term.field().field_id(), 258);
        assert_eq!(term.value_bytes(), b"apple");
        assert!(term > Term::field_start(Field::from_field_id(258)));
        assert!(term < Term::field_start(Field::from_field_id(259)));
    }

    #[test]
    fn test_json_path_term() {
        let term = Term::from_json_path(Field::from_field_id(1), "studio.name", "bones");
        assert_eq!(term.value_bytes(), b"studio.name\x01bones");
    }
}
