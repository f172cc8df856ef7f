//! Schema-conforming, multi-valued documents

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::facet::Facet;
use super::value::{JsonObject, Value};
use crate::error::ShowdexError;
use crate::schema::Schema;
use crate::Result;

/// The unit of indexing: field name to ordered values
///
/// Values keep their insertion order within a field. A field with no values
/// is simply absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: BTreeMap<String, Vec<Value>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(&mut self, field: &str, text: impl Into<String>) {
        self.add_value(field, Value::Str(text.into()));
    }

    pub fn add_i64(&mut self, field: &str, value: i64) {
        self.add_value(field, Value::I64(value));
    }

    pub fn add_u64(&mut self, field: &str, value: u64) {
        self.add_value(field, Value::U64(value));
    }

    /// Dates are kept at microsecond precision
    pub fn add_date(&mut self, field: &str, date: DateTime<Utc>) {
        self.add_value(field, Value::from(date));
    }

    pub fn add_facet(&mut self, field: &str, facet: Facet) {
        self.add_value(field, Value::Facet(facet));
    }

    pub fn add_bytes(&mut self, field: &str, bytes: impl Into<Vec<u8>>) {
        self.add_value(field, Value::Bytes(bytes.into()));
    }

    pub fn add_json(&mut self, field: &str, object: JsonObject) {
        self.add_value(field, Value::Json(object));
    }

    pub fn add_value(&mut self, field: &str, value: Value) {
        self.fields.entry(field.to_string()).or_default().push(value);
    }

    /// Append every value of `other` after this document's values
    pub fn extend(&mut self, other: Document) {
        for (name, values) in other.fields {
            self.fields.entry(name).or_default().extend(values);
        }
    }

    pub fn get_first(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(|values| values.first())
    }

    /// All values of a field; empty if the field has none
    pub fn get_all(&self, field: &str) -> &[Value] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct fields with at least one value
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Total number of values across fields
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Keep only the fields `keep` accepts
    pub(crate) fn retain_fields(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.fields.retain(|name, _| keep(name));
    }

    /// Interchange form: every field maps to an array of values
    pub fn to_dict(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (name, values) in &self.fields {
            object.insert(
                name.clone(),
                serde_json::Value::Array(values.iter().map(Value::to_json).collect()),
            );
        }
        serde_json::Value::Object(object)
    }

    /// Parse the interchange form, coercing values by the schema's field kinds
    ///
    /// Values may be a single scalar or an array. Unknown keys fail with
    /// `SchemaMismatch`.
    pub fn from_dict(json: &serde_json::Value, schema: &Schema) -> Result<Document> {
        Self::from_dict_with(json, schema, false)
    }

    pub(crate) fn from_dict_with(
        json: &serde_json::Value,
        schema: &Schema,
        ignore_unknown: bool,
    ) -> Result<Document> {
        let object = json.as_object().ok_or_else(|| {
            ShowdexError::Document("document must be a JSON object".to_string())
        })?;

        let mut doc = Document::new();
        for (name, raw) in object {
            let Some((_, entry)) = schema.get_field_entry(name) else {
                if ignore_unknown {
                    continue;
                }
                return Err(ShowdexError::SchemaMismatch(format!(
                    "unknown field '{}'",
                    name
                )));
            };

            let items: &[serde_json::Value] = match raw {
                serde_json::Value::Array(items) => items,
                serde_json::Value::Null => &[],
                scalar => std::slice::from_ref(scalar),
            };
            for item in items {
                let value = entry
                    .field_type()
                    .value_from_json(item)
                    .map_err(|msg| ShowdexError::Document(format!("field '{}': {}", name, msg)))?;
                doc.add_value(name, value);
            }
        }
        Ok(doc)
    }

    /// Parse a JSON object text against the schema
    pub fn parse_json(text: &str, schema: &Schema) -> Result<Document> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Self::from_dict(&json, schema)
    }
}
