//! Field type definitions
//!
//! Defines how each kind of field is stored, indexed and queried.

use serde::{Deserialize, Serialize};

use crate::document::value::{decode_bytes, parse_date, truncate_to_micros};
use crate::document::{Facet, Value};
use crate::tokenizer::TokenizerKind;

/// How much information postings keep for a term
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexRecordOption {
    /// Document ids only
    Basic,
    /// Document ids and term frequencies
    Freq,
    /// Document ids, term frequencies and positions
    #[default]
    Position,
}

impl IndexRecordOption {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(IndexRecordOption::Basic),
            "freq" => Some(IndexRecordOption::Freq),
            "position" => Some(IndexRecordOption::Position),
            _ => None,
        }
    }

    pub fn has_freqs(&self) -> bool {
        !matches!(self, IndexRecordOption::Basic)
    }

    pub fn has_positions(&self) -> bool {
        matches!(self, IndexRecordOption::Position)
    }
}

/// Fast field cardinality
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Multi,
}

/// Tokenizer and postings detail for an indexed text field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextIndexing {
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    #[serde(default)]
    pub record: IndexRecordOption,
}

fn default_tokenizer() -> String {
    "default".to_string()
}

impl Default for TextIndexing {
    fn default() -> Self {
        Self {
            tokenizer: default_tokenizer(),
            record: IndexRecordOption::default(),
        }
    }
}

/// Options for text fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOptions {
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub indexing: Option<TextIndexing>,
    #[serde(default)]
    pub fast: Option<Cardinality>,
}

impl TextOptions {
    /// Tokenized full-text field (default tokenizer, positions)
    pub fn text() -> Self {
        Self {
            stored: false,
            indexing: Some(TextIndexing::default()),
            fast: None,
        }
    }

    /// Untokenized keyword field: the whole value is one term
    pub fn string() -> Self {
        Self {
            stored: false,
            indexing: Some(TextIndexing {
                tokenizer: "raw".to_string(),
                record: IndexRecordOption::Basic,
            }),
            fast: None,
        }
    }

    /// Stored-only field
    pub fn stored_only() -> Self {
        Self {
            stored: true,
            indexing: None,
            fast: None,
        }
    }

    pub fn with_stored(mut self) -> Self {
        self.stored = true;
        self
    }

    /// Set the tokenizer by name (`default`, `raw`, `en_stem`, `whitespace`)
    pub fn with_tokenizer(mut self, tokenizer: impl Into<String>) -> Self {
        let indexing = self.indexing.get_or_insert_with(TextIndexing::default);
        indexing.tokenizer = tokenizer.into();
        self
    }

    pub fn with_index_option(mut self, record: IndexRecordOption) -> Self {
        let indexing = self.indexing.get_or_insert_with(TextIndexing::default);
        indexing.record = record;
        self
    }

    pub fn with_fast(mut self, cardinality: Cardinality) -> Self {
        self.fast = Some(cardinality);
        self
    }
}

/// Options for i64, u64 and date fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericOptions {
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub fast: Option<Cardinality>,
}

impl NumericOptions {
    pub fn with_stored(mut self) -> Self {
        self.stored = true;
        self
    }

    pub fn with_indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn with_fast(mut self, cardinality: Cardinality) -> Self {
        self.fast = Some(cardinality);
        self
    }
}

/// Options for json fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOptions {
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub indexing: Option<TextIndexing>,
}

impl JsonOptions {
    pub fn with_stored(mut self) -> Self {
        self.stored = true;
        self
    }

    /// Index string leaves with the given tokenizer
    pub fn with_indexing(mut self, indexing: TextIndexing) -> Self {
        self.indexing = Some(indexing);
        self
    }
}

/// Options for facet fields (facets are always indexed)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOptions {
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub fast: Option<Cardinality>,
}

impl FacetOptions {
    pub fn with_stored(mut self) -> Self {
        self.stored = true;
        self
    }

    pub fn with_fast(mut self, cardinality: Cardinality) -> Self {
        self.fast = Some(cardinality);
        self
    }
}

/// Options for bytes fields
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytesOptions {
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub fast: Option<Cardinality>,
}

impl BytesOptions {
    pub fn with_stored(mut self) -> Self {
        self.stored = true;
        self
    }

    pub fn with_indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn with_fast(mut self, cardinality: Cardinality) -> Self {
        self.fast = Some(cardinality);
        self
    }
}

/// Field data type with its options
///
/// Determines how a field is indexed, stored, and queried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum FieldType {
    Text(TextOptions),
    I64(NumericOptions),
    U64(NumericOptions),
    Date(NumericOptions),
    Json(JsonOptions),
    Facet(FacetOptions),
    Bytes(BytesOptions),
}

impl FieldType {
    /// Kind name, matching [`Value::kind_name`]
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldType::Text(_) => "text",
            FieldType::I64(_) => "i64",
            FieldType::U64(_) => "u64",
            FieldType::Date(_) => "date",
            FieldType::Json(_) => "json",
            FieldType::Facet(_) => "facet",
            FieldType::Bytes(_) => "bytes",
        }
    }

    pub fn is_stored(&self) -> bool {
        match self {
            FieldType::Text(o) => o.stored,
            FieldType::I64(o) | FieldType::U64(o) | FieldType::Date(o) => o.stored,
            FieldType::Json(o) => o.stored,
            FieldType::Facet(o) => o.stored,
            FieldType::Bytes(o) => o.stored,
        }
    }

    pub fn is_indexed(&self) -> bool {
        match self {
            FieldType::Text(o) => o.indexing.is_some(),
            FieldType::I64(o) | FieldType::U64(o) | FieldType::Date(o) => o.indexed,
            FieldType::Json(o) => o.indexing.is_some(),
            FieldType::Facet(_) => true,
            FieldType::Bytes(o) => o.indexed,
        }
    }

    pub fn fast(&self) -> Option<Cardinality> {
        match self {
            FieldType::Text(o) => o.fast,
            FieldType::I64(o) | FieldType::U64(o) | FieldType::Date(o) => o.fast,
            FieldType::Json(_) => None,
            FieldType::Facet(o) => o.fast,
            FieldType::Bytes(o) => o.fast,
        }
    }

    /// Tokenizer and record option, for text and json fields
    pub fn text_indexing(&self) -> Option<&TextIndexing> {
        match self {
            FieldType::Text(o) => o.indexing.as_ref(),
            FieldType::Json(o) => o.indexing.as_ref(),
            _ => None,
        }
    }

    /// Postings detail recorded for this field
    pub fn record_option(&self) -> IndexRecordOption {
        match self {
            FieldType::Text(_) | FieldType::Json(_) => self
                .text_indexing()
                .map(|i| i.record)
                .unwrap_or(IndexRecordOption::Basic),
            _ => IndexRecordOption::Basic,
        }
    }

    /// Check if this field type supports range queries
    pub fn supports_range(&self) -> bool {
        matches!(
            self,
            FieldType::I64(_) | FieldType::U64(_) | FieldType::Date(_)
        )
    }

    /// Check if this field can be used to order search results
    pub fn supports_sorting(&self) -> bool {
        self.supports_range() && self.fast().is_some()
    }

    /// Check the options against the rules for this kind
    pub(crate) fn check_options(&self) -> Result<(), String> {
        match self {
            FieldType::Text(o) => {
                if let Some(indexing) = &o.indexing {
                    let kind = TokenizerKind::from_name(&indexing.tokenizer).ok_or_else(|| {
                        format!("unknown tokenizer '{}'", indexing.tokenizer)
                    })?;
                    if o.fast.is_some() && kind != TokenizerKind::Raw {
                        return Err(
                            "fast text fields must use the 'raw' tokenizer".to_string()
                        );
                    }
                } else if o.fast.is_some() {
                    return Err("fast text fields must be indexed with the 'raw' tokenizer"
                        .to_string());
                }
            }
            FieldType::Json(o) => {
                if let Some(indexing) = &o.indexing {
                    TokenizerKind::from_name(&indexing.tokenizer).ok_or_else(|| {
                        format!("unknown tokenizer '{}'", indexing.tokenizer)
                    })?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Validate a value against this field type
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let ok = matches!(
            (self, value),
            (FieldType::Text(_), Value::Str(_))
                | (FieldType::I64(_), Value::I64(_))
                | (FieldType::U64(_), Value::U64(_))
                | (FieldType::Date(_), Value::Date(_))
                | (FieldType::Json(_), Value::Json(_))
                | (FieldType::Facet(_), Value::Facet(_))
                | (FieldType::Bytes(_), Value::Bytes(_))
        );
        if ok {
            Ok(())
        } else {
            Err(format!(
                "{} field cannot hold a {} value",
                self.kind_name(),
                value.kind_name()
            ))
        }
    }

    /// Coerce one interchange (JSON) scalar into a typed value
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<Value, String> {
        use serde_json::Value as J;
        match (self, json) {
            (FieldType::Text(_), J::String(s)) => Ok(Value::Str(s.clone())),
            (FieldType::I64(_), J::Number(n)) => n
                .as_i64()
                .map(Value::I64)
                .ok_or_else(|| format!("{} is not a valid i64", n)),
            (FieldType::U64(_), J::Number(n)) => n
                .as_u64()
                .map(Value::U64)
                .ok_or_else(|| format!("{} is not a valid u64", n)),
            (FieldType::Date(_), J::String(s)) => parse_date(s)
                .map(Value::Date)
                .ok_or_else(|| format!("'{}' is not an RFC 3339 date", s)),
            (FieldType::Date(_), J::Number(n)) => n
                .as_i64()
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                .map(|d| Value::Date(truncate_to_micros(d)))
                .ok_or_else(|| format!("{} is not a valid timestamp", n)),
            (FieldType::Facet(_), J::String(s)) => Facet::from_string(s)
                .map(Value::Facet)
                .map_err(|e| e.to_string()),
            (FieldType::Bytes(_), J::String(s)) => decode_bytes(s)
                .map(Value::Bytes)
                .ok_or_else(|| "bytes must be base64 encoded".to_string()),
            (FieldType::Json(_), J::Object(o)) => Ok(Value::Json(o.clone())),
            (field_type, other) => Err(format!(
                "{} field cannot be read from JSON {}",
                field_type.kind_name(),
                json_kind(other)
            )),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
