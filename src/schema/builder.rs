//! Schema definitions
//!
//! A schema is the ordered, immutable set of fields an index accepts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::field_type::{
    BytesOptions, Cardinality, FacetOptions, FieldType, JsonOptions, NumericOptions, TextOptions,
};
use crate::document::Document;
use crate::error::ShowdexError;
use crate::Result;

/// Handle to a field of a schema (its ordinal)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field(u32);

impl Field {
    pub fn from_field_id(field_id: u32) -> Self {
        Field(field_id)
    }

    pub fn field_id(self) -> u32 {
        self.0
    }
}

/// A named field with its type and options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEntry {
    name: String,
    field_type: FieldType,
}

impl FieldEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_stored(&self) -> bool {
        self.field_type.is_stored()
    }

    pub fn is_indexed(&self) -> bool {
        self.field_type.is_indexed()
    }

    pub fn is_fast(&self) -> bool {
        self.field_type.fast().is_some()
    }
}

/// Builder for [`Schema`]
///
/// Every `add_*_field` call checks the name and options immediately, so an
/// invalid field is rejected where it is declared.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldEntry>,
    names: HashMap<String, Field>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text_field(&mut self, name: &str, options: TextOptions) -> Result<Field> {
        self.add_field(name, FieldType::Text(options))
    }

    pub fn add_i64_field(&mut self, name: &str, options: NumericOptions) -> Result<Field> {
        self.add_field(name, FieldType::I64(options))
    }

    pub fn add_u64_field(&mut self, name: &str, options: NumericOptions) -> Result<Field> {
        self.add_field(name, FieldType::U64(options))
    }

    pub fn add_date_field(&mut self, name: &str, options: NumericOptions) -> Result<Field> {
        self.add_field(name, FieldType::Date(options))
    }

    pub fn add_json_field(&mut self, name: &str, options: JsonOptions) -> Result<Field> {
        self.add_field(name, FieldType::Json(options))
    }

    pub fn add_facet_field(&mut self, name: &str, options: FacetOptions) -> Result<Field> {
        self.add_field(name, FieldType::Facet(options))
    }

    pub fn add_bytes_field(&mut self, name: &str, options: BytesOptions) -> Result<Field> {
        self.add_field(name, FieldType::Bytes(options))
    }

    /// Append a field of any kind
    pub fn add_field(&mut self, name: &str, field_type: FieldType) -> Result<Field> {
        check_field_name(name)?;
        if self.names.contains_key(name) {
            return Err(ShowdexError::Schema(format!("duplicate field '{}'", name)));
        }
        field_type
            .check_options()
            .map_err(|msg| ShowdexError::Schema(format!("field '{}': {}", name, msg)))?;

        let field = Field(self.fields.len() as u32);
        self.fields.push(FieldEntry {
            name: name.to_string(),
            field_type,
        });
        self.names.insert(name.to_string(), field);
        Ok(field)
    }

    pub fn build(self) -> Schema {
        Schema(Arc::new(SchemaInner {
            fields: self.fields,
            names: self.names,
        }))
    }
}

fn check_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ShowdexError::Schema("field name is empty".to_string()));
    }
    if name.contains(':') || name.chars().any(char::is_whitespace) {
        return Err(ShowdexError::Schema(format!(
            "field name '{}' must not contain ':' or whitespace",
            name
        )));
    }
    Ok(())
}

struct SchemaInner {
    fields: Vec<FieldEntry>,
    names: HashMap<String, Field>,
}

/// Immutable, cheaply clonable schema
#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn get_field(&self, name: &str) -> Option<Field> {
        self.0.names.get(name).copied()
    }

    /// Entry for a field handle
    ///
    /// # Panics
    /// If the field does not belong to this schema.
    pub fn field_entry(&self, field: Field) -> &FieldEntry {
        &self.0.fields[field.0 as usize]
    }

    pub fn get_field_entry(&self, name: &str) -> Option<(Field, &FieldEntry)> {
        self.get_field(name)
            .map(|field| (field, self.field_entry(field)))
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &FieldEntry)> {
        self.0
            .fields
            .iter()
            .enumerate()
            .map(|(i, entry)| (Field(i as u32), entry))
    }

    pub fn num_fields(&self) -> usize {
        self.0.fields.len()
    }

    /// Check every value of a document against its field
    pub fn validate_document(&self, doc: &Document) -> Result<()> {
        for (name, values) in doc.iter() {
            let (_, entry) = self
                .get_field_entry(name)
                .ok_or_else(|| ShowdexError::Schema(format!("unknown field '{}'", name)))?;
            if entry.field_type().fast() == Some(Cardinality::Single) && values.len() > 1 {
                return Err(ShowdexError::Document(format!(
                    "field '{}' is a single-valued fast field but has {} values",
                    name,
                    values.len()
                )));
            }
            for value in values {
                entry
                    .field_type()
                    .validate(value)
                    .map_err(|msg| ShowdexError::Document(format!("field '{}': {}", name, msg)))?;
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and re-validate a serialized schema
    pub fn from_json(text: &str) -> Result<Schema> {
        Ok(serde_json::from_str(text)?)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.fields == other.0.fields
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.0.fields)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct SchemaDef {
    fields: Vec<FieldEntry>,
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SchemaDef {
            fields: self.0.fields.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let def = SchemaDef::deserialize(deserializer)?;
        let mut builder = SchemaBuilder::new();
        for entry in def.fields {
            builder
                .add_field(&entry.name, entry.field_type)
                .map_err(serde::de::Error::custom)?;
        }
        Ok(builder.build())
    }
}
