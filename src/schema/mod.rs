//! Schema and field type system
//!
//! This module defines the schema system for Showdex, including:
//! - Field kinds (text, i64, u64, date, json, facet, bytes) and their options
//! - The schema builder and the immutable, shared schema

mod builder;
mod field_type;

pub use builder::{Field, FieldEntry, Schema, SchemaBuilder};
pub use field_type::{
    BytesOptions, Cardinality, FacetOptions, FieldType, IndexRecordOption, JsonOptions,
    NumericOptions, TextIndexing, TextOptions,
};
