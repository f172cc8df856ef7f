//! Fast fields: per-segment columnar storage
//!
//! - numeric (i64, u64, date): order-preserving u64 values per doc
//! - bytes-like (raw text, facet, bytes): dictionary encoded to ordinals
//!
//! Both column kinds are multi-valued through a doc offsets array; a
//! single-valued field simply has at most one value per doc.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::term::{date_to_u64, i64_to_u64};
use super::types::DocId;
use crate::document::{Document, Value};
use crate::schema::{Field, FieldType, Schema};

/// Numeric column; values are in sortable u64 form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NumericColumn {
    offsets: Vec<u32>,
    values: Vec<u64>,
}

impl NumericColumn {
    fn push_doc(&mut self, values: impl IntoIterator<Item = u64>) {
        if self.offsets.is_empty() {
            self.offsets.push(0);
        }
        self.values.extend(values);
        self.offsets.push(self.values.len() as u32);
    }

    pub fn values(&self, doc: DocId) -> &[u64] {
        let doc = doc as usize;
        match (self.offsets.get(doc), self.offsets.get(doc + 1)) {
            (Some(&start), Some(&end)) => &self.values[start as usize..end as usize],
            _ => &[],
        }
    }

    pub fn first(&self, doc: DocId) -> Option<u64> {
        self.values(doc).first().copied()
    }

    pub fn num_docs(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }
}

/// Dictionary-encoded bytes column
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BytesColumn {
    /// Sorted unique values; ordinals index into it
    dictionary: Vec<Vec<u8>>,
    offsets: Vec<u32>,
    ordinals: Vec<u32>,
}

impl BytesColumn {
    fn build(docs: Vec<Vec<Vec<u8>>>) -> Self {
        let unique: BTreeSet<&Vec<u8>> = docs.iter().flatten().collect();
        let dictionary: Vec<Vec<u8>> = unique.into_iter().cloned().collect();

        let mut offsets = Vec::with_capacity(docs.len() + 1);
        let mut ordinals = Vec::new();
        offsets.push(0);
        for values in &docs {
            for value in values {
                // The dictionary holds every value, so the search always hits
                if let Ok(ord) = dictionary.binary_search(value) {
                    ordinals.push(ord as u32);
                }
            }
            offsets.push(ordinals.len() as u32);
        }

        Self {
            dictionary,
            offsets,
            ordinals,
        }
    }

    pub fn ordinals(&self, doc: DocId) -> &[u32] {
        let doc = doc as usize;
        match (self.offsets.get(doc), self.offsets.get(doc + 1)) {
            (Some(&start), Some(&end)) => &self.ordinals[start as usize..end as usize],
            _ => &[],
        }
    }

    pub fn term(&self, ord: u32) -> Option<&[u8]> {
        self.dictionary.get(ord as usize).map(Vec::as_slice)
    }

    pub fn values(&self, doc: DocId) -> impl Iterator<Item = &[u8]> {
        self.ordinals(doc)
            .iter()
            .filter_map(move |ord| self.term(*ord))
    }

    pub fn dictionary(&self) -> &[Vec<u8>] {
        &self.dictionary
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FastColumn {
    Numeric(NumericColumn),
    Bytes(BytesColumn),
}

/// Sortable u64 form of a numeric value
pub fn numeric_fast_value(value: &Value) -> Option<u64> {
    match value {
        Value::I64(v) => Some(i64_to_u64(*v)),
        Value::U64(v) => Some(*v),
        Value::Date(d) => Some(date_to_u64(d)),
        _ => None,
    }
}

fn bytes_fast_value(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Str(s) => Some(s.as_bytes().to_vec()),
        Value::Facet(f) => Some(f.encoded()),
        Value::Bytes(b) => Some(b.clone()),
        _ => None,
    }
}

enum ColumnWriter {
    Numeric(NumericColumn),
    Bytes(Vec<Vec<Vec<u8>>>),
}

/// Accumulates fast field values while a segment is built
pub struct FastFieldsWriter {
    columns: BTreeMap<u32, (String, ColumnWriter)>,
}

impl FastFieldsWriter {
    pub fn new(schema: &Schema) -> Self {
        let mut columns = BTreeMap::new();
        for (field, entry) in schema.fields() {
            if !entry.is_fast() {
                continue;
            }
            let writer = match entry.field_type() {
                FieldType::I64(_) | FieldType::U64(_) | FieldType::Date(_) => {
                    ColumnWriter::Numeric(NumericColumn::default())
                }
                _ => ColumnWriter::Bytes(Vec::new()),
            };
            columns.insert(field.field_id(), (entry.name().to_string(), writer));
        }
        Self { columns }
    }

    /// Record the fast values of the next document
    pub fn add_document(&mut self, doc: &Document) {
        for (name, writer) in self.columns.values_mut() {
            let values = doc.get_all(name);
            match writer {
                ColumnWriter::Numeric(column) => {
                    column.push_doc(values.iter().filter_map(numeric_fast_value))
                }
                ColumnWriter::Bytes(docs) => {
                    docs.push(values.iter().filter_map(bytes_fast_value).collect())
                }
            }
        }
    }

    pub fn finish(self) -> FastFields {
        let columns = self
            .columns
            .into_iter()
            .map(|(field_id, (_, writer))| {
                let column = match writer {
                    ColumnWriter::Numeric(column) => FastColumn::Numeric(column),
                    ColumnWriter::Bytes(docs) => FastColumn::Bytes(BytesColumn::build(docs)),
                };
                (field_id, column)
            })
            .collect();
        FastFields { columns }
    }
}

/// Fast field columns of one segment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FastFields {
    columns: BTreeMap<u32, FastColumn>,
}

impl FastFields {
    pub fn numeric(&self, field: Field) -> Option<&NumericColumn> {
        match self.columns.get(&field.field_id()) {
            Some(FastColumn::Numeric(column)) => Some(column),
            _ => None,
        }
    }

    pub fn bytes(&self, field: Field) -> Option<&BytesColumn> {
        match self.columns.get(&field.field_id()) {
            Some(FastColumn::Bytes(column)) => Some(column),
            _ => None,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Facet;
    use crate::schema::{Cardinality, FacetOptions, NumericOptions, TextOptions};

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder
            .add_i64_field("score", NumericOptions::default().with_fast(Cardinality::Single))
            .unwrap();
        builder
            .add_facet_field("genre", FacetOptions::default().with_fast(Cardinality::Multi))
            .unwrap();
        builder.add_text_field("title", TextOptions::text()).unwrap();
        builder.build()
    }

    #[test]
    fn test_numeric_column() {
        let schema = schema();
        let mut writer = FastFieldsWriter::new(&schema);

        let mut a = Document::new();
        a.add_i64("score", -4);
        writer.add_document(&a);
        writer.add_document(&Document::new());
        let mut c = Document::new();
        c.add_i64("score", 10);
        writer.add_document(&c);

        let fast = writer.finish();
        assert_eq!(fast.num_columns(), 2);
        let column = fast.numeric(schema.get_field("score").unwrap()).unwrap();
        assert_eq!(column.num_docs(), 3);
        assert_eq!(column.first(0), Some(i64_to_u64(-4)));
        assert_eq!(column.first(1), None);
        assert!(column.first(0) < column.first(2));
        assert!(fast.numeric(schema.get_field("title").unwrap()).is_none());
    }

    #[test]
    fn test_bytes_column_dictionary() {
        let schema = schema();
        let mut writer = FastFieldsWriter::new(&schema);

        let mut a = Document::new();
        a.add_facet("genre", Facet::from_string("/b").unwrap());
        a.add_facet("genre", Facet::from_string("/a/x").unwrap());
        writer.add_document(&a);
        let mut b = Document::new();
        b.add_facet("genre", Facet::from_string("/b").unwrap());
        writer.add_document(&b);

        let fast = writer.finish();
        let column = fast.bytes(schema.get_field("genre").unwrap()).unwrap();
        assert_eq!(column.dictionary().len(), 2);
        let values: Vec<&[u8]> = column.values(0).collect();
        assert_eq!(values, vec![b"b".as_slice(), b"a\0x".as_slice()]);
        assert_eq!(column.ordinals(1), column.ordinals(0)[..1].to_vec().as_slice());
    }
}
