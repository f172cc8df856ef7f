//! In-memory segment under construction
//!
//! Documents are analysed as they are added; the buffer keeps postings,
//! stored bodies, fast values and field lengths until it is written out as
//! an immutable segment.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use super::doc_store::DocStoreWriter;
use super::fast_field::FastFieldsWriter;
use super::statistics::SegmentStatistics;
use super::term::Term;
use super::types::{DocId, Posting};
use crate::document::{Document, JsonObject, Value};
use crate::schema::{Field, FieldType, IndexRecordOption, Schema};
use crate::tokenizer::Tokenizer;
use crate::Result;

/// Position gap between consecutive values of one field, so a phrase
/// never matches across two values
const POSITION_GAP: u32 = 1;

/// Fixed per-posting overhead used in heap accounting
const POSTING_OVERHEAD: usize = std::mem::size_of::<Posting>();

pub struct SegmentBuffer {
    schema: Schema,
    tokenizers: HashMap<u32, Tokenizer>,
    postings: HashMap<Term, Vec<Posting>>,
    store: DocStoreWriter,
    fast: FastFieldsWriter,
    stats: SegmentStatistics,
    heap_bytes: usize,
}

impl SegmentBuffer {
    pub fn new(schema: Schema) -> Self {
        let mut tokenizers = HashMap::new();
        for (field, entry) in schema.fields() {
            if let Some(indexing) = entry.field_type().text_indexing() {
                // Names were checked when the field was declared
                if let Some(tokenizer) = Tokenizer::for_name(&indexing.tokenizer) {
                    tokenizers.insert(field.field_id(), tokenizer);
                }
            }
        }
        let fast = FastFieldsWriter::new(&schema);
        Self {
            schema,
            tokenizers,
            postings: HashMap::new(),
            store: DocStoreWriter::new(),
            fast,
            stats: SegmentStatistics::new(),
            heap_bytes: 0,
        }
    }

    /// Analyse a validated document; returns its doc id in this segment
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        let schema = self.schema.clone();

        // The only fallible step runs first, so a failure leaves no trace
        let mut stored = doc.clone();
        stored.retain_fields(|name| {
            schema
                .get_field_entry(name)
                .map(|(_, entry)| entry.is_stored())
                .unwrap_or(false)
        });
        let before = self.store.len_bytes();
        self.store.append(&stored)?;
        self.heap_bytes += self.store.len_bytes() - before;

        let doc_id = self.stats.add_document();
        for (field, entry) in schema.fields() {
            let values = doc.get_all(entry.name());
            if values.is_empty() || !entry.is_indexed() {
                continue;
            }
            let record = entry.field_type().record_option();
            let terms = self.analyse_field(field, entry.field_type(), values);
            for (term, positions) in terms {
                let posting = match record {
                    IndexRecordOption::Position => Posting::with_positions(doc_id, positions),
                    IndexRecordOption::Freq => Posting::new(doc_id, positions.len() as u32),
                    IndexRecordOption::Basic => Posting::new(doc_id, 1),
                };
                self.heap_bytes += POSTING_OVERHEAD + 4 * posting.positions.len();
                match self.postings.entry(term) {
                    Entry::Occupied(mut list) => list.get_mut().push(posting),
                    Entry::Vacant(slot) => {
                        self.heap_bytes += slot.key().as_bytes().len();
                        slot.insert(vec![posting]);
                    }
                }
            }
        }

        self.fast.add_document(doc);
        self.heap_bytes += 8 * doc.len();

        Ok(doc_id)
    }

    /// Terms of one field with the positions they occur at
    fn analyse_field(
        &mut self,
        field: Field,
        field_type: &FieldType,
        values: &[Value],
    ) -> BTreeMap<Term, Vec<u32>> {
        let mut terms: BTreeMap<Term, Vec<u32>> = BTreeMap::new();
        match field_type {
            FieldType::Text(_) | FieldType::Json(_) => {
                let Some(tokenizer) = self.tokenizers.get(&field.field_id()) else {
                    return terms;
                };
                let mut base = 0u32;
                let mut num_tokens = 0u32;
                for value in values {
                    let texts: Vec<(Option<String>, String)> = match value {
                        Value::Str(text) => vec![(None, text.clone())],
                        Value::Json(object) => flatten_json(object)
                            .into_iter()
                            .map(|(path, text)| (Some(path), text))
                            .collect(),
                        _ => Vec::new(),
                    };
                    for (path, text) in texts {
                        let tokens = tokenizer.tokenize_with_positions(&text);
                        let mut last = None;
                        for (token, pos) in tokens {
                            let term = match &path {
                                Some(path) => Term::from_json_path(field, path, &token),
                                None => Term::from_field_text(field, &token),
                            };
                            terms.entry(term).or_default().push(base + pos);
                            last = Some(pos);
                            num_tokens += 1;
                        }
                        if let Some(last) = last {
                            base += last + 1 + POSITION_GAP;
                        }
                    }
                }
                self.stats.record_tokens(field, num_tokens);
            }
            _ => {
                for value in values {
                    let term = match value {
                        Value::I64(v) => Term::from_field_i64(field, *v),
                        Value::U64(v) => Term::from_field_u64(field, *v),
                        Value::Date(d) => Term::from_field_date(field, d),
                        Value::Facet(f) => Term::from_field_facet(field, f),
                        Value::Bytes(b) => Term::from_field_bytes(field, b),
                        _ => continue,
                    };
                    terms.entry(term).or_default().push(0);
                }
            }
        }
        terms
    }

    pub fn num_docs(&self) -> u32 {
        self.stats.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.stats.doc_count == 0
    }

    /// Approximate bytes held by this buffer
    pub fn heap_usage(&self) -> usize {
        self.heap_bytes
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        HashMap<Term, Vec<Posting>>,
        DocStoreWriter,
        FastFieldsWriter,
        SegmentStatistics,
    ) {
        (self.postings, self.store, self.fast, self.stats)
    }
}

/// Leaves of a json object as (dotted path, text); arrays share their path
pub fn flatten_json(object: &JsonObject) -> Vec<(String, String)> {
    fn walk(path: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Bool(b) => out.push((path.to_string(), b.to_string())),
            serde_json::Value::Number(n) => out.push((path.to_string(), n.to_string())),
            serde_json::Value::String(s) => out.push((path.to_string(), s.clone())),
            serde_json::Value::Array(items) => {
                for item in items {
                    walk(path, item, out);
                }
            }
            serde_json::Value::Object(object) => {
                for (key, child) in object {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    walk(&child_path, child, out);
                }
            }
        }
    }

    let mut out = Vec::new();
    for (key, value) in object {
        walk(key, value, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NumericOptions, TextOptions};
    use serde_json::json;

    #[test]
    fn test_flatten_json() {
        let object = json!({
            "studio": {"name": "Bones", "founded": 1998},
            "tags": ["mecha", "drama"],
            "gone": null
        });
        let leaves = flatten_json(object.as_object().unwrap());
        assert_eq!(
            leaves,
            vec![
                ("studio.founded".to_string(), "1998".to_string()),
                ("studio.name".to_string(), "Bones".to_string()),
                ("tags".to_string(), "mecha".to_string()),
                ("tags".to_string(), "drama".to_string()),
            ]
        );
    }

    #[test]
    fn test_buffer_positions_and_heap() {
        let mut builder = Schema::builder();
        let title = builder
            .add_text_field("title", TextOptions::text().with_stored())
            .unwrap();
        builder
            .add_u64_field("year", NumericOptions::default().with_indexed())
            .unwrap();
        let mut buffer = SegmentBuffer::new(builder.build());
        assert!(buffer.is_empty());

        let mut doc = Document::new();
        doc.add_text("title", "red apple");
        doc.add_text("title", "apple pie");
        doc.add_u64("year", 2001);
        assert_eq!(buffer.add_document(&doc).unwrap(), 0);
        assert_eq!(buffer.num_docs(), 1);
        assert!(buffer.heap_usage() > 0);

        let (postings, _, _, stats) = buffer.into_parts();
        let apple = &postings[&Term::from_field_text(title, "apple")];
        // second value starts after a one-position gap
        assert_eq!(apple[0].positions, vec![1, 3]);
        assert_eq!(stats.field_length(title, 0), 4);
        assert_eq!(postings.len(), 4);
    }

    #[test]
    fn test_store_and_doc_ids_stay_aligned() {
        let mut builder = Schema::builder();
        builder
            .add_text_field("title", TextOptions::text().with_stored())
            .unwrap();
        builder
            .add_u64_field("year", NumericOptions::default().with_indexed())
            .unwrap();
        let mut buffer = SegmentBuffer::new(builder.build());

        let mut titled = Document::new();
        titled.add_text("title", "red apple");
        let mut bare = Document::new();
        bare.add_u64("year", 1999);

        // a doc with nothing stored still takes a store slot
        for (expected, doc) in [titled.clone(), bare, titled].iter().enumerate() {
            assert_eq!(buffer.add_document(doc).unwrap(), expected as DocId);
            assert_eq!(buffer.store.num_docs(), buffer.num_docs());
        }
        assert_eq!(buffer.num_docs(), 3);
    }
}
