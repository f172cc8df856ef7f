//! The public, opaque query type
//!
//! A [`Query`] wraps a shared node tree. It is immutable, cheap to clone and
//! can be reused across searches and searchers that share a schema.

use std::ops::Bound;
use std::sync::Arc;

use super::ast::{EmptyQuery, QueryNode, QueryNodeRef};
use super::nodes::{
    AllDocsQuery, BoolQuery, BoostQuery, ExactValueQuery, FacetQuery, Occur, PhraseQuery,
    RangeQuery, TermQuery,
};
use crate::document::{Facet, Value};
use crate::error::ShowdexError;
use crate::schema::{Field, FieldEntry, FieldType, Schema};
use crate::segment::Term;
use crate::tokenizer::Tokenizer;
use crate::Result;

#[derive(Clone, Debug)]
pub struct Query(QueryNodeRef);

impl Query {
    fn from_node(node: impl QueryNode + 'static) -> Self {
        Query(Arc::new(node))
    }

    /// Documents containing an exact indexed term
    pub fn term(term: Term) -> Self {
        Self::from_node(TermQuery::new(term))
    }

    /// Documents containing the terms in order, within `slop`
    pub fn phrase(terms: Vec<Term>, slop: u32) -> Self {
        match terms.len() {
            0 => Self::empty(),
            1 => terms.into_iter().next().map(Self::term).unwrap_or_else(Self::empty),
            _ => Self::from_node(PhraseQuery::new(terms).with_slop(slop)),
        }
    }

    /// Documents with a term of `field` between the bounds
    pub fn range(field: Field, lower: Bound<Term>, upper: Bound<Term>) -> Self {
        Self::from_node(RangeQuery::new(field, lower, upper))
    }

    /// Documents whose facet lies in the subtree of `facet`
    pub fn facet(field: Field, facet: Facet) -> Self {
        Self::from_node(FacetQuery::new(field, facet))
    }

    pub fn boolean(clauses: Vec<(Occur, Query)>) -> Self {
        Self::from_node(BoolQuery::new(
            clauses
                .into_iter()
                .map(|(occur, query)| (occur, query.0))
                .collect(),
        ))
    }

    pub fn all() -> Self {
        Self::from_node(AllDocsQuery::new())
    }

    pub fn empty() -> Self {
        Self::from_node(EmptyQuery)
    }

    /// Multiply the scores of this query
    pub fn boost(self, boost: f32) -> Self {
        Self::from_node(BoostQuery::new(self.0, boost))
    }

    /// Analysed text on an indexed text field
    ///
    /// One token gives a term query. Several give a phrase when the field
    /// records positions, otherwise a conjunction of their terms.
    pub fn text(schema: &Schema, field: Field, text: &str, slop: u32) -> Result<Self> {
        let entry = schema.field_entry(field);
        let tokens = field_tokenizer(entry)?.tokenize_with_positions(text);
        Ok(Self::analysed(entry, tokens, slop, |token| {
            Term::from_field_text(field, token)
        }))
    }

    /// Analysed text under one path of a json field
    pub fn json_text(
        schema: &Schema,
        field: Field,
        path: &str,
        text: &str,
        slop: u32,
    ) -> Result<Self> {
        let entry = schema.field_entry(field);
        let tokens = field_tokenizer(entry)?.tokenize_with_positions(text);
        Ok(Self::analysed(entry, tokens, slop, |token| {
            Term::from_json_path(field, path, token)
        }))
    }

    fn analysed(
        entry: &FieldEntry,
        tokens: Vec<(String, u32)>,
        slop: u32,
        to_term: impl Fn(&str) -> Term,
    ) -> Self {
        // Words the tokenizer dropped still occupy positions in the index
        let skipped = match (tokens.first(), tokens.last()) {
            (Some((_, first)), Some((_, last))) => last - first + 1 - tokens.len() as u32,
            _ => 0,
        };
        let terms: Vec<Term> = tokens.iter().map(|(token, _)| to_term(token)).collect();
        if terms.len() > 1 && !entry.field_type().record_option().has_positions() {
            return Self::boolean(
                terms
                    .into_iter()
                    .map(|term| (Occur::Must, Self::term(term)))
                    .collect(),
            );
        }
        Self::phrase(terms, slop + skipped)
    }

    /// Documents whose `field` holds exactly `value`
    ///
    /// Raw text fields match on their single term. Tokenized text fields
    /// match the analysed phrase, then compare the stored value, so they
    /// must be stored. Facets match only the facet itself, not its subtree.
    pub fn exact(schema: &Schema, field: Field, value: &Value) -> Result<Self> {
        let entry = schema.field_entry(field);
        entry
            .field_type()
            .validate(value)
            .map_err(|msg| ShowdexError::Document(format!("field '{}': {}", entry.name(), msg)))?;
        if !entry.is_indexed() {
            return Err(ShowdexError::InvalidArgument(format!(
                "field '{}' is not indexed",
                entry.name()
            )));
        }
        let term = match value {
            Value::Str(text) => return Self::exact_text(schema, field, text),
            Value::I64(v) => Term::from_field_i64(field, *v),
            Value::U64(v) => Term::from_field_u64(field, *v),
            Value::Date(d) => Term::from_field_date(field, d),
            Value::Facet(f) => Term::from_field_facet(field, f),
            Value::Bytes(b) => Term::from_field_bytes(field, b),
            Value::Json(_) => {
                return Err(ShowdexError::InvalidArgument(format!(
                    "json field '{}' cannot be matched by value",
                    entry.name()
                )))
            }
        };
        Ok(Self::term(term))
    }

    fn exact_text(schema: &Schema, field: Field, text: &str) -> Result<Self> {
        let entry = schema.field_entry(field);
        let raw = entry
            .field_type()
            .text_indexing()
            .map(|indexing| indexing.tokenizer == "raw")
            .unwrap_or(false);
        let analysed = Self::text(schema, field, text, 0)?;
        if raw {
            return Ok(analysed);
        }
        if !entry.is_stored() {
            return Err(ShowdexError::Schema(format!(
                "exact match on tokenized field '{}' needs it stored",
                entry.name()
            )));
        }
        Ok(Self::from_node(ExactValueQuery::new(
            analysed.0,
            entry.name(),
            Value::Str(text.to_string()),
        )))
    }

    pub(crate) fn node(&self) -> &dyn QueryNode {
        self.0.as_ref()
    }

    /// Terms the query scores with
    pub fn terms(&self) -> Vec<Term> {
        let mut terms = Vec::new();
        self.0.collect_terms(&mut terms);
        terms.sort();
        terms.dedup();
        terms
    }

    pub fn query_type(&self) -> &'static str {
        self.0.query_type()
    }
}

fn field_tokenizer(entry: &FieldEntry) -> Result<Tokenizer> {
    let indexing = match entry.field_type() {
        FieldType::Text(_) | FieldType::Json(_) => entry.field_type().text_indexing(),
        _ => None,
    };
    let indexing = indexing.ok_or_else(|| {
        ShowdexError::InvalidArgument(format!("field '{}' is not an indexed text field", entry.name()))
    })?;
    Tokenizer::for_name(&indexing.tokenizer).ok_or_else(|| {
        ShowdexError::Internal(format!("unknown tokenizer '{}'", indexing.tokenizer))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexRecordOption, NumericOptions, TextOptions};

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("title", TextOptions::text()).unwrap();
        builder
            .add_text_field(
                "summary",
                TextOptions::text().with_index_option(IndexRecordOption::Freq),
            )
            .unwrap();
        builder.add_text_field("tag", TextOptions::string()).unwrap();
        builder
            .add_u64_field("year", NumericOptions::default().with_indexed())
            .unwrap();
        builder
            .add_u64_field("views", NumericOptions::default().with_stored())
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_text_shapes() {
        let schema = schema();
        let title = schema.get_field("title").unwrap();
        let summary = schema.get_field("summary").unwrap();
        let tag = schema.get_field("tag").unwrap();

        assert_eq!(Query::text(&schema, title, "Apple", 0).unwrap().query_type(), "term");
        assert_eq!(Query::text(&schema, title, "red apple", 0).unwrap().query_type(), "phrase");
        assert_eq!(Query::text(&schema, summary, "red apple", 0).unwrap().query_type(), "bool");
        assert_eq!(Query::text(&schema, title, "!!", 0).unwrap().query_type(), "empty");
        assert_eq!(Query::text(&schema, tag, "Red Apple", 0).unwrap().query_type(), "term");

        let terms = Query::text(&schema, title, "Red apple red", 0).unwrap().terms();
        assert_eq!(
            terms,
            vec![Term::from_field_text(title, "apple"), Term::from_field_text(title, "red")]
        );
    }

    #[test]
    fn test_exact() {
        let schema = schema();
        let year = schema.get_field("year").unwrap();
        let views = schema.get_field("views").unwrap();

        let query = Query::exact(&schema, year, &Value::U64(2001)).unwrap();
        assert_eq!(query.terms(), vec![Term::from_field_u64(year, 2001)]);

        assert!(matches!(
            Query::exact(&schema, year, &Value::I64(1)),
            Err(ShowdexError::Document(_))
        ));
        assert!(matches!(
            Query::exact(&schema, views, &Value::U64(1)),
            Err(ShowdexError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_exact_text() {
        let schema = schema();
        let tag = schema.get_field("tag").unwrap();
        let title = schema.get_field("title").unwrap();

        let raw = Query::exact(&schema, tag, &Value::Str("Red Apple".to_string())).unwrap();
        assert_eq!(raw.query_type(), "term");
        assert!(matches!(
            Query::exact(&schema, title, &Value::Str("red apple".to_string())),
            Err(ShowdexError::Schema(_))
        ));

        let mut builder = Schema::builder();
        builder
            .add_text_field("title", TextOptions::text().with_stored())
            .unwrap();
        let stored = builder.build();
        let field = stored.get_field("title").unwrap();
        let query = Query::exact(&stored, field, &Value::Str("red apple".to_string())).unwrap();
        assert_eq!(query.query_type(), "exact");
        assert_eq!(
            query.terms(),
            vec![Term::from_field_text(field, "apple"), Term::from_field_text(field, "red")]
        );
    }

    #[test]
    fn test_boost_and_boolean_terms() {
        let schema = schema();
        let title = schema.get_field("title").unwrap();
        let query = Query::boolean(vec![
            (Occur::Should, Query::text(&schema, title, "apple", 0).unwrap()),
            (Occur::MustNot, Query::text(&schema, title, "pear", 0).unwrap()),
        ])
        .boost(2.0);
        assert_eq!(query.query_type(), "boost");
        assert_eq!(query.terms(), vec![Term::from_field_text(title, "apple")]);
    }
}
