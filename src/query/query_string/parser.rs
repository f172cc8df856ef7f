//! Recursive descent parser for query strings
//!
//! # Grammar
//!
//! ```text
//! query       := or_expr
//! or_expr     := and_expr (OR? and_expr)*
//! and_expr    := clause (AND clause)*
//! clause      := (NOT | '-' | '+')? primary boost?
//! primary     := field_query | grouped | value
//! field_query := TERM COLON (value | grouped)
//! value       := TERM | QUOTED slop? | range | '*'
//! range       := ('[' | '{') bound TO bound (']' | '}')
//! bound       := '*' | '-'? TERM | QUOTED
//! slop        := TILDE distance
//! boost       := CARET factor
//! grouped     := '(' or_expr ')'
//! ```
//!
//! Adjacent clauses without an operator are alternatives, like `OR`.
//! `field:(a b)` applies the field to every unqualified value of the group.

use std::ops::Bound;

use super::lexer::{Lexer, Token};
use crate::document::value::{decode_bytes, parse_date};
use crate::document::Facet;
use crate::error::ShowdexError;
use crate::query::nodes::Occur;
use crate::query::Query;
use crate::schema::{Field, FieldType, Schema};
use crate::segment::Term;
use crate::Result;

/// Field (and json path) a value is matched against
#[derive(Clone, Debug)]
struct Target {
    field: Field,
    path: Option<String>,
}

impl Target {
    fn field(field: Field) -> Self {
        Self { field, path: None }
    }
}

/// Resolve `name` to a field, or to `json_field.path`
fn resolve_target(schema: &Schema, name: &str) -> Option<Target> {
    if let Some(field) = schema.get_field(name) {
        return Some(Target::field(field));
    }
    let (base, path) = name.split_once('.')?;
    let (field, entry) = schema.get_field_entry(base)?;
    match entry.field_type() {
        FieldType::Json(_) if !path.is_empty() => Some(Target {
            field,
            path: Some(path.to_string()),
        }),
        _ => None,
    }
}

/// Parser for Lucene-style query strings
///
/// Holds the schema and the fields unqualified values are matched against;
/// one parser can parse any number of query strings.
#[derive(Clone, Debug)]
pub struct QueryParser {
    schema: Schema,
    default_fields: Vec<Target>,
}

impl QueryParser {
    pub fn new(schema: Schema, default_fields: Vec<Field>) -> Self {
        Self {
            schema,
            default_fields: default_fields.into_iter().map(Target::field).collect(),
        }
    }

    /// Create a parser from default field names
    ///
    /// Names may address a json path (`attributes.studio`). An unknown name
    /// is reported as a syntax error at position 0.
    pub fn for_field_names(schema: &Schema, names: &[&str]) -> Result<Self> {
        let default_fields = names
            .iter()
            .map(|name| {
                resolve_target(schema, name).ok_or_else(|| {
                    ShowdexError::syntax(0, format!("unknown default field '{}'", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: schema.clone(),
            default_fields,
        })
    }

    /// Parse the query string into a query
    pub fn parse(&self, text: &str) -> Result<Query> {
        let mut state = ParseState::new(self, text)?;
        let query = state.parse_or_expr()?;

        // Ensure we've consumed all input
        if state.current_token != Token::Eof {
            return Err(ShowdexError::syntax(
                state.position,
                format!("unexpected {}", state.current_token.describe()),
            ));
        }
        Ok(query)
    }
}

/// Parse `text` with `default_field_names` as the fields of unqualified values
pub fn parse_query(schema: &Schema, text: &str, default_field_names: &[&str]) -> Result<Query> {
    QueryParser::for_field_names(schema, default_field_names)?.parse(text)
}

/// How a clause was prefixed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Prefix {
    None,
    Required,
    Excluded,
}

struct ParseState<'a> {
    schema: &'a Schema,
    lexer: Lexer,
    current_token: Token,
    /// Char offset of `current_token`
    position: usize,
    /// Fields for unqualified values; narrowed inside `field:( ... )`
    defaults: Vec<Target>,
}

impl<'a> ParseState<'a> {
    fn new(parser: &'a QueryParser, text: &str) -> Result<Self> {
        let mut lexer = Lexer::new(text);
        let current_token = lexer.next_token()?;
        let position = lexer.token_start();
        Ok(Self {
            schema: &parser.schema,
            lexer,
            current_token,
            position,
            defaults: parser.default_fields.clone(),
        })
    }

    /// Parse: or_expr := and_expr (OR? and_expr)*
    fn parse_or_expr(&mut self) -> Result<Query> {
        let mut groups = vec![self.parse_and_expr()?];

        loop {
            if self.current_token == Token::Or {
                self.advance()?;
                groups.push(self.parse_and_expr()?);
            } else if self.is_start_of_clause() {
                groups.push(self.parse_and_expr()?);
            } else {
                break;
            }
        }

        if groups.len() == 1 {
            let group = groups.pop().unwrap_or_default();
            return Ok(combine_group(group));
        }

        let clauses = groups
            .into_iter()
            .map(|mut group| {
                if group.len() == 1 {
                    if let Some((prefix, query)) = group.pop() {
                        return (prefix_occur(prefix, Occur::Should), query);
                    }
                }
                (Occur::Should, combine_group(group))
            })
            .collect();
        Ok(Query::boolean(clauses))
    }

    /// Parse: and_expr := clause (AND clause)*
    fn parse_and_expr(&mut self) -> Result<Vec<(Prefix, Query)>> {
        let mut clauses = vec![self.parse_clause()?];
        while self.current_token == Token::And {
            self.advance()?;
            clauses.push(self.parse_clause()?);
        }
        Ok(clauses)
    }

    /// Parse: clause := (NOT | '-' | '+')? primary boost?
    fn parse_clause(&mut self) -> Result<(Prefix, Query)> {
        let prefix = match self.current_token {
            Token::Not | Token::Minus => Prefix::Excluded,
            Token::Plus => Prefix::Required,
            _ => Prefix::None,
        };
        if prefix != Prefix::None {
            self.advance()?;
        }

        let query = self.parse_primary()?;
        let query = self.parse_boost(query)?;
        Ok((prefix, query))
    }

    /// Parse: primary := field_query | grouped | value
    fn parse_primary(&mut self) -> Result<Query> {
        let start = self.position;
        let is_field = matches!(self.current_token, Token::Term(_))
            && self.lexer.peek_token()? == Token::Colon;
        match self.current_token.clone() {
            Token::LeftParen => self.parse_group(),
            Token::Term(name) if is_field => {
                self.advance()?; // field name
                self.advance()?; // ':'
                let target = resolve_target(self.schema, &name).ok_or_else(|| {
                    ShowdexError::syntax(start, format!("unknown field '{}'", name))
                })?;
                self.parse_field_value(target)
            }
            Token::Asterisk => {
                self.advance()?;
                Ok(Query::all())
            }
            Token::Term(_) | Token::QuotedString(_) => {
                let (text, slop) = self.parse_value_text()?;
                self.default_fields_query(&text, slop, start)
            }
            token => Err(ShowdexError::syntax(
                start,
                format!("unexpected {}", token.describe()),
            )),
        }
    }

    /// Parse: grouped := '(' or_expr ')'
    fn parse_group(&mut self) -> Result<Query> {
        self.advance()?; // '('
        let query = self.parse_or_expr()?;
        self.expect(Token::RightParen)?;
        Ok(query)
    }

    /// Parse the value after `field:`
    fn parse_field_value(&mut self, target: Target) -> Result<Query> {
        let start = self.position;
        match self.current_token {
            Token::Asterisk => {
                self.advance()?;
                Ok(Query::all())
            }
            Token::LeftBracket | Token::LeftBrace => self.parse_range(&target),
            Token::LeftParen => {
                let outer = std::mem::replace(&mut self.defaults, vec![target]);
                let group = self.parse_group();
                self.defaults = outer;
                group
            }
            Token::Term(_) | Token::QuotedString(_) | Token::Minus => {
                let (text, slop) = self.parse_value_text()?;
                self.value_query(&target, &text, slop, start)
            }
            ref token => Err(ShowdexError::syntax(
                start,
                format!("expected a value, got {}", token.describe()),
            )),
        }
    }

    /// Read a bare or quoted value and its phrase slop
    ///
    /// A leading `-` right before a bare value is taken as a sign.
    fn parse_value_text(&mut self) -> Result<(String, u32)> {
        let start = self.position;
        let negative = self.current_token == Token::Minus;
        if negative {
            self.advance()?;
        }

        match self.current_token.clone() {
            Token::QuotedString(text) if !negative => {
                self.advance()?;
                let slop = self.parse_slop()?;
                Ok((text, slop))
            }
            Token::Term(text) => {
                if text.contains('*') {
                    return Err(ShowdexError::syntax(
                        self.position,
                        "wildcard terms are not supported",
                    ));
                }
                self.advance()?;
                if let Token::Tilde(_) = self.current_token {
                    return Err(ShowdexError::syntax(
                        self.position,
                        "slop applies only to quoted phrases",
                    ));
                }
                let text = if negative { format!("-{}", text) } else { text };
                Ok((text, 0))
            }
            ref token => Err(ShowdexError::syntax(
                start,
                format!("expected a value, got {}", token.describe()),
            )),
        }
    }

    /// Parse: slop := TILDE distance
    fn parse_slop(&mut self) -> Result<u32> {
        match self.current_token {
            Token::Tilde(Some(slop)) => {
                self.advance()?;
                Ok(slop)
            }
            Token::Tilde(None) => Err(ShowdexError::syntax(
                self.position,
                "expected a slop distance after '~'",
            )),
            _ => Ok(0),
        }
    }

    /// Parse: boost := CARET factor
    fn parse_boost(&mut self, query: Query) -> Result<Query> {
        match self.current_token {
            Token::Caret(Some(boost)) => {
                self.advance()?;
                Ok(query.boost(boost))
            }
            Token::Caret(None) => Err(ShowdexError::syntax(
                self.position,
                "expected a boost factor after '^'",
            )),
            _ => Ok(query),
        }
    }

    /// Parse range query: [low TO high] or {low TO high}
    fn parse_range(&mut self, target: &Target) -> Result<Query> {
        let start = self.position;
        let entry = self.schema.field_entry(target.field);
        if !entry.field_type().supports_range() || !entry.is_indexed() {
            return Err(ShowdexError::syntax(
                start,
                format!("field '{}' does not support range queries", entry.name()),
            ));
        }

        let inclusive_lower = self.current_token == Token::LeftBracket;
        self.advance()?; // '[' or '{'

        let lower = self.parse_range_bound(target.field)?;
        self.expect(Token::To)?;
        let upper = self.parse_range_bound(target.field)?;

        let inclusive_upper = match self.current_token {
            Token::RightBracket => true,
            Token::RightBrace => false,
            ref token => {
                return Err(ShowdexError::syntax(
                    self.position,
                    format!("expected ']' or '}}' to close the range, got {}", token.describe()),
                ))
            }
        };
        self.advance()?;

        let bound = |term: Option<Term>, inclusive: bool| match term {
            None => Bound::Unbounded,
            Some(term) if inclusive => Bound::Included(term),
            Some(term) => Bound::Excluded(term),
        };
        Ok(Query::range(
            target.field,
            bound(lower, inclusive_lower),
            bound(upper, inclusive_upper),
        ))
    }

    /// Parse one side of a range; `*` is unbounded
    fn parse_range_bound(&mut self, field: Field) -> Result<Option<Term>> {
        let start = self.position;
        if self.current_token == Token::Asterisk {
            self.advance()?;
            return Ok(None);
        }
        let negative = self.current_token == Token::Minus;
        if negative {
            self.advance()?;
        }
        let text = match self.current_token.clone() {
            Token::Term(text) => text,
            Token::QuotedString(text) if !negative => text,
            ref token => {
                return Err(ShowdexError::syntax(
                    self.position,
                    format!("expected a range bound, got {}", token.describe()),
                ))
            }
        };
        self.advance()?;
        let text = if negative { format!("-{}", text) } else { text };
        self.scalar_term(field, &text, start).map(Some)
    }

    /// Unqualified value: a disjunction over the default fields
    ///
    /// Default fields the value cannot apply to (a word against a numeric
    /// field) are skipped; the first error is reported if none applies.
    fn default_fields_query(&self, text: &str, slop: u32, position: usize) -> Result<Query> {
        let mut queries = Vec::new();
        let mut first_error = None;
        for target in &self.defaults {
            match self.value_query(target, text, slop, position) {
                Ok(query) => queries.push(query),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match (queries.len(), first_error) {
            (0, Some(e)) => Err(e),
            (0, None) => Err(ShowdexError::syntax(
                position,
                format!("no default field to match '{}' against", text),
            )),
            (1, _) => Ok(queries.pop().unwrap_or_else(Query::empty)),
            _ => Ok(Query::boolean(
                queries.into_iter().map(|q| (Occur::Should, q)).collect(),
            )),
        }
    }

    /// Query matching `text` against one target, converted by field kind
    fn value_query(&self, target: &Target, text: &str, slop: u32, position: usize) -> Result<Query> {
        let entry = self.schema.field_entry(target.field);
        if !entry.is_indexed() {
            return Err(ShowdexError::syntax(
                position,
                format!("field '{}' is not indexed", entry.name()),
            ));
        }
        match (entry.field_type(), &target.path) {
            (FieldType::Text(_), _) => Query::text(self.schema, target.field, text, slop),
            (FieldType::Json(_), Some(path)) => {
                Query::json_text(self.schema, target.field, path, text, slop)
            }
            (FieldType::Json(_), None) => Err(ShowdexError::syntax(
                position,
                format!(
                    "json field '{}' needs a path, as in '{}.key:value'",
                    entry.name(),
                    entry.name()
                ),
            )),
            (FieldType::Facet(_), _) => {
                let facet = Facet::from_string(text)
                    .map_err(|e| ShowdexError::syntax(position, e.to_string()))?;
                Ok(Query::facet(target.field, facet))
            }
            _ => Ok(Query::term(self.scalar_term(target.field, text, position)?)),
        }
    }

    /// Term for a numeric, date or bytes value
    fn scalar_term(&self, field: Field, text: &str, position: usize) -> Result<Term> {
        let entry = self.schema.field_entry(field);
        let invalid = || {
            ShowdexError::syntax(
                position,
                format!(
                    "'{}' is not a valid {} value for field '{}'",
                    text,
                    entry.field_type().kind_name(),
                    entry.name()
                ),
            )
        };
        match entry.field_type() {
            FieldType::I64(_) => text
                .parse::<i64>()
                .map(|v| Term::from_field_i64(field, v))
                .map_err(|_| invalid()),
            FieldType::U64(_) => text
                .parse::<u64>()
                .map(|v| Term::from_field_u64(field, v))
                .map_err(|_| invalid()),
            FieldType::Date(_) => parse_date(text)
                .map(|d| Term::from_field_date(field, &d))
                .ok_or_else(invalid),
            FieldType::Bytes(_) => decode_bytes(text)
                .map(|b| Term::from_field_bytes(field, &b))
                .ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    /// Check if current token can start a clause
    fn is_start_of_clause(&self) -> bool {
        matches!(
            self.current_token,
            Token::Term(_)
                | Token::QuotedString(_)
                | Token::LeftParen
                | Token::Plus
                | Token::Minus
                | Token::Not
                | Token::Asterisk
        )
    }

    /// Advance to the next token
    fn advance(&mut self) -> Result<()> {
        self.current_token = self.lexer.next_token()?;
        self.position = self.lexer.token_start();
        Ok(())
    }

    /// Expect a specific token and advance
    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.current_token == expected {
            self.advance()
        } else {
            Err(ShowdexError::syntax(
                self.position,
                format!(
                    "expected {}, got {}",
                    expected.describe(),
                    self.current_token.describe()
                ),
            ))
        }
    }
}

fn prefix_occur(prefix: Prefix, unprefixed: Occur) -> Occur {
    match prefix {
        Prefix::None => unprefixed,
        Prefix::Required => Occur::Must,
        Prefix::Excluded => Occur::MustNot,
    }
}

/// Clauses joined by AND: all required, excluded ones removed
fn combine_group(mut group: Vec<(Prefix, Query)>) -> Query {
    if group.len() == 1 && group[0].0 != Prefix::Excluded {
        if let Some((_, query)) = group.pop() {
            return query;
        }
    }
    Query::boolean(
        group
            .into_iter()
            .map(|(prefix, query)| (prefix_occur(prefix, Occur::Must), query))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::query::nodes::test_util::TestSegment;
    use crate::schema::{FacetOptions, JsonOptions, NumericOptions, TextIndexing, TextOptions};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("title", TextOptions::text()).unwrap();
        builder.add_text_field("body", TextOptions::text()).unwrap();
        builder
            .add_i64_field("year", NumericOptions::default().with_indexed())
            .unwrap();
        builder
            .add_date_field("aired", NumericOptions::default().with_indexed())
            .unwrap();
        builder
            .add_u64_field("views", NumericOptions::default().with_stored())
            .unwrap();
        builder
            .add_facet_field("category", FacetOptions::default())
            .unwrap();
        builder
            .add_json_field(
                "attrs",
                JsonOptions::default().with_indexing(TextIndexing::default()),
            )
            .unwrap();
        builder.build()
    }

    fn segment() -> TestSegment {
        let rows = [
            ("red apple", "fresh fruit", 1999, "/food/fruit", "granny"),
            ("green apple", "sour fruit", 2005, "/food/fruit/green", "smith"),
            ("red banana", "sweet and long", 2010, "/food", "cavendish"),
            ("red car", "fast", -20, "/vehicle", "ferrari"),
        ];
        let docs: Vec<Document> = rows
            .iter()
            .enumerate()
            .map(|(i, (title, body, year, category, brand))| {
                let mut doc = Document::new();
                doc.add_text("title", *title);
                doc.add_text("body", *body);
                doc.add_i64("year", *year);
                doc.add_date(
                    "aired",
                    Utc.with_ymd_and_hms(2020, 1, 1 + i as u32, 0, 0, 0).unwrap(),
                );
                doc.add_facet("category", Facet::from_string(category).unwrap());
                let attrs = json!({ "brand": brand }).as_object().cloned().unwrap();
                doc.add_json("attrs", attrs);
                doc
            })
            .collect();
        TestSegment::new(schema(), &docs)
    }

    fn search(segment: &TestSegment, text: &str) -> Vec<u32> {
        let query = parse_query(&segment.schema, text, &["title", "body"]).unwrap();
        let ctx = segment.context();
        query.node().execute(&ctx).unwrap().iter().collect()
    }

    fn syntax_position(text: &str) -> usize {
        match parse_query(&schema(), text, &["title"]) {
            Err(ShowdexError::QuerySyntax { position, .. }) => position,
            other => panic!("expected syntax error for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_field_terms() {
        let segment = segment();
        assert_eq!(search(&segment, "title:apple"), vec![0, 1]);
        assert_eq!(search(&segment, "title:red"), vec![0, 2, 3]);
        assert_eq!(search(&segment, "title:RED"), vec![0, 2, 3]);
    }

    #[test]
    fn test_boolean_operators() {
        let segment = segment();
        assert_eq!(search(&segment, "title:red AND title:apple"), vec![0]);
        assert_eq!(search(&segment, "title:green OR title:banana"), vec![1, 2]);
        assert_eq!(search(&segment, "title:green title:banana"), vec![1, 2]);
        assert_eq!(search(&segment, "title:red -title:apple"), vec![2, 3]);
        assert_eq!(search(&segment, "title:red AND NOT title:car"), vec![0, 2]);
        assert_eq!(search(&segment, "+title:apple title:red"), vec![0, 1]);
        assert_eq!(search(&segment, "NOT title:red"), vec![1]);
        assert_eq!(
            search(&segment, "(title:green OR title:banana) AND body:sweet"),
            vec![2]
        );
    }

    #[test]
    fn test_default_fields() {
        let segment = segment();
        // "fruit" only appears in body, "apple" only in title
        assert_eq!(search(&segment, "fruit"), vec![0, 1]);
        assert_eq!(search(&segment, "apple OR fast"), vec![0, 1, 3]);
        assert_eq!(search(&segment, "title:(green banana)"), vec![1, 2]);
    }

    #[test]
    fn test_phrases() {
        let segment = segment();
        assert_eq!(search(&segment, "\"red apple\""), vec![0]);
        assert_eq!(search(&segment, "title:\"apple red\""), Vec::<u32>::new());
        assert_eq!(search(&segment, "body:\"sweet long\""), Vec::<u32>::new());
        assert_eq!(search(&segment, "body:\"sweet long\"~1"), vec![2]);
    }

    #[test]
    fn test_numeric_and_date() {
        let segment = segment();
        assert_eq!(search(&segment, "year:2005"), vec![1]);
        assert_eq!(search(&segment, "year:-20"), vec![3]);
        assert_eq!(search(&segment, "year:[2000 TO 2010]"), vec![1, 2]);
        assert_eq!(search(&segment, "year:{1999 TO *]"), vec![1, 2]);
        assert_eq!(search(&segment, "year:[-100 TO 0}"), vec![3]);
        assert_eq!(search(&segment, "aired:2020-01-02"), vec![1]);
        assert_eq!(
            search(&segment, "aired:[\"2020-01-02T00:00:00Z\" TO 2020-01-03]"),
            vec![1, 2]
        );
    }

    #[test]
    fn test_facets_json_and_all() {
        let segment = segment();
        assert_eq!(search(&segment, "category:/food/fruit"), vec![0, 1]);
        assert_eq!(search(&segment, "category:\"/food\""), vec![0, 1, 2]);
        assert_eq!(search(&segment, "category:/"), vec![0, 1, 2, 3]);
        assert_eq!(search(&segment, "attrs.brand:ferrari"), vec![3]);
        assert_eq!(search(&segment, "*"), vec![0, 1, 2, 3]);
        assert_eq!(search(&segment, "year:* -category:/food"), vec![3]);
    }

    #[test]
    fn test_boost() {
        let query = parse_query(&schema(), "title:apple^2", &["title"]).unwrap();
        assert_eq!(query.query_type(), "boost");
        let query = parse_query(&schema(), "(apple OR pear)^0.5", &["title"]).unwrap();
        assert_eq!(query.query_type(), "boost");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(syntax_position(""), 0);
        assert_eq!(syntax_position("title:apple AND"), 15);
        assert_eq!(syntax_position("nope:apple"), 0);
        assert_eq!(syntax_position("apple OR missing:x"), 9);
        assert_eq!(syntax_position("year:abc"), 5);
        assert_eq!(syntax_position("title:[a TO b]"), 6);
        assert_eq!(syntax_position("(apple"), 6);
        assert_eq!(syntax_position("apple)"), 5);
        assert_eq!(syntax_position("year:[1 TO 2"), 12);
        assert_eq!(syntax_position("category:a/b"), 9);
        assert_eq!(syntax_position("views:3"), 6);
        assert_eq!(syntax_position("attrs:x"), 6);
        assert_eq!(syntax_position("appl*"), 0);
        assert_eq!(syntax_position("apple~2"), 5);
        assert_eq!(syntax_position("apple^"), 5);
    }

    #[test]
    fn test_unknown_default_field() {
        assert!(matches!(
            parse_query(&schema(), "apple", &["nope"]),
            Err(ShowdexError::QuerySyntax { position: 0, .. })
        ));
        assert!(parse_query(&schema(), "x", &["attrs.brand"]).is_ok());
    }
}
