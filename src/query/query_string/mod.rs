//! Lucene-style query string parser
//!
//! Supports syntax like:
//! - `title:apple AND NOT title:green`
//! - `year:[2000 TO *}` and `aired:{2020-01-01 TO 2021-01-01}`
//! - `title:"red apple"~1`
//! - `category:/food/fruit` (facet subtree)
//! - `attrs.studio:bones` (json path)
//!
//! # Example
//!
//! ```rust
//! use showdex::query::query_string::parse_query;
//! use showdex::schema::{Schema, TextOptions};
//!
//! let mut builder = Schema::builder();
//! builder.add_text_field("title", TextOptions::text()).unwrap();
//! let schema = builder.build();
//! let query = parse_query(&schema, "title:apple OR pear", &["title"]).unwrap();
//! assert_eq!(query.query_type(), "bool");
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token};
pub use parser::{parse_query, QueryParser};
