pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod index;
pub mod query;
pub mod schema;
pub mod segment;
pub mod tokenizer;

pub use config::{Bm25Params, LockWaitPolicy, ReaderConfig, ReloadPolicy, WriterConfig};
pub use document::{Document, Facet, JsonObject, Value};
pub use error::{Result, ShowdexError};
pub use index::{
    DocAddress, Index, IndexWriter, OrderKey, SearchRequest, SearchResult, Searcher, WriterState,
};
pub use query::{parse_query, Occur, Query, QueryParser};
pub use schema::{
    BytesOptions, Cardinality, FacetOptions, Field, FieldType, IndexRecordOption, JsonOptions,
    NumericOptions, Schema, SchemaBuilder, TextIndexing, TextOptions,
};
pub use segment::Term;
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
