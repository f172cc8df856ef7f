//! Document value model
//!
//! Typed field values, hierarchical facets and the multi-valued document
//! container that is the unit of indexing.

mod doc;
pub mod facet;
pub mod value;

pub use doc::Document;
pub use facet::Facet;
pub use value::{JsonObject, Value};
