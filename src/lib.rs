//! Compact Schemas
//!
//! A compiler for compact schema notation and a JSON Schema validator that
//! reports path-annotated errors.
//!
//! ## Features
//!
//! - **Compact notation**: `/name` required and `?name` optional properties,
//!   `$name` references, `#name` local definitions, `@type/subtype` media types
//! - **Concurrent resolution**: references are fetched asynchronously, and
//!   every fetch of the same URI shares one in-flight request and one result
//! - **Two drafts**: output as draft-03 (inline `required`) or draft-04
//!   (`required` lists)
//! - **Validation**: every failure reported with JSON pointers into the data
//!   and the schema; unregistered `$ref`s are collected, not fatal
//!
//! ## Architecture
//!
//! ```text
//! compact JSON ──▶ node ──▶ compiler ──▶ ExpandedSchema ──▶ validator ──▶ ValidationReport
//!                              │
//!                           resolve (scopes, cycle detection, FetchCache)
//!                              │
//!                           fetch (StaticFetcher, DirectoryFetcher, HttpFetcher)
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod fetch;
pub mod node;
pub mod query;
pub mod resolve;
pub mod schema;
pub mod validator;
pub mod version;

pub use compiler::{Compiler, CompilerPool};
pub use config::ToolConfig;
pub use error::{FetchError, Result, SchemaError};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{DirectoryFetcher, SchemaFetcher, StaticFetcher};
pub use node::{Literal, MappingKey, SchemaNode};
pub use query::{args_to_query, query_to_args};
pub use resolve::{FetchCache, ResolutionContext};
pub use schema::{add_titles_to_properties, media_types, ExpandedSchema};
pub use validator::{
    validate, ErrorCode, SchemaSource, SchemaStore, ValidationContext, ValidationError,
    ValidationReport,
};
pub use version::DraftVersion;
