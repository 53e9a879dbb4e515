//! Schema Validator
//!
//! Checks a JSON value against an expanded schema (draft-03/draft-04 shaped)
//! and reports every failure with JSON-pointer paths into both the data and
//! the schema. Validation never fails as an operation: problems with the
//! data become [`ValidationError`]s, and `$ref`s that cannot be resolved are
//! recorded as missing and validate nothing.
//!
//! ## Registries
//!
//! - [`SchemaStore`] is long-lived: register shared schemas once, validate
//!   many times.
//! - [`ValidationContext`] lives for one validation. It sees everything in
//!   its parent store plus whatever is registered on it, and collects the
//!   URIs it failed to find.
//!
//! ## Keyword categories
//!
//! Every category runs for every schema, in a fixed order, and each one
//! ignores data of a kind it does not apply to:
//!
//! 1. basic: `type`, `enum`
//! 2. numeric: `multipleOf`/`divisibleBy`, `minimum`, `maximum`
//! 3. string: `minLength`, `maxLength`, `pattern`
//! 4. array: `minItems`, `maxItems`, `uniqueItems`, `items`, `additionalItems`
//! 5. object: `minProperties`, `maxProperties`, `required`, `properties`,
//!    `patternProperties`, `additionalProperties`, `dependencies`
//! 6. combinators: `allOf`, `anyOf`, `oneOf`, `not`

mod error;
mod keywords;
pub mod uri;

pub use error::{escape_pointer, unescape_pointer, ErrorCode, ValidationError};
pub use keywords::deep_equal;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use crate::schema::ExpandedSchema;
use uri::{normalize_schema, split_fragment, trusted_schemas};

/// What to validate against
#[derive(Debug, Clone, Copy)]
pub enum SchemaSource<'a> {
    /// A schema document
    Document(&'a Value),
    /// The URI of a registered schema (may carry a `#/json/pointer`)
    Uri(&'a str),
}

impl<'a> From<&'a Value> for SchemaSource<'a> {
    fn from(value: &'a Value) -> Self {
        SchemaSource::Document(value)
    }
}

impl<'a> From<&'a ExpandedSchema> for SchemaSource<'a> {
    fn from(schema: &'a ExpandedSchema) -> Self {
        SchemaSource::Document(schema.as_value())
    }
}

impl<'a> From<&'a str> for SchemaSource<'a> {
    fn from(uri: &'a str) -> Self {
        SchemaSource::Uri(uri)
    }
}

/// Outcome of one validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    /// Schema URIs that were referenced but not registered
    pub missing: Vec<String>,
}

/// Register `schema` (normalised) and any self-identifying sub-schemas
fn register(schemas: &mut HashMap<String, Arc<Value>>, uri: &str, mut schema: Value) -> Arc<Value> {
    normalize_schema(&mut schema, uri);
    let mut found = HashMap::new();
    trusted_schemas(&schema, uri, &mut found);
    for (id, sub_schema) in found {
        debug!(id = id.as_str(), "registering self-identifying sub-schema");
        schemas.insert(id, Arc::new(sub_schema));
    }
    let schema = Arc::new(schema);
    schemas.insert(uri.to_string(), schema.clone());
    schema
}

/// Exact match, or a registered base URI plus a JSON-pointer fragment
fn lookup(schemas: &HashMap<String, Arc<Value>>, uri: &str) -> Option<Arc<Value>> {
    if let Some(schema) = schemas.get(uri) {
        return Some(schema.clone());
    }
    let (base, fragment) = split_fragment(uri);
    let document = schemas.get(base)?;
    match fragment.as_deref() {
        None | Some("") => Some(document.clone()),
        Some(pointer) if pointer.starts_with('/') => {
            document.pointer(pointer).cloned().map(Arc::new)
        }
        Some(_) => None,
    }
}

/// Long-lived schema registry
#[derive(Debug, Default, Clone)]
pub struct SchemaStore {
    schemas: HashMap<String, Arc<Value>>,
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema document under `uri`
    ///
    /// `id`s and `$ref`s inside the document are made absolute, and nested
    /// schemas whose `id` falls under `uri` are registered under that id.
    pub fn add_schema(&mut self, uri: &str, schema: Value) -> Arc<Value> {
        register(&mut self.schemas, uri, schema)
    }

    /// Look up a schema by URI, following a `#/json/pointer` fragment
    pub fn get_schema(&self, uri: &str) -> Option<Arc<Value>> {
        lookup(&self.schemas, uri)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Register every `*.json` file under `dir` as `base_uri` + relative path
    ///
    /// Files that are not valid JSON are skipped with a warning. Returns the
    /// number of documents registered.
    pub fn load_directory(&mut self, dir: &Path, base_uri: &str) -> crate::Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let content = std::fs::read_to_string(path)?;
            let schema: Value = match serde_json::from_str(&content) {
                Ok(schema) => schema,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparseable schema file");
                    continue;
                }
            };
            self.add_schema(&format!("{base_uri}{relative}"), schema);
            count += 1;
        }
        debug!(dir = %dir.display(), count, "loaded schema directory");
        Ok(count)
    }

    /// Validate `data` in a fresh context backed by this store
    pub fn validate<'a>(
        &self,
        data: &Value,
        schema: impl Into<SchemaSource<'a>>,
    ) -> ValidationReport {
        ValidationContext::with_parent(self).validate(data, schema)
    }
}

/// Per-validation scope: registered schemas, misses, compiled patterns
#[derive(Debug, Default)]
pub struct ValidationContext<'s> {
    parent: Option<&'s SchemaStore>,
    schemas: HashMap<String, Arc<Value>>,
    missing: Vec<String>,
    patterns: HashMap<String, Option<Regex>>,
    /// (reference, data address) pairs currently being validated
    active: Vec<(String, usize)>,
}

impl<'s> ValidationContext<'s> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that falls back to `store` for lookups
    pub fn with_parent(store: &'s SchemaStore) -> Self {
        Self {
            parent: Some(store),
            ..Self::default()
        }
    }

    /// Register a schema for this context only
    pub fn add_schema(&mut self, uri: &str, schema: Value) -> Arc<Value> {
        register(&mut self.schemas, uri, schema)
    }

    /// Look up a schema, recording the base URI as missing if absent
    pub fn get_schema(&mut self, uri: &str) -> Option<Arc<Value>> {
        let found = lookup(&self.schemas, uri)
            .or_else(|| self.parent.and_then(|p| p.get_schema(uri)));
        if found.is_none() {
            let (base, _) = split_fragment(uri);
            if !self.missing.iter().any(|m| m == base) {
                warn!(uri, "referenced schema is not registered");
                self.missing.push(base.to_string());
            }
        }
        found
    }

    /// Base URIs requested but not found so far
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    /// Validate `data`, registering a document source under the empty URI
    pub fn validate<'a>(
        mut self,
        data: &Value,
        schema: impl Into<SchemaSource<'a>>,
    ) -> ValidationReport {
        let document = match schema.into() {
            SchemaSource::Document(document) => document.clone(),
            SchemaSource::Uri(uri) => json!({ "$ref": uri }),
        };
        let root = self.add_schema("", document);
        let errors = self.validate_all(data, &root);
        ValidationReport {
            valid: errors.is_empty(),
            errors,
            missing: self.missing,
        }
    }

    /// Every failure of `data` against `schema`
    ///
    /// A schema carrying `$ref` is replaced by its referent; an unresolvable
    /// (or self-referencing) chain of references validates nothing. Coming
    /// back to a reference for the same data, however indirectly, also
    /// validates nothing.
    pub fn validate_all(&mut self, data: &Value, schema: &Value) -> Vec<ValidationError> {
        let mut referent: Option<Arc<Value>> = None;
        let mut followed: Vec<String> = Vec::new();
        loop {
            let current = referent.as_deref().unwrap_or(schema);
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                break;
            };
            if followed.iter().any(|r| r == reference) {
                warn!(reference, "reference loop; skipping");
                return Vec::new();
            }
            followed.push(reference.to_string());
            match self.get_schema(reference) {
                Some(found) => referent = Some(found),
                None => return Vec::new(),
            }
        }
        let schema = referent.as_deref().unwrap_or(schema);
        if !schema.is_object() {
            return Vec::new();
        }
        trace!(followed = followed.len(), "validating against schema");

        let entered = match followed.last() {
            Some(reference) => {
                let key = (reference.clone(), data as *const Value as usize);
                if self.active.contains(&key) {
                    warn!(
                        reference = reference.as_str(),
                        "recursive reference on the same data; skipping"
                    );
                    return Vec::new();
                }
                self.active.push(key);
                true
            }
            None => false,
        };

        let mut errors = Vec::new();
        self.validate_basic(data, schema, &mut errors);
        self.validate_numeric(data, schema, &mut errors);
        self.validate_string(data, schema, &mut errors);
        self.validate_array(data, schema, &mut errors);
        self.validate_object(data, schema, &mut errors);
        self.validate_combinators(data, schema, &mut errors);

        if entered {
            self.active.pop();
        }
        errors
    }

    /// Compiled `pattern`, or `None` if it is not a valid regular expression
    fn pattern(&mut self, source: &str) -> Option<&Regex> {
        self.patterns
            .entry(source.to_string())
            .or_insert_with(|| match Regex::new(source) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = source, error = %e, "ignoring invalid pattern");
                    None
                }
            })
            .as_ref()
    }
}

/// Validate `data` against `schema` with no pre-registered schemas
pub fn validate<'a>(data: &Value, schema: impl Into<SchemaSource<'a>>) -> ValidationReport {
    ValidationContext::new().validate(data, schema)
}
