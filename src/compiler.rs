//! Schema Compiler
//!
//! Expands compact schema notation (see [`crate::node`]) into a standard
//! JSON Schema document. References are resolved through a
//! [`ResolutionContext`]: local definitions first, then the compiler's
//! shared fetch cache, then the [`SchemaFetcher`].
//!
//! Expansion is recursive and asynchronous. The only suspension point is a
//! fetch; sibling elements of a sequence or object expand concurrently on the
//! calling task, and everything downstream of a reference waits for it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use compact_schemas::{Compiler, StaticFetcher};
//! use serde_json::json;
//!
//! # async fn example() -> compact_schemas::Result<()> {
//! let fetcher = StaticFetcher::new()
//!     .with("http://example.org/schema/number", json!({"type": "number"}));
//! let compiler = Compiler::new("http://example.org/schema", Arc::new(fetcher));
//! let schema = compiler.compile_value(&json!({"/x": "$number", "?label": "@text/plain"})).await?;
//! assert_eq!(schema.as_value()["required"], json!(["x"]));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::fetch::SchemaFetcher;
use crate::node::{MappingKey, SchemaNode};
use crate::resolve::{normalize_root, FetchCache, ResolutionContext};
use crate::schema::ExpandedSchema;
use crate::version::DraftVersion;

/// Compiles compact schemas against one schema root
///
/// The fetch cache lives as long as the compiler, so compiling many schemas
/// that share remote fragments fetches each fragment once.
pub struct Compiler {
    root_uri: String,
    version: DraftVersion,
    fetcher: Arc<dyn SchemaFetcher>,
    cache: Arc<FetchCache>,
}

impl Compiler {
    pub fn new(root_uri: &str, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            root_uri: normalize_root(root_uri),
            version: DraftVersion::default(),
            fetcher,
            cache: Arc::new(FetchCache::new()),
        }
    }

    /// Target a different JSON Schema draft
    pub fn with_version(mut self, version: DraftVersion) -> Self {
        self.version = version;
        self
    }

    pub fn root_uri(&self) -> &str {
        &self.root_uri
    }

    pub fn version(&self) -> DraftVersion {
        self.version
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Compile a schema node against this compiler's root URI
    pub async fn compile(&self, node: &SchemaNode) -> Result<ExpandedSchema> {
        self.compile_at(node, &self.root_uri).await
    }

    /// Compile a schema node, qualifying bare reference names with `root_uri`
    pub async fn compile_at(&self, node: &SchemaNode, root_uri: &str) -> Result<ExpandedSchema> {
        let ctx = ResolutionContext::new(root_uri, self.cache.clone(), self.fetcher.clone());
        let expanded = self.expand(node, ctx).await?;
        let mut document = match expanded {
            Value::Object(document) => document,
            other => {
                return Err(SchemaError::malformed(format!(
                    "compiled schema must be an object, got {other}"
                )))
            }
        };
        document.insert("$schema".to_string(), Value::String(self.version.uri().to_string()));
        debug!(root = root_uri, version = %self.version, "schema compiled");
        Ok(ExpandedSchema::new(Value::Object(document), self.version))
    }

    /// Parse a JSON document as compact notation and compile it
    pub async fn compile_value(&self, value: &Value) -> Result<ExpandedSchema> {
        let node = SchemaNode::parse(value)?;
        self.compile(&node).await
    }

    /// Parse JSON text as compact notation and compile it
    pub async fn compile_str(&self, text: &str) -> Result<ExpandedSchema> {
        let value: Value = serde_json::from_str(text)?;
        self.compile_value(&value).await
    }

    fn expand<'a>(
        &'a self,
        node: &'a SchemaNode,
        ctx: ResolutionContext,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            match node {
                SchemaNode::Literal(literal) => Ok(literal.to_value()),
                SchemaNode::MediaType(media_type) => Ok(json!({
                    "type": "string",
                    "format": "uri",
                    "mediaType": media_type,
                })),
                SchemaNode::Reference { name, args } => {
                    self.resolve(name, args.as_ref(), ctx).await
                }
                SchemaNode::Sequence(items) => {
                    let expanded =
                        try_join_all(items.iter().map(|item| self.expand(item, ctx.clone())))
                            .await?;
                    Ok(Value::Array(expanded))
                }
                SchemaNode::Mapping(entries) => self.expand_mapping(entries, ctx).await,
            }
        }
        .boxed()
    }

    /// Resolve `name` and compile what it refers to
    ///
    /// Local definitions resolve without a fetch. Anything else is fetched by
    /// its qualified URI (arguments appended as a query string) through the
    /// shared cache and compiled in the current context.
    fn resolve<'a>(
        &'a self,
        name: &'a str,
        args: Option<&'a Map<String, Value>>,
        ctx: ResolutionContext,
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            if let Some(local) = ctx.local(name) {
                let ctx = ctx.enter(&format!("#{name}"), name)?;
                return self.expand(&local, ctx).await;
            }

            let uri = ctx.qualify(name, args);
            let ctx = ctx.enter(&uri, name)?;
            let document = ctx.fetch(&uri).await?;
            let node = SchemaNode::parse(&document)?;
            self.expand(&node, ctx).await
        }
        .boxed()
    }

    async fn expand_mapping(
        &self,
        entries: &[(MappingKey, SchemaNode)],
        ctx: ResolutionContext,
    ) -> Result<Value> {
        let definitions: Vec<(String, SchemaNode)> = entries
            .iter()
            .filter_map(|(key, node)| match key {
                MappingKey::LocalDefinition(name) => Some((name.clone(), node.clone())),
                _ => None,
            })
            .collect();
        let ctx = ctx.define(definitions);

        let remaining: Vec<&(MappingKey, SchemaNode)> = entries
            .iter()
            .filter(|(key, _)| !matches!(key, MappingKey::LocalDefinition(_)))
            .collect();

        // Parsing already folded a `$name` object into one reference entry
        let substitution = remaining
            .iter()
            .find(|(key, _)| matches!(key, MappingKey::Reference(_)));
        if let Some((_, reference)) = substitution {
            return self.expand(reference, ctx).await;
        }

        let compiled =
            try_join_all(remaining.iter().map(|(_, node)| self.expand(node, ctx.clone()))).await?;

        let mut result = Map::new();
        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut object_marked = false;

        for ((key, _), value) in remaining.iter().zip(compiled) {
            match key {
                MappingKey::AllItems => {
                    result.insert("items".to_string(), value);
                }
                MappingKey::AnyAdditionalProperty => {
                    mark_object(&mut result, &mut object_marked);
                    result.insert("additionalProperties".to_string(), value);
                }
                MappingKey::Property { name, required: is_required, fixed } => {
                    mark_object(&mut result, &mut object_marked);
                    let mut value = if *fixed { json!({ "enum": [value] }) } else { value };
                    if *is_required {
                        if self.version.required_inline() {
                            if let Value::Object(schema) = &mut value {
                                schema.insert("required".to_string(), Value::Bool(true));
                            }
                        } else {
                            required.push(Value::String(name.clone()));
                        }
                    }
                    properties.insert(name.clone(), value);
                }
                MappingKey::Keyword(keyword) => {
                    result.insert(keyword.clone(), value);
                }
                MappingKey::LocalDefinition(_) | MappingKey::Reference(_) => {}
            }
        }

        if !properties.is_empty() {
            match result.get_mut("properties") {
                Some(Value::Object(existing)) => existing.extend(properties),
                _ => {
                    result.insert("properties".to_string(), Value::Object(properties));
                }
            }
        }
        if !required.is_empty() {
            match result.get_mut("required") {
                Some(Value::Array(existing)) => {
                    for name in required {
                        if !existing.contains(&name) {
                            existing.push(name);
                        }
                    }
                }
                _ => {
                    result.insert("required".to_string(), Value::Array(required));
                }
            }
        }
        if object_marked {
            result.insert("type".to_string(), Value::String("object".to_string()));
        }
        Ok(Value::Object(result))
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("root_uri", &self.root_uri)
            .field("version", &self.version)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Properties and `/*` declare an object schema
fn mark_object(result: &mut Map<String, Value>, marked: &mut bool) {
    if !*marked {
        *marked = true;
        result.insert("type".to_string(), Value::String("object".to_string()));
    }
}

/// One compiler per schema root, created on first use
///
/// Different roots get different compilers (and caches); asking twice for
/// the same root returns the same compiler.
pub struct CompilerPool {
    default_root: String,
    version: DraftVersion,
    fetcher: Arc<dyn SchemaFetcher>,
    compilers: Mutex<HashMap<String, Arc<Compiler>>>,
}

impl CompilerPool {
    pub fn new(default_root: &str, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self {
            default_root: normalize_root(default_root),
            version: DraftVersion::default(),
            fetcher,
            compilers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_version(mut self, version: DraftVersion) -> Self {
        self.version = version;
        self
    }

    /// The compiler for `root_uri`, or for the default root
    pub fn get(&self, root_uri: Option<&str>) -> Arc<Compiler> {
        let root = root_uri.map(normalize_root).unwrap_or_else(|| self.default_root.clone());
        let mut compilers = self.compilers.lock().unwrap_or_else(PoisonError::into_inner);
        compilers
            .entry(root)
            .or_insert_with_key(|root| {
                Arc::new(Compiler::new(root, self.fetcher.clone()).with_version(self.version))
            })
            .clone()
    }
}
