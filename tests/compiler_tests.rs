//! Compiler integration tests
//!
//! Expansion of compact notation, reference resolution through the shared
//! cache, and the two output drafts.

use std::path::Path;
use std::sync::Arc;

use compact_schemas::{
    Compiler, DirectoryFetcher, DraftVersion, SchemaError, SchemaFetcher, StaticFetcher,
};
use serde_json::{json, Value};

const ROOT: &str = "http://s/schema/";

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn fixture(name: &str) -> Value {
    let content = std::fs::read_to_string(fixtures_path().join(name)).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn with_static(fetcher: &Arc<StaticFetcher>) -> Compiler {
    let fetcher: Arc<dyn SchemaFetcher> = fetcher.clone();
    Compiler::new(ROOT, fetcher)
}

// =============================================================================
// Notation
// =============================================================================

#[tokio::test]
async fn test_required_and_optional_properties() {
    let fetcher = Arc::new(StaticFetcher::new());
    let schema = with_static(&fetcher)
        .compile_value(&json!({"/a": "string", "?b": "string"}))
        .await
        .unwrap();

    assert_eq!(
        schema.as_value(),
        &json!({
            "type": "object",
            "properties": {"a": "string", "b": "string"},
            "required": ["a"],
            "$schema": "http://json-schema.org/draft-04/schema#"
        })
    );
}

#[tokio::test]
async fn test_media_type_root() {
    let fetcher = Arc::new(StaticFetcher::new());
    let schema = with_static(&fetcher).compile_value(&json!("@image/png")).await.unwrap();

    assert_eq!(schema.as_value()["type"], json!("string"));
    assert_eq!(schema.as_value()["format"], json!("uri"));
    assert_eq!(schema.as_value()["mediaType"], json!("image/png"));
}

#[tokio::test]
async fn test_all_items_and_additional_properties() {
    let fetcher = Arc::new(StaticFetcher::new());
    let schema = with_static(&fetcher)
        .compile_value(&json!({
            "/tags": {"type": "array", "allItems": {"type": "string"}},
            "/meta": {"/*": {"type": "number"}}
        }))
        .await
        .unwrap();

    let properties = &schema.as_value()["properties"];
    assert_eq!(properties["tags"], json!({"type": "array", "items": {"type": "string"}}));
    assert_eq!(
        properties["meta"],
        json!({"type": "object", "additionalProperties": {"type": "number"}})
    );
}

#[tokio::test]
async fn test_draft3_marks_required_inline() {
    let fetcher: Arc<dyn SchemaFetcher> = Arc::new(StaticFetcher::new());
    let compiler = Compiler::new(ROOT, fetcher).with_version(DraftVersion::Draft3);
    let schema = compiler
        .compile_value(&json!({"/a": {"type": "string"}, "?b": {"type": "number"}}))
        .await
        .unwrap();

    let doc = schema.as_value();
    assert_eq!(doc["$schema"], json!("http://json-schema.org/draft-03/schema#"));
    assert_eq!(doc["properties"]["a"], json!({"type": "string", "required": true}));
    assert_eq!(doc["properties"]["b"], json!({"type": "number"}));
    assert!(doc.get("required").is_none());
    assert_eq!(schema.version(), DraftVersion::Draft3);
}

#[tokio::test]
async fn test_expanded_schema_is_idempotent() {
    let fetcher = Arc::new(StaticFetcher::new());
    let compiler = with_static(&fetcher);
    let expanded = fixture("expanded.json");

    let once = compiler.compile_value(&expanded).await.unwrap().into_value();
    let twice = compiler.compile_value(&once).await.unwrap().into_value();

    let mut without_tag = once.clone();
    without_tag.as_object_mut().unwrap().remove("$schema");
    assert_eq!(without_tag, expanded);
    assert_eq!(once, twice);
    assert_eq!(fetcher.fetch_count(), 0);
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn test_local_definitions_never_fetch() {
    let fetcher = Arc::new(StaticFetcher::new());
    let schema = with_static(&fetcher)
        .compile_value(&json!({
            "#point": {"/x": {"type": "number"}, "/y": {"type": "number"}},
            "/origin": "$point",
            "/path": {"type": "array", "allItems": "$point"}
        }))
        .await
        .unwrap();

    let point = json!({
        "type": "object",
        "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
        "required": ["x", "y"]
    });
    assert_eq!(schema.as_value()["properties"]["origin"], point);
    assert_eq!(schema.as_value()["properties"]["path"]["items"], point);
    assert_eq!(fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn test_inner_definition_shadows_outer() {
    let fetcher = Arc::new(StaticFetcher::new());
    let schema = with_static(&fetcher)
        .compile_value(&json!({
            "#id": {"type": "string"},
            "/outer": "$id",
            "/inner": {"#id": {"type": "integer"}, "/value": "$id"}
        }))
        .await
        .unwrap();

    let doc = schema.as_value();
    assert_eq!(doc["properties"]["outer"], json!({"type": "string"}));
    assert_eq!(doc["properties"]["inner"]["properties"]["value"], json!({"type": "integer"}));
}

#[tokio::test]
async fn test_repeated_reference_fetches_once() {
    let fetcher = Arc::new(
        StaticFetcher::new().with(format!("{ROOT}point"), json!({"/x": {"type": "number"}})),
    );
    let compiler = with_static(&fetcher);

    let schema = compiler
        .compile_value(&json!({"/a": "$point", "/b": "$point", "/c": {"allItems": "$point"}}))
        .await
        .unwrap();
    assert_eq!(schema.as_value()["properties"]["a"], schema.as_value()["properties"]["b"]);

    compiler.compile_value(&json!({"/again": "$point"})).await.unwrap();
    assert_eq!(fetcher.fetch_count(), 1);
    assert_eq!(compiler.cache().len(), 1);
}

#[tokio::test]
async fn test_arguments_select_distinct_documents() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with(format!("{ROOT}range?min=1"), json!({"type": "integer", "minimum": 1}))
            .with(format!("{ROOT}range?min=5"), json!({"type": "integer", "minimum": 5})),
    );
    let compiler = with_static(&fetcher);

    let schema = compiler
        .compile_value(&json!({
            "/low": {"$range": {"min": 1}},
            "/high": {"$range": {"min": 5}},
            "/low_again": {"$range": {"min": 1}}
        }))
        .await
        .unwrap();

    let properties = &schema.as_value()["properties"];
    assert_eq!(properties["low"]["minimum"], json!(1));
    assert_eq!(properties["high"]["minimum"], json!(5));
    assert_eq!(fetcher.fetch_count(), 2);
}

#[tokio::test]
async fn test_null_argument_is_passed_through() {
    let fetcher = Arc::new(
        StaticFetcher::new().with(format!("{ROOT}range?max=null"), json!({"type": "integer"})),
    );
    let schema = with_static(&fetcher)
        .compile_value(&json!({
            "/a": {"$range": {"max": null}},
            "/b": {"$range": true, "max": null}
        }))
        .await
        .unwrap();

    let properties = &schema.as_value()["properties"];
    assert_eq!(properties["a"], json!({"type": "integer"}));
    assert_eq!(properties["b"], json!({"type": "integer"}));
    assert_eq!(fetcher.fetch_count(), 1);
}

#[tokio::test]
async fn test_resolution_error_names_uri() {
    let fetcher = Arc::new(StaticFetcher::new());
    let err = with_static(&fetcher)
        .compile_value(&json!({"/a": "$nowhere"}))
        .await
        .unwrap_err();

    assert!(matches!(err, SchemaError::Resolution { .. }));
    assert_eq!(err.failing_uri(), Some("http://s/schema/nowhere"));
    assert!(err.to_string().contains("http://s/schema/nowhere"));
}

#[tokio::test]
async fn test_failed_fetch_is_retried() {
    let fetcher = Arc::new(StaticFetcher::new());
    let compiler = with_static(&fetcher);

    assert!(compiler.compile_value(&json!({"/a": "$later"})).await.is_err());
    assert!(compiler.compile_value(&json!({"/a": "$later"})).await.is_err());
    assert_eq!(fetcher.fetch_count(), 2);
    assert!(compiler.cache().is_empty());
}

#[tokio::test]
async fn test_self_reference_is_rejected() {
    let fetcher =
        Arc::new(StaticFetcher::new().with(format!("{ROOT}node"), json!({"/next": "$node"})));
    let compiler = with_static(&fetcher);

    let err = compiler.compile_value(&json!({"#loop": "$loop", "/x": "$loop"})).await.unwrap_err();
    assert!(matches!(err, SchemaError::RecursiveDefinition { .. }));

    let err = compiler.compile_value(&json!({"/head": "$node"})).await.unwrap_err();
    assert!(matches!(err, SchemaError::RecursiveDefinition { .. }));
}

#[tokio::test]
async fn test_absolute_reference_ignores_root() {
    let fetcher =
        Arc::new(StaticFetcher::new().with("http://other/types/id", json!({"type": "string"})));
    let schema = with_static(&fetcher)
        .compile_value(&json!({"/id": "$http://other/types/id"}))
        .await
        .unwrap();
    assert_eq!(schema.as_value()["properties"]["id"], json!({"type": "string"}));
}

// =============================================================================
// Directory-backed resolution
// =============================================================================

#[tokio::test]
async fn test_compile_fixture_from_directory() {
    let directory =
        DirectoryFetcher::new(ROOT, fixtures_path().join("schemas")).with_extension("json");
    let fetcher: Arc<dyn SchemaFetcher> = Arc::new(directory);
    let compiler = Compiler::new(ROOT, fetcher);

    let schema = compiler.compile_value(&fixture("shape.json")).await.unwrap();

    assert_eq!(
        schema.as_value(),
        &json!({
            "type": "object",
            "properties": {
                "kind": {"enum": ["circle"]},
                "center": {
                    "type": "object",
                    "properties": {"x": {"type": "number"}, "y": {"type": "number"}},
                    "required": ["x", "y"]
                },
                "radius": {"type": "number", "minimum": 0},
                "label": {"type": "string", "maxLength": 20},
                "thumbnail": {"type": "string", "format": "uri", "mediaType": "image/png"}
            },
            "required": ["kind", "center", "radius"],
            "$schema": "http://json-schema.org/draft-04/schema#"
        })
    );
}

#[tokio::test]
async fn test_compile_str_rejects_bad_json() {
    let fetcher = Arc::new(StaticFetcher::new());
    let err = with_static(&fetcher).compile_str("{\"/a\": ").await.unwrap_err();
    assert!(matches!(err, SchemaError::Json(_)));
}
