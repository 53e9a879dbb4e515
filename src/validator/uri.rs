//! URI handling for schema registration
//!
//! Registered schemas are normalised so that every `id` is absolute and
//! every `$ref` is resolved against the nearest enclosing `id`. After that,
//! lookups are plain string matches plus an optional JSON-pointer fragment.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

/// Resolve `href` against `base` (RFC 3986)
///
/// When `base` is not an absolute URI the reference cannot be made more
/// absolute than it already is and is returned unchanged.
pub fn resolve_url(base: &str, href: &str) -> String {
    if let Ok(absolute) = Url::parse(href) {
        return absolute.to_string();
    }
    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(joined) => joined.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Make `id` and `$ref` values absolute, in place
///
/// `enum` values are data, not schemas, and are left untouched.
pub fn normalize_schema(schema: &mut Value, base_uri: &str) {
    match schema {
        Value::Object(map) => {
            let mut base = base_uri.to_string();
            if let Some(Value::String(id)) = map.get_mut("id") {
                base = resolve_url(base_uri, id);
                *id = base.clone();
            }
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                *reference = resolve_url(&base, reference);
                return;
            }
            for (key, value) in map.iter_mut() {
                if key != "enum" {
                    normalize_schema(value, &base);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_schema(item, base_uri);
            }
        }
        _ => {}
    }
}

/// Collect sub-schemas whose `id` places them under `url`
///
/// A nested schema is trusted when its id extends `url` and either `url`
/// ends with `/` or the remainder starts with `#` or `?`. The first schema
/// found for an id wins.
pub fn trusted_schemas(schema: &Value, url: &str, found: &mut HashMap<String, Value>) {
    if let Some(id) = schema.get("id").and_then(Value::as_str) {
        if let Some(remainder) = id.strip_prefix(url) {
            let trusted = (!url.is_empty() && url.ends_with('/'))
                || remainder.starts_with('#')
                || remainder.starts_with('?');
            if trusted {
                found.entry(id.to_string()).or_insert_with(|| schema.clone());
            }
        }
    }
    match schema {
        Value::Object(map) => {
            for (key, value) in map {
                if key != "enum" && (value.is_object() || value.is_array()) {
                    trusted_schemas(value, url, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                trusted_schemas(item, url, found);
            }
        }
        _ => {}
    }
}

/// Split `uri#fragment` into its base and decoded fragment
pub fn split_fragment(uri: &str) -> (&str, Option<String>) {
    match uri.split_once('#') {
        Some((base, fragment)) => {
            let fragment = percent_decode_str(fragment).decode_utf8_lossy().into_owned();
            (base, Some(fragment))
        }
        None => (uri, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("http://x/a/b.json", "c.json"), "http://x/a/c.json");
        assert_eq!(
            resolve_url("http://x/a/b.json", "#/definitions/p"),
            "http://x/a/b.json#/definitions/p"
        );
        assert_eq!(resolve_url("http://x/a/", "http://y/z"), "http://y/z");
        assert_eq!(resolve_url("", "#/definitions/p"), "#/definitions/p");
    }

    #[test]
    fn test_normalize_schema() {
        let mut schema = json!({
            "id": "http://x/root.json",
            "properties": {
                "a": {"$ref": "#/definitions/a"},
                "b": {"id": "sub/b.json", "items": {"$ref": "c.json"}},
                "c": {"enum": [{"$ref": "untouched"}]}
            }
        });
        normalize_schema(&mut schema, "");
        assert_eq!(schema["properties"]["a"]["$ref"], json!("http://x/root.json#/definitions/a"));
        assert_eq!(schema["properties"]["b"]["id"], json!("http://x/sub/b.json"));
        assert_eq!(schema["properties"]["b"]["items"]["$ref"], json!("http://x/sub/c.json"));
        assert_eq!(schema["properties"]["c"]["enum"][0]["$ref"], json!("untouched"));
    }

    #[test]
    fn test_trusted_schemas() {
        let schema = json!({
            "id": "http://x/root",
            "definitions": {
                "a": {"id": "http://x/root#a", "type": "string"},
                "b": {"id": "http://elsewhere/b", "type": "number"}
            }
        });
        let mut found = HashMap::new();
        trusted_schemas(&schema, "http://x/root", &mut found);
        assert!(found.contains_key("http://x/root#a"));
        assert!(!found.contains_key("http://elsewhere/b"));
    }

    #[test]
    fn test_split_fragment_decodes() {
        assert_eq!(split_fragment("http://x/s#/a%20b"), ("http://x/s", Some("/a b".to_string())));
        assert_eq!(split_fragment("http://x/s"), ("http://x/s", None));
        assert_eq!(split_fragment("http://x/s#/a%7E"), ("http://x/s", Some("/a~".to_string())));
    }
}
