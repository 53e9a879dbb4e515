//! Expanded schema documents and helpers for working with them

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::version::DraftVersion;

/// A fully expanded, standards-shaped schema document
///
/// Produced once per compile and immutable afterwards; share it freely
/// between validations.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedSchema {
    document: Value,
    version: DraftVersion,
}

impl ExpandedSchema {
    pub fn new(document: Value, version: DraftVersion) -> Self {
        Self { document, version }
    }

    /// The draft this document was compiled to
    pub fn version(&self) -> DraftVersion {
        self.version
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    pub fn into_value(self) -> Value {
        self.document
    }

    /// Pretty-printed JSON text
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.document).unwrap_or_else(|_| self.document.to_string())
    }
}

impl AsRef<Value> for ExpandedSchema {
    fn as_ref(&self) -> &Value {
        &self.document
    }
}

impl Serialize for ExpandedSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

/// Media types accepted by a compact rich-value schema
///
/// Recognises `"@image/png"`, `{"anyOf": ["@image/png", "@image/jpeg"]}`
/// (likewise `oneOf`), and a single-key object whose key is such a string.
/// Returns `None` when the schema names no media type.
pub fn media_types(schema: &Value) -> Option<Vec<String>> {
    match schema {
        Value::String(s) => s.strip_prefix('@').map(|m| vec![m.to_string()]),
        Value::Object(map) => {
            let alternatives = map.get("anyOf").or_else(|| map.get("oneOf"));
            if let Some(Value::Array(alternatives)) = alternatives {
                return Some(
                    alternatives
                        .iter()
                        .filter_map(Value::as_str)
                        .filter_map(|s| s.strip_prefix('@'))
                        .map(str::to_string)
                        .collect(),
                );
            }
            if map.len() == 1 {
                let key = map.keys().next()?;
                return media_types(&Value::String(key.clone()));
            }
            None
        }
        _ => None,
    }
}

/// Give every untitled property schema its property name as `title`
///
/// Recurses into property schemas that are themselves object schemas.
pub fn add_titles_to_properties(schema: &mut Value) -> &mut Value {
    if let Some(Value::Object(properties)) = schema.get_mut("properties") {
        for (name, property) in properties.iter_mut() {
            if let Value::Object(fields) = property {
                fields
                    .entry("title")
                    .or_insert_with(|| Value::String(name.clone()));
            }
            if property.get("type").and_then(Value::as_str) == Some("object") {
                add_titles_to_properties(property);
            }
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_types_from_string() {
        assert_eq!(media_types(&json!("@image/png")), Some(vec!["image/png".to_string()]));
        assert_eq!(media_types(&json!("string")), None);
    }

    #[test]
    fn test_media_types_from_alternatives() {
        let schema = json!({"anyOf": ["@image/png", "@image/jpeg", "$other"]});
        assert_eq!(
            media_types(&schema),
            Some(vec!["image/png".to_string(), "image/jpeg".to_string()])
        );
        let schema = json!({"oneOf": ["@text/csv"]});
        assert_eq!(media_types(&schema), Some(vec!["text/csv".to_string()]));
    }

    #[test]
    fn test_media_types_from_single_key() {
        assert_eq!(
            media_types(&json!({"@text/plain": {}})),
            Some(vec!["text/plain".to_string()])
        );
        assert_eq!(media_types(&json!({"a": 1, "b": 2})), None);
    }

    #[test]
    fn test_add_titles() {
        let mut schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "size": {"type": "integer", "title": "Size in bytes"},
                "origin": {
                    "type": "object",
                    "properties": {"x": {"type": "number"}}
                }
            }
        });
        add_titles_to_properties(&mut schema);
        assert_eq!(schema["properties"]["name"]["title"], json!("name"));
        assert_eq!(schema["properties"]["size"]["title"], json!("Size in bytes"));
        assert_eq!(schema["properties"]["origin"]["title"], json!("origin"));
        assert_eq!(schema["properties"]["origin"]["properties"]["x"]["title"], json!("x"));
    }
}
