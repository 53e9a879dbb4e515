//! Compact Schema Notation
//!
//! The input side of the compiler. A compact schema is a JSON document in
//! which strings and object keys carry meaning through sentinel characters:
//!
//! | Form            | Meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `"$name"`       | reference to the schema `name`                       |
//! | `"@image/png"`  | URI string whose referent has the given media type   |
//! | `"#name": ..`   | local definition, visible inside the enclosing object|
//! | `"$name": ..`   | replace the whole object with the parameterised `name`|
//! | `"/name": ..`   | required property                                    |
//! | `"?name": ..`   | optional property                                    |
//! | `"/name=": ..`  | property with a fixed value (trailing `=`)           |
//! | `"allItems": ..`| `items`                                              |
//! | `"/*": ..`      | `additionalProperties`                               |
//!
//! Every key is classified once, when the node is parsed, so the compiler
//! only ever dispatches on [`MappingKey`] variants.

use serde_json::{Map, Number, Value};

use crate::error::{Result, SchemaError};

/// A scalar passed through the compiler unchanged
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(Number),
    Bool(bool),
    String(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

/// One node of a compact schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Literal(Literal),
    /// `"$name"`, or an object carrying a `$name` key
    Reference {
        name: String,
        args: Option<Map<String, Value>>,
    },
    /// `"@media/type"`
    MediaType(String),
    Sequence(Vec<SchemaNode>),
    Mapping(Vec<(MappingKey, SchemaNode)>),
}

/// Structural meaning of an object key in compact notation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingKey {
    /// `#name`
    LocalDefinition(String),
    /// `$name` (other than `$ref` and `$schema`)
    Reference(String),
    /// `/name`, `?name`, with an optional trailing `=`
    Property {
        name: String,
        required: bool,
        fixed: bool,
    },
    /// `allItems`
    AllItems,
    /// `/*`
    AnyAdditionalProperty,
    /// Any other key, copied as-is
    Keyword(String),
}

impl MappingKey {
    /// Classify a raw object key
    pub fn classify(key: &str) -> Self {
        if key == "allItems" {
            return MappingKey::AllItems;
        }
        if key == "/*" {
            return MappingKey::AnyAdditionalProperty;
        }
        if key == "$ref" || key == "$schema" {
            return MappingKey::Keyword(key.to_string());
        }
        if let Some(name) = key.strip_prefix('#') {
            return MappingKey::LocalDefinition(name.to_string());
        }
        if let Some(name) = key.strip_prefix('$') {
            return MappingKey::Reference(name.to_string());
        }
        let (required, rest) = match key.chars().next() {
            Some('/') => (true, &key[1..]),
            Some('?') => (false, &key[1..]),
            _ => return MappingKey::Keyword(key.to_string()),
        };
        let (name, fixed) = match rest.strip_suffix('=') {
            Some(name) => (name, true),
            None => (rest, false),
        };
        MappingKey::Property {
            name: name.to_string(),
            required,
            fixed,
        }
    }

    /// The key as written in compact notation
    pub fn to_key(&self) -> String {
        match self {
            MappingKey::LocalDefinition(name) => format!("#{name}"),
            MappingKey::Reference(name) => format!("${name}"),
            MappingKey::Property { name, required, fixed } => format!(
                "{}{}{}",
                if *required { '/' } else { '?' },
                name,
                if *fixed { "=" } else { "" }
            ),
            MappingKey::AllItems => "allItems".to_string(),
            MappingKey::AnyAdditionalProperty => "/*".to_string(),
            MappingKey::Keyword(key) => key.clone(),
        }
    }
}

impl SchemaNode {
    /// Parse a JSON document into compact schema nodes
    ///
    /// `null` is not part of the notation and is rejected as malformed.
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Err(SchemaError::malformed(
                "element is none of the expected number, boolean, string, array or object: null",
            )),
            Value::Bool(b) => Ok(SchemaNode::Literal(Literal::Bool(*b))),
            Value::Number(n) => Ok(SchemaNode::Literal(Literal::Number(n.clone()))),
            Value::String(s) => Ok(Self::parse_string(s)),
            Value::Array(items) => items
                .iter()
                .map(SchemaNode::parse)
                .collect::<Result<Vec<_>>>()
                .map(SchemaNode::Sequence),
            Value::Object(map) => Self::parse_mapping(map),
        }
    }

    fn parse_mapping(map: &Map<String, Value>) -> Result<Self> {
        let substitution = map.keys().find_map(|key| match MappingKey::classify(key) {
            MappingKey::Reference(name) => Some((key.as_str(), name)),
            _ => None,
        });

        let Some((raw_key, name)) = substitution else {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                entries.push((MappingKey::classify(key), SchemaNode::parse(value)?));
            }
            return Ok(SchemaNode::Mapping(entries));
        };

        // The object collapses into the reference; only its local
        // definitions are still schema nodes.
        let mut entries = Vec::new();
        for (key, value) in map {
            if let MappingKey::LocalDefinition(definition) = MappingKey::classify(key) {
                entries.push((MappingKey::LocalDefinition(definition), SchemaNode::parse(value)?));
            }
        }
        let args = substitution_args(&name, raw_key, map)?;
        entries.push((MappingKey::Reference(name.clone()), SchemaNode::Reference { name, args }));
        Ok(SchemaNode::Mapping(entries))
    }

    fn parse_string(s: &str) -> Self {
        if let Some(name) = s.strip_prefix('$') {
            SchemaNode::Reference {
                name: name.to_string(),
                args: None,
            }
        } else if let Some(media_type) = s.strip_prefix('@') {
            SchemaNode::MediaType(media_type.to_string())
        } else {
            SchemaNode::Literal(Literal::String(s.to_string()))
        }
    }

    /// Render the node back into compact notation
    pub fn to_value(&self) -> Value {
        match self {
            SchemaNode::Literal(literal) => literal.to_value(),
            SchemaNode::Reference { name, args: None } => Value::String(format!("${name}")),
            SchemaNode::Reference { name, args: Some(args) } => {
                let mut map = Map::new();
                map.insert(format!("${name}"), Value::Object(args.clone()));
                Value::Object(map)
            }
            SchemaNode::MediaType(media_type) => Value::String(format!("@{media_type}")),
            SchemaNode::Sequence(items) => {
                Value::Array(items.iter().map(SchemaNode::to_value).collect())
            }
            SchemaNode::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, node)| match (key, node) {
                        (MappingKey::Reference(_), SchemaNode::Reference { args, .. }) => {
                            (key.to_key(), Value::Object(args.clone().unwrap_or_default()))
                        }
                        _ => (key.to_key(), node.to_value()),
                    })
                    .collect(),
            ),
        }
    }
}

/// Arguments for a `{"$name": ...}` substitution, kept as raw JSON
///
/// A mapping under the `$name` key is the argument set; a sequence there is
/// an error. Otherwise the object's other keys, as written, are the
/// arguments. An empty set means no arguments at all.
fn substitution_args(
    name: &str,
    raw_key: &str,
    map: &Map<String, Value>,
) -> Result<Option<Map<String, Value>>> {
    let args = match map.get(raw_key) {
        Some(Value::Object(args)) => args.clone(),
        Some(Value::Array(_)) => {
            return Err(SchemaError::InvalidArguments {
                name: name.to_string(),
                message: "got an array".to_string(),
            })
        }
        _ => map
            .iter()
            .filter(|(key, _)| {
                !matches!(
                    MappingKey::classify(key),
                    MappingKey::Reference(_) | MappingKey::LocalDefinition(_)
                )
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    };
    Ok(if args.is_empty() { None } else { Some(args) })
}

impl TryFrom<&Value> for SchemaNode {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self> {
        SchemaNode::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_property_keys() {
        assert_eq!(
            MappingKey::classify("/name"),
            MappingKey::Property { name: "name".into(), required: true, fixed: false }
        );
        assert_eq!(
            MappingKey::classify("?kind="),
            MappingKey::Property { name: "kind".into(), required: false, fixed: true }
        );
    }

    #[test]
    fn test_classify_special_keys() {
        assert_eq!(MappingKey::classify("/*"), MappingKey::AnyAdditionalProperty);
        assert_eq!(MappingKey::classify("allItems"), MappingKey::AllItems);
        assert_eq!(MappingKey::classify("#point"), MappingKey::LocalDefinition("point".into()));
        assert_eq!(MappingKey::classify("$point"), MappingKey::Reference("point".into()));
        assert_eq!(MappingKey::classify("$ref"), MappingKey::Keyword("$ref".into()));
        assert_eq!(MappingKey::classify("$schema"), MappingKey::Keyword("$schema".into()));
        assert_eq!(MappingKey::classify("minimum"), MappingKey::Keyword("minimum".into()));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(
            SchemaNode::parse(&json!("$number")).unwrap(),
            SchemaNode::Reference { name: "number".into(), args: None }
        );
        assert_eq!(
            SchemaNode::parse(&json!("@image/png")).unwrap(),
            SchemaNode::MediaType("image/png".into())
        );
        assert_eq!(
            SchemaNode::parse(&json!("string")).unwrap(),
            SchemaNode::Literal(Literal::String("string".into()))
        );
    }

    #[test]
    fn test_parse_rejects_null() {
        let err = SchemaNode::parse(&json!({"/a": null})).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedSchema { .. }));
    }

    #[test]
    fn test_substitution_args_stay_raw() {
        let node = SchemaNode::parse(&json!({"$range": {"max": null, "min": [1]}})).unwrap();
        let expected_args = json!({"max": null, "min": [1]}).as_object().cloned();
        assert_eq!(
            node,
            SchemaNode::Mapping(vec![(
                MappingKey::Reference("range".into()),
                SchemaNode::Reference { name: "range".into(), args: expected_args }
            )])
        );
    }

    #[test]
    fn test_sibling_args_skip_local_definitions() {
        let doc = json!({"#n": "number", "$range": true, "min": null});
        let node = SchemaNode::parse(&doc).unwrap();
        let SchemaNode::Mapping(entries) = node else {
            panic!("expected a mapping");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, MappingKey::LocalDefinition("n".into()));
        assert_eq!(
            entries[1].1,
            SchemaNode::Reference {
                name: "range".into(),
                args: json!({"min": null}).as_object().cloned()
            }
        );
    }

    #[test]
    fn test_array_arguments_are_rejected() {
        let err = SchemaNode::parse(&json!({"$range": [1, 2]})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidArguments { ref name, .. } if name == "range"));
    }

    #[test]
    fn test_to_value_preserves_notation() {
        let doc = json!({
            "#point": {"/x": "$number", "/y": "$number"},
            "/origin": "$point",
            "?label=": "fixed",
            "/*": "@text/plain"
        });
        let node = SchemaNode::parse(&doc).unwrap();
        assert_eq!(node.to_value(), doc);
    }
}
