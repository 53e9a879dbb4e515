//! Query-string encoding for parameterised schema references
//!
//! Reference arguments travel as a query string: each value is rendered as
//! JSON text before being form-encoded, so `{"n": 3, "s": "a b"}` becomes
//! `n=3&s=%22a+b%22`.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Encode an argument mapping as `key=value&...`
pub fn args_to_query(args: &Map<String, Value>) -> String {
    args.iter()
        .map(|(key, value)| {
            let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
            let value: String =
                form_urlencoded::byte_serialize(value.to_string().as_bytes()).collect();
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a query string into an argument mapping
///
/// Values are kept as strings unless `schema` types them. The schema may be
/// an object schema with `properties` or a bare map of property schemas;
/// properties typed `integer`, `number` or `boolean` are converted. Values
/// that fail numeric conversion become `null`.
pub fn query_to_args(query: &str, schema: Option<&Value>) -> Map<String, Value> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut args: Map<String, Value> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect();

    let Some(schema) = schema else {
        return args;
    };
    let properties = match (schema.get("type"), schema.get("properties")) {
        (Some(Value::String(t)), Some(props)) if t == "object" => props,
        _ => schema,
    };
    let Some(properties) = properties.as_object() else {
        return args;
    };

    for (name, property) in properties {
        let declared = property.get("type").and_then(Value::as_str);
        if let (Some(declared), Some(Value::String(raw))) = (declared, args.get(name)) {
            if raw.is_empty() {
                continue;
            }
            let converted = convert(raw, declared);
            args.insert(name.clone(), converted);
        }
    }
    args
}

fn convert(raw: &str, declared: &str) -> Value {
    match declared {
        "integer" => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        "number" => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "boolean" => Value::Bool(raw == "true"),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_are_json_encoded() {
        let args = json!({"n": 3, "s": "a b", "list": [1, 2]});
        let query = args_to_query(args.as_object().unwrap());
        assert_eq!(query, "n=3&s=%22a+b%22&list=%5B1%2C2%5D");
    }

    #[test]
    fn test_empty_args() {
        assert_eq!(args_to_query(&Map::new()), "");
    }

    #[test]
    fn test_query_to_args_untyped() {
        let args = query_to_args("?a=1&b=hello+world", None);
        assert_eq!(args["a"], json!("1"));
        assert_eq!(args["b"], json!("hello world"));
    }

    #[test]
    fn test_query_to_args_typed_by_object_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": {"type": "integer"},
                "ratio": {"type": "number"},
                "flag": {"type": "boolean"},
                "name": {"type": "string"}
            }
        });
        let args = query_to_args("count=4&ratio=0.5&flag=true&name=x", Some(&schema));
        assert_eq!(args["count"], json!(4));
        assert_eq!(args["ratio"], json!(0.5));
        assert_eq!(args["flag"], json!(true));
        assert_eq!(args["name"], json!("x"));
    }

    #[test]
    fn test_query_to_args_typed_by_properties_map() {
        let schema = json!({"flag": {"type": "boolean"}});
        let args = query_to_args("flag=no", Some(&schema));
        assert_eq!(args["flag"], json!(false));
    }
}
