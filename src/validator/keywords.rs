//! Keyword checks, one method per category

use serde_json::{Map, Value};
use tracing::trace;

use super::{ErrorCode, ValidationContext, ValidationError};

/// JSON type name of `data` as schemas spell it
fn type_name(data: &Value) -> &'static str {
    match data {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_integer(data: &Value) -> bool {
    data.as_f64().map_or(false, |n| n.is_finite() && n.fract() == 0.0)
}

/// Structural equality where `1` and `1.0` are the same number
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y || x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| deep_equal(v, w)))
        }
        _ => a == b,
    }
}

fn number(schema: &Value, keyword: &str) -> Option<f64> {
    schema.get(keyword).and_then(Value::as_f64)
}

fn count(schema: &Value, keyword: &str) -> Option<usize> {
    schema.get(keyword).and_then(Value::as_u64).map(|n| n as usize)
}

fn flag(schema: &Value, keyword: &str) -> bool {
    schema.get(keyword).and_then(Value::as_bool).unwrap_or(false)
}

/// A failure of `keyword` in the current schema, for the current data
fn failure(code: ErrorCode, message: impl Into<String>, keyword: &str) -> ValidationError {
    ValidationError::new(code, message).prefix_with(None, Some(keyword))
}

fn dependency_message(needed: &str, trigger: &str) -> String {
    format!("Dependency failed - key must exist: {needed} (due to key: {trigger})")
}

fn prefixed(
    errors: Vec<ValidationError>,
    data: Option<&str>,
    schema: Option<&str>,
) -> impl Iterator<Item = ValidationError> {
    let data = data.map(str::to_string);
    let schema = schema.map(str::to_string);
    errors
        .into_iter()
        .map(move |e| e.prefix_with(data.as_deref(), schema.as_deref()))
}

impl ValidationContext<'_> {
    pub(super) fn validate_basic(
        &mut self,
        data: &Value,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(allowed) = schema.get("type") {
            let candidates: &[Value] = match allowed {
                Value::Array(types) => types,
                other => std::slice::from_ref(other),
            };
            let matches = candidates.iter().any(|t| match t.as_str() {
                Some("any") => true,
                Some("integer") => is_integer(data),
                Some(name) => name == type_name(data),
                None => false,
            });
            if !matches {
                let actual = type_name(data);
                errors.push(failure(
                    ErrorCode::InvalidType,
                    format!("invalid data type: {actual}"),
                    "type",
                ));
            }
        }

        if let Some(Value::Array(options)) = schema.get("enum") {
            if !options.iter().any(|option| deep_equal(data, option)) {
                errors.push(failure(
                    ErrorCode::EnumMismatch,
                    format!("No enum match for: {data}"),
                    "enum",
                ));
            }
        }
    }

    pub(super) fn validate_numeric(
        &mut self,
        data: &Value,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(n) = data.as_f64() else {
            return;
        };

        let divisor = ["multipleOf", "divisibleBy"].into_iter().find_map(|keyword| {
            number(schema, keyword)
                .filter(|d| *d != 0.0)
                .map(|d| (keyword, d))
        });
        if let Some((keyword, divisor)) = divisor {
            let quotient = n / divisor;
            if (quotient - quotient.round()).abs() > f64::EPSILON * quotient.abs().max(1.0) {
                errors.push(failure(
                    ErrorCode::NumberMultipleOf,
                    format!("Value {data} is not a multiple of {divisor}"),
                    keyword,
                ));
            }
        }

        if let Some(minimum) = number(schema, "minimum") {
            if n < minimum {
                errors.push(failure(
                    ErrorCode::NumberMinimum,
                    format!("Value {data} is less than minimum {minimum}"),
                    "minimum",
                ));
            } else if n == minimum && flag(schema, "exclusiveMinimum") {
                errors.push(failure(
                    ErrorCode::NumberMinimumExclusive,
                    format!("Value {data} is equal to exclusive minimum {minimum}"),
                    "exclusiveMinimum",
                ));
            }
        }

        if let Some(maximum) = number(schema, "maximum") {
            if n > maximum {
                errors.push(failure(
                    ErrorCode::NumberMaximum,
                    format!("Value {data} is greater than maximum {maximum}"),
                    "maximum",
                ));
            } else if n == maximum && flag(schema, "exclusiveMaximum") {
                errors.push(failure(
                    ErrorCode::NumberMaximumExclusive,
                    format!("Value {data} is equal to exclusive maximum {maximum}"),
                    "exclusiveMaximum",
                ));
            }
        }
    }

    pub(super) fn validate_string(
        &mut self,
        data: &Value,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let Value::String(text) = data else {
            return;
        };
        let length = text.chars().count();

        if let Some(min) = count(schema, "minLength") {
            if length < min {
                errors.push(failure(
                    ErrorCode::StringLengthShort,
                    format!("String is too short ({length} chars), minimum {min}"),
                    "minLength",
                ));
            }
        }
        if let Some(max) = count(schema, "maxLength") {
            if length > max {
                errors.push(failure(
                    ErrorCode::StringLengthLong,
                    format!("String is too long ({length} chars), maximum {max}"),
                    "maxLength",
                ));
            }
        }

        if let Some(source) = schema.get("pattern").and_then(Value::as_str) {
            let matched = self.pattern(source).map(|regex| regex.is_match(text));
            if matched == Some(false) {
                errors.push(failure(
                    ErrorCode::StringPattern,
                    format!("String does not match pattern: {source}"),
                    "pattern",
                ));
            }
        }
    }

    pub(super) fn validate_array(
        &mut self,
        data: &Value,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let Value::Array(items) = data else {
            return;
        };

        if let Some(min) = count(schema, "minItems") {
            if items.len() < min {
                errors.push(failure(
                    ErrorCode::ArrayLengthShort,
                    format!("Array is too short ({}), minimum {min}", items.len()),
                    "minItems",
                ));
            }
        }
        if let Some(max) = count(schema, "maxItems") {
            if items.len() > max {
                errors.push(failure(
                    ErrorCode::ArrayLengthLong,
                    format!("Array is too long ({}), maximum {max}", items.len()),
                    "maxItems",
                ));
            }
        }

        if flag(schema, "uniqueItems") {
            'outer: for i in 0..items.len() {
                for j in i + 1..items.len() {
                    if deep_equal(&items[i], &items[j]) {
                        errors.push(failure(
                            ErrorCode::ArrayUnique,
                            format!("Array items are not unique (indices {i} and {j})"),
                            "uniqueItems",
                        ));
                        break 'outer;
                    }
                }
            }
        }

        match schema.get("items") {
            Some(Value::Array(tuple)) => {
                for (i, item) in items.iter().enumerate() {
                    let index = i.to_string();
                    if let Some(item_schema) = tuple.get(i) {
                        let found = self.validate_all(item, item_schema);
                        errors.extend(found.into_iter().map(|e| {
                            e.prefix_with(None, Some(index.as_str()))
                                .prefix_with(Some(index.as_str()), Some("items"))
                        }));
                        continue;
                    }
                    match schema.get("additionalItems") {
                        Some(Value::Bool(false)) => errors.push(
                            ValidationError::new(
                                ErrorCode::ArrayAdditionalItems,
                                "Additional items not allowed",
                            )
                            .prefix_with(Some(index.as_str()), Some("additionalItems")),
                        ),
                        Some(Value::Bool(true)) | None => {}
                        Some(additional) => {
                            let found = self.validate_all(item, additional);
                            errors.extend(prefixed(
                                found,
                                Some(index.as_str()),
                                Some("additionalItems"),
                            ));
                        }
                    }
                }
            }
            Some(item_schema) => {
                for (i, item) in items.iter().enumerate() {
                    let index = i.to_string();
                    let found = self.validate_all(item, item_schema);
                    errors.extend(prefixed(found, Some(index.as_str()), Some("items")));
                }
            }
            None => {}
        }
    }

    pub(super) fn validate_object(
        &mut self,
        data: &Value,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let Value::Object(fields) = data else {
            return;
        };

        if let Some(min) = count(schema, "minProperties") {
            if fields.len() < min {
                errors.push(failure(
                    ErrorCode::ObjectPropertiesMinimum,
                    format!("Too few properties defined ({}), minimum {min}", fields.len()),
                    "minProperties",
                ));
            }
        }
        if let Some(max) = count(schema, "maxProperties") {
            if fields.len() > max {
                errors.push(failure(
                    ErrorCode::ObjectPropertiesMaximum,
                    format!("Too many properties defined ({}), maximum {max}", fields.len()),
                    "maxProperties",
                ));
            }
        }

        self.validate_required(fields, schema, errors);
        self.validate_properties(fields, schema, errors);
        self.validate_dependencies(data, fields, schema, errors);
    }

    /// Draft-04 `required` lists and draft-03 `"required": true` flags
    fn validate_required(
        &mut self,
        fields: &Map<String, Value>,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(Value::Array(required)) = schema.get("required") {
            for (i, key) in required.iter().enumerate() {
                let Some(key) = key.as_str() else {
                    continue;
                };
                if !fields.contains_key(key) {
                    errors.push(
                        failure(
                            ErrorCode::ObjectRequired,
                            format!("Missing required property: {key}"),
                            i.to_string().as_str(),
                        )
                        .prefix_with(None, Some("required"))
                        .prefix_with(None, Some(key)),
                    );
                }
            }
        }

        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (key, property) in properties {
                if flag(property, "required") && !fields.contains_key(key) {
                    errors.push(
                        failure(
                            ErrorCode::ObjectRequired,
                            format!("Missing required property: {key}"),
                            "required",
                        )
                        .prefix_with(None, Some(key.as_str()))
                        .prefix_with(None, Some("properties")),
                    );
                }
            }
        }
    }

    /// `properties`, `patternProperties`, then `additionalProperties` for
    /// keys neither of them matched
    fn validate_properties(
        &mut self,
        fields: &Map<String, Value>,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let properties = schema.get("properties").and_then(Value::as_object);
        let patterns = schema.get("patternProperties").and_then(Value::as_object);

        for (key, value) in fields {
            let mut matched = false;

            if let Some(property) = properties.and_then(|p| p.get(key)) {
                matched = true;
                let found = self.validate_all(value, property);
                errors.extend(found.into_iter().map(|e| {
                    e.prefix_with(Some(key.as_str()), Some(key.as_str()))
                        .prefix_with(None, Some("properties"))
                }));
            }

            for (source, pattern_schema) in patterns.into_iter().flatten() {
                let is_match = self.pattern(source).map_or(false, |regex| regex.is_match(key));
                if !is_match {
                    continue;
                }
                matched = true;
                let found = self.validate_all(value, pattern_schema);
                errors.extend(found.into_iter().map(|e| {
                    e.prefix_with(Some(key.as_str()), Some(source.as_str()))
                        .prefix_with(None, Some("patternProperties"))
                }));
            }

            if matched {
                continue;
            }
            match schema.get("additionalProperties") {
                Some(Value::Bool(false)) => errors.push(
                    ValidationError::new(
                        ErrorCode::ObjectAdditionalProperties,
                        format!("Additional properties not allowed: {key}"),
                    )
                    .prefix_with(Some(key.as_str()), Some("additionalProperties")),
                ),
                Some(Value::Bool(true)) | None => {}
                Some(additional) => {
                    let found = self.validate_all(value, additional);
                    errors.extend(prefixed(
                        found,
                        Some(key.as_str()),
                        Some("additionalProperties"),
                    ));
                }
            }
        }
    }

    fn validate_dependencies(
        &mut self,
        data: &Value,
        fields: &Map<String, Value>,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(Value::Object(dependencies)) = schema.get("dependencies") else {
            return;
        };
        for (trigger, dependency) in dependencies {
            if !fields.contains_key(trigger) {
                continue;
            }
            match dependency {
                Value::String(needed) => {
                    if !fields.contains_key(needed) {
                        errors.push(
                            failure(
                                ErrorCode::ObjectDependencyKey,
                                dependency_message(needed, trigger),
                                trigger.as_str(),
                            )
                            .prefix_with(None, Some("dependencies")),
                        );
                    }
                }
                Value::Array(needed) => {
                    for (i, key) in needed.iter().enumerate() {
                        let Some(key) = key.as_str() else {
                            continue;
                        };
                        if !fields.contains_key(key) {
                            errors.push(
                                failure(
                                    ErrorCode::ObjectDependencyKey,
                                    dependency_message(key, trigger),
                                    i.to_string().as_str(),
                                )
                                .prefix_with(None, Some(trigger.as_str()))
                                .prefix_with(None, Some("dependencies")),
                            );
                        }
                    }
                }
                dependency_schema => {
                    let found = self.validate_all(data, dependency_schema);
                    errors.extend(found.into_iter().map(|e| {
                        e.prefix_with(None, Some(trigger.as_str()))
                            .prefix_with(None, Some("dependencies"))
                    }));
                }
            }
        }
    }

    pub(super) fn validate_combinators(
        &mut self,
        data: &Value,
        schema: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(Value::Array(all)) = schema.get("allOf") {
            for (i, sub_schema) in all.iter().enumerate() {
                let index = i.to_string();
                let found = self.validate_all(data, sub_schema);
                errors.extend(found.into_iter().map(|e| {
                    e.prefix_with(None, Some(index.as_str()))
                        .prefix_with(None, Some("allOf"))
                }));
            }
        }

        if let Some(Value::Array(any)) = schema.get("anyOf") {
            let mut failures = Vec::new();
            let mut passed = false;
            for (i, sub_schema) in any.iter().enumerate() {
                let found = self.validate_all(data, sub_schema);
                if found.is_empty() {
                    passed = true;
                    break;
                }
                failures.extend(prefixed(found, None, Some(i.to_string().as_str())));
            }
            if !passed {
                trace!(alternatives = any.len(), "no anyOf alternative matched");
                errors.push(
                    ValidationError::new(
                        ErrorCode::AnyOfMissing,
                        "Data does not match any schemas from \"anyOf\"",
                    )
                    .with_sub_errors(failures)
                    .prefix_with(None, Some("anyOf")),
                );
            }
        }

        if let Some(Value::Array(one)) = schema.get("oneOf") {
            let mut failures = Vec::new();
            let mut first_match: Option<usize> = None;
            for (i, sub_schema) in one.iter().enumerate() {
                let found = self.validate_all(data, sub_schema);
                if !found.is_empty() {
                    failures.extend(prefixed(found, None, Some(i.to_string().as_str())));
                    continue;
                }
                if let Some(first) = first_match {
                    errors.push(failure(
                        ErrorCode::OneOfMultiple,
                        format!(
                            "Data is valid against more than one schema from \"oneOf\": \
                             indices {first} and {i}"
                        ),
                        "oneOf",
                    ));
                    break;
                }
                first_match = Some(i);
            }
            if first_match.is_none() {
                errors.push(
                    ValidationError::new(
                        ErrorCode::OneOfMissing,
                        "Data does not match any schemas from \"oneOf\"",
                    )
                    .with_sub_errors(failures)
                    .prefix_with(None, Some("oneOf")),
                );
            }
        }

        if let Some(not) = schema.get("not") {
            if self.validate_all(data, not).is_empty() {
                errors.push(failure(
                    ErrorCode::NotPassed,
                    "Data matches schema from \"not\"",
                    "not",
                ));
            }
        }
    }
}
