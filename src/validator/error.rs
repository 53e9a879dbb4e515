//! Validation error reporting

use serde::Serialize;
use std::fmt;

/// What went wrong, as a stable machine-readable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidType,
    EnumMismatch,
    AnyOfMissing,
    OneOfMissing,
    OneOfMultiple,
    NotPassed,
    // Numeric errors
    NumberMultipleOf,
    NumberMinimum,
    NumberMinimumExclusive,
    NumberMaximum,
    NumberMaximumExclusive,
    // String errors
    StringLengthShort,
    StringLengthLong,
    StringPattern,
    // Object errors
    ObjectPropertiesMinimum,
    ObjectPropertiesMaximum,
    ObjectRequired,
    ObjectAdditionalProperties,
    ObjectDependencyKey,
    // Array errors
    ArrayLengthShort,
    ArrayLengthLong,
    ArrayUnique,
    ArrayAdditionalItems,
}

impl ErrorCode {
    /// Numeric value of the code; the hundreds digit is the category
    pub fn value(&self) -> u16 {
        match self {
            ErrorCode::InvalidType => 0,
            ErrorCode::EnumMismatch => 1,
            ErrorCode::AnyOfMissing => 10,
            ErrorCode::OneOfMissing => 11,
            ErrorCode::OneOfMultiple => 12,
            ErrorCode::NotPassed => 13,
            ErrorCode::NumberMultipleOf => 100,
            ErrorCode::NumberMinimum => 101,
            ErrorCode::NumberMinimumExclusive => 102,
            ErrorCode::NumberMaximum => 103,
            ErrorCode::NumberMaximumExclusive => 104,
            ErrorCode::StringLengthShort => 200,
            ErrorCode::StringLengthLong => 201,
            ErrorCode::StringPattern => 202,
            ErrorCode::ObjectPropertiesMinimum => 300,
            ErrorCode::ObjectPropertiesMaximum => 301,
            ErrorCode::ObjectRequired => 302,
            ErrorCode::ObjectAdditionalProperties => 303,
            ErrorCode::ObjectDependencyKey => 304,
            ErrorCode::ArrayLengthShort => 400,
            ErrorCode::ArrayLengthLong => 401,
            ErrorCode::ArrayUnique => 402,
            ErrorCode::ArrayAdditionalItems => 403,
        }
    }
}

/// A single validation failure
///
/// `data_path` points into the validated data and `schema_path` into the
/// schema, both as JSON pointers. Combinator failures (`anyOf`, `oneOf`)
/// carry the failures of each alternative in `sub_errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
    pub data_path: String,
    pub schema_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_errors: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data_path: String::new(),
            schema_path: String::new(),
            sub_errors: Vec::new(),
        }
    }

    pub(crate) fn with_sub_errors(mut self, sub_errors: Vec<ValidationError>) -> Self {
        self.sub_errors = sub_errors;
        self
    }

    /// Prepend one path segment to the data and/or schema path
    ///
    /// Applies to every nested sub-error as well, so a combinator's
    /// alternatives stay addressed relative to the same root.
    pub fn prefix_with(mut self, data: Option<&str>, schema: Option<&str>) -> Self {
        self.prefix_in_place(
            data.map(escape_pointer).as_deref(),
            schema.map(escape_pointer).as_deref(),
        );
        self
    }

    fn prefix_in_place(&mut self, data: Option<&str>, schema: Option<&str>) {
        if let Some(segment) = data {
            self.data_path = format!("/{}{}", segment, self.data_path);
        }
        if let Some(segment) = schema {
            self.schema_path = format!("/{}{}", segment, self.schema_path);
        }
        for sub in &mut self.sub_errors {
            sub.prefix_in_place(data, schema);
        }
    }

    /// Fragment URI addressing the failing data (`#/path/to/value`)
    pub fn uri(&self) -> String {
        format!("#{}", self.data_path)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.data_path, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Escape one JSON pointer segment (`~` → `~0`, `/` → `~1`)
pub fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Undo [`escape_pointer`]
pub fn unescape_pointer(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
