//! JSON Schema format versions the compiler can target

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

/// Output format of a compiled schema
///
/// The two drafts differ only in how required properties are expressed:
/// draft-03 flags each property schema with `required: true`, draft-04
/// lists the names in a sibling `required` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DraftVersion {
    #[serde(rename = "draft-03")]
    Draft3,
    #[default]
    #[serde(rename = "draft-04")]
    Draft4,
}

impl DraftVersion {
    pub const ALL: [DraftVersion; 2] = [DraftVersion::Draft3, DraftVersion::Draft4];

    /// The `$schema` URI naming this draft
    pub fn uri(&self) -> &'static str {
        match self {
            DraftVersion::Draft3 => "http://json-schema.org/draft-03/schema#",
            DraftVersion::Draft4 => "http://json-schema.org/draft-04/schema#",
        }
    }

    /// Short name used in configuration files (e.g. "draft-04")
    pub fn short_name(&self) -> &'static str {
        match self {
            DraftVersion::Draft3 => "draft-03",
            DraftVersion::Draft4 => "draft-04",
        }
    }

    /// Look up a draft by its `$schema` URI
    pub fn from_uri(uri: &str) -> Result<Self, SchemaError> {
        Self::ALL
            .into_iter()
            .find(|v| v.uri() == uri)
            .ok_or_else(|| SchemaError::UnsupportedVersion(uri.to_string()))
    }

    /// Whether required-ness is recorded on each property schema
    pub fn required_inline(&self) -> bool {
        matches!(self, DraftVersion::Draft3)
    }

    pub(crate) fn supported_uris() -> String {
        Self::ALL.iter().map(|v| v.uri()).collect::<Vec<_>>().join(",")
    }
}

impl FromStr for DraftVersion {
    type Err = SchemaError;

    /// Accepts either the short name or the full `$schema` URI
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft-03" | "draft3" => Ok(DraftVersion::Draft3),
            "draft-04" | "draft4" => Ok(DraftVersion::Draft4),
            other => Self::from_uri(other),
        }
    }
}

impl fmt::Display for DraftVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_draft4() {
        assert_eq!(DraftVersion::default(), DraftVersion::Draft4);
        assert!(!DraftVersion::default().required_inline());
    }

    #[test]
    fn test_from_uri() {
        let v = DraftVersion::from_uri("http://json-schema.org/draft-03/schema#").unwrap();
        assert_eq!(v, DraftVersion::Draft3);
        assert!(v.required_inline());
    }

    #[test]
    fn test_unsupported_uri() {
        let err = DraftVersion::from_uri("http://json-schema.org/draft-07/schema#").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("draft-07"));
        assert!(message.contains("draft-03/schema#"));
        assert!(message.contains("draft-04/schema#"));
    }

    #[test]
    fn test_parse_short_names() {
        assert_eq!("draft-03".parse::<DraftVersion>().unwrap(), DraftVersion::Draft3);
        assert_eq!("draft-04".parse::<DraftVersion>().unwrap(), DraftVersion::Draft4);
        assert!("draft-99".parse::<DraftVersion>().is_err());
    }
}
