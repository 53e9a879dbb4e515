//! Configuration management for schema-tool
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schemas.toml)
//! - Environment variables (SCHEMAS__*)
//!
//! ## Example config file (schemas.toml):
//! ```toml
//! [compiler]
//! root_uri = "http://example.org/schema/"
//! draft = "draft-04"
//!
//! [fetch]
//! schema_dir = "./schemas"
//! extension = "json"
//! http_timeout_secs = 30
//!
//! [validation]
//! fail_on_missing = false
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::version::DraftVersion;

/// Main configuration for schema-tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Compiler settings
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Where referenced schemas come from
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Root URI that bare reference names are qualified against
    #[serde(default = "default_root_uri")]
    pub root_uri: String,

    /// Draft to emit
    #[serde(default)]
    pub draft: DraftVersion,
}

/// Fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory mirroring the schema root; unset means fetch over HTTP
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// File extension appended to reference paths in `schema_dir`
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Timeout for HTTP fetches
    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Treat unresolved `$ref`s as a failed validation
    #[serde(default)]
    pub fail_on_missing: bool,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

impl OutputFormat {
    /// Render `value` in this format
    pub fn render<T: Serialize>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

// Default value functions
fn default_root_uri() -> String {
    "http://localhost/schema/".to_string()
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            root_uri: default_root_uri(),
            draft: DraftVersion::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            schema_dir: None,
            extension: default_extension(),
            http_timeout_secs: default_timeout(),
        }
    }
}

impl ToolConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `config_path` over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["schemas.toml", ".schemas.toml", "config/schemas.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "schemas") {
            let xdg_config = config_dir.config_dir().join("schemas.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCHEMAS__COMPILER__ROOT_URI and friends
        builder = builder.add_source(
            Environment::with_prefix("SCHEMAS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = self
            .to_toml()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Configuration as TOML text
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Get the schema directory (resolves relative paths)
    pub fn schema_dir(&self) -> Option<PathBuf> {
        self.fetch.schema_dir.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                std::env::current_dir().unwrap_or_default().join(p)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolConfig::default();
        assert_eq!(config.compiler.draft, DraftVersion::Draft4);
        assert_eq!(config.fetch.extension, "json");
        assert!(!config.validation.fail_on_missing);
        assert!(config.schema_dir().is_none());
    }

    #[test]
    fn test_serialize_config() {
        let config = ToolConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[compiler]"));
        assert!(toml_str.contains("draft = \"draft-04\""));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[compiler]\nroot_uri = \"http://x/s/\"\ndraft = \"draft-03\"\n\n[output]\nformat = \"compact\"\n",
        )
        .unwrap();

        let config = ToolConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.compiler.root_uri, "http://x/s/");
        assert_eq!(config.compiler.draft, DraftVersion::Draft3);
        assert_eq!(config.output.format, OutputFormat::Compact);
        assert_eq!(config.fetch.http_timeout_secs, 30);
    }

    #[test]
    fn test_output_format_render() {
        let value = serde_json::json!({"a": 1});
        assert_eq!(OutputFormat::Compact.render(&value).unwrap(), r#"{"a":1}"#);
        assert!(OutputFormat::Pretty.render(&value).unwrap().contains('\n'));
    }
}
