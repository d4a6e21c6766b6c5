//! Ingestion configuration.
//!
//! Loaded from YAML, then overlaid with environment variables:
//!
//! ```yaml
//! no_match_policy: default_collection
//! output_format: ndjson
//! log_filter: "metabrowse=debug"
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `METABROWSE_NO_MATCH_POLICY` | `no_match_policy` |
//! | `METABROWSE_OUTPUT_FORMAT` | `output_format` |
//! | `METABROWSE_LOG` | `log_filter` |

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{IngestError, Result};

/// What to do when no detection rule matches a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchPolicy {
    /// Report [`IngestError::NoFormatDetected`]
    #[default]
    Error,
    /// Parse with the first registered collection type
    DefaultCollection,
}

impl FromStr for NoMatchPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(NoMatchPolicy::Error),
            "default_collection" | "default" => Ok(NoMatchPolicy::DefaultCollection),
            other => Err(IngestError::Config(format!(
                "unknown no-match policy '{}' (expected error or default_collection)",
                other
            ))),
        }
    }
}

/// Output format for parsed entity metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// A single JSON array
    #[default]
    Json,
    /// One JSON object per line
    Ndjson,
}

impl FromStr for OutputFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "ndjson" | "jsonl" => Ok(OutputFormat::Ndjson),
            other => Err(IngestError::Config(format!(
                "unknown output format '{}' (expected json or ndjson)",
                other
            ))),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(default)]
    pub no_match_policy: NoMatchPolicy,

    #[serde(default)]
    pub output_format: OutputFormat,

    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            no_match_policy: NoMatchPolicy::default(),
            output_format: OutputFormat::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or has an invalid format
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty file means all defaults
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `METABROWSE_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup("METABROWSE_NO_MATCH_POLICY") {
            self.no_match_policy = policy.parse()?;
        }
        if let Some(format) = lookup("METABROWSE_OUTPUT_FORMAT") {
            self.output_format = format.parse()?;
        }
        if let Some(filter) = lookup("METABROWSE_LOG") {
            self.log_filter = filter;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.no_match_policy, NoMatchPolicy::Error);
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = IngestConfig::from_yaml("no_match_policy: default_collection\n").unwrap();
        assert_eq!(config.no_match_policy, NoMatchPolicy::DefaultCollection);
        assert_eq!(config.output_format, OutputFormat::Json);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_policy() {
        let result = IngestConfig::from_yaml("no_match_policy: guess\n");
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_from_yaml_rejects_unknown_keys() {
        assert!(IngestConfig::from_yaml("colour: blue\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "output_format: ndjson").unwrap();
        writeln!(file, "log_filter: \"metabrowse=debug\"").unwrap();

        let config = IngestConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.output_format, OutputFormat::Ndjson);
        assert_eq!(config.log_filter, "metabrowse=debug");
    }

    #[test]
    fn test_load_missing_file() {
        let result = IngestConfig::load_from_file("/nonexistent/metabrowse.yaml");
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("METABROWSE_NO_MATCH_POLICY", "default"),
            ("METABROWSE_OUTPUT_FORMAT", "jsonl"),
        ]
        .into_iter()
        .collect();

        let config = IngestConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.no_match_policy, NoMatchPolicy::DefaultCollection);
        assert_eq!(config.output_format, OutputFormat::Ndjson);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let result = IngestConfig::default()
            .with_overrides(|key| (key == "METABROWSE_OUTPUT_FORMAT").then(|| "xml".to_string()));
        assert!(result.is_err());
    }
}
