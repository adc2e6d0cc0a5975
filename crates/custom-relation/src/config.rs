//! Relation Settings - Environment-driven configuration for key matching
//!
//! Controls how composite join keys are rendered (separator, synthetic
//! column name, key format) and when a match is reported as slow.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

const ENV_KEY_SEPARATOR: &str = "CUSTOM_RELATION_KEY_SEPARATOR";
const ENV_SYNTHETIC_COLUMN: &str = "CUSTOM_RELATION_SYNTHETIC_COLUMN";
const ENV_KEY_FORMAT: &str = "CUSTOM_RELATION_KEY_FORMAT";
const ENV_SLOW_MATCH_MS: &str = "CUSTOM_RELATION_SLOW_MATCH_MS";

/// Default separator placed between composite key values
pub const DEFAULT_KEY_SEPARATOR: &str = ",";

/// Default alias of the key column the query materializes for each result row
pub const DEFAULT_SYNTHETIC_COLUMN: &str = "__custom_relation_key";

/// How join-key values are rendered before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFormat {
    /// Values stringified and joined with the separator. Values that
    /// stringify identically collide (`1` and `"1"` both render as `1`).
    #[default]
    Concatenated,
    /// Values encoded as a JSON array, so `1` and `"1"` stay distinct.
    /// Result keys are computed from result fields instead of a
    /// query-side synthetic column.
    Typed,
}

impl FromStr for KeyFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "concatenated" | "concat" | "string" => Ok(KeyFormat::Concatenated),
            "typed" | "tuple" => Ok(KeyFormat::Typed),
            _ => Err(ConfigError::InvalidValue {
                field: "key_format".to_string(),
                value: s.to_string(),
                expected: "concatenated or typed".to_string(),
            }),
        }
    }
}

/// Configuration source information for debugging
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    EnvVar(String),
    Default(String),
    Programmatic,
}

/// Settings shared by every custom relation built from them
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSettings {
    /// Separator between values of a composite key
    pub key_separator: String,
    /// Alias under which the query exposes the concatenated result key
    pub synthetic_column: String,
    pub key_format: KeyFormat,
    /// Matches slower than this are logged at WARN
    pub slow_match_threshold_ms: u64,
    sources: HashMap<String, ConfigSource>,
}

impl Default for RelationSettings {
    fn default() -> Self {
        Self {
            key_separator: DEFAULT_KEY_SEPARATOR.to_string(),
            synthetic_column: DEFAULT_SYNTHETIC_COLUMN.to_string(),
            key_format: KeyFormat::Concatenated,
            slow_match_threshold_ms: 250,
            sources: HashMap::new(),
        }
    }
}

impl RelationSettings {
    /// Load settings from `CUSTOM_RELATION_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut sources = HashMap::new();

        let mut read = |field: &str, var: &str, default: String| -> String {
            match lookup(var) {
                Some(value) => {
                    sources.insert(field.to_string(), ConfigSource::EnvVar(var.to_string()));
                    value
                }
                None => {
                    sources.insert(field.to_string(), ConfigSource::Default(default.clone()));
                    default
                }
            }
        };

        let key_separator = read("key_separator", ENV_KEY_SEPARATOR, defaults.key_separator);
        let synthetic_column = read(
            "synthetic_column",
            ENV_SYNTHETIC_COLUMN,
            defaults.synthetic_column,
        );
        let key_format = read("key_format", ENV_KEY_FORMAT, "concatenated".to_string());
        let slow_match = read(
            "slow_match_threshold_ms",
            ENV_SLOW_MATCH_MS,
            defaults.slow_match_threshold_ms.to_string(),
        );

        let key_format = KeyFormat::from_str(&key_format)?;
        let slow_match_threshold_ms = slow_match.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            field: "slow_match_threshold_ms".to_string(),
            value: slow_match.clone(),
            expected: "a non-negative number of milliseconds".to_string(),
        })?;

        let settings = Self {
            key_separator,
            synthetic_column,
            key_format,
            slow_match_threshold_ms,
            sources,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.key_separator = separator.into();
        self.sources
            .insert("key_separator".to_string(), ConfigSource::Programmatic);
        self
    }

    pub fn with_synthetic_column<S: Into<String>>(mut self, column: S) -> Self {
        self.synthetic_column = column.into();
        self.sources
            .insert("synthetic_column".to_string(), ConfigSource::Programmatic);
        self
    }

    pub fn with_key_format(mut self, format: KeyFormat) -> Self {
        self.key_format = format;
        self.sources
            .insert("key_format".to_string(), ConfigSource::Programmatic);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_separator.is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "key_separator".to_string(),
                reason: "Key separator cannot be empty".to_string(),
            });
        }

        if !is_identifier(&self.synthetic_column) {
            return Err(ConfigError::ValidationFailed {
                field: "synthetic_column".to_string(),
                reason: format!(
                    "'{}' is not a valid column alias (letters, digits and underscores, not starting with a digit)",
                    self.synthetic_column
                ),
            });
        }

        Ok(())
    }

    /// Where each setting came from; unset entries were never overridden
    pub fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = self.sources.clone();
        let current = [
            ("key_separator", self.key_separator.clone()),
            ("synthetic_column", self.synthetic_column.clone()),
            ("key_format", format!("{:?}", self.key_format)),
            ("slow_match_threshold_ms", self.slow_match_threshold_ms.to_string()),
        ];
        for (field, value) in current {
            sources
                .entry(field.to_string())
                .or_insert(ConfigSource::Default(value));
        }
        sources
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}
