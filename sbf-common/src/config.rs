//! Configuration loading and config file resolution
//!
//! Config file priority order:
//! 1. Command-line argument (highest priority)
//! 2. `SBF_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/sbf/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file never terminates the program: compiled defaults are
//! used and the returned [`ConfigSource`] says so, for logging once tracing
//! is initialized. A config file that exists but fails to
//! parse or validate is a [`Error::Config`]; one that cannot be read is an
//! [`Error::Io`].

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SBF_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reconciliation engine settings (optional)
    #[serde(default)]
    pub reconciliation: ReconciliationSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Matching and fill settings for the reconciliation engine
///
/// Tables here are raw strings; the reconciliation crate turns them into
/// typed matching rules.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconciliationSettings {
    /// Facts below this confidence never populate a field
    pub confidence_threshold: f64,

    /// chrono format string used to render date fields
    pub date_output_format: String,

    /// When true, configured tables are added to the built-in ones;
    /// when false they replace them
    pub extend_defaults: bool,

    pub fuzzy: FuzzySettings,

    /// Canonical name -> aliases
    pub synonyms: BTreeMap<String, Vec<String>>,

    pub composites: Vec<CompositeSettings>,

    pub splits: Vec<SplitSettings>,
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            date_output_format: "%Y-%m-%d".to_string(),
            extend_defaults: true,
            fuzzy: FuzzySettings::default(),
            synonyms: BTreeMap::new(),
            composites: Vec::new(),
            splits: Vec::new(),
        }
    }
}

/// Fuzzy pass thresholds
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FuzzySettings {
    /// Maximum Levenshtein distance between tokens
    pub max_edit_distance: usize,
    /// Shortest token that may take part in containment or edit-distance matching
    pub min_token_len: usize,
}

impl Default for FuzzySettings {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            min_token_len: 3,
        }
    }
}

/// Several facts combined into one field
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompositeSettings {
    pub target: String,
    pub parts: Vec<String>,
    /// "space", "concat", or any other string used verbatim as separator
    #[serde(default = "default_joiner")]
    pub joiner: String,
}

fn default_joiner() -> String {
    "space".to_string()
}

/// One fact decomposed into several fields
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SplitSettings {
    pub source: String,
    /// Separator string; whitespace runs when omitted
    #[serde(default)]
    pub separator: Option<String>,
    pub parts: Vec<SplitPartSettings>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SplitPartSettings {
    pub target: String,
    /// "first", "last", "inner", or a zero-based segment index
    pub select: String,
}

impl ReconciliationSettings {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.date_output_format.trim().is_empty() {
            return Err(Error::Config("date_output_format must not be empty".to_string()));
        }
        for composite in &self.composites {
            if composite.parts.len() < 2 {
                return Err(Error::Config(format!(
                    "composite '{}' needs at least two parts",
                    composite.target
                )));
            }
        }
        for split in &self.splits {
            if split.parts.is_empty() {
                return Err(Error::Config(format!(
                    "split '{}' declares no parts",
                    split.source
                )));
            }
            if split.separator.as_deref() == Some("") {
                return Err(Error::Config(format!(
                    "split '{}' has an empty separator",
                    split.source
                )));
            }
        }
        Ok(())
    }
}

/// Where the loaded configuration came from
///
/// Returned alongside the config so the caller can log it once tracing is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; compiled defaults used
    Missing(PathBuf),
    /// No config file anywhere; compiled defaults used
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
        }
    }
}

impl TomlConfig {
    /// Resolve the config file and load it, falling back to defaults
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        Self::resolve_and_load(cli_arg).map(|(config, _)| config)
    }

    /// Like [`TomlConfig::load`], also reporting which source was used
    pub fn resolve_and_load(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let resolver = ConfigResolver::new(cli_arg.map(Path::to_path_buf));
        match resolver.resolve() {
            Some(path) if path.exists() => {
                let config = load_toml_config(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }
}

/// Parse and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_toml_config(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Parse and validate TOML config text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.reconciliation.validate()?;
    Ok(config)
}

/// Config file path resolution
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli_arg: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_arg: Option<PathBuf>) -> Self {
        Self { cli_arg }
    }

    /// Returns the highest-priority candidate path, if any
    ///
    /// CLI and environment paths are returned even when they do not exist so
    /// the caller can report them; the platform path only when it exists.
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Platform config directory
        default_config_path().filter(|path| path.exists())
    }
}

/// `<config_dir>/sbf/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sbf").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        assert_eq!(config.reconciliation.confidence_threshold, 0.4);
        assert_eq!(config.reconciliation.fuzzy.max_edit_distance, 2);
        assert!(config.reconciliation.extend_defaults);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let err = parse_toml_config("[reconciliation]\nconfidence_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_single_part_composite_rejected() {
        let toml = r#"
[[reconciliation.composites]]
target = "full_name"
parts = ["first_name"]
"#;
        assert!(parse_toml_config(toml).is_err());
    }

    #[test]
    fn test_composite_joiner_defaults_to_space() {
        let toml = r#"
[[reconciliation.composites]]
target = "complete_address"
parts = ["street", "city"]
"#;
        let config = parse_toml_config(toml).unwrap();
        assert_eq!(config.reconciliation.composites[0].joiner, "space");
    }
}
