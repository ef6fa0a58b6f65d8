//! Tests for configuration resolution and graceful degradation
//!
//! - Missing TOML files SHALL NOT cause termination
//! - Priority order: CLI argument → SBF_CONFIG → platform path → defaults
//! - Malformed TOML is a configuration error
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SBF_CONFIG are marked with #[serial].

use sbf_common::config::{ConfigResolver, ConfigSource, TomlConfig, CONFIG_ENV_VAR};
use sbf_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_cli_argument_beats_environment() {
    let dir = TempDir::new().unwrap();
    let cli = write_config(&dir, "cli.toml", "[logging]\nlevel = \"debug\"\n");
    let envp = write_config(&dir, "env.toml", "[logging]\nlevel = \"warn\"\n");
    env::set_var(CONFIG_ENV_VAR, &envp);

    let resolver = ConfigResolver::new(Some(cli.clone()));
    assert_eq!(resolver.resolve(), Some(cli.clone()));

    let config = TomlConfig::load(Some(&cli)).unwrap();
    assert_eq!(config.logging.level, "debug");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_variable_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let envp = write_config(
        &dir,
        "env.toml",
        "[reconciliation]\nconfidence_threshold = 0.75\n",
    );
    env::set_var(CONFIG_ENV_VAR, &envp);

    let config = TomlConfig::load(None).unwrap();
    assert_eq!(config.reconciliation.confidence_threshold, 0.75);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load(Some(&missing)).unwrap();
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_load_reports_missing_file_for_logging() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let (config, source) = TomlConfig::resolve_and_load(Some(&missing)).unwrap();

    assert_eq!(config, TomlConfig::default());
    assert_eq!(source, ConfigSource::Missing(missing));
}

#[test]
#[serial]
fn test_load_reports_file_it_parsed() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "cli.toml", "[logging]\nlevel = \"debug\"\n");

    let (config, source) = TomlConfig::resolve_and_load(Some(&path)).unwrap();

    assert_eq!(config.logging.level, "debug");
    assert_eq!(source, ConfigSource::File(path));
}

#[test]
#[serial]
fn test_unreadable_config_path_is_io_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();

    // exists, but is a directory
    let err = TomlConfig::load(Some(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "unexpected error: {err}");
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let bad = write_config(&dir, "bad.toml", "[logging\nlevel = ");

    let err = TomlConfig::load(Some(&bad)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "unexpected error: {err}");
}

#[test]
#[serial]
fn test_full_reconciliation_section_parses() {
    env::remove_var(CONFIG_ENV_VAR);
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "full.toml",
        r#"
[logging]
level = "trace"
file = "/tmp/sbf.log"

[reconciliation]
confidence_threshold = 0.5
date_output_format = "%m/%d/%Y"
extend_defaults = false

[reconciliation.fuzzy]
max_edit_distance = 1
min_token_len = 4

[reconciliation.synonyms]
date_of_birth = ["dob", "birthday"]

[[reconciliation.composites]]
target = "complete_address"
parts = ["street", "barangay", "city"]
joiner = ", "

[[reconciliation.splits]]
source = "full_name"
parts = [
    { target = "first_name", select = "first" },
    { target = "last_name", select = "last" },
]
"#,
    );

    let config = TomlConfig::load(Some(&path)).unwrap();
    assert_eq!(config.logging.file, Some(PathBuf::from("/tmp/sbf.log")));

    let recon = &config.reconciliation;
    assert_eq!(recon.date_output_format, "%m/%d/%Y");
    assert!(!recon.extend_defaults);
    assert_eq!(recon.fuzzy.max_edit_distance, 1);
    assert_eq!(recon.fuzzy.min_token_len, 4);
    assert_eq!(recon.synonyms["date_of_birth"], vec!["dob", "birthday"]);
    assert_eq!(recon.composites[0].joiner, ", ");
    assert_eq!(recon.splits[0].separator, None);
    assert_eq!(recon.splits[0].parts[1].select, "last");
}
