//! Configuration file loading and layering.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use ipscout::cli::{Cli, load_config};
use ipscout::config::Config;
use ipscout_core::ReconError;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// FILE LOADING
// =============================================================================

#[test]
fn test_full_document() {
    let config = Config::from_toml_str(
        r#"
[paths]
log_dir = "/var/lib/ipscout/log"
save_dir = "/var/lib/ipscout/saves"
graph_file = "case-42.dot"

[api_keys]
shodan = "shodan-key"
virustotal = "vt-key"

[modules]
enabled = ["whois", "shodan", "vt"]

[network]
timeout_secs = 3
pdns_timeout_secs = 60
user_agent = "case-42"
"#,
    )
    .expect("parse");

    assert_eq!(config.paths.graph_file, PathBuf::from("case-42.dot"));
    assert_eq!(config.api_keys.shodan.as_deref(), Some("shodan-key"));
    assert_eq!(config.api_keys.ipinfo, None);
    assert!(config.modules.is_enabled("vt"));
    assert!(!config.modules.is_enabled("ping"));
    assert_eq!(config.network.timeout(), Duration::from_secs(3));
    assert_eq!(config.network.pdns_timeout(), Duration::from_secs(60));
    assert_eq!(config.network.user_agent, "case-42");
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let config = Config::from_toml_str("[network]\ntimeout_secs = 30\n").expect("parse");
    assert_eq!(config.network.timeout_secs, 30);
    assert_eq!(config.network.pdns_timeout_secs, 300);
    assert_eq!(config.paths, Config::default().paths);
}

#[test]
fn test_malformed_document_is_config_error() {
    let err = Config::from_toml_str("[paths\nlog_dir = 1").expect_err("must fail");
    assert!(matches!(err, ReconError::ConfigError(_)));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = TempDir::new().expect("tempdir");
    let missing = dir.path().join("absent.toml");
    let err = Config::load(Some(missing.as_path())).expect_err("must fail");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("ipscout.toml");
    fs::write(&path, "[paths]\nsave_dir = \"cases\"\n").expect("write");

    let config = Config::load(Some(path.as_path())).expect("load");
    assert_eq!(config.paths.save_dir, PathBuf::from("cases"));
    assert_eq!(config.paths.log_dir, PathBuf::from("log"));
}

// =============================================================================
// LAYERING
// =============================================================================

#[test]
fn test_cli_flags_win_over_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("ipscout.toml");
    fs::write(&path, "[paths]\nlog_dir = \"from-file\"\n").expect("write");

    let cli = Cli {
        config: Some(path),
        log_dir: Some(dir.path().join("from-flag")),
        ..Cli::default()
    };
    let config = load_config(&cli).expect("config");
    assert_eq!(config.paths.log_dir, dir.path().join("from-flag"));
}

#[test]
fn test_overrides_replace_file_values() {
    let mut config = Config::from_toml_str("[api_keys]\nipinfo = \"file-token\"\n").expect("parse");
    config.apply_overrides(|name| match name {
        "IPSCOUT_IPINFO_KEY" => Some("env-token".to_string()),
        "IPSCOUT_SAVE_DIR" => Some("env-saves".to_string()),
        _ => None,
    });
    assert_eq!(config.api_keys.ipinfo.as_deref(), Some("env-token"));
    assert_eq!(config.paths.save_dir, PathBuf::from("env-saves"));
}
