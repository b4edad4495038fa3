// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Deskline configuration system.

use std::io::Write;

use deskline_config::diagnostic::ConfigError;
use deskline_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use serial_test::serial;

#[test]
fn full_file_deserializes() {
    let toml = r#"
[client]
log_level = "debug"

[api]
base_url = "https://helpdesk.example.com/api/cuentas"
public_paths = ["/login", "/register"]
token_invalid_marker = "expired"

[realtime]
ping_interval_secs = 15
reconnect_delay_secs = 1
max_reconnect_attempts = 3

[notifications]
poll_interval_secs = 20

[session]
credentials_path = "/tmp/deskline-session.json"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.client.log_level, "debug");
    assert_eq!(config.api.base_url, "https://helpdesk.example.com/api/cuentas");
    assert_eq!(config.api.public_paths, ["/login", "/register"]);
    assert_eq!(config.api.token_invalid_marker, "expired");
    assert_eq!(config.realtime.ping_interval_secs, 15);
    assert_eq!(config.realtime.max_reconnect_attempts, 3);
    assert_eq!(config.notifications.poll_interval_secs, 20);
    assert_eq!(
        config.session.credentials_path.to_str(),
        Some("/tmp/deskline-session.json")
    );
}

#[test]
fn empty_file_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults validate");
    assert_eq!(config.api.base_url, "http://127.0.0.1:8000/api/cuentas");
    assert_eq!(config.realtime.max_reconnect_attempts, 5);
}

#[test]
fn unknown_key_gets_suggestion() {
    let errors = load_and_validate_str(
        r#"
[realtime]
ping_intervall_secs = 10
"#,
    )
    .expect_err("typo must be rejected");

    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "ping_intervall_secs");
            assert_eq!(suggestion.as_deref(), Some("ping_interval_secs"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_reported_with_key() {
    let errors = load_and_validate_str(
        r#"
[notifications]
poll_interval_secs = "often"
"#,
    )
    .unwrap_err();

    match &errors[0] {
        ConfigError::InvalidType { key, .. } => {
            assert_eq!(key, "notifications.poll_interval_secs")
        }
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn validation_runs_after_parse() {
    let errors = load_and_validate_str(
        r#"
[api]
base_url = "not a url"
"#,
    )
    .unwrap_err();
    assert!(errors[0].to_string().contains("api.base_url"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[api]\nbase_url = \"http://from-file:8000/api\"").unwrap();

    // SAFETY: serialized with every other env-mutating test in this binary.
    unsafe {
        std::env::set_var("DESKLINE_API_BASE_URL", "https://from-env/api/cuentas");
        std::env::set_var("DESKLINE_REALTIME_MAX_RECONNECT_ATTEMPTS", "2");
    }
    let result = load_and_validate_path(file.path());
    unsafe {
        std::env::remove_var("DESKLINE_API_BASE_URL");
        std::env::remove_var("DESKLINE_REALTIME_MAX_RECONNECT_ATTEMPTS");
    }

    let config = result.expect("env overrides validate");
    assert_eq!(config.api.base_url, "https://from-env/api/cuentas");
    assert_eq!(config.realtime.max_reconnect_attempts, 2);
}

#[test]
#[serial]
fn file_errors_carry_source_span() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[session]\ncredential_path = \"/tmp/x\"").unwrap();

    let errors = load_and_validate_path(file.path()).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey {
            suggestion, span, ..
        } => {
            assert_eq!(suggestion.as_deref(), Some("credentials_path"));
            assert!(span.is_some());
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
