// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.
//!
//! All problems are collected before returning so the user can fix them in
//! one pass.

use reqwest::Url;

use crate::diagnostic::ConfigError;
use crate::model::DesklineConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
pub fn validate_config(config: &DesklineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.client.log_level.as_str()) {
        invalid(format!(
            "client.log_level `{}` must be one of: {}",
            config.client.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    match Url::parse(config.api.base_url.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => invalid(format!(
            "api.base_url must use http or https, got `{}`",
            url.scheme()
        )),
        Err(e) => invalid(format!(
            "api.base_url `{}` is not a valid URL: {e}",
            config.api.base_url
        )),
    }

    if config.api.public_paths.iter().any(|p| p.trim().is_empty()) {
        invalid("api.public_paths must not contain empty entries".to_string());
    }

    if config.api.token_invalid_marker.trim().is_empty() {
        invalid("api.token_invalid_marker must not be empty".to_string());
    }

    if config.realtime.ping_interval_secs == 0 {
        invalid("realtime.ping_interval_secs must be greater than zero".to_string());
    }

    if config.realtime.reconnect_delay_secs == 0 {
        invalid("realtime.reconnect_delay_secs must be greater than zero".to_string());
    }

    if config.realtime.max_reconnect_attempts == 0 {
        invalid("realtime.max_reconnect_attempts must be at least 1".to_string());
    }

    if config.notifications.poll_interval_secs == 0 {
        invalid("notifications.poll_interval_secs must be greater than zero".to_string());
    }

    if config.session.credentials_path.as_os_str().is_empty() {
        invalid("session.credentials_path must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&DesklineConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut config = DesklineConfig::default();
        config.client.log_level = "loud".into();
        config.api.base_url = "ftp://backend".into();
        config.realtime.ping_interval_secs = 0;
        config.notifications.poll_interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        let text: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert!(text.iter().any(|e| e.contains("client.log_level")));
        assert!(text.iter().any(|e| e.contains("http or https")));
    }

    #[test]
    fn zero_reconnect_attempts_is_rejected() {
        let mut config = DesklineConfig::default();
        config.realtime.max_reconnect_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("max_reconnect_attempts"));
    }
}
