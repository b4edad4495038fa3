// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every section uses `deny_unknown_fields` so typos surface as errors
//! instead of being silently ignored.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Deskline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesklineConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Backend REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Substrings marking a request URL as public (sent without credential).
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,

    /// Marker the backend puts in a 401 body when the access token expired.
    #[serde(default = "default_token_invalid_marker")]
    pub token_invalid_marker: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            public_paths: default_public_paths(),
            token_invalid_marker: default_token_invalid_marker(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/cuentas".to_string()
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/login".to_string(),
        "/register".to_string(),
        "/token/".to_string(),
    ]
}

fn default_token_invalid_marker() -> String {
    "token_not_valid".to_string()
}

/// Realtime channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Seconds between keepalive pings on an open channel.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Fixed delay before a reconnect attempt.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Reconnect attempts after which the channel gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl RealtimeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

/// Notification feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Seconds between unread-count polls while following the feed.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl NotificationsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

/// Credential persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// File holding the persisted session.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deskline")
        .join("session.json")
}
