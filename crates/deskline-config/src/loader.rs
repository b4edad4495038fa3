// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/deskline/deskline.toml` < `~/.config/deskline/deskline.toml`
//! < `./deskline.toml` < `DESKLINE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DesklineConfig;

/// Config files consulted by [`load_config`], lowest precedence first.
pub fn config_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/deskline/deskline.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("deskline/deskline.toml"));
    }
    paths.push(PathBuf::from("deskline.toml"));
    paths
}

/// Build the layered Figment without extracting it.
pub fn build_figment() -> Figment {
    config_file_candidates()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(DesklineConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<DesklineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DesklineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DesklineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DesklineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DesklineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider with explicit section mapping.
///
/// `Env::split("_")` would turn `DESKLINE_API_BASE_URL` into `api.base.url`,
/// so the section prefix is replaced once instead.
fn env_provider() -> Env {
    Env::prefixed("DESKLINE_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 5] = ["client", "api", "realtime", "notifications", "session"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
