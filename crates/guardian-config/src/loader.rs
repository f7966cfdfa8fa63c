// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./guardian.toml` > `~/.config/guardian/guardian.toml` >
//! `/etc/guardian/guardian.toml` with environment variable overrides via `GUARDIAN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GuardianConfig;

/// Env key prefixes and the config path they map to, most specific first.
const ENV_SECTIONS: &[(&str, &str)] = &[
    ("game_grand_", "game.grand."),
    ("game_consolation_", "game.consolation."),
    ("game_prizes_", "game.prizes."),
    ("agent_", "agent."),
    ("upstream_", "upstream."),
    ("game_", "game."),
    ("storage_", "storage."),
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/guardian/guardian.toml` (system-wide)
/// 3. `~/.config/guardian/guardian.toml` (user XDG config)
/// 4. `./guardian.toml` (local directory)
/// 5. `GUARDIAN_*` environment variables
pub fn load_config() -> Result<GuardianConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults only.
///
/// Used for testing; neither files nor the environment are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<GuardianConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GuardianConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GuardianConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GuardianConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first.
///
/// The local file is made absolute so it matches the path figment records
/// as the source of an error.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/guardian/guardian.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("guardian/guardian.toml"));
    }
    paths.push(
        std::env::current_dir()
            .map(|d| d.join("guardian.toml"))
            .unwrap_or_else(|_| PathBuf::from("guardian.toml")),
    );
    paths
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(GuardianConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
///
/// Uses an explicit section table, not `Env::split("_")`, because key names
/// contain underscores: `GUARDIAN_UPSTREAM_API_KEY` must become
/// `upstream.api_key`, not `upstream.api.key`.
pub fn map_env_key(key: &str) -> String {
    for (prefix, section) in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(prefix) {
            return format!("{section}{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("GUARDIAN_").map(|key| map_env_key(key.as_str()).into())
}
