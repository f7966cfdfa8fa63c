// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Guardian game.
//!
//! Layered TOML configuration for the game: compiled defaults, system and
//! user files, a local `guardian.toml`, then `GUARDIAN_*` environment
//! variables. Every table rejects unknown keys, and failures are reported as
//! miette diagnostics.
//!
//! # Usage
//!
//! ```no_run
//! use guardian_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Max turns: {}", config.game.max_turns);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::GuardianConfig;

/// Loads the layered configuration (files, then `GUARDIAN_*` env vars) and
/// validates it.
pub fn load_and_validate() -> Result<GuardianConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || {
        loader::search_paths().iter().filter_map(|p| read_source(p)).collect()
    })
}

/// Like [`load_and_validate`] but with one explicit file instead of the
/// search path.
pub fn load_and_validate_path(path: &Path) -> Result<GuardianConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_source(path).into_iter().collect()
    })
}

/// Parses and validates `toml_content` over the compiled defaults.
pub fn load_and_validate_str(toml_content: &str) -> Result<GuardianConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Runs validation on a parsed config, or turns the figment error into
/// diagnostics. Sources are only read on the error path.
fn checked(
    loaded: Result<GuardianConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<GuardianConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_source(path: &Path) -> Option<(String, String)> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| (path.display().to_string(), content))
}
