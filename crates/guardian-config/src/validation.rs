// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty secrets, ordered bonus thresholds and value ranges.

use crate::diagnostic::ConfigError;
use crate::model::{GuardianConfig, SecretConfig};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &GuardianConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.upstream.api_url.trim().is_empty() {
        errors.push(validation("upstream.api_url must not be empty"));
    }

    let temperature = config.upstream.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        errors.push(validation(format!(
            "upstream.temperature must be between 0 and 2, got {temperature}"
        )));
    }

    if config.upstream.max_attempts < 1 {
        errors.push(validation("upstream.max_attempts must be at least 1"));
    }

    if config.upstream.stream_buffer < 1 {
        errors.push(validation("upstream.stream_buffer must be at least 1"));
    }

    validate_secret("game.grand", &config.game.grand, &mut errors);
    validate_secret("game.consolation", &config.game.consolation, &mut errors);

    let grand = config.game.grand.phrase.trim();
    if !grand.is_empty() && grand == config.game.consolation.phrase.trim() {
        errors.push(validation(
            "game.grand.phrase and game.consolation.phrase must differ",
        ));
    }

    if config.game.max_turns < 1 {
        errors.push(validation("game.max_turns must be at least 1"));
    }

    if config.game.max_message_length < 1 {
        errors.push(validation("game.max_message_length must be at least 1"));
    }

    let consolation_at = config.game.bonus_consolation_threshold;
    let grand_at = config.game.bonus_grand_threshold;
    if consolation_at > 0 && grand_at > 0 && consolation_at >= grand_at {
        errors.push(validation(format!(
            "game.bonus_consolation_threshold ({consolation_at}) must be below \
             game.bonus_grand_threshold ({grand_at})"
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(validation("storage.database_path must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_secret(section: &str, secret: &SecretConfig, errors: &mut Vec<ConfigError>) {
    if secret.phrase.trim().is_empty() {
        errors.push(validation(format!("{section}.phrase must not be empty")));
    }
    if secret.keywords.iter().any(|k| k.trim().is_empty()) {
        errors.push(validation(format!(
            "{section}.keywords must not contain empty fragments"
        )));
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}
