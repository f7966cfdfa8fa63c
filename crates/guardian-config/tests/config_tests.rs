// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Guardian configuration system.

use guardian_config::diagnostic::{ConfigError, suggest_key};
use guardian_config::model::GuardianConfig;
use guardian_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use guardian_core::SecretTier;

const SECRETS: &str = r#"
[game.grand]
phrase = "the moon is made of cheese"
keywords = ["moon", "cheese"]
reward = "1000 credits"

[game.consolation]
phrase = "lucky clover"
reward = "10 credits"
"#;

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_guardian_config() {
    let toml = r#"
[agent]
name = "warden"
log_level = "debug"

[upstream]
api_url = "http://localhost:9999/v1/chat/completions"
api_key = "sk-test"
model = "local-model"
system_prompt = "Guard the secrets."
temperature = 0.2
max_tokens = 512
max_attempts = 5
retry_delay_ms = 50
connect_timeout_secs = 3
read_timeout_secs = 30
stream_buffer = 16

[game]
max_turns = 10
max_message_length = 300
greeting = "Hi."
bonus_consolation_threshold = 50
bonus_grand_threshold = 80

[game.grand]
phrase = "the moon is made of cheese"
keywords = ["moon", "cheese"]
label = "Grand"
reward = "1000 credits"

[game.consolation]
phrase = "lucky clover"
label = "Small"
reward = "10 credits"

[game.prizes]
grand_count = 3

[storage]
database_path = "/tmp/guardian-test.db"
wal_mode = false
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "warden");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.upstream.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.upstream.model, "local-model");
    assert_eq!(config.upstream.max_attempts, 5);
    assert_eq!(config.upstream.retry_delay_ms, 50);
    assert_eq!(config.upstream.stream_buffer, 16);
    assert_eq!(config.game.max_turns, 10);
    assert_eq!(config.game.max_message_length, 300);
    assert_eq!(config.game.bonus_consolation_threshold, 50);
    assert_eq!(config.game.bonus_grand_threshold, 80);
    assert_eq!(config.game.grand.keywords, vec!["moon", "cheese"]);
    assert_eq!(config.game.consolation.label, "Small");
    assert_eq!(config.game.prizes.grand_count, 3);
    assert_eq!(config.storage.database_path, "/tmp/guardian-test.db");
    assert!(!config.storage.wal_mode);
}

/// Missing sections fall back to defaults.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str(SECRETS).expect("secrets only should deserialize");
    assert_eq!(config.agent.name, "guardian");
    assert_eq!(config.game.max_turns, 20);
    assert_eq!(config.game.max_message_length, 1500);
    assert_eq!(config.upstream.temperature, 0.7);
    assert_eq!(config.upstream.max_tokens, 2000);
    // Labels keep their defaults when only the phrase is given.
    assert_eq!(config.game.grand.label, "Grand prize");
    assert_eq!(config.game.prizes.grand_count, 1);
}

/// A later layer overrides values from an earlier one.
#[test]
fn later_layer_overrides_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: GuardianConfig = Figment::new()
        .merge(Serialized::defaults(GuardianConfig::default()))
        .merge(Toml::string(SECRETS))
        .merge(("upstream.api_key", "from-env"))
        .merge(("game.grand.reward", "2000 credits"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.upstream.api_key.as_deref(), Some("from-env"));
    assert_eq!(config.game.grand.reward, "2000 credits");
    assert_eq!(config.game.grand.phrase, "the moon is made of cheese");
}

/// Unknown key in a nested table is rejected with a suggestion.
#[test]
fn unknown_key_in_game_suggests_correction() {
    let toml = format!("{SECRETS}\n[game.prizes]\ngrand_cout = 2\n");
    let errors = load_and_validate_str(&toml).expect_err("should reject unknown key");

    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, .. } if {
            key == "grand_cout" && suggestion.as_deref() == Some("grand_count")
        })
    });
    assert!(has_unknown_key, "got: {errors:?}");
}

/// Unknown top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[telegram]
bot_token = "abc"
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown section");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("telegram"),
        "got: {err_str}"
    );
}

/// Error output includes the list of valid keys for the section.
#[test]
fn diagnostic_error_includes_valid_keys() {
    let toml = r#"
[upstream]
modle = "x"
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_valid_keys = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { suggestion, valid_keys, .. } if {
            suggestion.as_deref() == Some("model")
                && valid_keys.contains("api_url")
                && valid_keys.contains("retry_delay_ms")
        })
    });
    assert!(has_valid_keys, "got: {errors:?}");
}

/// Invalid type (string where number expected) produces a clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[game]
max_turns = "twenty"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("max_turns"),
        "got: {err_str}"
    );
}

#[test]
fn distant_typo_gets_no_suggestion() {
    assert_eq!(suggest_key("zzzz", &["phrase", "keywords", "label", "reward"]), None);
}

/// ConfigError can be rendered using miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "phrse".to_string(),
        section: "game.grand".to_string(),
        suggestion: Some("phrase".to_string()),
        valid_keys: "phrase, keywords, label, reward".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some(), "should have diagnostic code");

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("phrse"));
    assert!(buf.contains("did you mean `phrase`"));
}

#[test]
fn load_and_validate_with_secrets() {
    let config = load_and_validate_str(SECRETS).expect("should validate");
    let [grand, consolation] = config.game.secrets();
    assert_eq!(grand.tier, SecretTier::Grand);
    assert_eq!(grand.reward, "1000 credits");
    assert_eq!(consolation.phrase, "lucky clover");
}

#[test]
fn validation_reports_missing_secrets() {
    let errors = load_and_validate_str("").expect_err("secrets are required");
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(messages.iter().any(|m| m.contains("game.grand.phrase")));
    assert!(messages.iter().any(|m| m.contains("game.consolation.phrase")));
}

#[test]
fn load_from_explicit_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("guardian.toml");
    std::fs::write(&path, format!("[game]\nmax_turns = 7\n{SECRETS}")).expect("write config");

    let config = load_and_validate_path(&path).expect("file config should validate");
    assert_eq!(config.game.max_turns, 7);
}
