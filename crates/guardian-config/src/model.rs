// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Guardian game.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use guardian_core::types::{SecretSpec, SecretTier};
use serde::{Deserialize, Serialize};

/// Top-level Guardian configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardianConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Upstream chat-completion service.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Game rules, secrets and prizes.
    #[serde(default)]
    pub game: GameConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the guardian.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "guardian".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OpenAI-compatible chat-completion endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Full URL of the chat-completions endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer token. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Inline system prompt. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the system prompt.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Total attempts for a request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Longest silence tolerated between two reads of the response body.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Capacity of the delta queue between the network reader and the consumer.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            system_prompt: None,
            system_prompt_file: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_stream_buffer() -> usize {
    100
}

/// Game rules configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GameConfig {
    /// User turns allowed per conversation.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Longest accepted user message, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// First assistant message of every conversation.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Lifetime turns after which the consolation secret is offered. 0 disables.
    #[serde(default)]
    pub bonus_consolation_threshold: u32,

    /// Lifetime turns after which a user who chose to continue gets the grand
    /// secret. 0 disables.
    #[serde(default)]
    pub bonus_grand_threshold: u32,

    #[serde(default = "default_grand_secret")]
    pub grand: SecretConfig,

    #[serde(default = "default_consolation_secret")]
    pub consolation: SecretConfig,

    #[serde(default)]
    pub prizes: PrizesConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_message_length: default_max_message_length(),
            greeting: default_greeting(),
            bonus_consolation_threshold: 0,
            bonus_grand_threshold: 0,
            grand: default_grand_secret(),
            consolation: default_consolation_secret(),
            prizes: PrizesConfig::default(),
        }
    }
}

impl GameConfig {
    /// The two guarded secrets, grand first.
    pub fn secrets(&self) -> [SecretSpec; 2] {
        [
            self.grand.to_spec(SecretTier::Grand),
            self.consolation.to_spec(SecretTier::Consolation),
        ]
    }
}

fn default_max_turns() -> u32 {
    20
}

fn default_max_message_length() -> usize {
    1500
}

fn default_greeting() -> String {
    "Hello! I am the Guardian. I keep a few secret passphrases safe. \
     Talk to me and see whether you can get one out of me, \
     but I will do everything I can to protect them. Ready?"
        .to_string()
}

fn default_grand_secret() -> SecretConfig {
    SecretConfig {
        label: "Grand prize".to_string(),
        ..SecretConfig::default()
    }
}

fn default_consolation_secret() -> SecretConfig {
    SecretConfig {
        label: "Consolation prize".to_string(),
        ..SecretConfig::default()
    }
}

/// One guarded secret.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecretConfig {
    /// Canonical phrase. Must be set.
    #[serde(default)]
    pub phrase: String,

    /// Fragments that together count as a paraphrased leak. Empty disables.
    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub label: String,

    /// Reward descriptor shown to winners.
    #[serde(default)]
    pub reward: String,
}

impl SecretConfig {
    pub fn to_spec(&self, tier: SecretTier) -> SecretSpec {
        SecretSpec {
            phrase: self.phrase.clone(),
            keywords: self.keywords.clone(),
            tier,
            label: self.label.clone(),
            reward: self.reward.clone(),
        }
    }
}

/// Prize supply configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrizesConfig {
    /// Maximum number of grand winners.
    #[serde(default = "default_grand_count")]
    pub grand_count: u32,
}

impl Default for PrizesConfig {
    fn default() -> Self {
        Self {
            grand_count: default_grand_count(),
        }
    }
}

fn default_grand_count() -> u32 {
    1
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("guardian").join("guardian.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("guardian.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
