// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible streaming completion provider for the Guardian game.
//!
//! This crate implements [`CompletionProvider`] for chat-completions
//! endpoints that stream Server-Sent Events.

pub mod client;
pub mod sse;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use guardian_config::model::UpstreamConfig;
use guardian_core::error::GuardianError;
use guardian_core::traits::{CompletionProvider, PluginAdapter};
use guardian_core::types::{AdapterType, HealthStatus, Message, Role};
use guardian_core::DeltaStream;
use tracing::{debug, info};

use crate::client::{ClientSettings, CompletionClient};
use crate::types::{ChatMessage, ChatRequest};

/// Streaming chat-completions provider implementing [`CompletionProvider`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: CompletionClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
    stream_buffer: usize,
}

impl OpenAiProvider {
    /// Creates a provider from the `[upstream]` configuration section.
    pub fn new(config: &UpstreamConfig) -> Result<Self, GuardianError> {
        let api_key = resolve_api_key(&config.api_key)?;

        let client = CompletionClient::new(ClientSettings {
            api_url: config.api_url.clone(),
            api_key,
            max_attempts: config.max_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        })?;

        info!(
            model = config.model.as_str(),
            api_url = config.api_url.as_str(),
            "completion provider initialized"
        );

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stream_buffer: config.stream_buffer,
        })
    }

    /// Builds the request body: system prompt, history in order, new message last.
    pub fn build_request(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
    ) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::new(Role::System, system_prompt));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::new(Role::User, user_message));

        ChatRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, GuardianError> {
        // No request is made: a health request would consume tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GuardianError> {
        debug!("completion provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<DeltaStream, GuardianError> {
        let request = self.build_request(system_prompt, history, user_message);
        let response = self.client.open_stream(&request).await?;
        Ok(Box::pin(sse::spawn_delta_reader(
            response,
            self.stream_buffer,
        )))
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, GuardianError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        GuardianError::Config(
            "API key not found. Set upstream.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}
