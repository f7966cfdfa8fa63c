// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat-completions endpoints.
//!
//! Provides [`CompletionClient`] which handles request construction,
//! bearer authentication, timeouts, and retry of transient failures.

use std::time::Duration;

use guardian_core::GuardianError;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatRequest};

/// Connection and retry settings for [`CompletionClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: String,
    pub api_key: String,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// HTTP client for upstream completion requests.
///
/// A connection failure, a timeout or a 5xx status is retried after a fixed
/// delay; any other non-200 status fails at once.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    max_attempts: u32,
    retry_delay: Duration,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl CompletionClient {
    pub fn new(settings: ClientSettings) -> Result<Self, GuardianError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|e| GuardianError::Config(format!("invalid API key header value: {e}")))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .build()
            .map_err(|e| GuardianError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            api_url: settings.api_url,
            max_attempts: settings.max_attempts.max(1),
            retry_delay: settings.retry_delay,
            connect_timeout: settings.connect_timeout,
            read_timeout: settings.read_timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Sends a streaming request and returns the accepted (HTTP 200) response.
    ///
    /// The body has not been read yet; see [`crate::sse::spawn_delta_reader`].
    pub async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::Response, GuardianError> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                warn!(
                    attempt,
                    delay_ms = self.retry_delay.as_millis() as u64,
                    "retrying streaming request after transient error"
                );
                tokio::time::sleep(self.retry_delay).await;
            }

            match self.send_once(request, attempt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(attempt, error = %e, "transient upstream failure");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(GuardianError::RetryExhausted {
            attempts: self.max_attempts,
            source: Box::new(last_error.unwrap_or_else(|| {
                GuardianError::Internal("no attempt was made".into())
            })),
        })
    }

    async fn send_once(
        &self,
        request: &ChatRequest,
        attempt: u32,
    ) -> Result<reqwest::Response, GuardianError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        debug!(status = status.as_u16(), attempt, "streaming response received");

        if status == StatusCode::OK {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_err) => api_err.error.message,
            Err(_) => body,
        };
        Err(GuardianError::Upstream {
            status: status.as_u16(),
            body,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> GuardianError {
        if e.is_timeout() {
            let duration = if e.is_connect() {
                self.connect_timeout
            } else {
                self.read_timeout
            };
            return GuardianError::Timeout { duration };
        }
        GuardianError::Provider {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }
}
