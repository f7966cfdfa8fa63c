// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion provider for deterministic testing.
//!
//! `MockProvider` implements `CompletionProvider` with scripted replies,
//! enabling fast, CI-runnable tests without external API calls.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_core::Stream;
use tokio::sync::Mutex;

use guardian_core::traits::adapter::PluginAdapter;
use guardian_core::traits::provider::CompletionProvider;
use guardian_core::types::{AdapterType, HealthStatus, Message, StreamDelta};
use guardian_core::{DeltaStream, GuardianError};

/// What the provider does for one `stream_chat` call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Streams the fragments, then finishes normally.
    Reply(Vec<String>),
    /// Streams the fragments, then fails with a stream error.
    FailAfter(Vec<String>),
    /// Refuses to start with the given HTTP status.
    Reject(u16),
    /// Streams the fragments, then never yields again.
    Hang(Vec<String>),
}

impl Script {
    /// A reply split into one fragment per word, spaces kept.
    pub fn words(text: &str) -> Self {
        Script::Reply(text.split_inclusive(' ').map(str::to_string).collect())
    }
}

/// Arguments of one recorded `stream_chat` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub history: Vec<Message>,
    pub user_message: String,
}

/// A mock provider that plays back scripted replies.
///
/// Scripts are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" reply is streamed.
pub struct MockProvider {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<RecordedCall>>,
    open_streams: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a new mock provider with an empty script queue.
    pub fn new() -> Self {
        Self::with_scripts(Vec::new())
    }

    /// Create a mock provider pre-loaded with the given scripts.
    pub fn with_scripts(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::from(scripts)),
            calls: Mutex::new(Vec::new()),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a script to the end of the queue.
    pub async fn push(&self, script: Script) {
        self.scripts.lock().await.push_back(script);
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Delta streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    async fn next_script(&self) -> Script {
        self.scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Script::Reply(vec!["mock response".to_string()]))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, GuardianError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GuardianError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<DeltaStream, GuardianError> {
        self.calls.lock().await.push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            history: history.to_vec(),
            user_message: user_message.to_string(),
        });

        let (fragments, tail, hang) = match self.next_script().await {
            Script::Reject(status) => {
                return Err(GuardianError::Upstream {
                    status,
                    body: "scripted rejection".to_string(),
                });
            }
            Script::Reply(fragments) => (
                fragments,
                Some(Ok(StreamDelta::Finished {
                    reason: Some("stop".to_string()),
                })),
                false,
            ),
            Script::FailAfter(fragments) => (
                fragments,
                Some(Err(GuardianError::Stream {
                    message: "scripted stream failure".to_string(),
                })),
                false,
            ),
            Script::Hang(fragments) => (fragments, None, true),
        };

        let mut items: VecDeque<Result<StreamDelta, GuardianError>> = fragments
            .into_iter()
            .map(|text| Ok(StreamDelta::Text(text)))
            .collect();
        items.extend(tail);

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(ScriptedStream {
            items,
            hang,
            open_streams: Arc::clone(&self.open_streams),
        }))
    }
}

struct ScriptedStream {
    items: VecDeque<Result<StreamDelta, GuardianError>>,
    hang: bool,
    open_streams: Arc<AtomicUsize>,
}

impl Stream for ScriptedStream {
    type Item = Result<StreamDelta, GuardianError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.items.pop_front() {
            Some(item) => Poll::Ready(Some(item)),
            None if self.hang => Poll::Pending,
            None => Poll::Ready(None),
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.open_streams.fetch_sub(1, Ordering::SeqCst);
    }
}
