// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion provider trait for the upstream chat-completion service.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::GuardianError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Message, StreamDelta};

/// A finite, forward-only sequence of upstream deltas.
///
/// Dropping the stream before it ends must release the underlying connection.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, GuardianError>> + Send>>;

/// Adapter for the upstream completion service.
#[async_trait]
pub trait CompletionProvider: PluginAdapter {
    /// Opens a streaming completion.
    ///
    /// The prompt sent upstream is `system_prompt`, then `history` in order,
    /// then `user_message`. Returns once the upstream accepted the request;
    /// errors after that point arrive as `Err` items on the stream.
    async fn stream_chat(
        &self,
        system_prompt: &str,
        history: &[Message],
        user_message: &str,
    ) -> Result<DeltaStream, GuardianError>;
}
