// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Guardian game.
//!
//! [`GuardianError`] covers failures of the machinery (upstream, storage,
//! configuration). [`Rejection`] covers policy decisions taken before any
//! upstream call; it is an expected outcome, not a fault.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Guardian adapter traits and core operations.
#[derive(Debug, Error)]
pub enum GuardianError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Upstream provider errors that are not tied to an HTTP status
    /// (client construction, connection failure, body read failure).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The upstream answered with a status that is never retried (4xx and
    /// other non-5xx statuses).
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Every attempt failed with a transient error; carries the last cause.
    #[error("upstream request failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        source: Box<GuardianError>,
    },

    /// The delta stream broke after it had started.
    #[error("stream error: {message}")]
    Stream { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GuardianError {
    /// Returns true when retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GuardianError::Provider { .. } | GuardianError::Timeout { .. } => true,
            GuardianError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A turn or conversation request refused by game policy.
///
/// Rejections are raised before any upstream call and leave no trace in
/// storage, except [`Rejection::TurnLimitReached`] which also ends the
/// conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("conversation not found")]
    ConversationNotFound,

    #[error("conversation belongs to another user")]
    NotOwner,

    #[error("conversation has ended")]
    ConversationInactive,

    #[error("maximum of {max} turns reached")]
    TurnLimitReached { max: u32 },

    #[error("message is {actual} characters long, the limit is {max}")]
    MessageTooLong { max: usize, actual: usize },

    /// The user already holds a secret and may not start new conversations.
    #[error("a secret has already been claimed by this user")]
    BonusClaimed,

    #[error("no bonus offer is pending")]
    NoPendingOffer,

    #[error("unknown bonus choice `{0}`")]
    InvalidChoice(String),
}

/// Failure of an orchestrator entry point: either a policy rejection or a
/// machinery error.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Failed(#[from] GuardianError),
}
