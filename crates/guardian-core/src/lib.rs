// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Guardian secret-keeping game.
//!
//! This crate provides the trait definitions, error types, and domain types
//! shared by the provider client, the persistence gateway and the game
//! orchestrator.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{GuardianError, Rejection, TurnError};
pub use traits::provider::DeltaStream;
pub use traits::{CompletionProvider, GameStore, PluginAdapter};
pub use types::{
    AdapterType, BonusChoice, BonusState, Conversation, ConversationOutcome, ConversationPhase,
    ConversationSummary, HealthStatus, Message, Player, Role, SecretSpec, SecretTier, StreamDelta,
    StreamEvent, WinnerAward, WinnerDraft, WinnerRecord,
};
