// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Game logic for Guardian.
//!
//! The [`Orchestrator`] is the central coordinator that:
//! - Validates a turn against game policy
//! - Streams the upstream reply out as ordered events
//! - Detects leaked secrets with the [`SecretMatcher`]
//! - Applies the long-play bonus rules

pub mod bonus;
pub mod matcher;
pub mod orchestrator;
pub mod prompt;

pub use bonus::{BonusDecision, BonusInputs};
pub use matcher::{MatchMethod, SecretMatch, SecretMatcher};
pub use orchestrator::{BonusResolution, EventStream, GameRules, Orchestrator, TurnRequest};
pub use prompt::load_system_prompt;
