// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Guardian integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Scripted completion provider that records its calls
//! - [`MemoryStore`] - In-memory persistence gateway
//! - [`TestHarness`] - Orchestrator wired to both

pub mod harness;
pub mod memory_store;
pub mod mock_provider;

pub use harness::{CONSOLATION_PHRASE, GRAND_PHRASE, TestHarness, test_game_config};
pub use memory_store::MemoryStore;
pub use mock_provider::{MockProvider, RecordedCall, Script};
