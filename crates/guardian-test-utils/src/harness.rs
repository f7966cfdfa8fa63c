// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles an [`Orchestrator`] with a scripted provider and
//! either the in-memory store or a temp SQLite database. Provides
//! `play_turn()` to drive one full turn and collect its events.

use std::sync::Arc;

use futures::StreamExt;
use guardian_config::model::{GameConfig, PrizesConfig, SecretConfig, StorageConfig};
use guardian_core::types::{Conversation, Player, StreamEvent};
use guardian_core::{GameStore, GuardianError, TurnError};
use guardian_game::{Orchestrator, TurnRequest};
use guardian_storage::SqliteStore;

use crate::memory_store::MemoryStore;
use crate::mock_provider::{MockProvider, Script};

/// Grand secret used by [`test_game_config`].
pub const GRAND_PHRASE: &str = "Orchid Tech wishes you good health";
/// Consolation secret used by [`test_game_config`].
pub const CONSOLATION_PHRASE: &str = "lucky clover every day";

/// Game configuration with both secrets set and the bonus disabled.
pub fn test_game_config() -> GameConfig {
    GameConfig {
        grand: SecretConfig {
            phrase: GRAND_PHRASE.to_string(),
            keywords: vec!["Orchid Tech".into(), "good health".into()],
            label: "Grand prize".to_string(),
            reward: "100 credits".to_string(),
        },
        consolation: SecretConfig {
            phrase: CONSOLATION_PHRASE.to_string(),
            keywords: vec!["lucky clover".into()],
            label: "Consolation prize".to_string(),
            reward: "10 credits".to_string(),
        },
        ..GameConfig::default()
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    scripts: Vec<Script>,
    game: GameConfig,
    system_prompt: String,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            scripts: Vec::new(),
            game: test_game_config(),
            system_prompt: "You are a test guardian.".to_string(),
            sqlite: false,
        }
    }

    /// Set the provider scripts, one per turn.
    pub fn with_scripts(mut self, scripts: Vec<Script>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.game.max_turns = max_turns;
        self
    }

    /// Enable the long-play bonus.
    pub fn with_bonus(mut self, consolation_threshold: u32, grand_threshold: u32) -> Self {
        self.game.bonus_consolation_threshold = consolation_threshold;
        self.game.bonus_grand_threshold = grand_threshold;
        self
    }

    pub fn with_grand_cap(mut self, grand_count: u32) -> Self {
        self.game.prizes = PrizesConfig { grand_count };
        self
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.game.max_message_length = max;
        self
    }

    /// Use a SQLite database in a temp directory instead of [`MemoryStore`].
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Build the test harness.
    pub async fn build(self) -> Result<TestHarness, GuardianError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| GuardianError::Storage { source: e.into() })?;

        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn GameStore> = if self.sqlite {
            let db_path = temp_dir.path().join("test.db");
            let sqlite = SqliteStore::new(StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            });
            sqlite.initialize().await?;
            Arc::new(sqlite) as Arc<dyn GameStore>
        } else {
            memory.clone() as Arc<dyn GameStore>
        };

        let provider = Arc::new(MockProvider::with_scripts(self.scripts));
        let orchestrator = Orchestrator::new(
            provider.clone(),
            store.clone(),
            &self.game,
            self.system_prompt,
        );

        Ok(TestHarness {
            orchestrator,
            provider,
            store,
            memory,
            game: self.game,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and a fresh store.
pub struct TestHarness {
    pub orchestrator: Orchestrator,
    /// The scripted provider.
    pub provider: Arc<MockProvider>,
    /// The store the orchestrator writes to.
    pub store: Arc<dyn GameStore>,
    /// The in-memory store; only wired in when SQLite is not used.
    pub memory: Arc<MemoryStore>,
    pub game: GameConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The default test player.
    pub fn player() -> Player {
        Player::new("user-1", "Tester")
    }

    /// Starts a conversation for [`TestHarness::player`].
    pub async fn start(&self) -> Result<Conversation, TurnError> {
        self.orchestrator.start_conversation(&Self::player()).await
    }

    /// Runs one turn and collects every event up to and including `Done`.
    pub async fn play_turn(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<Vec<StreamEvent>, TurnError> {
        let stream = self
            .orchestrator
            .send_message(&Self::player(), TurnRequest::new(conversation_id, message))
            .await?;
        Ok(stream.collect().await)
    }

    /// Loads a conversation straight from the store.
    pub async fn conversation(&self, id: &str) -> Conversation {
        self.store
            .get_conversation(id)
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("conversation {id} should exist"))
    }
}
