// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the GameStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use guardian_config::model::StorageConfig;
use guardian_core::types::{
    BonusState, Conversation, ConversationOutcome, ConversationSummary, Player, Role, WinnerAward,
    WinnerDraft, WinnerRecord,
};
use guardian_core::{AdapterType, GameStore, GuardianError, HealthStatus, PluginAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed persistence gateway.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`GameStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, GuardianError> {
        self.db.get().ok_or_else(|| GuardianError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, GuardianError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GuardianError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl GameStore for SqliteStore {
    async fn initialize(&self) -> Result<(), GuardianError> {
        let path = self.config.database_path.as_str();
        let wal_mode = self.config.wal_mode;
        self.db
            .get_or_try_init(|| Database::open(path, wal_mode))
            .await?;
        debug!(path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), GuardianError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Conversations ---

    async fn create_conversation(
        &self,
        player: &Player,
        max_turns: u32,
    ) -> Result<Conversation, GuardianError> {
        queries::conversations::create_conversation(self.db()?, player, max_turns).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, GuardianError> {
        queries::conversations::get_conversation(self.db()?, id).await
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, GuardianError> {
        queries::conversations::list_conversations(self.db()?, user_id, limit).await
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<u32, GuardianError> {
        queries::messages::append_message(self.db()?, conversation_id, role, content).await
    }

    async fn end_conversation(
        &self,
        conversation_id: &str,
        outcome: ConversationOutcome,
    ) -> Result<bool, GuardianError> {
        queries::conversations::end_conversation(self.db()?, conversation_id, outcome).await
    }

    async fn user_total_turns(&self, user_id: &str) -> Result<u32, GuardianError> {
        queries::conversations::user_total_turns(self.db()?, user_id).await
    }

    // --- Winners ---

    async fn record_winner(
        &self,
        draft: WinnerDraft,
        grand_cap: u32,
    ) -> Result<WinnerAward, GuardianError> {
        queries::winners::record_winner(self.db()?, draft, grand_cap).await
    }

    async fn grand_winner_count(&self) -> Result<u32, GuardianError> {
        queries::winners::grand_winner_count(self.db()?).await
    }

    async fn list_winners(&self, limit: usize) -> Result<Vec<WinnerRecord>, GuardianError> {
        queries::winners::list_winners(self.db()?, limit).await
    }

    // --- Bonus ---

    async fn bonus_state(&self, user_id: &str) -> Result<BonusState, GuardianError> {
        queries::bonus::bonus_state(self.db()?, user_id).await
    }

    async fn set_bonus_state(
        &self,
        user_id: &str,
        state: BonusState,
    ) -> Result<(), GuardianError> {
        queries::bonus::set_bonus_state(self.db()?, user_id, state).await
    }
}
