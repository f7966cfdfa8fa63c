// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence gateway trait.

use async_trait::async_trait;

use crate::error::GuardianError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    BonusState, Conversation, ConversationOutcome, ConversationSummary, Player, Role, WinnerAward,
    WinnerDraft, WinnerRecord,
};

/// Persistence gateway for conversations, winners and bonus progress.
///
/// Implementations must make [`GameStore::record_winner`] a single atomic
/// read-modify-write across all callers: the first-winner flag is handed out
/// once per tier and the grand count never exceeds the cap.
#[async_trait]
pub trait GameStore: PluginAdapter {
    /// Prepares the backend (migrations, connection). Idempotent.
    async fn initialize(&self) -> Result<(), GuardianError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), GuardianError>;

    /// Creates an active conversation with zero turns.
    async fn create_conversation(
        &self,
        player: &Player,
        max_turns: u32,
    ) -> Result<Conversation, GuardianError>;

    /// Loads a conversation with its messages in append order.
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, GuardianError>;

    /// A user's conversations, newest first.
    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, GuardianError>;

    /// Appends a message. A user message counts as one turn.
    ///
    /// Returns the conversation's turn count after the append.
    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<u32, GuardianError>;

    /// Ends an active conversation. Ended conversations are left untouched.
    ///
    /// Returns true when this call performed the transition.
    async fn end_conversation(
        &self,
        conversation_id: &str,
        outcome: ConversationOutcome,
    ) -> Result<bool, GuardianError>;

    /// Atomically records a winner, assigning the first-winner flag.
    ///
    /// For the grand tier nothing is written once `grand_cap` winners exist.
    async fn record_winner(
        &self,
        draft: WinnerDraft,
        grand_cap: u32,
    ) -> Result<WinnerAward, GuardianError>;

    /// Sum of turn counts over all of the user's conversations.
    async fn user_total_turns(&self, user_id: &str) -> Result<u32, GuardianError>;

    async fn bonus_state(&self, user_id: &str) -> Result<BonusState, GuardianError>;

    async fn set_bonus_state(&self, user_id: &str, state: BonusState)
    -> Result<(), GuardianError>;

    async fn grand_winner_count(&self) -> Result<u32, GuardianError>;

    /// Most recent winners first.
    async fn list_winners(&self, limit: usize) -> Result<Vec<WinnerRecord>, GuardianError>;
}
