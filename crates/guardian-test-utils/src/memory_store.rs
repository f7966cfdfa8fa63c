// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence gateway.
//!
//! `MemoryStore` implements `GameStore` behind a single mutex, which makes
//! every operation (winner recording included) atomic with respect to all
//! others.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use guardian_core::traits::adapter::PluginAdapter;
use guardian_core::traits::store::GameStore;
use guardian_core::types::{
    AdapterType, BonusState, Conversation, ConversationOutcome, ConversationSummary,
    HealthStatus, Message, Player, Role, SecretTier, WinnerAward, WinnerDraft, WinnerRecord,
};
use guardian_core::GuardianError;

#[derive(Default)]
struct State {
    conversations: HashMap<String, Conversation>,
    /// Conversation ids in creation order.
    created: Vec<String>,
    winners: Vec<WinnerRecord>,
    first_claimed: HashSet<SecretTier>,
    grand_winners: u32,
    bonus: HashMap<String, BonusState>,
}

/// A `GameStore` kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_winner_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `record_winner` call fail with a storage error.
    pub fn fail_winner_writes(&self, fail: bool) {
        self.fail_winner_writes.store(fail, Ordering::SeqCst);
    }
}

fn storage_error(message: &str) -> GuardianError {
    GuardianError::Storage {
        source: message.to_string().into(),
    }
}

fn now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, GuardianError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), GuardianError> {
        Ok(())
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn initialize(&self) -> Result<(), GuardianError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), GuardianError> {
        Ok(())
    }

    async fn create_conversation(
        &self,
        player: &Player,
        max_turns: u32,
    ) -> Result<Conversation, GuardianError> {
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: player.id.clone(),
            nickname: player.nickname.clone(),
            messages: Vec::new(),
            turn_count: 0,
            max_turns,
            is_active: true,
            is_success: false,
            found_secret: None,
            created_at: now(),
        };
        let mut state = self.state.lock().await;
        state.created.push(conversation.id.clone());
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, GuardianError> {
        Ok(self.state.lock().await.conversations.get(id).cloned())
    }

    async fn list_conversations(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>, GuardianError> {
        let state = self.state.lock().await;
        Ok(state
            .created
            .iter()
            .rev()
            .filter_map(|id| state.conversations.get(id))
            .filter(|c| c.user_id == user_id)
            .take(limit)
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                nickname: c.nickname.clone(),
                turn_count: c.turn_count,
                max_turns: c.max_turns,
                is_active: c.is_active,
                is_success: c.is_success,
                found_secret: c.found_secret.clone(),
                last_message: c.messages.last().map(|m| m.content.clone()),
                created_at: c.created_at.clone(),
            })
            .collect())
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<u32, GuardianError> {
        if role == Role::System {
            return Err(GuardianError::Internal(
                "system messages are not persisted".into(),
            ));
        }
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| storage_error("conversation does not exist"))?;
        conversation.messages.push(Message::new(role, content));
        if role == Role::User {
            conversation.turn_count += 1;
        }
        Ok(conversation.turn_count)
    }

    async fn end_conversation(
        &self,
        conversation_id: &str,
        outcome: ConversationOutcome,
    ) -> Result<bool, GuardianError> {
        let mut state = self.state.lock().await;
        let Some(conversation) = state.conversations.get_mut(conversation_id) else {
            return Ok(false);
        };
        if !conversation.is_active {
            return Ok(false);
        }
        conversation.is_active = false;
        if let ConversationOutcome::Success { secret } = outcome {
            conversation.is_success = true;
            conversation.found_secret = Some(secret);
        }
        Ok(true)
    }

    async fn record_winner(
        &self,
        draft: WinnerDraft,
        grand_cap: u32,
    ) -> Result<WinnerAward, GuardianError> {
        if self.fail_winner_writes.load(Ordering::SeqCst) {
            return Err(storage_error("winner writes are failing"));
        }
        let mut state = self.state.lock().await;
        if draft.tier == SecretTier::Grand {
            if state.grand_winners >= grand_cap {
                return Ok(WinnerAward::CapReached);
            }
            state.grand_winners += 1;
        }
        let is_first_winner = state.first_claimed.insert(draft.tier);
        let record = WinnerRecord {
            id: state.winners.len() as i64 + 1,
            nickname: draft.nickname,
            conversation_id: draft.conversation_id,
            tier: draft.tier,
            is_first_winner,
            secret: draft.secret,
            reward: draft.reward,
            created_at: now(),
        };
        state.winners.push(record.clone());
        Ok(WinnerAward::Recorded(record))
    }

    async fn user_total_turns(&self, user_id: &str) -> Result<u32, GuardianError> {
        Ok(self
            .state
            .lock()
            .await
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.turn_count)
            .sum())
    }

    async fn bonus_state(&self, user_id: &str) -> Result<BonusState, GuardianError> {
        Ok(self
            .state
            .lock()
            .await
            .bonus
            .get(user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn set_bonus_state(
        &self,
        user_id: &str,
        state: BonusState,
    ) -> Result<(), GuardianError> {
        self.state
            .lock()
            .await
            .bonus
            .insert(user_id.to_string(), state);
        Ok(())
    }

    async fn grand_winner_count(&self) -> Result<u32, GuardianError> {
        Ok(self.state.lock().await.grand_winners)
    }

    async fn list_winners(&self, limit: usize) -> Result<Vec<WinnerRecord>, GuardianError> {
        Ok(self
            .state
            .lock()
            .await
            .winners
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn draft(tier: SecretTier, nickname: &str) -> WinnerDraft {
        WinnerDraft {
            nickname: nickname.into(),
            conversation_id: "c".into(),
            tier,
            secret: "s".into(),
            reward: "r".into(),
        }
    }

    #[tokio::test]
    async fn turns_count_user_messages_only() {
        let store = MemoryStore::new();
        let conv = store
            .create_conversation(&Player::new("u1", "n"), 5)
            .await
            .unwrap();
        store
            .append_message(&conv.id, Role::Assistant, "hello")
            .await
            .unwrap();
        assert_eq!(
            store.append_message(&conv.id, Role::User, "hi").await.unwrap(),
            1
        );
        assert_eq!(store.user_total_turns("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ended_conversation_is_not_ended_twice() {
        let store = MemoryStore::new();
        let conv = store
            .create_conversation(&Player::new("u1", "n"), 5)
            .await
            .unwrap();
        assert!(store
            .end_conversation(&conv.id, ConversationOutcome::Limit)
            .await
            .unwrap());
        assert!(!store
            .end_conversation(
                &conv.id,
                ConversationOutcome::Success {
                    secret: "s".into()
                }
            )
            .await
            .unwrap());
        let conv = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert!(!conv.is_success);
    }

    #[tokio::test]
    async fn conversations_are_listed_newest_first() {
        let store = MemoryStore::new();
        let player = Player::new("u1", "n");
        let first = store.create_conversation(&player, 5).await.unwrap();
        let second = store.create_conversation(&player, 5).await.unwrap();
        store
            .create_conversation(&Player::new("u2", "m"), 5)
            .await
            .unwrap();
        store
            .append_message(&first.id, Role::User, "hello there")
            .await
            .unwrap();

        let listed = store.list_conversations("u1", 10).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, [second.id.as_str(), first.id.as_str()]);
        assert_eq!(listed[1].last_message.as_deref(), Some("hello there"));
        assert_eq!(listed[1].turn_count, 1);

        assert_eq!(store.list_conversations("u1", 1).await.unwrap().len(), 1);
        assert!(store.list_conversations("u3", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_grand_grants_respect_cap() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .record_winner(draft(SecretTier::Grand, &format!("p{i}")), 3)
                    .await
                    .unwrap()
            }));
        }
        let mut firsts = 0;
        let mut recorded = 0;
        for handle in handles {
            if let WinnerAward::Recorded(record) = handle.await.unwrap() {
                recorded += 1;
                if record.is_first_winner {
                    firsts += 1;
                }
            }
        }
        assert_eq!(recorded, 3);
        assert_eq!(firsts, 1);
        assert_eq!(store.grand_winner_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failing_winner_writes() {
        let store = MemoryStore::new();
        store.fail_winner_writes(true);
        assert!(store
            .record_winner(draft(SecretTier::Consolation, "n"), 1)
            .await
            .is_err());
    }
}
