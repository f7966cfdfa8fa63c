// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `guardian check`, `guardian winners` and `guardian conversations`
//! command implementations.

use colored::Colorize;
use guardian_config::GuardianConfig;
use guardian_config::model::StorageConfig;
use guardian_core::{ConversationSummary, GameStore, GuardianError, WinnerRecord};
use guardian_game::{SecretMatch, SecretMatcher};
use guardian_storage::SqliteStore;

/// Runs the matcher against the configured secrets and prints the verdict.
pub fn run_check(config: &GuardianConfig, text: &str) {
    let matcher = SecretMatcher::new(config.game.secrets());
    println!("{}", describe_match(matcher.check(text).as_ref()));
}

fn describe_match(found: Option<&SecretMatch>) -> String {
    match found {
        Some(m) => format!(
            "{} {} secret ({}), matched by {}",
            "leak:".red().bold(),
            m.tier,
            m.label,
            m.method
        ),
        None => format!("{} no secret detected", "ok:".green().bold()),
    }
}

/// Prints the most recent winners.
pub async fn run_winners(config: &GuardianConfig, limit: usize) -> Result<(), GuardianError> {
    let winners = fetch_winners(&config.storage, limit).await?;
    if winners.is_empty() {
        println!("{}", "no winners yet".dimmed());
        return Ok(());
    }
    for winner in &winners {
        println!("{}", format_winner(winner));
    }
    Ok(())
}

async fn fetch_winners(
    storage: &StorageConfig,
    limit: usize,
) -> Result<Vec<WinnerRecord>, GuardianError> {
    let store = SqliteStore::new(storage.clone());
    store.initialize().await?;
    let winners = store.list_winners(limit).await;
    store.close().await?;
    winners
}

fn format_winner(winner: &WinnerRecord) -> String {
    format!(
        "{}  {:<22} {:<20} {}",
        winner.created_at, winner.category(), winner.nickname, winner.reward
    )
}

/// Longest message preview shown per conversation, in characters.
const PREVIEW_CHARS: usize = 48;

/// Prints a player's conversations, newest first.
pub async fn run_conversations(
    config: &GuardianConfig,
    user_id: &str,
    limit: usize,
) -> Result<(), GuardianError> {
    let conversations = fetch_conversations(&config.storage, user_id, limit).await?;
    if conversations.is_empty() {
        println!("{}", format!("no conversations for {user_id}").dimmed());
        return Ok(());
    }
    for conversation in &conversations {
        println!("{}", format_conversation(conversation));
    }
    Ok(())
}

async fn fetch_conversations(
    storage: &StorageConfig,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ConversationSummary>, GuardianError> {
    let store = SqliteStore::new(storage.clone());
    store.initialize().await?;
    let conversations = store.list_conversations(user_id, limit).await;
    store.close().await?;
    conversations
}

pub(crate) fn format_conversation(conversation: &ConversationSummary) -> String {
    format!(
        "{}  {}  {:<13} {:>3}/{:<3} {}",
        conversation.created_at,
        conversation.id,
        conversation.phase().to_string(),
        conversation.turn_count,
        conversation.max_turns,
        preview(conversation.last_message.as_deref().unwrap_or_default()),
    )
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > PREVIEW_CHARS || line.len() < text.trim_end().len() {
        let cut: String = line.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use guardian_core::{ConversationOutcome, Player, Role, SecretTier, WinnerDraft};

    use super::*;

    fn storage_in(dir: &tempfile::TempDir) -> StorageConfig {
        StorageConfig {
            database_path: dir.path().join("winners.db").to_string_lossy().to_string(),
            wal_mode: true,
        }
    }

    #[test]
    fn no_match_is_reported_as_ok() {
        colored::control::set_override(false);
        assert_eq!(describe_match(None), "ok: no secret detected");
    }

    #[test]
    fn winner_line_shows_category_and_reward() {
        let winner = WinnerRecord {
            id: 1,
            nickname: "Ada".into(),
            conversation_id: "c-1".into(),
            tier: SecretTier::Grand,
            is_first_winner: true,
            secret: "s".into(),
            reward: "100 credits".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let line = format_winner(&winner);
        assert!(line.contains("grand-first"));
        assert!(line.contains("Ada"));
        assert!(line.ends_with("100 credits"));
    }

    #[tokio::test]
    async fn fetch_winners_on_fresh_database_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let winners = fetch_winners(&storage_in(&dir), 10).await.unwrap();
        assert!(winners.is_empty());
    }

    #[tokio::test]
    async fn fetch_winners_reads_recorded_rows() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);

        let store = SqliteStore::new(storage.clone());
        store.initialize().await.unwrap();
        let conversation = store
            .create_conversation(&Player::new("u1", "Ada"), 20)
            .await
            .unwrap();
        store
            .record_winner(
                WinnerDraft {
                    nickname: "Ada".into(),
                    conversation_id: conversation.id.clone(),
                    tier: SecretTier::Consolation,
                    secret: "lucky clover".into(),
                    reward: "10 credits".into(),
                },
                1,
            )
            .await
            .unwrap();
        store.close().await.unwrap();

        let winners = fetch_winners(&storage, 10).await.unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].nickname, "Ada");
        assert!(winners[0].is_first_winner);
    }

    #[test]
    fn preview_keeps_first_line_and_truncates() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview("first\nsecond"), "first...");
        let long = "x".repeat(60);
        assert_eq!(preview(&long), format!("{}...", "x".repeat(48)));
        assert_eq!(preview(""), "");
    }

    #[test]
    fn conversation_line_shows_phase_and_turns() {
        let summary = ConversationSummary {
            id: "c-1".into(),
            nickname: "Ada".into(),
            turn_count: 4,
            max_turns: 20,
            is_active: false,
            is_success: true,
            found_secret: Some("lucky clover".into()),
            last_message: Some("well played".into()),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let line = format_conversation(&summary);
        assert!(line.contains("c-1"));
        assert!(line.contains("ended-success"));
        assert!(line.contains("4/20"));
        assert!(line.ends_with("well played"));
    }

    #[tokio::test]
    async fn fetch_conversations_lists_only_that_player() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&dir);

        let store = SqliteStore::new(storage.clone());
        store.initialize().await.unwrap();
        let ada = Player::new("u1", "Ada");
        let first = store.create_conversation(&ada, 20).await.unwrap();
        store
            .append_message(&first.id, Role::User, "hello guardian")
            .await
            .unwrap();
        store
            .end_conversation(&first.id, ConversationOutcome::Limit)
            .await
            .unwrap();
        let second = store.create_conversation(&ada, 20).await.unwrap();
        store
            .create_conversation(&Player::new("u2", "Bob"), 20)
            .await
            .unwrap();
        store.close().await.unwrap();

        let listed = fetch_conversations(&storage, "u1", 10).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, [second.id.as_str(), first.id.as_str()]);
        assert_eq!(listed[1].last_message.as_deref(), Some("hello guardian"));

        assert!(fetch_conversations(&storage, "nobody", 10)
            .await
            .unwrap()
            .is_empty());
    }
}
