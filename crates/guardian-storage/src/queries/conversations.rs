// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lifecycle queries.

use guardian_core::GuardianError;
use guardian_core::types::{Conversation, ConversationOutcome, ConversationSummary, Player};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::messages::load_messages;
use crate::queries::now_timestamp;

/// Insert a new active conversation with zero turns.
pub async fn create_conversation(
    db: &Database,
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
        created_at: now_timestamp(),
    };
    let row = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, nickname, max_turns, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![row.id, row.user_id, row.nickname, row.max_turns, row.created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(conversation)
}

/// Load a conversation and its messages.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, GuardianError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let conversation = conn
                .query_row(
                    "SELECT id, user_id, nickname, turn_count, max_turns, is_active,
                            is_success, found_secret, created_at
                     FROM conversations WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(Conversation {
                            id: row.get(0)?,
                            user_id: row.get(1)?,
                            nickname: row.get(2)?,
                            messages: Vec::new(),
                            turn_count: row.get(3)?,
                            max_turns: row.get(4)?,
                            is_active: row.get(5)?,
                            is_success: row.get(6)?,
                            found_secret: row.get(7)?,
                            created_at: row.get(8)?,
                        })
                    },
                )
                .optional()?;
            match conversation {
                Some(mut conversation) => {
                    conversation.messages = load_messages(conn, &conversation.id)?;
                    Ok(Some(conversation))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// A user's conversations, newest first, each with its latest message.
pub async fn list_conversations(
    db: &Database,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ConversationSummary>, GuardianError> {
    let user_id = user_id.to_string();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.nickname, c.turn_count, c.max_turns, c.is_active,
                        c.is_success, c.found_secret, c.created_at,
                        (SELECT m.content FROM messages m
                         WHERE m.conversation_id = c.id
                         ORDER BY m.id DESC LIMIT 1)
                 FROM conversations c
                 WHERE c.user_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user_id, limit], |row| {
                Ok(ConversationSummary {
                    id: row.get(0)?,
                    nickname: row.get(1)?,
                    turn_count: row.get(2)?,
                    max_turns: row.get(3)?,
                    is_active: row.get(4)?,
                    is_success: row.get(5)?,
                    found_secret: row.get(6)?,
                    created_at: row.get(7)?,
                    last_message: row.get(8)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// End a conversation if it is still active.
///
/// Returns true when this call made the transition.
pub async fn end_conversation(
    db: &Database,
    id: &str,
    outcome: ConversationOutcome,
) -> Result<bool, GuardianError> {
    let id = id.to_string();
    let (is_success, found_secret) = match outcome {
        ConversationOutcome::Success { secret } => (true, Some(secret)),
        ConversationOutcome::Limit => (false, None),
    };
    let ended_at = now_timestamp();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE conversations
                 SET is_active = 0, is_success = ?2, found_secret = ?3, ended_at = ?4
                 WHERE id = ?1 AND is_active = 1",
                params![id, is_success, found_secret, ended_at],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Sum of turn counts over all of a user's conversations.
pub async fn user_total_turns(db: &Database, user_id: &str) -> Result<u32, GuardianError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(turn_count), 0) FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}
