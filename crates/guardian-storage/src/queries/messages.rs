// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message append and load.

use std::str::FromStr;

use guardian_core::GuardianError;
use guardian_core::types::{Message, Role};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::now_timestamp;

/// Append a message; a user message also counts one turn.
///
/// Both writes happen in one transaction. Returns the turn count afterwards.
pub async fn append_message(
    db: &Database,
    conversation_id: &str,
    role: Role,
    content: &str,
) -> Result<u32, GuardianError> {
    if role == Role::System {
        return Err(GuardianError::Internal(
            "system messages are not persisted".into(),
        ));
    }
    let conversation_id = conversation_id.to_string();
    let content = content.to_string();
    let created_at = now_timestamp();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, role.to_string(), content, created_at],
            )?;
            if role == Role::User {
                tx.execute(
                    "UPDATE conversations SET turn_count = turn_count + 1 WHERE id = ?1",
                    params![conversation_id],
                )?;
            }
            let turn_count: u32 = tx.query_row(
                "SELECT turn_count FROM conversations WHERE id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(turn_count)
        })
        .await
        .map_err(map_tr_err)
}

/// Load a conversation's messages in append order. Runs on the writer thread.
pub(crate) fn load_messages(
    conn: &rusqlite::Connection,
    conversation_id: &str,
) -> Result<Vec<Message>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT role, content FROM messages WHERE conversation_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        let role: String = row.get(0)?;
        let role = Role::from_str(&role).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Message {
            role,
            content: row.get(1)?,
        })
    })?;
    rows.collect()
}
