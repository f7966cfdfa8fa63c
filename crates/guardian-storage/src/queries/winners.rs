// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Winner recording and leaderboard queries.

use std::str::FromStr;

use guardian_core::GuardianError;
use guardian_core::types::{SecretTier, WinnerAward, WinnerDraft, WinnerRecord};
use rusqlite::{TransactionBehavior, params};
use tracing::info;

use crate::database::{Database, map_tr_err};
use crate::queries::now_timestamp;

/// Record a winner as one IMMEDIATE transaction.
///
/// Reads the tier counter, refuses a grand winner once `grand_cap` is reached,
/// assigns the first-winner flag, bumps the counter and inserts the row.
/// Concurrent callers are serialized by the single writer thread and the
/// write lock taken at `BEGIN IMMEDIATE`.
pub async fn record_winner(
    db: &Database,
    draft: WinnerDraft,
    grand_cap: u32,
) -> Result<WinnerAward, GuardianError> {
    let created_at = now_timestamp();
    let award = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let tier = draft.tier.to_string();

            let (first_claimed, winner_count): (bool, u32) = tx.query_row(
                "SELECT first_claimed, winner_count FROM prize_counters WHERE tier = ?1",
                params![tier],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            if draft.tier == SecretTier::Grand && winner_count >= grand_cap {
                tx.commit()?;
                return Ok(WinnerAward::CapReached);
            }

            let is_first_winner = !first_claimed;
            tx.execute(
                "UPDATE prize_counters
                 SET first_claimed = 1, winner_count = winner_count + 1
                 WHERE tier = ?1",
                params![tier],
            )?;
            tx.execute(
                "INSERT INTO winners
                 (nickname, conversation_id, tier, is_first_winner, secret, reward, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    draft.nickname,
                    draft.conversation_id,
                    tier,
                    is_first_winner,
                    draft.secret,
                    draft.reward,
                    created_at,
                ],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;

            Ok(WinnerAward::Recorded(WinnerRecord {
                id,
                nickname: draft.nickname,
                conversation_id: draft.conversation_id,
                tier: draft.tier,
                is_first_winner,
                secret: draft.secret,
                reward: draft.reward,
                created_at,
            }))
        })
        .await
        .map_err(map_tr_err)?;

    if let WinnerAward::Recorded(record) = &award {
        info!(
            tier = %record.tier,
            conversation_id = record.conversation_id.as_str(),
            category = record.category().as_str(),
            "winner recorded"
        );
    }
    Ok(award)
}

/// Number of grand winners recorded so far.
pub async fn grand_winner_count(db: &Database) -> Result<u32, GuardianError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                "SELECT winner_count FROM prize_counters WHERE tier = 'grand'",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent winners first.
pub async fn list_winners(db: &Database, limit: usize) -> Result<Vec<WinnerRecord>, GuardianError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, nickname, conversation_id, tier, is_first_winner, secret, reward, created_at
                 FROM winners ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                let tier: String = row.get(3)?;
                let tier = SecretTier::from_str(&tier).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(WinnerRecord {
                    id: row.get(0)?,
                    nickname: row.get(1)?,
                    conversation_id: row.get(2)?,
                    tier,
                    is_first_winner: row.get(4)?,
                    secret: row.get(5)?,
                    reward: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
