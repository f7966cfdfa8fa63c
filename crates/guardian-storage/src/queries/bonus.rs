// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user bonus state.

use std::str::FromStr;

use guardian_core::GuardianError;
use guardian_core::types::BonusState;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::now_timestamp;

/// Current bonus state; users without a row are in [`BonusState::None`].
pub async fn bonus_state(db: &Database, user_id: &str) -> Result<BonusState, GuardianError> {
    let user_id = user_id.to_string();
    let stored: Option<String> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT state FROM bonus_status WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    match stored {
        Some(state) => BonusState::from_str(&state).map_err(|e| GuardianError::Storage {
            source: Box::new(e),
        }),
        None => Ok(BonusState::None),
    }
}

/// Upsert a user's bonus state.
pub async fn set_bonus_state(
    db: &Database,
    user_id: &str,
    state: BonusState,
) -> Result<(), GuardianError> {
    let user_id = user_id.to_string();
    let updated_at = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bonus_status (user_id, state, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id) DO UPDATE SET state = excluded.state,
                                                     updated_at = excluded.updated_at",
                params![user_id, state.to_string(), updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_starts_at_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert_eq!(bonus_state(&db, "u1").await.unwrap(), BonusState::None);
    }

    #[tokio::test]
    async fn state_is_upserted() {
        let db = Database::open_in_memory().await.unwrap();
        set_bonus_state(&db, "u1", BonusState::Offered).await.unwrap();
        set_bonus_state(&db, "u1", BonusState::ClaimedConsolation)
            .await
            .unwrap();
        assert_eq!(
            bonus_state(&db, "u1").await.unwrap(),
            BonusState::ClaimedConsolation
        );
        assert_eq!(bonus_state(&db, "u2").await.unwrap(), BonusState::None);
    }
}
