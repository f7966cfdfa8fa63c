// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements run on tokio-rusqlite's single background thread, so the
//! [`Database`] handle is the one writer. Do NOT open additional connections
//! for writes: `record_winner` relies on this serialization together with an
//! IMMEDIATE transaction.

use std::path::Path;

use guardian_core::GuardianError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations::run_migrations;

/// Milliseconds SQLite waits on a locked database before failing.
const BUSY_TIMEOUT_MS: i64 = 5000;

/// Handle to the game database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs
    /// and runs pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, GuardianError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GuardianError::Storage {
                    source: Box::new(e),
                })?;
        }

        let conn = Connection::open(path)
            .await
            .map_err(|e| GuardianError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, GuardianError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| GuardianError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    /// The connection every query goes through.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Truncates the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), GuardianError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), GuardianError> {
        self.conn
            .call(move |conn| -> Result<(), GuardianError> {
                apply_pragmas(conn, wal_mode).map_err(|e| GuardianError::Storage {
                    source: Box::new(e),
                })?;
                run_migrations(conn)
            })
            .await
            .map_err(|e| match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => GuardianError::Storage {
                    source: other.to_string().into(),
                },
            })
    }
}

fn apply_pragmas(conn: &rusqlite::Connection, wal_mode: bool) -> Result<(), rusqlite::Error> {
    if wal_mode {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = mode.as_str(), "journal mode set");
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)?;
    Ok(())
}

/// Maps a tokio-rusqlite call error into [`GuardianError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> GuardianError {
    GuardianError::Storage {
        source: Box::new(e),
    }
}
