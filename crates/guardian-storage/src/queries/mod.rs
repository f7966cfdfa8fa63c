// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the game tables.

pub mod bonus;
pub mod conversations;
pub mod messages;
pub mod winners;

/// Current UTC time in the ISO 8601 form stored in every timestamp column.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
