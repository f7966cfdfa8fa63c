// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the orchestrator, the provider client and the
//! persistence gateway.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`PluginAdapter`](crate::PluginAdapter).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
}

/// Author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Only used when assembling the upstream prompt; never persisted.
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The authenticated player on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub nickname: String,
}

impl Player {
    pub fn new(id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
        }
    }
}

/// Lifecycle phase of a conversation. Both ended phases are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConversationPhase {
    Active,
    EndedSuccess,
    EndedLimit,
}

impl ConversationPhase {
    fn from_flags(is_active: bool, is_success: bool) -> Self {
        match (is_active, is_success) {
            (true, _) => ConversationPhase::Active,
            (false, true) => ConversationPhase::EndedSuccess,
            (false, false) => ConversationPhase::EndedLimit,
        }
    }
}

/// How a conversation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// A secret was disclosed, either leaked or granted.
    Success { secret: String },
    /// The turn limit was reached without a secret.
    Limit,
}

/// A conversation between one player and the guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub nickname: String,
    /// Messages in append order.
    pub messages: Vec<Message>,
    /// Number of user messages appended so far. Never decreases.
    pub turn_count: u32,
    pub max_turns: u32,
    pub is_active: bool,
    pub is_success: bool,
    pub found_secret: Option<String>,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

impl Conversation {
    pub fn is_owned_by(&self, player: &Player) -> bool {
        self.user_id == player.id
    }

    pub fn phase(&self) -> ConversationPhase {
        ConversationPhase::from_flags(self.is_active, self.is_success)
    }

    pub fn turns_exhausted(&self) -> bool {
        self.turn_count >= self.max_turns
    }
}

/// One row of a player's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub nickname: String,
    pub turn_count: u32,
    pub max_turns: u32,
    pub is_active: bool,
    pub is_success: bool,
    pub found_secret: Option<String>,
    /// Content of the most recent message, if any.
    pub last_message: Option<String>,
    pub created_at: String,
}

impl ConversationSummary {
    pub fn phase(&self) -> ConversationPhase {
        ConversationPhase::from_flags(self.is_active, self.is_success)
    }
}

/// Reward tier of a secret. Grand always outranks consolation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SecretTier {
    Grand,
    Consolation,
}

impl SecretTier {
    /// Bonus state a user lands in after receiving this tier.
    pub fn claimed_state(self) -> BonusState {
        match self {
            SecretTier::Grand => BonusState::ClaimedGrand,
            SecretTier::Consolation => BonusState::ClaimedConsolation,
        }
    }
}

/// One of the two guarded secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    /// Canonical phrase, reported verbatim on any match.
    pub phrase: String,
    /// Fragments that, all present together, count as a paraphrased leak.
    pub keywords: Vec<String>,
    pub tier: SecretTier,
    /// Human-readable prize name.
    pub label: String,
    /// Reward descriptor, e.g. "100 CNY".
    pub reward: String,
}

/// Per-user progress through the long-play bonus.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BonusState {
    #[default]
    None,
    Offered,
    Continued,
    ClaimedConsolation,
    ClaimedGrand,
}

impl BonusState {
    /// Claimed states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, BonusState::ClaimedConsolation | BonusState::ClaimedGrand)
    }
}

/// The player's answer to a bonus offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BonusChoice {
    /// Take the consolation secret now.
    Claim,
    /// Decline and keep playing for the grand secret.
    Continue,
}

/// A winner about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerDraft {
    pub nickname: String,
    pub conversation_id: String,
    pub tier: SecretTier,
    pub secret: String,
    pub reward: String,
}

/// A recorded winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub id: i64,
    pub nickname: String,
    pub conversation_id: String,
    pub tier: SecretTier,
    /// True for the first winner ever recorded for this tier.
    pub is_first_winner: bool,
    pub secret: String,
    pub reward: String,
    /// ISO 8601 timestamp.
    pub created_at: String,
}

impl WinnerRecord {
    /// Leaderboard category, e.g. `grand-first`.
    pub fn category(&self) -> String {
        let rank = if self.is_first_winner {
            "first"
        } else {
            "subsequent"
        };
        format!("{}-{rank}", self.tier)
    }
}

/// Result of an atomic winner recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WinnerAward {
    Recorded(WinnerRecord),
    /// The grand prize cap was already reached; nothing was written.
    CapReached,
}

/// One item of the upstream delta sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelta {
    /// A non-empty text fragment.
    Text(String),
    /// The upstream signalled completion.
    Finished { reason: Option<String> },
}

/// Events emitted by one orchestration run, in order.
///
/// The JSON form uses a `type` discriminator and camelCase fields; `Done` is
/// written as the bare `[DONE]` sentinel (see [`StreamEvent::to_wire`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Content {
        content: String,
    },
    #[serde(rename = "password_found")]
    SecretFound {
        #[serde(rename = "password")]
        secret: String,
        tier: SecretTier,
        #[serde(rename = "prizeType")]
        label: String,
        /// `None` when the grand cap was exhausted and no prize was recorded.
        #[serde(rename = "prizeAmount", default, skip_serializing_if = "Option::is_none")]
        reward: Option<String>,
        is_first_winner: bool,
    },
    BonusOffer {
        total_turns: u32,
        #[serde(rename = "consolationPassword")]
        consolation_secret: String,
        #[serde(rename = "consolationPrizeAmount")]
        consolation_reward: String,
        #[serde(rename = "grandAvailable")]
        grand_still_available: bool,
    },
    Error {
        #[serde(rename = "content")]
        message: String,
    },
    Done,
}

/// Sentinel written after the last event of a run.
pub const DONE_SENTINEL: &str = "[DONE]";

impl StreamEvent {
    /// Encodes the event as the payload of one transport frame.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            StreamEvent::Done => Ok(DONE_SENTINEL.to_string()),
            other => serde_json::to_string(other),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn bonus_state_string_forms() {
        assert_eq!(BonusState::ClaimedConsolation.to_string(), "claimed_consolation");
        assert_eq!(BonusState::from_str("continued").unwrap(), BonusState::Continued);
        assert_eq!(BonusState::default(), BonusState::None);
    }

    #[test]
    fn only_claimed_states_are_terminal() {
        assert!(BonusState::ClaimedGrand.is_terminal());
        assert!(BonusState::ClaimedConsolation.is_terminal());
        assert!(!BonusState::Offered.is_terminal());
        assert!(!BonusState::Continued.is_terminal());
        assert!(!BonusState::None.is_terminal());
    }

    #[test]
    fn bonus_choice_parses_lowercase() {
        assert_eq!(BonusChoice::from_str("claim").unwrap(), BonusChoice::Claim);
        assert_eq!(BonusChoice::from_str("continue").unwrap(), BonusChoice::Continue);
        assert!(BonusChoice::from_str("maybe").is_err());
    }

    #[test]
    fn conversation_phase_follows_flags() {
        let mut conv = Conversation {
            id: "c1".into(),
            user_id: "u1".into(),
            nickname: "nick".into(),
            messages: vec![],
            turn_count: 0,
            max_turns: 20,
            is_active: true,
            is_success: false,
            found_secret: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert_eq!(conv.phase(), ConversationPhase::Active);
        conv.is_active = false;
        assert_eq!(conv.phase(), ConversationPhase::EndedLimit);
        conv.is_success = true;
        assert_eq!(conv.phase(), ConversationPhase::EndedSuccess);
        assert_eq!(conv.phase().to_string(), "ended-success");
    }

    #[test]
    fn winner_category_combines_tier_and_rank() {
        let record = WinnerRecord {
            id: 1,
            nickname: "n".into(),
            conversation_id: "c".into(),
            tier: SecretTier::Consolation,
            is_first_winner: true,
            secret: "s".into(),
            reward: "r".into(),
            created_at: "t".into(),
        };
        assert_eq!(record.category(), "consolation-first");
    }

    #[test]
    fn content_event_wire_form() {
        let event = StreamEvent::Content {
            content: "hi".into(),
        };
        assert_eq!(event.to_wire().unwrap(), r#"{"type":"content","content":"hi"}"#);
    }

    #[test]
    fn secret_found_wire_form_uses_camel_case() {
        let event = StreamEvent::SecretFound {
            secret: "open sesame".into(),
            tier: SecretTier::Grand,
            label: "Grand prize".into(),
            reward: Some("100".into()),
            is_first_winner: true,
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(value["type"], "password_found");
        assert_eq!(value["password"], "open sesame");
        assert_eq!(value["tier"], "grand");
        assert_eq!(value["prizeType"], "Grand prize");
        assert_eq!(value["prizeAmount"], "100");
        assert_eq!(value["isFirstWinner"], true);
    }

    #[test]
    fn bonus_offer_wire_form() {
        let event = StreamEvent::BonusOffer {
            total_turns: 55,
            consolation_secret: "lucky".into(),
            consolation_reward: "5".into(),
            grand_still_available: true,
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(value["type"], "bonus_offer");
        assert_eq!(value["totalTurns"], 55);
        assert_eq!(value["consolationPassword"], "lucky");
        assert_eq!(value["consolationPrizeAmount"], "5");
        assert_eq!(value["grandAvailable"], true);
    }

    #[test]
    fn error_event_carries_message_as_content() {
        let event = StreamEvent::Error {
            message: "upstream down".into(),
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_wire().unwrap()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["content"], "upstream down");
    }

    #[test]
    fn done_is_the_bare_sentinel() {
        assert_eq!(StreamEvent::Done.to_wire().unwrap(), "[DONE]");
        assert!(StreamEvent::Done.is_terminal());
    }
}
