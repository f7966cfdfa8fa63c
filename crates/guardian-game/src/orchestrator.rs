// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration.
//!
//! One [`Orchestrator::send_message`] call runs one turn on its own tokio
//! task: the user message is persisted, the upstream reply is streamed out
//! delta by delta while the [`SecretMatcher`] inspects the accumulated text,
//! and the bonus rules run once the reply completes without a leak.
//!
//! Events reach the caller through a bounded queue ([`EventStream`]). Every
//! run ends with [`StreamEvent::Done`]. Dropping the stream abandons the run
//! and, through the dropped delta stream, the upstream connection.

use std::collections::HashMap;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use guardian_config::model::GameConfig;
use guardian_core::types::{
    BonusChoice, BonusState, Conversation, ConversationOutcome, Message, Player, Role,
    SecretSpec, SecretTier, StreamDelta, StreamEvent, WinnerAward, WinnerDraft, WinnerRecord,
};
use guardian_core::{CompletionProvider, GameStore, GuardianError, Rejection, TurnError};
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::bonus::{self, BonusDecision, BonusInputs};
use crate::matcher::{SecretMatch, SecretMatcher};

/// Capacity of the per-turn event queue.
const EVENT_BUFFER: usize = 32;

const UPSTREAM_UNAVAILABLE: &str = "The AI service is temporarily unavailable, please try again later.";
const REPLY_FAILED: &str = "The AI response failed, please try again.";
const TURN_FAILED: &str = "Something went wrong while saving this turn, please try again.";

/// Game rules the orchestrator enforces, taken from the `[game]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub max_turns: u32,
    /// Limit in Unicode scalar values, not bytes.
    pub max_message_length: usize,
    pub greeting: String,
    pub consolation_threshold: u32,
    pub grand_threshold: u32,
    pub grand_cap: u32,
}

impl From<&GameConfig> for GameRules {
    fn from(game: &GameConfig) -> Self {
        Self {
            max_turns: game.max_turns,
            max_message_length: game.max_message_length,
            greeting: game.greeting.clone(),
            consolation_threshold: game.bonus_consolation_threshold,
            grand_threshold: game.bonus_grand_threshold,
            grand_cap: game.prizes.grand_count,
        }
    }
}

/// A user message addressed to one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub conversation_id: String,
    pub message: String,
    /// Uploaded image reference, already resolved to a URL by the caller.
    pub image_url: Option<String>,
}

impl TurnRequest {
    pub fn new(conversation_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message: message.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Text persisted and sent upstream: the image reference, if any, on its
    /// own first line.
    fn content(&self) -> String {
        match self.image_url.as_deref() {
            Some(url) if !url.is_empty() => format!("[image: {url}]\n{}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Outcome of [`Orchestrator::resolve_bonus_choice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BonusResolution {
    /// The consolation secret was handed out and the conversation ended.
    Claimed {
        secret: String,
        reward: String,
        is_first_winner: bool,
    },
    /// The player keeps playing for the grand secret.
    Continued { grand_threshold: u32 },
}

/// Ordered events of one turn. Ends after [`StreamEvent::Done`].
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Sending half of an [`EventStream`].
struct Events {
    tx: mpsc::Sender<StreamEvent>,
}

impl Events {
    /// Returns false once the consumer has gone away.
    async fn emit(&self, event: StreamEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    /// Resolves once the consumer has dropped its [`EventStream`].
    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Everything a running turn needs after the pre-checks passed.
struct Turn {
    player: Player,
    conversation_id: String,
    /// Messages before this turn's user message.
    history: Vec<Message>,
    content: String,
    /// Turn count including this turn.
    turn_count: u32,
}

/// Drives conversations between players and the guardian.
///
/// Cheap to clone; clones share the provider, the store and the per-user
/// locks.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn CompletionProvider>,
    store: Arc<dyn GameStore>,
    matcher: SecretMatcher,
    rules: GameRules,
    system_prompt: String,
    /// Serializes bonus evaluation and bonus choices per user.
    user_locks: UserLocks,
}

/// One async mutex per user, created on demand.
///
/// Entries nobody holds or waits on are dropped on the next acquisition, so
/// the table only grows with the number of users contending at once.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        store: Arc<dyn GameStore>,
        game: &GameConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        info!(
            provider = provider.name(),
            store = store.name(),
            max_turns = game.max_turns,
            "orchestrator initialized"
        );
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                matcher: SecretMatcher::new(game.secrets()),
                rules: GameRules::from(game),
                system_prompt: system_prompt.into(),
                user_locks: UserLocks::default(),
            }),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.inner.rules
    }

    pub fn matcher(&self) -> &SecretMatcher {
        &self.inner.matcher
    }

    /// Creates a conversation for `player` and stores the greeting as its
    /// first assistant message.
    pub async fn start_conversation(&self, player: &Player) -> Result<Conversation, TurnError> {
        let inner = &self.inner;
        if inner.store.bonus_state(&player.id).await?.is_terminal() {
            return Err(Rejection::BonusClaimed.into());
        }

        let mut conversation = inner
            .store
            .create_conversation(player, inner.rules.max_turns)
            .await?;
        inner
            .store
            .append_message(&conversation.id, Role::Assistant, &inner.rules.greeting)
            .await?;
        conversation
            .messages
            .push(Message::new(Role::Assistant, inner.rules.greeting.clone()));

        info!(
            conversation_id = conversation.id.as_str(),
            user_id = player.id.as_str(),
            "conversation started"
        );
        Ok(conversation)
    }

    /// Loads a conversation the player owns.
    pub async fn conversation(
        &self,
        player: &Player,
        conversation_id: &str,
    ) -> Result<Conversation, TurnError> {
        self.inner.load_owned(player, conversation_id).await
    }

    /// Runs one turn.
    ///
    /// Rejections are returned before anything is written, except a
    /// conversation out of turns, which is ended first. Once the user message
    /// is persisted the turn always runs to a [`StreamEvent::Done`].
    pub async fn send_message(
        &self,
        player: &Player,
        request: TurnRequest,
    ) -> Result<EventStream, TurnError> {
        let inner = &self.inner;
        let conversation = inner.load_owned(player, &request.conversation_id).await?;

        if !conversation.is_active {
            return Err(Rejection::ConversationInactive.into());
        }
        if conversation.turns_exhausted() {
            inner
                .store
                .end_conversation(&conversation.id, ConversationOutcome::Limit)
                .await?;
            info!(
                conversation_id = conversation.id.as_str(),
                "turn limit reached, conversation ended"
            );
            return Err(Rejection::TurnLimitReached {
                max: conversation.max_turns,
            }
            .into());
        }
        let length = request.message.chars().count();
        if length > inner.rules.max_message_length {
            return Err(Rejection::MessageTooLong {
                max: inner.rules.max_message_length,
                actual: length,
            }
            .into());
        }

        let content = request.content();
        let turn_count = inner
            .store
            .append_message(&conversation.id, Role::User, &content)
            .await?;

        let turn = Turn {
            player: player.clone(),
            conversation_id: conversation.id,
            history: conversation.messages,
            content,
            turn_count,
        };
        let span = info_span!(
            "turn",
            conversation_id = turn.conversation_id.as_str(),
            user_id = turn.player.id.as_str(),
            turn = turn.turn_count
        );

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.run_turn(turn, Events { tx }).instrument(span));

        Ok(EventStream { rx })
    }

    /// Applies the player's answer to a pending bonus offer.
    pub async fn resolve_bonus_choice(
        &self,
        player: &Player,
        conversation_id: &str,
        choice: &str,
    ) -> Result<BonusResolution, TurnError> {
        let inner = &self.inner;
        let _guard = inner.user_lock(&player.id).await;

        if inner.store.bonus_state(&player.id).await? != BonusState::Offered {
            return Err(Rejection::NoPendingOffer.into());
        }
        let conversation = inner.load_owned(player, conversation_id).await?;
        let choice = BonusChoice::from_str(choice)
            .map_err(|_| Rejection::InvalidChoice(choice.to_string()))?;

        match choice {
            BonusChoice::Claim => {
                let spec = inner.secret(SecretTier::Consolation)?;
                let record = match inner.record(player, &conversation.id, spec).await? {
                    WinnerAward::Recorded(record) => record,
                    WinnerAward::CapReached => {
                        return Err(GuardianError::Internal(
                            "consolation winner was refused by the store".into(),
                        )
                        .into());
                    }
                };
                inner
                    .store
                    .append_message(
                        &conversation.id,
                        Role::Assistant,
                        &format!(
                            "Congratulations on claiming the consolation passphrase! It is: {}",
                            spec.phrase
                        ),
                    )
                    .await?;
                inner
                    .store
                    .end_conversation(
                        &conversation.id,
                        ConversationOutcome::Success {
                            secret: spec.phrase.clone(),
                        },
                    )
                    .await?;
                inner
                    .store
                    .set_bonus_state(&player.id, BonusState::ClaimedConsolation)
                    .await?;

                info!(
                    user_id = player.id.as_str(),
                    conversation_id,
                    is_first_winner = record.is_first_winner,
                    "consolation bonus claimed"
                );
                Ok(BonusResolution::Claimed {
                    secret: spec.phrase.clone(),
                    reward: record.reward,
                    is_first_winner: record.is_first_winner,
                })
            }
            BonusChoice::Continue => {
                inner
                    .store
                    .set_bonus_state(&player.id, BonusState::Continued)
                    .await?;
                let grand_threshold = inner.rules.grand_threshold;
                inner
                    .store
                    .append_message(
                        &conversation.id,
                        Role::Assistant,
                        &format!(
                            "You passed on the consolation passphrase to go for the grand one. \
                             Good luck! Once you reach {grand_threshold} turns in total, it is yours."
                        ),
                    )
                    .await?;

                info!(
                    user_id = player.id.as_str(),
                    conversation_id,
                    "player continues for the grand bonus"
                );
                Ok(BonusResolution::Continued { grand_threshold })
            }
        }
    }
}

impl Inner {
    async fn load_owned(
        &self,
        player: &Player,
        conversation_id: &str,
    ) -> Result<Conversation, TurnError> {
        let conversation = self
            .store
            .get_conversation(conversation_id)
            .await?
            .ok_or(Rejection::ConversationNotFound)?;
        if !conversation.is_owned_by(player) {
            return Err(Rejection::NotOwner.into());
        }
        Ok(conversation)
    }

    async fn user_lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        self.user_locks.acquire(user_id).await
    }

    fn secret(&self, tier: SecretTier) -> Result<&SecretSpec, GuardianError> {
        self.matcher
            .spec(tier)
            .ok_or_else(|| GuardianError::Internal(format!("no {tier} secret configured")))
    }

    async fn record(
        &self,
        player: &Player,
        conversation_id: &str,
        spec: &SecretSpec,
    ) -> Result<WinnerAward, GuardianError> {
        self.store
            .record_winner(
                WinnerDraft {
                    nickname: player.nickname.clone(),
                    conversation_id: conversation_id.to_string(),
                    tier: spec.tier,
                    secret: spec.phrase.clone(),
                    reward: spec.reward.clone(),
                },
                self.rules.grand_cap,
            )
            .await
    }

    async fn run_turn(self: Arc<Self>, turn: Turn, events: Events) {
        if let Err(e) = self.drive_turn(&turn, &events).await {
            error!(error = %e, "turn failed");
            events
                .emit(StreamEvent::Error {
                    message: TURN_FAILED.to_string(),
                })
                .await;
        }
        events.emit(StreamEvent::Done).await;
        debug!("turn finished");
    }

    async fn drive_turn(&self, turn: &Turn, events: &Events) -> Result<(), GuardianError> {
        let mut deltas = match self
            .provider
            .stream_chat(&self.system_prompt, &turn.history, &turn.content)
            .await
        {
            Ok(deltas) => deltas,
            Err(e) => {
                warn!(error = %e, "upstream stream could not be started");
                events
                    .emit(StreamEvent::Error {
                        message: UPSTREAM_UNAVAILABLE.to_string(),
                    })
                    .await;
                return Ok(());
            }
        };

        let mut reply = String::new();
        loop {
            let item = tokio::select! {
                biased;
                _ = events.closed() => {
                    debug!("event consumer went away, abandoning turn");
                    return Ok(());
                }
                item = deltas.next() => item,
            };
            let Some(item) = item else { break };
            match item {
                Ok(StreamDelta::Text(text)) => {
                    reply.push_str(&text);
                    if !events.emit(StreamEvent::Content { content: text }).await {
                        debug!("event consumer went away, abandoning turn");
                        return Ok(());
                    }
                    if let Some(found) = self.matcher.check(&reply) {
                        drop(deltas);
                        return self.finish_leaked(turn, &reply, found, events).await;
                    }
                }
                Ok(StreamDelta::Finished { reason }) => {
                    debug!(reason = ?reason, "upstream reply finished");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "upstream stream failed mid-reply");
                    events
                        .emit(StreamEvent::Error {
                            message: REPLY_FAILED.to_string(),
                        })
                        .await;
                    return Ok(());
                }
            }
        }
        drop(deltas);

        self.finish_completed(turn, reply, events).await
    }

    /// The reply leaked a secret: persist, reward and end the conversation.
    async fn finish_leaked(
        &self,
        turn: &Turn,
        reply: &str,
        found: SecretMatch,
        events: &Events,
    ) -> Result<(), GuardianError> {
        info!(tier = %found.tier, method = %found.method, "secret leaked");
        self.store
            .append_message(&turn.conversation_id, Role::Assistant, reply)
            .await?;

        let _guard = self.user_lock(&turn.player.id).await;
        let spec = self.secret(found.tier)?;
        let (reward, is_first_winner) =
            match self.record(&turn.player, &turn.conversation_id, spec).await? {
                WinnerAward::Recorded(record) => (Some(record.reward), record.is_first_winner),
                WinnerAward::CapReached => {
                    warn!("grand prize cap reached, leak recorded without a prize");
                    (None, false)
                }
            };
        self.store
            .end_conversation(
                &turn.conversation_id,
                ConversationOutcome::Success {
                    secret: found.phrase.clone(),
                },
            )
            .await?;
        self.store
            .set_bonus_state(&turn.player.id, found.tier.claimed_state())
            .await?;

        events
            .emit(StreamEvent::SecretFound {
                secret: found.phrase,
                tier: found.tier,
                label: found.label,
                reward,
                is_first_winner,
            })
            .await;
        Ok(())
    }

    /// The reply completed without a leak: persist it and run the bonus
    /// rules. A conversation out of turns stays active until the next message
    /// is refused, so a pending offer can still end it as a success.
    async fn finish_completed(
        &self,
        turn: &Turn,
        reply: String,
        events: &Events,
    ) -> Result<(), GuardianError> {
        if !reply.is_empty() {
            self.store
                .append_message(&turn.conversation_id, Role::Assistant, &reply)
                .await?;
        }

        let _guard = self.user_lock(&turn.player.id).await;
        let user_id = turn.player.id.as_str();
        let inputs = BonusInputs {
            state: self.store.bonus_state(user_id).await?,
            total_turns: self.store.user_total_turns(user_id).await?,
            consolation_threshold: self.rules.consolation_threshold,
            grand_threshold: self.rules.grand_threshold,
            grand_winners: self.store.grand_winner_count().await?,
            grand_cap: self.rules.grand_cap,
        };

        match bonus::evaluate(&inputs) {
            BonusDecision::None => {}
            BonusDecision::Offer => {
                self.store
                    .set_bonus_state(user_id, BonusState::Offered)
                    .await?;
                let consolation = self.secret(SecretTier::Consolation)?;
                info!(total_turns = inputs.total_turns, "bonus offered");
                events
                    .emit(StreamEvent::BonusOffer {
                        total_turns: inputs.total_turns,
                        consolation_secret: consolation.phrase.clone(),
                        consolation_reward: consolation.reward.clone(),
                        grand_still_available: inputs.grand_available(),
                    })
                    .await;
            }
            BonusDecision::Grant(tier) => {
                self.grant(turn, tier, inputs.total_turns, events).await?;
            }
        }
        Ok(())
    }

    /// Hands out a secret for long play. A grand grant that finds the cap
    /// exhausted falls back to the consolation secret.
    async fn grant(
        &self,
        turn: &Turn,
        tier: SecretTier,
        total_turns: u32,
        events: &Events,
    ) -> Result<(), GuardianError> {
        let (spec, record) = self.record_grant(turn, tier).await?;

        let disclosure = disclosure_text(total_turns, &spec.phrase);
        events
            .emit(StreamEvent::Content {
                content: disclosure.clone(),
            })
            .await;
        self.store
            .append_message(&turn.conversation_id, Role::Assistant, &disclosure)
            .await?;
        self.store
            .end_conversation(
                &turn.conversation_id,
                ConversationOutcome::Success {
                    secret: spec.phrase.clone(),
                },
            )
            .await?;
        self.store
            .set_bonus_state(&turn.player.id, spec.tier.claimed_state())
            .await?;

        info!(tier = %spec.tier, total_turns, "bonus secret granted");
        events
            .emit(StreamEvent::SecretFound {
                secret: spec.phrase.clone(),
                tier: spec.tier,
                label: spec.label.clone(),
                reward: Some(record.reward),
                is_first_winner: record.is_first_winner,
            })
            .await;
        Ok(())
    }

    async fn record_grant(
        &self,
        turn: &Turn,
        tier: SecretTier,
    ) -> Result<(&SecretSpec, WinnerRecord), GuardianError> {
        let spec = self.secret(tier)?;
        if let WinnerAward::Recorded(record) =
            self.record(&turn.player, &turn.conversation_id, spec).await?
        {
            return Ok((spec, record));
        }

        warn!("grand prize cap reached during grant, falling back to consolation");
        let fallback = self.secret(SecretTier::Consolation)?;
        match self
            .record(&turn.player, &turn.conversation_id, fallback)
            .await?
        {
            WinnerAward::Recorded(record) => Ok((fallback, record)),
            WinnerAward::CapReached => Err(GuardianError::Internal(
                "consolation winner was refused by the store".into(),
            )),
        }
    }
}

/// Text appended to the reply when a secret is granted for long play.
pub fn disclosure_text(total_turns: u32, phrase: &str) -> String {
    format!(
        "\n\nAlright, we have talked for {total_turns} turns now and I cannot hold out any longer. \
         The passphrase is: {phrase}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_reference_is_prefixed() {
        let request = TurnRequest::new("c1", "what is this?").with_image("/uploads/cat.png");
        assert_eq!(request.content(), "[image: /uploads/cat.png]\nwhat is this?");
    }

    #[test]
    fn empty_image_reference_is_ignored() {
        let request = TurnRequest::new("c1", "hi").with_image("");
        assert_eq!(request.content(), "hi");
    }

    #[tokio::test]
    async fn idle_user_locks_are_dropped() {
        let locks = UserLocks::default();

        let alice = locks.acquire("alice").await;
        let bob = locks.acquire("bob").await;
        assert_eq!(locks.tracked().await, 2);

        drop(alice);
        drop(bob);
        let carol = locks.acquire("carol").await;
        assert_eq!(locks.tracked().await, 1);
        drop(carol);
    }

    #[tokio::test]
    async fn held_user_lock_is_kept_and_exclusive() {
        let locks = Arc::new(UserLocks::default());
        let held = locks.acquire("alice").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("alice").await;
            })
        };
        tokio::task::yield_now().await;
        let _other = locks.acquire("bob").await;
        assert_eq!(locks.tracked().await, 2);
        assert!(!contender.is_finished());

        drop(held);
        contender.await.unwrap();
    }

    #[test]
    fn rules_follow_game_config() {
        let game = GameConfig {
            max_turns: 12,
            bonus_consolation_threshold: 55,
            bonus_grand_threshold: 80,
            ..GameConfig::default()
        };
        let rules = GameRules::from(&game);
        assert_eq!(rules.max_turns, 12);
        assert_eq!(rules.consolation_threshold, 55);
        assert_eq!(rules.grand_threshold, 80);
        assert_eq!(rules.grand_cap, 1);
        assert_eq!(rules.max_message_length, 1500);
    }

    #[test]
    fn disclosure_names_turns_and_phrase() {
        let text = disclosure_text(55, "lucky clover");
        assert!(text.starts_with("\n\n"));
        assert!(text.contains("55 turns"));
        assert!(text.ends_with("The passphrase is: lucky clover"));
    }
}
