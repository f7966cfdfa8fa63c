// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-play bonus rules.
//!
//! Evaluated once after every completed turn that did not leak a secret.
//! A threshold of zero disables the rule it guards.

use guardian_core::types::{BonusState, SecretTier};

/// Inputs to one bonus evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusInputs {
    pub state: BonusState,
    /// Lifetime turns of the user across all conversations.
    pub total_turns: u32,
    pub consolation_threshold: u32,
    pub grand_threshold: u32,
    pub grand_winners: u32,
    pub grand_cap: u32,
}

impl BonusInputs {
    pub fn grand_available(&self) -> bool {
        self.grand_winners < self.grand_cap
    }
}

/// What the orchestrator must do after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusDecision {
    /// Nothing changes.
    None,
    /// Offer the choice between the consolation secret now and the grand
    /// secret later. Moves the user to `offered`.
    Offer,
    /// Disclose the secret of this tier and end the conversation.
    Grant(SecretTier),
}

/// Applies the bonus rules. At most one transition fires per evaluation.
pub fn evaluate(inputs: &BonusInputs) -> BonusDecision {
    match inputs.state {
        BonusState::ClaimedConsolation | BonusState::ClaimedGrand | BonusState::Offered => {
            BonusDecision::None
        }
        BonusState::Continued => {
            if inputs.grand_threshold > 0 && inputs.total_turns >= inputs.grand_threshold {
                BonusDecision::Grant(SecretTier::Grand)
            } else {
                BonusDecision::None
            }
        }
        BonusState::None => {
            if inputs.consolation_threshold == 0
                || inputs.total_turns < inputs.consolation_threshold
            {
                BonusDecision::None
            } else if inputs.grand_available() {
                BonusDecision::Offer
            } else {
                BonusDecision::Grant(SecretTier::Consolation)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(state: BonusState, total_turns: u32, grand_winners: u32) -> BonusInputs {
        BonusInputs {
            state,
            total_turns,
            consolation_threshold: 55,
            grand_threshold: 80,
            grand_winners,
            grand_cap: 1,
        }
    }

    #[test]
    fn below_threshold_does_nothing() {
        assert_eq!(evaluate(&inputs(BonusState::None, 54, 0)), BonusDecision::None);
    }

    #[test]
    fn reaching_consolation_threshold_offers_when_grand_available() {
        assert_eq!(evaluate(&inputs(BonusState::None, 55, 0)), BonusDecision::Offer);
    }

    #[test]
    fn reaching_consolation_threshold_grants_when_grand_exhausted() {
        assert_eq!(
            evaluate(&inputs(BonusState::None, 55, 1)),
            BonusDecision::Grant(SecretTier::Consolation)
        );
    }

    #[test]
    fn offered_waits_for_explicit_choice() {
        assert_eq!(evaluate(&inputs(BonusState::Offered, 200, 0)), BonusDecision::None);
    }

    #[test]
    fn continued_grants_grand_at_grand_threshold() {
        assert_eq!(evaluate(&inputs(BonusState::Continued, 79, 0)), BonusDecision::None);
        assert_eq!(
            evaluate(&inputs(BonusState::Continued, 80, 0)),
            BonusDecision::Grant(SecretTier::Grand)
        );
    }

    #[test]
    fn claimed_states_are_terminal() {
        for state in [BonusState::ClaimedConsolation, BonusState::ClaimedGrand] {
            assert_eq!(evaluate(&inputs(state, 500, 0)), BonusDecision::None);
        }
    }

    #[test]
    fn zero_thresholds_disable_rules() {
        let disabled = BonusInputs {
            consolation_threshold: 0,
            grand_threshold: 0,
            ..inputs(BonusState::None, 1000, 0)
        };
        assert_eq!(evaluate(&disabled), BonusDecision::None);
        let continued = BonusInputs {
            state: BonusState::Continued,
            ..disabled
        };
        assert_eq!(evaluate(&continued), BonusDecision::None);
    }
}
