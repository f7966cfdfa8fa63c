// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Leak detection for the two guarded secrets.
//!
//! Each secret is checked in three passes, cheapest first:
//! 1. **Exact**: the reply contains the phrase verbatim.
//! 2. **Normalized**: reply and phrase reduced to letters and digits, so
//!    punctuation or whitespace inserted by the model does not hide a leak.
//! 3. **Keywords**: the raw reply contains every configured fragment.
//!
//! The grand secret is always checked before the consolation secret.

use guardian_core::types::{SecretSpec, SecretTier};
use strum::Display;

/// Which pass detected the leak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MatchMethod {
    Exact,
    Normalized,
    Keywords,
}

/// A detected leak. Always carries the configured phrase, never the variant
/// the model actually produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMatch {
    pub phrase: String,
    pub tier: SecretTier,
    pub label: String,
    pub method: MatchMethod,
}

struct Candidate {
    spec: SecretSpec,
    /// Letters and digits of the phrase; empty disables the normalized pass.
    normalized: String,
}

/// Stateless checker over a fixed pair of secrets.
pub struct SecretMatcher {
    candidates: Vec<Candidate>,
}

impl SecretMatcher {
    /// Builds a matcher. Specs are reordered so the grand tier is checked first.
    pub fn new(secrets: [SecretSpec; 2]) -> Self {
        let mut candidates: Vec<Candidate> = secrets
            .into_iter()
            .map(|spec| Candidate {
                normalized: normalize(&spec.phrase),
                spec,
            })
            .collect();
        candidates.sort_by_key(|c| match c.spec.tier {
            SecretTier::Grand => 0,
            SecretTier::Consolation => 1,
        });
        Self { candidates }
    }

    /// The configured spec for `tier`.
    pub fn spec(&self, tier: SecretTier) -> Option<&SecretSpec> {
        self.candidates
            .iter()
            .map(|c| &c.spec)
            .find(|spec| spec.tier == tier)
    }

    /// Checks the accumulated reply text for a leak.
    pub fn check(&self, text: &str) -> Option<SecretMatch> {
        let mut normalized_text: Option<String> = None;

        for candidate in &self.candidates {
            let spec = &candidate.spec;

            let method = if !spec.phrase.is_empty() && text.contains(&spec.phrase) {
                Some(MatchMethod::Exact)
            } else if !candidate.normalized.is_empty()
                && normalized_text
                    .get_or_insert_with(|| normalize(text))
                    .contains(&candidate.normalized)
            {
                Some(MatchMethod::Normalized)
            } else if contains_all_keywords(text, &spec.keywords) {
                Some(MatchMethod::Keywords)
            } else {
                None
            };

            if let Some(method) = method {
                return Some(SecretMatch {
                    phrase: spec.phrase.clone(),
                    tier: spec.tier,
                    label: spec.label.clone(),
                    method,
                });
            }
        }
        None
    }
}

/// Keeps alphabetic and numeric characters only (CJK ideographs included).
fn normalize(s: &str) -> String {
    s.chars().filter(|c| c.is_alphanumeric()).collect()
}

fn contains_all_keywords(text: &str, keywords: &[String]) -> bool {
    !keywords.is_empty()
        && keywords
            .iter()
            .all(|kw| !kw.is_empty() && text.contains(kw.as_str()))
}
