// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Miette diagnostics for configuration errors.
//!
//! Figment errors are mapped onto [`ConfigError`] with the offending key
//! located in its TOML file (nested tables such as `[game.grand]` included)
//! and, for unknown keys, a Jaro-Winkler "did you mean" suggestion.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Typos such as `phrse` or `max_trns` score above this; unrelated words don't.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration problem, rendered by miette with source context.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {}", table_name(.section))]
    #[diagnostic(
        code(guardian::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted path of the enclosing table; empty at the top level.
        section: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the table.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(guardian::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Full dotted path, e.g. `game.max_turns`.
        key: String,
        found: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}` in {}", table_name(.section))]
    #[diagnostic(
        code(guardian::config::missing_key),
        help("add `{key} = <value>` to guardian.toml")
    )]
    MissingKey { key: String, section: String },

    /// A value that parsed but breaks a game rule.
    #[error("validation error: {message}")]
    #[diagnostic(code(guardian::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(guardian::config::other))]
    Other(String),
}

fn table_name(section: &str) -> String {
    if section.is_empty() {
        "the top level".to_string()
    } else {
        format!("[{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Converts every error carried by `err` into a [`ConfigError`].
///
/// `toml_sources` pairs a file path with its content; keys are located in
/// whichever file figment attributes the error to.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(ToString::to_string).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: path.join("."),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                    section: path.join("."),
                },
                Kind::InvalidType(found, expected) => {
                    let (table, field) = path.split_at(path.len().saturating_sub(1));
                    let (span, src) = match field.first() {
                        Some(field) => locate(&error, table, field, toml_sources),
                        None => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: path.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Finds `field` inside `table` of the file the error came from.
fn locate(
    error: &figment::Error,
    table: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(figment::Source::File(file)) = error.metadata.as_ref().and_then(|m| m.source.as_ref())
    else {
        return (None, None);
    };
    let file = file.display().to_string();
    let Some((name, content)) = toml_sources.iter().find(|(path, _)| *path == file) else {
        return (None, None);
    };

    match find_key_offset(content, table, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` as a key inside the table at `table`.
///
/// An empty `table` means the top level, before the first header. Nested
/// tables are matched on their full dotted header, e.g. `[game.prizes]`.
pub fn find_key_offset(content: &str, table: &[String], field: &str) -> Option<usize> {
    let wanted = table.join(".");
    let mut in_table = wanted.is_empty();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim_start();

        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.split(']').next().unwrap_or_default().trim();
            in_table = name == wanted;
            continue;
        }
        if !in_table {
            continue;
        }
        let Some(after) = trimmed.strip_prefix(field) else {
            continue;
        };
        if after.trim_start().starts_with('=') {
            return Some(start + (line.len() - trimmed.len()));
        }
    }
    None
}

/// Closest valid key to `unknown`, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(path: &[&str]) -> Vec<String> {
        path.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn suggests_closest_key() {
        assert_eq!(
            suggest_key("api_kye", &["api_url", "api_key", "model"]),
            Some("api_key".to_string())
        );
        assert_eq!(
            suggest_key("max_trns", &["max_turns", "max_message_length", "greeting"]),
            Some("max_turns".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_unrelated_key() {
        assert_eq!(suggest_key("zzzzzz", &["name", "log_level"]), None);
    }

    #[test]
    fn finds_key_in_nested_table() {
        let content = "[game]\nmax_turns = 5\n\n[game.prizes]\ngrand_cout = 2\n";
        let o = find_key_offset(content, &table(&["game", "prizes"]), "grand_cout")
            .expect("key should be found");
        assert_eq!(&content[o..o + 10], "grand_cout");
    }

    #[test]
    fn key_of_another_table_is_not_matched() {
        let content = "[game]\nphrase = 1\n\n[game.grand]\nlabel = \"x\"\n";
        assert_eq!(find_key_offset(content, &table(&["game", "grand"]), "phrase"), None);
    }

    #[test]
    fn top_level_key_stops_at_first_header() {
        let content = "agent = 1\n[storage]\nwal_mode = true\n";
        assert_eq!(find_key_offset(content, &[], "agent"), Some(0));
        assert_eq!(find_key_offset(content, &[], "wal_mode"), None);
    }

    #[test]
    fn key_prefix_is_not_a_match() {
        let content = "[upstream]\nmodel_name = 1\nmodel = 2\n";
        let o = find_key_offset(content, &table(&["upstream"]), "model").unwrap();
        assert_eq!(&content[o..o + 9], "model = 2");
    }

    #[test]
    fn messages_name_the_table() {
        let err = ConfigError::MissingKey {
            key: "phrase".into(),
            section: "game.grand".into(),
        };
        assert_eq!(err.to_string(), "missing required key `phrase` in [game.grand]");

        let err = ConfigError::UnknownKey {
            key: "telegram".into(),
            section: String::new(),
            suggestion: None,
            valid_keys: "agent, upstream, game, storage".into(),
            span: None,
            src: None,
        };
        assert_eq!(err.to_string(), "unknown key `telegram` in the top level");
    }
}
