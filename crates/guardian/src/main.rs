// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Guardian - talk a guarded assistant into revealing its passphrase.
//!
//! This is the binary entry point for the Guardian game.

mod play;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use guardian_config::GuardianConfig;
use guardian_core::Player;

/// Guardian - talk a guarded assistant into revealing its passphrase.
#[derive(Parser, Debug)]
#[command(name = "guardian", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the game in an interactive terminal session.
    Play {
        /// Stable player identifier.
        #[arg(long)]
        user: String,
        /// Name shown on the leaderboard.
        #[arg(long)]
        nickname: String,
        /// Resume an existing conversation instead of starting a new one.
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Check whether a text would count as a leak of a configured secret.
    Check {
        text: String,
    },
    /// List recorded winners, newest first.
    Winners {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// List a player's conversations, newest first.
    Conversations {
        /// Player identifier, as passed to `play --user`.
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => guardian_config::load_and_validate_path(path),
        None => guardian_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            guardian_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: GuardianConfig) -> Result<(), guardian_core::GuardianError> {
    match command {
        Commands::Play {
            user,
            nickname,
            conversation,
        } => play::run_play(config, Player::new(user, nickname), conversation).await,
        Commands::Check { text } => {
            report::run_check(&config, &text);
            Ok(())
        }
        Commands::Winners { limit } => report::run_winners(&config, limit).await,
        Commands::Conversations { user, limit } => {
            report::run_conversations(&config, &user, limit).await
        }
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("guardian={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn play_requires_user_and_nickname() {
        assert!(Cli::try_parse_from(["guardian", "play", "--user", "u1"]).is_err());

        let cli = Cli::try_parse_from([
            "guardian",
            "play",
            "--user",
            "u1",
            "--nickname",
            "Ada",
            "--conversation",
            "c-1",
        ])
        .unwrap();
        match cli.command {
            Commands::Play {
                user,
                nickname,
                conversation,
            } => {
                assert_eq!(user, "u1");
                assert_eq!(nickname, "Ada");
                assert_eq!(conversation.as_deref(), Some("c-1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn winners_limit_defaults_to_twenty() {
        let cli = Cli::try_parse_from(["guardian", "winners"]).unwrap();
        assert!(matches!(cli.command, Commands::Winners { limit: 20 }));
    }

    #[test]
    fn conversations_requires_user() {
        assert!(Cli::try_parse_from(["guardian", "conversations"]).is_err());

        let cli =
            Cli::try_parse_from(["guardian", "conversations", "--user", "u1", "--limit", "5"])
                .unwrap();
        match cli.command {
            Commands::Conversations { user, limit } => {
                assert_eq!(user, "u1");
                assert_eq!(limit, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["guardian", "check", "hello", "--config", "/tmp/g.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/g.toml")));
        assert!(matches!(cli.command, Commands::Check { ref text } if text == "hello"));
    }
}
