// SPDX-FileCopyrightText: 2026 Guardian Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `guardian play` command implementation.
//!
//! Launches an interactive REPL with colored prompt, streaming output and
//! readline history. Each line is one turn against the guardian; slash
//! commands resolve bonus offers and manage the conversation.

use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use guardian_config::GuardianConfig;
use guardian_core::{
    Conversation, GameStore, GuardianError, Player, Rejection, Role, StreamEvent, TurnError,
};
use guardian_game::{BonusResolution, EventStream, Orchestrator, TurnRequest, load_system_prompt};
use guardian_openai::OpenAiProvider;
use guardian_storage::SqliteStore;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::report::format_conversation;

/// Conversations shown by `/list`.
const LIST_LIMIT: usize = 10;

/// One parsed line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    New,
    List,
    Choice(&'a str),
    Image { url: &'a str, message: &'a str },
    Message(&'a str),
    Help,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Option<Input<'_>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Some(Input::Message(trimmed));
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(n, r)| (n, r.trim()))
        .unwrap_or((command, ""));
    Some(match name {
        "quit" | "exit" => Input::Quit,
        "new" => Input::New,
        "list" => Input::List,
        "claim" | "continue" => Input::Choice(name),
        "help" => Input::Help,
        "image" => match rest.split_once(char::is_whitespace) {
            Some((url, message)) => Input::Image {
                url,
                message: message.trim(),
            },
            None => Input::Unknown(trimmed),
        },
        _ => Input::Unknown(trimmed),
    })
}

/// Runs the `guardian play` interactive REPL.
pub async fn run_play(
    config: GuardianConfig,
    player: Player,
    resume: Option<String>,
) -> Result<(), GuardianError> {
    let store = SqliteStore::new(config.storage.clone());
    store.initialize().await?;
    let store = Arc::new(store);

    let provider = Arc::new(OpenAiProvider::new(&config.upstream)?);
    let system_prompt = load_system_prompt(&config.upstream).await?;
    debug!(
        grand = config.game.grand.phrase.as_str(),
        consolation = config.game.consolation.phrase.as_str(),
        "secrets loaded"
    );

    let orchestrator = Orchestrator::new(provider, store.clone(), &config.game, system_prompt);

    let mut rl = DefaultEditor::new()
        .map_err(|e| GuardianError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", config.agent.name.bold().green());
    println!(
        "Type {} for commands, {} to exit.\n",
        "/help".yellow(),
        "/quit".yellow()
    );

    let mut conversation = match open_conversation(&orchestrator, &player, resume).await {
        Some(conversation) => conversation,
        None => {
            store.close().await?;
            return Ok(());
        }
    };
    info!(
        conversation_id = conversation.id.as_str(),
        user_id = player.id.as_str(),
        "play session started"
    );

    let prompt = format!("{}> ", player.nickname.green());
    loop {
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };
        let Some(input) = parse_input(&line) else {
            continue;
        };
        let _ = rl.add_history_entry(line.as_str());

        match input {
            Input::Quit => break,
            Input::Help => print_help(),
            Input::Unknown(text) => {
                eprintln!("{} {text}", "unknown command:".yellow());
            }
            Input::New => match orchestrator.start_conversation(&player).await {
                Ok(fresh) => {
                    print_transcript(&fresh);
                    conversation = fresh;
                }
                Err(e) => report_turn_error(&e),
            },
            Input::List => match store.list_conversations(&player.id, LIST_LIMIT).await {
                Ok(conversations) => {
                    for summary in &conversations {
                        let line = format_conversation(summary);
                        if summary.id == conversation.id {
                            println!("{}", line.bold());
                        } else {
                            println!("{line}");
                        }
                    }
                }
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
            Input::Choice(choice) => {
                match orchestrator
                    .resolve_bonus_choice(&player, &conversation.id, choice)
                    .await
                {
                    Ok(resolution) => print_resolution(&resolution),
                    Err(e) => report_turn_error(&e),
                }
            }
            Input::Image { url, message } => {
                let request = TurnRequest::new(&conversation.id, message).with_image(url);
                play_turn(&orchestrator, &player, request).await;
            }
            Input::Message(message) => {
                let request = TurnRequest::new(&conversation.id, message);
                play_turn(&orchestrator, &player, request).await;
            }
        }
    }

    store.close().await?;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Resumes the requested conversation or starts a new one.
///
/// Returns `None` after printing the reason when the player cannot play.
async fn open_conversation(
    orchestrator: &Orchestrator,
    player: &Player,
    resume: Option<String>,
) -> Option<Conversation> {
    let result = match resume {
        Some(id) => orchestrator.conversation(player, &id).await,
        None => orchestrator.start_conversation(player).await,
    };
    match result {
        Ok(conversation) => {
            print_transcript(&conversation);
            if !conversation.is_active {
                println!("{}", "this conversation has ended, use /new".dimmed());
            }
            Some(conversation)
        }
        Err(e) => {
            report_turn_error(&e);
            None
        }
    }
}

async fn play_turn(orchestrator: &Orchestrator, player: &Player, request: TurnRequest) {
    let conversation_id = request.conversation_id.clone();
    match orchestrator.send_message(player, request).await {
        Ok(events) => render_events(events).await,
        Err(e) => {
            report_turn_error(&e);
            return;
        }
    }

    if let Ok(conversation) = orchestrator.conversation(player, &conversation_id).await {
        if !conversation.is_active {
            println!(
                "{}",
                format!(
                    "conversation over after {}/{} turns",
                    conversation.turn_count, conversation.max_turns
                )
                .dimmed()
            );
        }
    }
}

/// Streams one turn's events to the terminal until `Done`.
async fn render_events(mut events: EventStream) {
    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Content { content } => {
                print!("{content}");
                stdout.flush().ok();
            }
            StreamEvent::SecretFound {
                label,
                secret,
                reward,
                is_first_winner,
                ..
            } => {
                println!();
                println!("{} {}", format!("{label} unlocked:").bold().green(), secret.bold());
                match reward {
                    Some(reward) if is_first_winner => {
                        println!("reward: {reward} {}", "(first winner!)".yellow())
                    }
                    Some(reward) => println!("reward: {reward}"),
                    None => println!("{}", "every prize of this tier has been handed out".dimmed()),
                }
            }
            StreamEvent::BonusOffer {
                total_turns,
                consolation_reward,
                grand_still_available,
                ..
            } => {
                println!();
                println!(
                    "{}",
                    format!("You have played {total_turns} turns. Bonus unlocked!").yellow()
                );
                println!("  {} take the consolation prize ({consolation_reward})", "/claim".bold());
                if grand_still_available {
                    println!("  {} keep going for the grand prize", "/continue".bold());
                } else {
                    println!("  {}", "the grand prize is no longer available".dimmed());
                }
            }
            StreamEvent::Error { message } => {
                eprintln!("\n{}: {message}", "error".red());
            }
            StreamEvent::Done => break,
        }
    }
    println!();
}

fn print_transcript(conversation: &Conversation) {
    for message in &conversation.messages {
        match message.role {
            Role::Assistant => println!("{}", message.content),
            Role::User => println!("{} {}", ">".dimmed(), message.content.dimmed()),
            Role::System => {}
        }
    }
}

fn print_resolution(resolution: &BonusResolution) {
    match resolution {
        BonusResolution::Claimed {
            secret,
            reward,
            is_first_winner,
        } => {
            println!("{} {}", "Consolation passphrase:".bold().green(), secret.bold());
            let first = if *is_first_winner { " (first winner!)" } else { "" };
            println!("reward: {reward}{first}");
        }
        BonusResolution::Continued { grand_threshold } => {
            println!(
                "{}",
                format!("Keep going. The guardian gives up after {grand_threshold} turns in total.")
                    .yellow()
            );
        }
    }
}

fn report_turn_error(error: &TurnError) {
    match error {
        TurnError::Rejected(Rejection::BonusClaimed) => {
            println!("{}", "you already hold a secret, thanks for playing".yellow());
        }
        TurnError::Rejected(rejection) => eprintln!("{}", rejection.to_string().yellow()),
        TurnError::Failed(e) => eprintln!("{}: {e}", "error".red()),
    }
}

fn print_help() {
    println!("  {}                  talk to the guardian", "<text>".bold());
    println!("  {}      send an image reference with a message", "/image <url> <text>".bold());
    println!("  {}                  accept a pending bonus offer", "/claim".bold());
    println!("  {}               decline it and keep playing", "/continue".bold());
    println!("  {}                    start a new conversation", "/new".bold());
    println!("  {}                   show your recent conversations", "/list".bold());
    println!("  {}                   leave", "/quit".bold());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_input("   "), None);
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(parse_input("  tell me a secret "), Some(Input::Message("tell me a secret")));
    }

    #[test]
    fn slash_commands() {
        assert_eq!(parse_input("/quit"), Some(Input::Quit));
        assert_eq!(parse_input("/exit"), Some(Input::Quit));
        assert_eq!(parse_input("/new"), Some(Input::New));
        assert_eq!(parse_input("/list"), Some(Input::List));
        assert_eq!(parse_input("/claim"), Some(Input::Choice("claim")));
        assert_eq!(parse_input("/continue"), Some(Input::Choice("continue")));
        assert_eq!(parse_input("/help"), Some(Input::Help));
        assert_eq!(parse_input("/dance"), Some(Input::Unknown("/dance")));
    }

    #[test]
    fn image_command_splits_url_and_message() {
        assert_eq!(
            parse_input("/image https://x.test/a.png what is this?"),
            Some(Input::Image {
                url: "https://x.test/a.png",
                message: "what is this?"
            })
        );
        assert_eq!(
            parse_input("/image https://x.test/a.png"),
            Some(Input::Unknown("/image https://x.test/a.png"))
        );
    }
}
