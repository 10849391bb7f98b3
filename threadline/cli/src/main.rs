//! Threadline - Streaming Chat from the Terminal
//!
//! Sends prompts to an OpenAI-compatible chat-completion endpoint, streams
//! the answer to stdout and keeps every conversation on disk.
//!
//! # Usage
//!
//! ```bash
//! # Start a new conversation
//! threadline send "Explain lifetimes in two sentences"
//!
//! # Continue one
//! threadline send --chat 3f2a... "And what about 'static?"
//!
//! # Browse
//! threadline list --search rust
//! threadline show 3f2a...
//!
//! # Verbose logging
//! RUST_LOG=debug threadline send "hi"
//! ```
//!
//! Ctrl-C while a response is streaming cancels it; nothing is saved.

mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use threadline_core::{
    filter_chats, ChatClient, ChatError, ChatStore, ClientConfig, ConversationId, FileStore,
    MessageRole, OpenRouterBackend, Prompt, StreamOutcome, StreamUpdate,
};

use render::SnapshotPrinter;

/// Threadline - streaming chat client
#[derive(Parser, Debug)]
#[command(name = "threadline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "THREADLINE_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Directory for conversation records
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "THREADLINE_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a prompt and stream the answer
    Send {
        /// Conversation to continue (a new one is started otherwise)
        #[arg(long, value_name = "ID")]
        chat: Option<String>,

        /// Model override
        #[arg(short = 'm', long)]
        model: Option<String>,

        /// JPEG image to attach
        #[arg(long, value_name = "FILE")]
        image: Option<PathBuf>,

        /// Prompt text
        #[arg(required = true)]
        prompt: Vec<String>,
    },

    /// List conversations, newest first
    List {
        /// Only names containing this text
        #[arg(short = 's', long)]
        search: Option<String>,
    },

    /// Print a conversation
    Show {
        /// Conversation ID
        id: String,

        /// Print the stored record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create an empty conversation
    New,

    /// Delete a conversation
    Delete {
        /// Conversation ID
        id: String,
    },
}

/// Initialize logging with the specified level
///
/// Logs go to stderr; stdout carries the conversation.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("threadline={level},threadline_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then config file, then environment, then flags
fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = ClientConfig::load_from_path(path)?;
            config.apply_env();
            config
        }
        None => ClientConfig::load()?,
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Command::Send {
        model: Some(model), ..
    } = &args.command
    {
        config.model.clone_from(model);
    }
    Ok(config)
}

async fn open_chats(config: &ClientConfig) -> Result<ChatStore<FileStore>> {
    let dir = config.resolved_data_dir();
    let store = FileStore::open(&dir)
        .await
        .with_context(|| format!("Failed to open data directory: {dir:?}"))?;
    Ok(ChatStore::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args)?;
    let chats = open_chats(&config).await?;

    match args.command {
        Command::Send {
            chat, image, prompt, ..
        } => send(config, chats, chat, image, prompt.join(" ")).await,
        Command::List { search } => list(&chats, search.as_deref()).await,
        Command::Show { id, json } => show(&chats, &id, json).await,
        Command::New => {
            let chat = chats.create_chat().await?;
            println!("{}", chat.id);
            Ok(())
        }
        Command::Delete { id } => {
            let id = ConversationId::from(id.as_str());
            if chats.get_chat(&id).await?.is_none() {
                bail!("Chat not found: {id}");
            }
            chats.delete_chat(&id).await?;
            Ok(())
        }
    }
}

async fn send(
    config: ClientConfig,
    chats: ChatStore<FileStore>,
    chat: Option<String>,
    image: Option<PathBuf>,
    text: String,
) -> Result<()> {
    let conversation = match chat {
        Some(id) => {
            let id = ConversationId::from(id.as_str());
            chats
                .get_chat(&id)
                .await?
                .with_context(|| format!("Chat not found: {id}"))?
        }
        None => chats.draft_chat().await?,
    };

    let mut prompt = Prompt::text(text);
    if let Some(path) = image {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read image: {path:?}"))?;
        prompt = prompt.with_image(encode_image(&bytes));
    }

    let backend = OpenRouterBackend::from_config(&config)
        .context("Set THREADLINE_API_KEY or OPENROUTER_API_KEY")?;
    let client = Arc::new(ChatClient::new(backend, chats, config));

    let conversation_id = conversation.id.clone();
    let (tx, mut rx) = client.update_channel();
    let handle = client.spawn_message(conversation, prompt, tx);

    let mut printer = SnapshotPrinter::new();
    let mut failed = false;
    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            update = rx.recv() => {
                let Some(update) = update else { break };
                match update {
                    StreamUpdate::Snapshot(msg) => {
                        write!(stdout, "{}", printer.advance(&msg.content))?;
                        stdout.flush()?;
                    }
                    StreamUpdate::Finished { conversation, title } => {
                        let content = conversation
                            .last_message()
                            .map(|m| m.content.as_str())
                            .unwrap_or_default();
                        write!(stdout, "{}", printer.finish(content))?;
                        if let Some(title) = title {
                            info!(title = %title, "Conversation titled");
                        }
                    }
                    StreamUpdate::Cancelled { .. } => {
                        writeln!(stdout)?;
                        eprintln!("Cancelled.");
                    }
                    StreamUpdate::Failed { error, .. } => {
                        writeln!(stdout)?;
                        eprintln!("Error: {error}");
                        failed = true;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!(conversation_id = %conversation_id, "Interrupted");
                handle.cancel();
            }
        }
    }

    let outcome = handle.join().await;
    if let Some(code) = reported_exit_code(&outcome, failed) {
        std::process::exit(code);
    }
    if let StreamOutcome::Completed(finished) = outcome? {
        eprintln!("[{}] {}", finished.conversation.id, finished.conversation.name);
    }
    Ok(())
}

/// Exit code for an outcome the update loop already reported
///
/// `None` means the outcome still has to be handled by the caller.
fn reported_exit_code(outcome: &Result<StreamOutcome, ChatError>, failed: bool) -> Option<i32> {
    match outcome {
        Ok(StreamOutcome::Cancelled) => Some(130),
        Err(_) if failed => Some(1),
        _ => None,
    }
}

/// Base64 payload for a JPEG data URL
fn encode_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

async fn list(chats: &ChatStore<FileStore>, search: Option<&str>) -> Result<()> {
    let all = chats.load_chats().await;
    let shown = match search {
        Some(query) => filter_chats(&all, query),
        None => all,
    };

    for chat in shown {
        println!(
            "{}  {}  {}",
            chat.id,
            chat.updated_at.format("%Y-%m-%d %H:%M"),
            chat.name
        );
    }
    Ok(())
}

async fn show(chats: &ChatStore<FileStore>, id: &str, json: bool) -> Result<()> {
    let id = ConversationId::from(id);
    let chat = chats
        .get_chat(&id)
        .await?
        .with_context(|| format!("Chat not found: {id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
        return Ok(());
    }

    println!("# {}", chat.name);
    for msg in &chat.messages {
        let who = match msg.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "assistant",
        };
        println!("\n[{who}]\n{}", msg.content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_image_from_raw_bytes() {
        // JPEG start-of-image marker, not valid UTF-8
        let jpeg_header = [0xFF, 0xD8, 0xFF, 0xE0];
        assert!(std::str::from_utf8(&jpeg_header).is_err());
        assert_eq!(encode_image(&jpeg_header), "/9j/4A==");
    }

    #[test]
    fn test_reported_failure_exits_without_propagating() {
        let err = || Err(ChatError::Network("connection reset".into()));
        assert_eq!(reported_exit_code(&err(), true), Some(1));
        // Never reported: main prints it
        assert_eq!(reported_exit_code(&err(), false), None);
        assert_eq!(reported_exit_code(&Ok(StreamOutcome::Cancelled), false), Some(130));
    }

    #[test]
    fn test_image_flag_parses() {
        let args = Args::try_parse_from([
            "threadline", "send", "--image", "cat.jpg", "what", "is", "this",
        ])
        .unwrap();
        let Command::Send { image, prompt, .. } = args.command else {
            panic!("Expected send command");
        };
        assert_eq!(image, Some(PathBuf::from("cat.jpg")));
        assert_eq!(prompt.join(" "), "what is this");
    }
}
