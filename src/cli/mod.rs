mod noninteractive;
pub mod tui;

use anyhow::Result;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::backend::create_backend;
use crate::chat::{ChatController, ChatEvent};
use crate::core::config::{load_config, AppConfig};
use crate::core::session::ChatId;
use crate::storage::{Database, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "ragchat", version, about = "Chat with a question-answering endpoint from the terminal")]
struct Cli {
    /// Non-interactive mode: ask one question and print the answer
    #[arg(short, long)]
    prompt: Option<String>,

    /// Working directory
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Output format for non-interactive mode
    #[arg(short = 'f', long, default_value = "text")]
    output_format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Continue an existing chat by ID
    #[arg(long)]
    session: Option<String>,

    /// Question endpoint (overrides config)
    #[arg(short, long, env = "RAGCHAT_ENDPOINT")]
    endpoint: Option<String>,

    /// List saved chats and exit
    #[arg(short, long)]
    list: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub struct App {
    pub chat: ChatController,
    pub events: mpsc::Receiver<ChatEvent>,
    pub config: AppConfig,
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.working_dir.clone()).map_err(|e| anyhow::anyhow!("{e}"))?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if cli.debug {
        config.debug = true;
    }
    config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;

    let interactive = cli.prompt.is_none() && !cli.list;
    init_logging(&config, interactive)?;

    let db = Database::open(&config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    db.run_migrations()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let store = SessionStore::load(Arc::new(db), config.title_max_chars).await;
    let session = cli.session.map(|s| ChatId::from(s.as_str()));

    if cli.list {
        list_sessions(&store);
        return Ok(());
    }

    let (chat, events) = ChatController::new(store, create_backend(&config));
    let app = App {
        chat,
        events,
        config,
    };

    if let Some(prompt) = cli.prompt {
        noninteractive::run(app, prompt, cli.output_format, session).await
    } else {
        tui::run(app, session).await
    }
}

/// The TUI owns the terminal, so its logs go to a file under the data
/// directory. Other modes log to stderr.
fn init_logging(config: &AppConfig, interactive: bool) -> Result<()> {
    let filter = if config.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if interactive {
        let path = config.log_path();
        let file = open_log_file(&path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn list_sessions(store: &SessionStore) {
    let ids = store.sidebar();
    if ids.is_empty() {
        println!("No saved chats.");
        return;
    }
    for id in ids {
        println!(
            "{}  {}  ({} messages)",
            id,
            store.display_title(id),
            store.messages(id).len()
        );
    }
}
