use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod client;
mod clipboard;
mod config;
mod conversation;
mod error;
mod handler;
mod markdown;
mod state;
mod theme;
mod tui;
mod ui;
mod view;

use app::{App, Settings};
use client::ChatClient;
use config::Config;
use conversation::ConversationStore;
use tui::{EventHandler, Tui, TICK_RATE};
use view::AT_BOTTOM_THRESHOLD;

#[derive(Parser)]
#[command(name = "chat")]
#[command(about = "Terminal chat client for a remote chat-completion endpoint")]
struct Cli {
    /// Base URL of the chat service (POST {endpoint}/api/chat)
    #[arg(short, long, env = "CHAT_ENDPOINT")]
    endpoint: Option<String>,

    /// Start with the light theme
    #[arg(long)]
    light: bool,

    /// Rows from the bottom that still count as "at the bottom"
    #[arg(long)]
    scroll_threshold: Option<u16>,

    /// Write logs here instead of the cache directory
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Send one message, print the reply and exit without opening the UI
    #[arg(short, long, value_name = "MESSAGE")]
    ask: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file.as_deref())?;

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "could not read config, using defaults");
            Config::new()
        }
    };

    let settings = Settings {
        endpoint: cli
            .endpoint
            .unwrap_or_else(|| config.endpoint_or_default().to_string()),
        dark_mode: !cli.light && config.dark_mode.unwrap_or(true),
        scroll_threshold: cli
            .scroll_threshold
            .or(config.scroll_threshold)
            .unwrap_or(AT_BOTTOM_THRESHOLD),
    };
    info!(endpoint = %settings.endpoint, dark_mode = settings.dark_mode, "starting chat");

    if let Some(message) = cli.ask {
        return ask_once(&settings.endpoint, &message).await;
    }

    let mut app = App::new(settings);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Err(err) = &result {
        warn!(error = %err, "exited with error");
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event);

        app.poll_tasks().await;
        app.sync_view(Instant::now());
    }

    Ok(())
}

async fn ask_once(endpoint: &str, message: &str) -> Result<()> {
    let client = ChatClient::new(endpoint);
    let mut conversation = ConversationStore::new();

    if !conversation.send_message(message, &client).await {
        return Err(anyhow!("Nothing to send"));
    }

    if let Some(reply) = conversation.messages().last() {
        println!("{}", reply.content);
    }
    Ok(())
}

/// Logs go to a file; the terminal belongs to the UI
fn init_logging(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not determine cache directory"))?
            .join("chat-cli")
            .join("chat-cli.log"),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}
