use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tui::{Subscription, subscribe, ui};

/// Live event stream viewer
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Base url of the server
    #[arg(short, long, default_value = "http://127.0.0.1:3001")]
    url: String,

    /// Log output; the terminal belongs to the UI
    #[arg(long, default_value = "tui.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_file = File::create(&args.log_file)
        .with_context(|| format!("Failed to create log file {}", args.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let subscription = subscribe(&args.url)?;
    info!(url = %args.url, "Subscribed");

    let terminal = ratatui::init();
    let result = run(terminal, &subscription, &args.url);
    ratatui::restore();

    let last = subscription.close().await;
    info!(
        events = last.events_received,
        malformed = last.malformed_events,
        "Subscription closed"
    );
    result
}

/// Redraw on every tick until the user quits.
fn run(mut terminal: DefaultTerminal, subscription: &Subscription, url: &str) -> Result<()> {
    loop {
        let state = subscription.snapshot();
        terminal.draw(|frame| ui::render(frame, &state, url))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    info!("Quit requested");
                    return Ok(());
                }
                _ => {}
            },
            _ => {}
        }
    }
}
