//! Terminal client for mentor_room

mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::Terminal;
use settings_manager::{ConfigManager, Settings};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// mentor_room - talk to a panel of AI mentors
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    /// Slot layout
    #[clap(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Visualization style
    #[clap(long, value_enum)]
    style: Option<StyleArg>,

    /// Fetch tokens from this backend instead of using simulated credentials
    #[clap(long)]
    token_endpoint: Option<String>,

    /// Room to join
    #[clap(long)]
    room: Option<String>,

    /// Participant name
    #[clap(long)]
    name: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Single,
    Panel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    Radial,
    Bars,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(layout) = self.layout {
            settings.layout = match layout {
                LayoutArg::Single => room::Layout::Single,
                LayoutArg::Panel => room::Layout::Panel,
            };
        }
        if let Some(style) = self.style {
            settings.visualization.style = match style {
                StyleArg::Radial => visualization::VisualizationStyle::Radial,
                StyleArg::Bars => visualization::VisualizationStyle::Bars,
            };
        }
        if let Some(endpoint) = &self.token_endpoint {
            settings.token_endpoint = endpoint.clone();
            settings.simulation.enabled = false;
        }
        if let Some(room) = &self.room {
            settings.room_name = room.clone();
        }
        if let Some(name) = &self.name {
            settings.participant_name = name.clone();
        }
    }
}

/// Route logs to a file; the terminal belongs to the UI.
fn init_logging(debug: bool) -> Result<PathBuf> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("mentor_room");
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    let log_path = log_dir.join("mentor_room.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(log_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = init_logging(args.debug)?;
    info!("Starting mentor_room, logging to {:?}", log_path);

    let config = match &args.config {
        Some(path) => ConfigManager::with_file(path),
        None => ConfigManager::new(),
    }
    .context("Failed to load config")?;
    let mut settings = config.settings().clone();
    args.apply(&mut settings);
    settings.validate().context("Invalid settings")?;

    let mut app = App::new(&settings);

    // Blocking key reader feeding the async loop
    let (key_tx, key_rx) = mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || loop {
        match event::read() {
            Ok(ev) => {
                if key_tx.send(ev).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to read terminal event: {}", e);
                break;
            }
        }
    });

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal, key_rx).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!("Exiting with error: {:#}", e);
    }
    info!("Exiting mentor_room");
    // The key reader is parked in a blocking read; don't wait for it
    std::process::exit(if result.is_ok() { 0 } else { 1 })
}
