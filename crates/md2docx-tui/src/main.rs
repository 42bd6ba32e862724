//! md2docx - A terminal client for converting Google Drive markdown to .docx.
//!
//! Signs in through the backend's Google OAuth flow, keeps the session in a
//! local cookie jar, and drives the list/convert/download calls.

mod app;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste,
        EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

use md2docx_core::Config;

use app::{App, AppState};
use ui::input::{handle_input, handle_paste};
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_NAME: &str = "md2docx.log";

const USAGE: &str = "\
Usage: md2docx [--callback <redirect-url>]

Options:
  --callback <url>  Complete a Google sign-in from the redirect URL
  -h, --help        Print this help
";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to a daily file under the storage directory so they don't
/// corrupt the terminal UI; stderr is the fallback when no directory is
/// available. Use RUST_LOG to control the level (e.g., RUST_LOG=debug).
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = match config.log_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        Err(_) => (BoxMakeWriter::new(io::stderr), None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let callback = match parse_args(&args[1..]) {
        Ok(Some(Command::Help)) => {
            print!("{}", USAGE);
            return Ok(());
        }
        Ok(Some(Command::Callback(url))) => Some(url),
        Ok(None) => None,
        Err(message) => {
            eprintln!("{}\n\n{}", message, USAGE);
            std::process::exit(2);
        }
    };

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_tracing(&config);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!("md2docx starting");

    let mut app = App::new(config)?;
    if let Some(redirect) = callback {
        app.open_callback(redirect);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("md2docx shutting down");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Callback(String),
}

fn parse_args(args: &[String]) -> Result<Option<Command>, String> {
    let mut iter = args.iter();
    match iter.next().map(String::as_str) {
        None => Ok(None),
        Some("-h") | Some("--help") => Ok(Some(Command::Help)),
        Some("--callback") => match iter.next() {
            Some(url) => Ok(Some(Command::Callback(url.clone()))),
            None => Err("--callback requires a redirect URL".to_string()),
        },
        Some(other) => Err(format!("Unknown argument: {}", other)),
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    // Ctrl+C to quit
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        return Ok(());
                    }

                    if handle_input(app, key) {
                        return Ok(());
                    }
                }
                Event::Paste(text) => handle_paste(app, &text),
                _ => {}
            }
        }

        // Yield so spawned tasks make progress between frames
        tokio::task::yield_now().await;

        // Check for navigation and completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
