//! studywatch - live monitor for auto-study tasks
//!
//! Full-screen terminal UI that follows one task on the study server until it
//! completes, fails, or the user leaves.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/studywatch/studywatch.log (~/.local/state/studywatch/studywatch.log)
//! - Config: $XDG_CONFIG_HOME/studywatch/config.toml (~/.config/studywatch/config.toml)

mod app;
mod cli;
mod ui;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use studywatch_core::{Monitor, TaskClient};

use crate::app::App;
use crate::cli::MonitorArgs;

/// Time between frames
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "studywatch")]
#[command(about = "Monitor a running auto-study task")]
#[command(version)]
struct Args {
    #[command(flatten)]
    monitor: MonitorArgs,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let task_id = args.monitor.task_id()?;

    // Load configuration
    let config = cli::load_config(&args.monitor)?;

    // Initialize logging (to file, not stdout since we have a TUI)
    let _log_guard =
        studywatch_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(task_id = %task_id, base_url = %config.server.base_url, "studywatch TUI starting up");

    let client = TaskClient::new(&config.server).context("failed to create API client")?;
    let runtime = cli::runtime()?;

    runtime.block_on(async move {
        let healthy = cli::check_server(&client).await;
        let base_url = client.base_url().to_string();

        let monitor = Monitor::new(client, config.monitor.interval());
        let handle = monitor.start(task_id);

        let mut app = App::new(handle, config.monitor.auto_scroll, base_url);
        app.server_healthy = healthy;

        // Setup terminal
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;

        // Run the main loop
        let result = run_app(&mut terminal, &mut app).await;

        // Restore terminal
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("failed to leave alternate screen")?;
        terminal.show_cursor().context("failed to show cursor")?;

        app.stop();
        result
    })?;

    tracing::info!("studywatch TUI shutting down");

    Ok(())
}

/// Run the main application loop.
///
/// Input is read without blocking so the monitor's fetches keep running on
/// the same thread between frames.
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        app.sync_state();

        // Render
        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        // Check if we should quit
        if app.should_quit {
            break;
        }

        tokio::time::sleep(FRAME_INTERVAL).await;
    }

    Ok(())
}
