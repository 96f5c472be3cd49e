//! studywatch-watch - line-oriented task monitor
//!
//! Follows one task with a progress bar and prints log lines as they arrive.
//! Suited to pipes and CI where a full-screen UI is not available.
//!
//! Exit status: 0 when the task completes, 1 when it ends in error, 130 when
//! interrupted with Ctrl-C.

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use studywatch_core::format::format_log_time;
use studywatch_core::view::{self, ExpandedSet};
use studywatch_core::{LogEntry, Monitor, MonitorHandle, PollPhase, TaskClient, TaskStatus};

use crate::cli::MonitorArgs;

/// How often the interrupt flag is checked while waiting for changes
const INTERRUPT_POLL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "studywatch-watch")]
#[command(about = "Follow an auto-study task and print its log")]
#[command(version)]
struct Args {
    #[command(flatten)]
    monitor: MonitorArgs,
}

/// How a watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Interrupted,
}

impl Outcome {
    fn exit_code(self) -> i32 {
        match self {
            Outcome::Completed => 0,
            Outcome::Failed => 1,
            Outcome::Interrupted => 130,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let task_id = args.monitor.task_id()?;

    let config = cli::load_config(&args.monitor)?;

    let log_guard =
        studywatch_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(task_id = %task_id, "studywatch-watch starting");

    let client = TaskClient::new(&config.server).context("failed to create API client")?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nStopping...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to set Ctrl-C handler")?;

    let runtime = cli::runtime()?;
    let outcome = runtime.block_on(async move {
        if !cli::check_server(&client).await {
            eprintln!(
                "warning: {} did not pass the health check, polling anyway",
                client.base_url()
            );
        }

        let monitor = Monitor::new(client, config.monitor.interval());
        let mut handle = monitor.start(task_id);
        let outcome = watch(&mut handle, &interrupted).await;
        handle.finished().await;
        outcome
    });

    tracing::info!(outcome = ?outcome, "studywatch-watch finished");

    // process::exit skips destructors; flush the log first.
    drop(runtime);
    drop(log_guard);
    std::process::exit(outcome.exit_code());
}

fn print_log(pb: &ProgressBar, entry: &LogEntry) {
    let line = format!(
        "{} {:<8} {}",
        format_log_time(entry.timestamp),
        entry.level.as_str().to_uppercase(),
        entry.message
    );
    pb.suspend(|| println!("{}", line));
}

/// Follow the session until it finishes or the user interrupts.
async fn watch(handle: &mut MonitorHandle, interrupted: &AtomicBool) -> Outcome {
    let mut rx = handle.subscribe();

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let mut printed = 0;

    loop {
        {
            let state = rx.borrow_and_update();

            for entry in state.logs.since(printed) {
                print_log(&pb, entry);
            }
            printed = state.logs.len();

            let task_view = view::reduce(&state, &ExpandedSet::new());
            pb.set_position(u64::from(task_view.percent));
            let mut message = format!(
                "{} {}/{}",
                task_view.badge.label, task_view.progress, task_view.total
            );
            if let Some(course) = task_view.current_course {
                message.push_str(&format!("  {}", course));
            }
            pb.set_message(message);

            match state.phase {
                // Fetches issued alongside the terminal status are still draining.
                PollPhase::Finished if handle.is_running() => {}
                PollPhase::Finished => {
                    let status = state.status.as_ref();
                    if status.map(|s| s.status) == Some(TaskStatus::Completed) {
                        pb.finish_with_message("completed");
                        println!(
                            "Task {} completed ({}/{} courses)",
                            state.task_id, task_view.progress, task_view.total
                        );
                        break Outcome::Completed;
                    }
                    pb.abandon_with_message("failed");
                    eprintln!(
                        "Task {} failed: {}",
                        state.task_id,
                        task_view.error.unwrap_or("no error message from server")
                    );
                    break Outcome::Failed;
                }
                PollPhase::Stopped => {
                    pb.abandon_with_message("stopped");
                    break Outcome::Interrupted;
                }
                PollPhase::Polling => {}
            }
        }

        if interrupted.load(Ordering::SeqCst) {
            handle.stop();
            pb.abandon_with_message("interrupted");
            break Outcome::Interrupted;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() && !rx.has_changed().unwrap_or(false) {
                    // Driver gone: one last pass over the final state.
                    let phase = rx.borrow().phase;
                    if phase == PollPhase::Polling {
                        pb.abandon_with_message("monitor exited");
                        break Outcome::Interrupted;
                    }
                }
            }
            _ = tokio::time::sleep(INTERRUPT_POLL) => {}
        }
    }
}
