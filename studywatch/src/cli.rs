//! Command-line arguments and startup shared by both binaries.

use anyhow::{Context, Result};
use clap::Args;
use studywatch_core::{Config, TaskClient, TaskId};

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Id of the task to monitor (as returned when the task was started)
    #[arg(value_name = "TASK_ID")]
    pub task_id: String,

    /// Base URL of the study server API (overrides server.base_url)
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Poll interval in milliseconds (overrides monitor.interval_ms)
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

impl MonitorArgs {
    pub fn task_id(&self) -> Result<TaskId> {
        let id = self.task_id.trim();
        anyhow::ensure!(!id.is_empty(), "TASK_ID must not be empty");
        Ok(TaskId::new(id))
    }
}

/// Load the config file and apply command-line overrides.
pub fn load_config(args: &MonitorArgs) -> Result<Config> {
    let mut config = Config::load().context("failed to load configuration")?;

    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.monitor.interval_ms = interval_ms;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Build the current-thread runtime both binaries poll on.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// Probe the server once; an unhealthy answer is only a warning.
pub async fn check_server(client: &TaskClient) -> bool {
    let healthy = client.health_check().await.unwrap_or(false);
    if healthy {
        tracing::info!(base_url = %client.base_url(), "Server health check passed");
    } else {
        tracing::warn!(
            base_url = %client.base_url(),
            "Server did not pass the health check, polling anyway"
        );
    }
    healthy
}
