//! # studywatch-core
//!
//! Core library for studywatch - a live monitor for auto-study tasks running
//! on a study server.
//!
//! This library provides:
//! - Domain types for task status, course details and log entries
//! - An HTTP client for the server's read endpoints
//! - The poll scheduler that keeps a task's state current
//! - A pure reducer that turns that state into a render-ready view
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! State flows in one direction:
//! - **Fetch:** [`TaskClient`] reads status, details and logs over HTTP
//! - **Poll:** [`Monitor`] drives the three fetches on a fixed cadence and
//!   owns the resulting [`MonitorState`]
//! - **View:** [`view::reduce`] derives a [`view::TaskView`] for rendering
//!
//! ## Example
//!
//! ```rust,no_run
//! use studywatch_core::{Config, Monitor, TaskClient, TaskId};
//!
//! # async fn run() -> studywatch_core::Result<()> {
//! let config = Config::load()?;
//! let client = TaskClient::new(&config.server)?;
//! let monitor = Monitor::new(client, config.monitor.interval());
//!
//! let mut handle = monitor.start(TaskId::from("alice_1700000000"));
//! handle.finished().await;
//! println!("final status: {:?}", handle.state().status);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::TaskClient;
pub use config::Config;
pub use error::{Error, Result};
pub use log_buffer::LogBuffer;
pub use monitor::{Monitor, MonitorHandle, MonitorState, PollPhase, TaskSource};
pub use types::*;
pub use view::{ExpandedSet, TaskView};

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod log_buffer;
pub mod logging;
pub mod monitor;
pub mod types;
pub mod view;
