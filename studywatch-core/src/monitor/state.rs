//! The three state slots owned by the poll driver.

use std::fmt;

use crate::log_buffer::LogBuffer;
use crate::types::{DetailSnapshot, StatusSnapshot, TaskId};

/// The three independently fetched views of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Status,
    Details,
    Logs,
}

impl FetchKind {
    pub const ALL: [FetchKind; 3] = [FetchKind::Status, FetchKind::Details, FetchKind::Logs];

    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Status => "status",
            FetchKind::Details => "details",
            FetchKind::Logs => "logs",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the poll loop is in its life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollPhase {
    /// Ticks are being issued
    #[default]
    Polling,
    /// A terminal status was observed; no further ticks
    Finished,
    /// The caller tore the session down
    Stopped,
}

/// Failed fetches per kind, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchFailures {
    pub status: u64,
    pub details: u64,
    pub logs: u64,
}

impl FetchFailures {
    pub fn record(&mut self, kind: FetchKind) {
        match kind {
            FetchKind::Status => self.status += 1,
            FetchKind::Details => self.details += 1,
            FetchKind::Logs => self.logs += 1,
        }
    }

    pub fn get(&self, kind: FetchKind) -> u64 {
        match kind {
            FetchKind::Status => self.status,
            FetchKind::Details => self.details,
            FetchKind::Logs => self.logs,
        }
    }

    pub fn total(&self) -> u64 {
        self.status + self.details + self.logs
    }
}

/// Everything the poll loop knows about a task.
///
/// Each slot is replaced (snapshots) or extended (logs) only by a successful
/// fetch of its own kind; a failure of one kind never touches the others.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub task_id: TaskId,
    /// Latest successful status; `None` until the first one arrives
    pub status: Option<StatusSnapshot>,
    /// Latest successful detail tree; `None` until the first one arrives
    pub details: Option<DetailSnapshot>,
    pub logs: LogBuffer,
    /// Ticks on which at least one fetch was issued
    pub ticks: u64,
    pub phase: PollPhase,
    pub failures: FetchFailures,
}

impl MonitorState {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: None,
            details: None,
            logs: LogBuffer::new(),
            ticks: 0,
            phase: PollPhase::Polling,
            failures: FetchFailures::default(),
        }
    }

    /// True once a terminal status has been applied.
    pub fn is_terminal(&self) -> bool {
        self.status
            .as_ref()
            .map_or(false, |s| s.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    #[test]
    fn test_failures_record() {
        let mut failures = FetchFailures::default();
        failures.record(FetchKind::Logs);
        failures.record(FetchKind::Logs);
        failures.record(FetchKind::Status);
        assert_eq!(failures.get(FetchKind::Logs), 2);
        assert_eq!(failures.get(FetchKind::Details), 0);
        assert_eq!(failures.total(), 3);
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = MonitorState::new(TaskId::from("t1"));
        assert!(state.status.is_none());
        assert!(state.details.is_none());
        assert!(state.logs.is_empty());
        assert_eq!(state.phase, PollPhase::Polling);
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_is_terminal() {
        let mut state = MonitorState::new(TaskId::from("t1"));
        state.status = Some(StatusSnapshot {
            status: TaskStatus::Error,
            progress: 0,
            total: 3,
            current_course: None,
            current_chapter: None,
            current_task: None,
            error: Some("login failed".to_string()),
            start_time: None,
            stats: None,
        });
        assert!(state.is_terminal());
    }
}
