//! Domain types for studywatch
//!
//! These types mirror the three read endpoints of the study server:
//!
//! | Endpoint | Type |
//! |----------|------|
//! | `GET /task/{id}` | [`StatusSnapshot`] |
//! | `GET /task/{id}/details` | [`DetailSnapshot`] |
//! | `GET /logs/{id}` | `Vec<`[`LogEntry`]`>` (incremental) |
//!
//! Every payload arrives wrapped in an [`Envelope`]. The server is written in a
//! dynamic language, so ids may be strings or numbers and most fields may be
//! missing; deserialization is lenient where the UI can cope and strict where
//! it cannot (a status snapshot without a `status` is malformed).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================
// Task identity
// ============================================

/// Opaque identifier of a study task, handed to us by whoever launched it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================
// Status
// ============================================

/// Lifecycle of a study task (and of each course inside it).
///
/// `Pending → Running → {Completed, Error}`. The last two are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
    /// Any value the server sends that we do not recognize
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Terminal states stop polling; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        match self {
            TaskStatus::Completed | TaskStatus::Error => true,
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Unknown => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters maintained by the server while the task runs.
///
/// `completed_* <= total_*` is expected but not guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsBlock {
    pub total_chapters: u64,
    pub completed_chapters: u64,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub skipped_tasks: u64,
}

/// Coarse summary from `GET /task/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Authoritative lifecycle signal
    pub status: TaskStatus,
    /// Courses finished so far
    #[serde(default, deserialize_with = "lenient_count")]
    pub progress: i64,
    /// Courses scheduled in total
    #[serde(default, deserialize_with = "lenient_count")]
    pub total: i64,
    #[serde(default)]
    pub current_course: Option<String>,
    #[serde(default)]
    pub current_chapter: Option<String>,
    #[serde(default)]
    pub current_task: Option<String>,
    /// Server-supplied message when `status` is `error`
    #[serde(default)]
    pub error: Option<String>,
    /// Epoch seconds
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub stats: Option<StatsBlock>,
}

// ============================================
// Details
// ============================================

/// Hierarchical tree from `GET /task/{id}/details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailSnapshot {
    #[serde(default)]
    pub courses: Vec<CourseDetail>,
    /// Media jobs currently playing, keyed by job id
    #[serde(default)]
    pub active_jobs: BTreeMap<String, MediaJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDetail {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub chapters: Vec<ChapterDetail>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterDetail {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub has_finished: bool,
    /// Number of jobs inside the chapter
    #[serde(default, rename = "jobCount")]
    pub job_count: Option<u32>,
}

/// A video/audio job being played back by the server.
///
/// `progress` is reported independently of the time fields; the two may
/// disagree and `progress` wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaJob {
    pub job_name: String,
    pub course_name: String,
    /// 0 to 100
    pub progress: f64,
    /// Seconds
    pub current_time: f64,
    /// Seconds
    pub duration: f64,
    /// Epoch seconds of the last server-side update
    pub timestamp: Option<f64>,
}

// ============================================
// Logs
// ============================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Warning,
    Error,
    Success,
    /// Also covers any level we do not recognize
    #[default]
    #[serde(other)]
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Success => "success",
        }
    }
}

/// One line of the task's execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLogEntry")]
pub struct LogEntry {
    /// Epoch seconds
    pub timestamp: f64,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: f64, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
        }
    }
}

/// Wire form of a log entry: either a full object or a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLogEntry {
    Full {
        #[serde(default)]
        timestamp: f64,
        #[serde(default)]
        level: LogLevel,
        #[serde(default)]
        message: String,
    },
    Text(String),
}

impl From<RawLogEntry> for LogEntry {
    fn from(raw: RawLogEntry) -> Self {
        match raw {
            RawLogEntry::Full {
                timestamp,
                level,
                message,
            } => LogEntry {
                timestamp,
                level,
                message,
            },
            RawLogEntry::Text(message) => LogEntry {
                timestamp: 0.0,
                level: LogLevel::Info,
                message,
            },
        }
    }
}

// ============================================
// Envelope
// ============================================

/// Tagged response wrapper used by every endpoint: `{status, data | msg}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: bool,
    pub data: Option<T>,
    pub msg: Option<String>,
}

/// Accepts `"42"`, `42`, `4.2` or `null` and yields a string id.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Int(i)) => i.to_string(),
        Some(RawId::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

/// Accepts `2`, `2.0` or `null` for a counter; fractions are truncated.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<RawCount>::deserialize(deserializer)? {
        Some(RawCount::Int(i)) => i,
        Some(RawCount::Float(f)) if f.is_finite() => f.trunc() as i64,
        Some(RawCount::Float(_)) | None => 0,
    })
}
