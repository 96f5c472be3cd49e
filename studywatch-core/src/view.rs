//! Render-ready view model derived from the monitor state.
//!
//! [`reduce`] is a pure function of the current [`MonitorState`] and the
//! user's [`ExpandedSet`]. It never touches the network, the clock or shared
//! mutable state, so any interleaving of status/details/logs completions
//! reduces to a consistent view. Epoch times are left raw; renderers format
//! them with [`crate::format`] against their own clock and timezone.

use std::collections::BTreeSet;

use crate::format::format_clock;
use crate::log_buffer::LogBuffer;
use crate::monitor::{FetchFailures, MonitorState, PollPhase};
use crate::types::{CourseDetail, LogEntry, MediaJob, StatsBlock, TaskStatus};

// ============================================
// Expand/collapse
// ============================================

/// Course ids currently expanded in the UI. Client-local; lives for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedSet {
    ids: BTreeSet<String>,
}

impl ExpandedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `course_id`. Returns true if it is now expanded.
    pub fn toggle(&mut self, course_id: &str) -> bool {
        if self.ids.remove(course_id) {
            false
        } else {
            self.ids.insert(course_id.to_string());
            true
        }
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.ids.contains(course_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================
// Badge
// ============================================

/// Colour family for a badge; the UI maps these onto its palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Active,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: &'static str,
    pub icon: &'static str,
    pub tone: Tone,
}

impl StatusBadge {
    /// Badge shown before the first status arrives.
    pub const LOADING: StatusBadge = StatusBadge {
        label: "Loading",
        icon: "…",
        tone: Tone::Neutral,
    };

    pub fn for_status(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => StatusBadge {
                label: "Pending",
                icon: "○",
                tone: Tone::Neutral,
            },
            TaskStatus::Running => StatusBadge {
                label: "Running",
                icon: "▶",
                tone: Tone::Active,
            },
            TaskStatus::Completed => StatusBadge {
                label: "Completed",
                icon: "✓",
                tone: Tone::Success,
            },
            TaskStatus::Error => StatusBadge {
                label: "Error",
                icon: "✗",
                tone: Tone::Failure,
            },
            TaskStatus::Unknown => StatusBadge {
                label: "Unknown",
                icon: "?",
                tone: Tone::Neutral,
            },
        }
    }
}

// ============================================
// View model
// ============================================

/// `round(100 * progress / max(1, total))` clamped to `0..=100`.
pub fn progress_percent(progress: i64, total: i64) -> u8 {
    let ratio = 100.0 * progress as f64 / total.max(1) as f64;
    ratio.round().clamp(0.0, 100.0) as u8
}

/// Server-reported job progress, rounded and clamped for display.
pub fn job_percent(progress: f64) -> u8 {
    if !progress.is_finite() {
        return 0;
    }
    progress.round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaJobView {
    pub id: String,
    pub job_name: String,
    pub course_name: String,
    pub percent: u8,
    pub current_time: String,
    pub duration: String,
    /// Epoch seconds of the server's last update for this job
    pub updated_at: Option<f64>,
}

impl MediaJobView {
    fn from_job(id: &str, job: &MediaJob) -> Self {
        let job_name = if job.job_name.trim().is_empty() {
            "Untitled job".to_string()
        } else {
            job.job_name.clone()
        };
        Self {
            id: id.to_string(),
            job_name,
            course_name: job.course_name.clone(),
            percent: job_percent(job.progress),
            current_time: format_clock(job.current_time),
            duration: format_clock(job.duration),
            updated_at: job.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterRow {
    /// 1-based position within the course
    pub index: usize,
    pub title: String,
    pub finished: bool,
    pub job_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseView {
    pub id: String,
    pub title: String,
    pub badge: StatusBadge,
    pub finished_chapters: usize,
    pub total_chapters: usize,
    pub expanded: bool,
    /// Populated only while expanded
    pub chapters: Vec<ChapterRow>,
    /// Epoch seconds
    pub started_at: Option<f64>,
    /// `None` while the course is still running
    pub ended_at: Option<f64>,
    pub error: Option<String>,
}

impl CourseView {
    fn from_course(course: &CourseDetail, expanded: &ExpandedSet) -> Self {
        let finished_chapters = course.chapters.iter().filter(|c| c.has_finished).count();
        let is_expanded = expanded.contains(&course.id);
        let chapters = if is_expanded {
            course
                .chapters
                .iter()
                .enumerate()
                .map(|(i, c)| ChapterRow {
                    index: i + 1,
                    title: c.title.clone(),
                    finished: c.has_finished,
                    job_count: c.job_count,
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            id: course.id.clone(),
            title: course.title.clone(),
            badge: StatusBadge::for_status(course.status),
            finished_chapters,
            total_chapters: course.chapters.len(),
            expanded: is_expanded,
            chapters,
            started_at: course.start_time,
            ended_at: course.end_time,
            error: course.error.clone().filter(|e| !e.is_empty()),
        }
    }

    /// Finished / total chapters, or `None` for a course with no chapters.
    pub fn completion_ratio(&self) -> Option<f64> {
        (self.total_chapters > 0)
            .then(|| self.finished_chapters as f64 / self.total_chapters as f64)
    }
}

/// Stats block with the display-time clamping applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsView {
    pub completed_chapters: u64,
    pub total_chapters: u64,
    pub completed_tasks: u64,
    pub total_tasks: u64,
    /// `None` when zero so the UI can hide the row
    pub failed_tasks: Option<u64>,
    pub skipped_tasks: Option<u64>,
}

impl From<&StatsBlock> for StatsView {
    fn from(stats: &StatsBlock) -> Self {
        Self {
            completed_chapters: stats.completed_chapters.min(stats.total_chapters),
            total_chapters: stats.total_chapters,
            completed_tasks: stats.completed_tasks.min(stats.total_tasks),
            total_tasks: stats.total_tasks,
            failed_tasks: (stats.failed_tasks > 0).then_some(stats.failed_tasks),
            skipped_tasks: (stats.skipped_tasks > 0).then_some(stats.skipped_tasks),
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView<'a> {
    pub task_id: &'a str,
    pub badge: StatusBadge,
    pub percent: u8,
    pub progress: i64,
    pub total: i64,
    pub current_course: Option<&'a str>,
    pub current_chapter: Option<&'a str>,
    pub current_task: Option<&'a str>,
    /// Epoch seconds
    pub started_at: Option<f64>,
    /// Server message for a task that ended in error
    pub error: Option<&'a str>,
    pub jobs: Vec<MediaJobView>,
    pub courses: Vec<CourseView>,
    pub stats: Option<StatsView>,
    pub logs: &'a [LogEntry],
    pub is_terminal: bool,
    pub phase: PollPhase,
    pub failures: FetchFailures,
}

/// Derive the view for the current state.
pub fn reduce<'a>(state: &'a MonitorState, expanded: &ExpandedSet) -> TaskView<'a> {
    let status = state.status.as_ref();

    let badge = status.map_or(StatusBadge::LOADING, |s| StatusBadge::for_status(s.status));
    let (progress, total) = status.map_or((0, 0), |s| (s.progress, s.total));
    let error = status
        .filter(|s| s.status == TaskStatus::Error)
        .and_then(|s| s.error.as_deref())
        .filter(|e| !e.is_empty());

    let (jobs, courses) = match &state.details {
        Some(details) => (
            details
                .active_jobs
                .iter()
                .map(|(id, job)| MediaJobView::from_job(id, job))
                .collect(),
            details
                .courses
                .iter()
                .map(|c| CourseView::from_course(c, expanded))
                .collect(),
        ),
        None => (Vec::new(), Vec::new()),
    };

    TaskView {
        task_id: state.task_id.as_str(),
        badge,
        percent: progress_percent(progress, total),
        progress,
        total,
        current_course: status.and_then(|s| s.current_course.as_deref()),
        current_chapter: status.and_then(|s| s.current_chapter.as_deref()),
        current_task: status.and_then(|s| s.current_task.as_deref()),
        started_at: status.and_then(|s| s.start_time),
        error,
        jobs,
        courses,
        stats: status.and_then(|s| s.stats.as_ref()).map(StatsView::from),
        logs: log_slice(&state.logs),
        is_terminal: state.is_terminal(),
        phase: state.phase,
        failures: state.failures,
    }
}

fn log_slice(logs: &LogBuffer) -> &[LogEntry] {
    logs.entries()
}
