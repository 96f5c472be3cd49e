//! Application state for the TUI.

use crossterm::event::{KeyCode, KeyEvent};
use studywatch_core::view::{self, ExpandedSet, TaskView};
use studywatch_core::{MonitorHandle, MonitorState};
use tokio::sync::watch;

/// Which pane receives navigation keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Courses,
    Logs,
}

/// Main application state.
pub struct App {
    /// Running session; `None` only in tests
    handle: Option<MonitorHandle>,
    state_rx: watch::Receiver<MonitorState>,
    /// Latest state copied out of the monitor
    state: MonitorState,
    driver_gone: bool,
    /// Courses the user has expanded
    pub expanded: ExpandedSet,
    pub focus: Focus,
    /// Selected row in the course list
    pub selected_course: usize,
    /// Lines scrolled back from the newest log entry
    pub log_scroll_offset: usize,
    /// Follow the newest log entry as batches arrive
    pub log_auto_scroll: bool,
    /// Result of the startup health check
    pub server_healthy: bool,
    pub base_url: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(handle: MonitorHandle, auto_scroll: bool, base_url: String) -> Self {
        let state_rx = handle.subscribe();
        let mut app = Self::with_receiver(state_rx, auto_scroll, base_url);
        app.handle = Some(handle);
        app
    }

    fn with_receiver(
        state_rx: watch::Receiver<MonitorState>,
        auto_scroll: bool,
        base_url: String,
    ) -> Self {
        let state = state_rx.borrow().clone();
        Self {
            handle: None,
            state_rx,
            state,
            driver_gone: false,
            expanded: ExpandedSet::new(),
            focus: Focus::default(),
            selected_course: 0,
            log_scroll_offset: 0,
            log_auto_scroll: auto_scroll,
            server_healthy: true,
            base_url,
            should_quit: false,
        }
    }

    /// Derive the view for the next frame.
    pub fn view(&self) -> TaskView<'_> {
        view::reduce(&self.state, &self.expanded)
    }

    pub fn course_count(&self) -> usize {
        self.state.details.as_ref().map_or(0, |d| d.courses.len())
    }

    /// Pull the newest state from the monitor, if it changed.
    ///
    /// Keeps the log view anchored when auto-scroll is off, and keeps the
    /// course selection in range when the tree shrinks.
    pub fn sync_state(&mut self) {
        match self.state_rx.has_changed() {
            Ok(true) => {}
            Ok(false) => return,
            // The driver has exited; its last value is read once.
            Err(_) if self.driver_gone => return,
            Err(_) => self.driver_gone = true,
        }
        let next = self.state_rx.borrow_and_update().clone();

        let added = next.logs.len().saturating_sub(self.state.logs.len());
        self.state = next;

        if added > 0 {
            if self.log_auto_scroll {
                self.log_scroll_offset = 0;
            } else {
                self.log_scroll_offset = self.log_scroll_offset.saturating_add(added);
            }
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let count = self.course_count();
        if self.selected_course >= count {
            self.selected_course = count.saturating_sub(1);
        }
    }

    /// Stop monitoring. The UI stays up until `should_quit` is acted on.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            handle.stop();
        }
    }

    /// Handle keyboard input.
    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.stop();
                self.should_quit = true;
            }
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Courses => Focus::Logs,
                    Focus::Logs => Focus::Courses,
                };
            }
            _ => match self.focus {
                Focus::Courses => self.handle_course_key(key),
                Focus::Logs => self.handle_log_key(key),
            },
        }
    }

    fn handle_course_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_course + 1 < self.course_count() {
                    self.selected_course += 1;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_course = self.selected_course.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.selected_course = 0;
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.selected_course = self.course_count().saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.toggle_selected_course();
            }
            _ => {}
        }
    }

    fn toggle_selected_course(&mut self) {
        let course_id = self
            .state
            .details
            .as_ref()
            .and_then(|d| d.courses.get(self.selected_course))
            .map(|c| c.id.clone());

        if let Some(course_id) = course_id {
            let expanded = self.expanded.toggle(&course_id);
            tracing::debug!(course_id = %course_id, expanded, "Toggled course");
        }
    }

    fn handle_log_key(&mut self, key: KeyEvent) {
        let max_offset = self.state.logs.len().saturating_sub(1);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                // Back toward older entries
                self.log_scroll_offset = (self.log_scroll_offset + 1).min(max_offset);
                self.log_auto_scroll = false;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.log_scroll_offset = self.log_scroll_offset.saturating_sub(1);
                // Re-enable auto-scroll when back at the tail
                if self.log_scroll_offset == 0 {
                    self.log_auto_scroll = true;
                }
            }
            KeyCode::PageUp | KeyCode::Char('u') => {
                self.log_scroll_offset = (self.log_scroll_offset + 10).min(max_offset);
                self.log_auto_scroll = false;
            }
            KeyCode::PageDown | KeyCode::Char('d') => {
                self.log_scroll_offset = self.log_scroll_offset.saturating_sub(10);
                if self.log_scroll_offset == 0 {
                    self.log_auto_scroll = true;
                }
            }
            KeyCode::Char(' ') => {
                self.log_auto_scroll = !self.log_auto_scroll;
                if self.log_auto_scroll {
                    self.log_scroll_offset = 0;
                }
            }
            KeyCode::Home | KeyCode::Char('g') => {
                // Oldest entry
                self.log_scroll_offset = max_offset;
                self.log_auto_scroll = false;
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.log_scroll_offset = 0;
                self.log_auto_scroll = true;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use studywatch_core::{
        ChapterDetail, CourseDetail, DetailSnapshot, LogEntry, LogLevel, TaskId, TaskStatus,
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn course(id: &str) -> CourseDetail {
        CourseDetail {
            id: id.to_string(),
            title: format!("Course {}", id),
            status: TaskStatus::Running,
            chapters: vec![ChapterDetail {
                id: "1".to_string(),
                title: "Intro".to_string(),
                has_finished: false,
                job_count: None,
            }],
            start_time: None,
            end_time: None,
            error: None,
        }
    }

    fn app_with(state: MonitorState) -> (App, watch::Sender<MonitorState>) {
        let (tx, rx) = watch::channel(state);
        let app = App::with_receiver(rx, true, "http://127.0.0.1:5000/api".to_string());
        (app, tx)
    }

    fn push_logs(tx: &watch::Sender<MonitorState>, count: usize) {
        tx.send_modify(|s| {
            let start = s.logs.len();
            let batch = (start..start + count)
                .map(|i| LogEntry::new(i as f64, LogLevel::Info, format!("line {}", i)))
                .collect();
            s.logs.append(batch);
        });
    }

    #[test]
    fn test_toggle_selected_course() {
        let mut state = MonitorState::new(TaskId::from("t1"));
        state.details = Some(DetailSnapshot {
            courses: vec![course("c1"), course("c2")],
            ..Default::default()
        });
        let (mut app, _tx) = app_with(state);

        app.handle_key(key(KeyCode::Char('j')));
        app.handle_key(key(KeyCode::Enter));
        assert!(app.expanded.contains("c2"));
        assert!(!app.expanded.contains("c1"));

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.expanded.is_empty());

        // Selection stops at the last course.
        app.handle_key(key(KeyCode::Char('j')));
        assert_eq!(app.selected_course, 1);
    }

    #[test]
    fn test_auto_scroll_follows_new_logs() {
        let (mut app, tx) = app_with(MonitorState::new(TaskId::from("t1")));
        push_logs(&tx, 5);
        app.sync_state();
        assert_eq!(app.state.logs.len(), 5);
        assert_eq!(app.log_scroll_offset, 0);
    }

    #[test]
    fn test_manual_scroll_stays_anchored() {
        let (mut app, tx) = app_with(MonitorState::new(TaskId::from("t1")));
        push_logs(&tx, 5);
        app.sync_state();

        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char('k')));
        app.handle_key(key(KeyCode::Char('k')));
        assert_eq!(app.log_scroll_offset, 2);
        assert!(!app.log_auto_scroll);

        push_logs(&tx, 3);
        app.sync_state();
        assert_eq!(app.log_scroll_offset, 5);

        app.handle_key(key(KeyCode::Char('G')));
        assert_eq!(app.log_scroll_offset, 0);
        assert!(app.log_auto_scroll);
    }

    #[test]
    fn test_space_toggles_auto_scroll_in_log_focus() {
        let (mut app, _tx) = app_with(MonitorState::new(TaskId::from("t1")));
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Logs);

        app.handle_key(key(KeyCode::Char(' ')));
        assert!(!app.log_auto_scroll);
        app.handle_key(key(KeyCode::Char(' ')));
        assert!(app.log_auto_scroll);
    }

    #[test]
    fn test_quit_keys() {
        let (mut app, _tx) = app_with(MonitorState::new(TaskId::from("t1")));
        app.handle_key(key(KeyCode::Esc));
        assert!(app.should_quit);
    }
}
