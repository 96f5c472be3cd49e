//! UI rendering for the TUI.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, Paragraph, Wrap},
    Frame,
};
use studywatch_core::format::{format_log_time, format_relative_epoch, format_start_time};
use studywatch_core::view::{CourseView, MediaJobView, StatsView, StatusBadge, TaskView, Tone};
use studywatch_core::{LogEntry, LogLevel, PollPhase};

use crate::app::{App, Focus};

// ========== Palette ==========

/// Accent for keys and highlights
const ACCENT: Color = Color::Rgb(0, 200, 200);
/// Running / in progress
const TONE_ACTIVE: Color = Color::Rgb(80, 160, 255);
/// Completed / success
const TONE_SUCCESS: Color = Color::Rgb(50, 205, 50);
/// Error
const TONE_FAILURE: Color = Color::Rgb(230, 80, 80);
/// Warnings in the log
const TONE_WARNING: Color = Color::Rgb(255, 180, 60);
/// Secondary text
const DIM: Color = Color::Rgb(128, 128, 128);
/// Label color for metadata attributes
const LABEL_COLOR: Color = Color::Rgb(100, 180, 180);
/// Border color for unfocused blocks
const BORDER_IDLE: Color = Color::Rgb(70, 70, 70);
/// Border color for the focused block
const BORDER_FOCUS: Color = Color::Rgb(0, 150, 150);

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Neutral => DIM,
        Tone::Active => TONE_ACTIVE,
        Tone::Success => TONE_SUCCESS,
        Tone::Failure => TONE_FAILURE,
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Info => Color::White,
        LogLevel::Warning => TONE_WARNING,
        LogLevel::Error => TONE_FAILURE,
        LogLevel::Success => TONE_SUCCESS,
    }
}

fn panel(title: &str, focused: bool) -> Block<'_> {
    let border = if focused { BORDER_FOCUS } else { BORDER_IDLE };
    Block::default()
        .title(Span::styled(format!(" {} ", title), Style::default().bold()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
}

/// Render the application UI.
pub fn render(frame: &mut Frame, app: &App) {
    let view = app.view();
    let area = frame.area();

    let jobs_height = if view.jobs.is_empty() {
        0
    } else {
        (view.jobs.len().min(4) * 2 + 2) as u16
    };
    let error_height = if view.error.is_some() { 3 } else { 0 };

    // Layout: header, overall gauge, error, media jobs, courses | stats, logs, footer
    let chunks = Layout::vertical([
        Constraint::Length(4),            // Header
        Constraint::Length(3),            // Overall progress
        Constraint::Length(error_height), // Task error
        Constraint::Length(jobs_height),  // Active media jobs
        Constraint::Min(6),               // Courses | Stats
        Constraint::Length(10),           // Logs
        Constraint::Length(1),            // Footer
    ])
    .split(area);

    render_header(frame, &view, chunks[0]);
    render_progress(frame, &view, chunks[1]);
    if let Some(error) = view.error {
        render_error(frame, error, chunks[2]);
    }
    if !view.jobs.is_empty() {
        render_jobs(frame, &view.jobs, chunks[3]);
    }

    let middle = Layout::horizontal([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[4]);
    render_courses(frame, app, &view.courses, middle[0]);
    render_stats(frame, &view, middle[1]);

    render_logs(frame, app, view.logs, chunks[5]);
    render_footer(frame, app, &view, chunks[6]);
}

fn render_header(frame: &mut Frame, view: &TaskView, area: Rect) {
    let badge_style = Style::default().fg(tone_color(view.badge.tone)).bold();

    let mut lines = vec![Line::from(vec![
        Span::styled(" studywatch ", Style::default().fg(ACCENT).bold()),
        Span::styled("│ ", Style::default().fg(DIM)),
        Span::styled(format!("{} {}", view.badge.icon, view.badge.label), badge_style),
        Span::styled("  task ", Style::default().fg(DIM)),
        Span::styled(view.task_id.to_string(), Style::default().fg(Color::White)),
        Span::styled("  started ", Style::default().fg(DIM)),
        Span::styled(format_start_time(view.started_at), Style::default().fg(Color::White)),
    ])];

    let current = [
        ("Course", view.current_course),
        ("Chapter", view.current_chapter),
        ("Task", view.current_task),
    ];
    let mut spans = vec![Span::raw(" ")];
    for (label, value) in current {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            spans.push(Span::styled(format!("{}: ", label), Style::default().fg(LABEL_COLOR)));
            spans.push(Span::styled(format!("{}   ", value), Style::default().fg(Color::White)));
        }
    }
    lines.push(Line::from(spans));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER_IDLE));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_progress(frame: &mut Frame, view: &TaskView, area: Rect) {
    let gauge = Gauge::default()
        .block(panel("Progress", false))
        .gauge_style(Style::default().fg(tone_color(view.badge.tone)))
        .percent(u16::from(view.percent))
        .label(format!(
            "{}%  ({}/{} courses)",
            view.percent, view.progress, view.total
        ));
    frame.render_widget(gauge, area);
}

fn render_error(frame: &mut Frame, error: &str, area: Rect) {
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled("✗ ", Style::default().fg(TONE_FAILURE).bold()),
        Span::styled(error.to_string(), Style::default().fg(TONE_FAILURE)),
    ]))
    .wrap(Wrap { trim: true })
    .block(panel("Task failed", false).border_style(Style::default().fg(TONE_FAILURE)));
    frame.render_widget(paragraph, area);
}

fn render_jobs(frame: &mut Frame, jobs: &[MediaJobView], area: Rect) {
    let block = panel("Playing", false);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let shown = jobs.len().min(4);
    let rows = Layout::vertical(vec![Constraint::Length(2); shown]).split(inner);

    for (job, row) in jobs.iter().zip(rows.iter()) {
        let parts = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(*row);

        let title = Line::from(vec![
            Span::styled(job.job_name.clone(), Style::default().fg(Color::White).bold()),
            Span::styled(format!("  {}", job.course_name), Style::default().fg(DIM)),
            Span::styled(
                format!("  updated {}", format_relative_epoch(job.updated_at)),
                Style::default().fg(DIM),
            ),
        ]);
        frame.render_widget(Paragraph::new(title), parts[0]);

        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(TONE_ACTIVE))
            .percent(u16::from(job.percent))
            .label(format!(
                "{} / {}  {}%",
                job.current_time, job.duration, job.percent
            ));
        frame.render_widget(gauge, parts[1]);
    }
}

fn course_lines(course: &CourseView, selected: bool) -> Vec<Line<'static>> {
    let marker = if course.expanded { "▾" } else { "▸" };
    let badge: StatusBadge = course.badge;
    let ratio = match course.completion_ratio() {
        Some(ratio) => format!("{:>3.0}%", ratio * 100.0),
        None => "   -".to_string(),
    };

    let mut title_style = Style::default().fg(Color::White);
    if selected {
        title_style = title_style.add_modifier(Modifier::REVERSED);
    }

    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", marker), Style::default().fg(DIM)),
        Span::styled(format!("{} ", badge.icon), Style::default().fg(tone_color(badge.tone))),
        Span::styled(course.title.clone(), title_style),
        Span::styled(
            format!(
                "  {}/{} chapters {}",
                course.finished_chapters, course.total_chapters, ratio
            ),
            Style::default().fg(DIM),
        ),
    ])];

    if course.expanded {
        lines.push(Line::from(Span::styled(
            format!(
                "    started {}  ended {}",
                format_start_time(course.started_at),
                format_start_time(course.ended_at)
            ),
            Style::default().fg(DIM),
        )));
        if let Some(error) = &course.error {
            lines.push(Line::from(Span::styled(
                format!("    ✗ {}", error),
                Style::default().fg(TONE_FAILURE),
            )));
        }
        if course.chapters.is_empty() {
            lines.push(Line::from(Span::styled(
                "    no chapters",
                Style::default().fg(DIM),
            )));
        }
        for chapter in &course.chapters {
            let (icon, color) = if chapter.finished {
                ("✓", TONE_SUCCESS)
            } else {
                ("·", DIM)
            };
            let mut spans = vec![
                Span::styled(format!("    {} ", icon), Style::default().fg(color)),
                Span::styled(
                    format!("{}. {}", chapter.index, chapter.title),
                    Style::default().fg(Color::Gray),
                ),
            ];
            if let Some(jobs) = chapter.job_count {
                spans.push(Span::styled(
                    format!("  ({} jobs)", jobs),
                    Style::default().fg(DIM),
                ));
            }
            lines.push(Line::from(spans));
        }
    }

    lines
}

fn render_courses(frame: &mut Frame, app: &App, courses: &[CourseView], area: Rect) {
    let block = panel("Courses", app.focus == Focus::Courses);

    if courses.is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            " Waiting for course details…",
            Style::default().fg(DIM),
        ))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let mut lines = Vec::new();
    let mut selected_line = 0;
    for (i, course) in courses.iter().enumerate() {
        let selected = i == app.selected_course;
        if selected {
            selected_line = lines.len();
        }
        lines.extend(course_lines(course, selected));
    }

    // Keep the selected course in view
    let height = area.height.saturating_sub(2) as usize;
    let scroll = selected_line.saturating_sub(height.saturating_sub(1));

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((scroll.min(u16::MAX as usize) as u16, 0));
    frame.render_widget(paragraph, area);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!(" {:<10}", label), Style::default().fg(LABEL_COLOR)),
        Span::styled(value, Style::default().fg(color).bold()),
    ])
}

fn render_stats(frame: &mut Frame, view: &TaskView, area: Rect) {
    let mut lines = Vec::new();

    match &view.stats {
        Some(StatsView {
            completed_chapters,
            total_chapters,
            completed_tasks,
            total_tasks,
            failed_tasks,
            skipped_tasks,
        }) => {
            lines.push(stat_line(
                "Chapters",
                format!("{}/{}", completed_chapters, total_chapters),
                Color::White,
            ));
            lines.push(stat_line(
                "Tasks",
                format!("{}/{}", completed_tasks, total_tasks),
                Color::White,
            ));
            if let Some(failed) = failed_tasks {
                lines.push(stat_line("Failed", failed.to_string(), TONE_FAILURE));
            }
            if let Some(skipped) = skipped_tasks {
                lines.push(stat_line("Skipped", skipped.to_string(), TONE_WARNING));
            }
        }
        None => lines.push(Line::from(Span::styled(
            " No statistics yet",
            Style::default().fg(DIM),
        ))),
    }

    frame.render_widget(Paragraph::new(lines).block(panel("Stats", false)), area);
}

fn log_line(entry: &LogEntry) -> Line<'static> {
    let color = level_color(entry.level);
    Line::from(vec![
        Span::styled(
            format!(" {} ", format_log_time(entry.timestamp)),
            Style::default().fg(DIM),
        ),
        Span::styled(
            format!("{:<8}", entry.level.as_str().to_uppercase()),
            Style::default().fg(color).bold(),
        ),
        Span::styled(entry.message.clone(), Style::default().fg(color)),
    ])
}

fn render_logs(frame: &mut Frame, app: &App, logs: &[LogEntry], area: Rect) {
    let follow = if app.log_auto_scroll { "follow" } else { "paused" };
    let title = format!("Logs ({}) · {}", logs.len(), follow);
    let block = panel(&title, app.focus == Focus::Logs);

    if logs.is_empty() {
        let placeholder = Paragraph::new(Span::styled(
            " Waiting for log output…",
            Style::default().fg(DIM),
        ))
        .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    // Offset counts back from the newest entry
    let height = area.height.saturating_sub(2) as usize;
    let end = logs.len() - app.log_scroll_offset.min(logs.len() - 1);
    let start = end.saturating_sub(height);
    let lines: Vec<Line> = logs[start..end].iter().map(log_line).collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(frame: &mut Frame, app: &App, view: &TaskView, area: Rect) {
    let key_style = Style::default().fg(ACCENT).bold();
    let label_style = Style::default().fg(Color::DarkGray);
    let separator = Span::styled("  │  ", Style::default().fg(Color::DarkGray));

    let mut spans = vec![Span::raw(" ")];

    if view.is_terminal || view.phase != PollPhase::Polling {
        spans.push(Span::styled(
            "Monitoring finished, press q to return",
            Style::default().fg(tone_color(view.badge.tone)).bold(),
        ));
    } else {
        spans.extend([
            Span::styled("[Tab]", key_style),
            Span::styled(" Focus  ", label_style),
            separator.clone(),
            Span::styled("[j/k]", key_style),
            Span::styled(" Move  ", label_style),
            separator.clone(),
            Span::styled("[Enter]", key_style),
            Span::styled(" Expand  ", label_style),
            separator.clone(),
            Span::styled("[Space]", key_style),
            Span::styled(" Auto-scroll  ", label_style),
            separator.clone(),
            Span::styled("[q]", key_style),
            Span::styled(" Stop", label_style),
        ]);
    }

    let failures = view.failures.total();
    if failures > 0 {
        spans.push(separator.clone());
        spans.push(Span::styled(
            format!("{} failed fetches", failures),
            Style::default().fg(TONE_WARNING),
        ));
    }
    if !app.server_healthy {
        spans.push(separator);
        spans.push(Span::styled(
            format!("{} failed health check", app.base_url),
            Style::default().fg(TONE_WARNING),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
