use crate::backend::SessionBackend;
use crate::clock::Clock;
use crate::engine::{TimerEngine, TimerEvent};
use crate::models::{StudySessionRecord, TimerMode};
use crate::stats::{calculate_stats, weekly_progress, SessionSummary};
use crate::utils::{format_clock, format_duration};
use anyhow::Result;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use crossterm::{
    event::{self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::time::Duration as StdDuration;

const TICK_INTERVAL: StdDuration = StdDuration::from_millis(500);
const ALERT_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
enum AlertKind {
    Info,
    Reminder,
    Error,
}

struct Alert {
    text: String,
    kind: AlertKind,
    expires_at: DateTime<Utc>,
}

/// Transient banners shown above the footer.
#[derive(Default)]
struct Alerts {
    items: Vec<Alert>,
}

impl Alerts {
    fn push_events(&mut self, events: Vec<TimerEvent>, now: DateTime<Utc>) {
        for event in events {
            let (text, kind) = match event {
                TimerEvent::Completed { finished, next } => (
                    format!("{finished} interval complete, next up: {next}"),
                    AlertKind::Info,
                ),
                TimerEvent::SessionSaved(record) => (
                    format!(
                        "Saved study session ({})",
                        format_duration(record.duration_seconds as i64)
                    ),
                    AlertKind::Info,
                ),
                TimerEvent::SaveFailed(message) => (message, AlertKind::Error),
                TimerEvent::Reminder(message) => (message.to_string(), AlertKind::Reminder),
                TimerEvent::Started(_)
                | TimerEvent::Paused { .. }
                | TimerEvent::Reset(_)
                | TimerEvent::ModeSwitched(_) => continue,
            };
            self.items.push(Alert {
                text,
                kind,
                expires_at: now + Duration::seconds(ALERT_SECS),
            });
        }
    }

    fn expire(&mut self, now: DateTime<Utc>) {
        self.items.retain(|a| a.expires_at > now);
    }

    fn latest(&self) -> Option<&Alert> {
        self.items.last()
    }
}

pub fn run_tui<B: SessionBackend, C: Clock>(
    engine: &mut TimerEngine<B, C>,
    initial: Vec<TimerEvent>,
) -> Result<()> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut alerts = Alerts::default();
    alerts.push_events(initial, engine.now());
    let res = run_loop(&mut terminal, engine, &mut alerts);

    engine.shutdown();

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("timer view failed: {:?}", err);
        println!("{:?}", err)
    }

    Ok(())
}

fn run_loop<B: SessionBackend, C: Clock>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &mut TimerEngine<B, C>,
    alerts: &mut Alerts,
) -> Result<()> {
    loop {
        terminal.draw(|f| draw(f, engine, alerts))?;

        let mut events = Vec::new();
        if event::poll(TICK_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(())
                    }
                    KeyCode::Char(' ') | KeyCode::Char('s') => events.extend(engine.toggle()),
                    KeyCode::Char('r') => events.extend(engine.reset()),
                    KeyCode::Char('m') => {
                        let next = engine.state().mode.other();
                        events.extend(engine.switch_mode(next));
                    }
                    _ => {}
                },
                Event::FocusGained => events.extend(engine.visibility_restored()),
                Event::FocusLost => engine.visibility_hidden(),
                _ => {}
            }
        }

        events.extend(engine.tick());
        let now = engine.now();
        alerts.push_events(events, now);
        alerts.expire(now);
    }
}

fn draw<B: SessionBackend, C: Clock>(
    frame: &mut Frame,
    engine: &TimerEngine<B, C>,
    alerts: &Alerts,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(9), // Timer + stats
            Constraint::Min(0),    // Chart
            Constraint::Length(3), // Alerts
            Constraint::Length(3), // Footer
        ])
        .split(frame.size());

    let sessions = engine.all_sessions();
    draw_header(frame, chunks[0], engine);
    draw_body(frame, chunks[1], engine, &sessions);
    draw_chart(frame, chunks[2], &sessions);
    draw_alerts(frame, chunks[3], alerts);
    draw_footer(frame, chunks[4]);
}

fn mode_color(mode: TimerMode) -> Color {
    match mode {
        TimerMode::Study => Color::Green,
        TimerMode::Break => Color::Cyan,
    }
}

fn draw_header<B: SessionBackend, C: Clock>(
    frame: &mut Frame,
    area: Rect,
    engine: &TimerEngine<B, C>,
) {
    let state = engine.state();
    let status = if state.is_running {
        Span::styled(
            "RUNNING",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
    } else if state.elapsed_seconds() > 0 {
        Span::styled(
            "PAUSED",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw("READY")
    };

    let header = Line::from(vec![
        Span::styled(
            " Prepclock ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            state.mode.to_string().to_uppercase(),
            Style::default()
                .fg(mode_color(state.mode))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        status,
        Span::raw(" | "),
        Span::raw(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    ]);

    let header = Paragraph::new(header).block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_body<B: SessionBackend, C: Clock>(
    frame: &mut Frame,
    area: Rect,
    engine: &TimerEngine<B, C>,
    sessions: &[StudySessionRecord],
) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(area);

    draw_timer_block(frame, chunks[0], engine);

    let stats = calculate_stats(sessions, Local::now().date_naive());
    draw_summary_block(frame, chunks[1], " TODAY ", &stats.today_summary);
    draw_summary_block(frame, chunks[2], " WEEK ", &stats.week_summary);
}

fn draw_timer_block<B: SessionBackend, C: Clock>(
    frame: &mut Frame,
    area: Rect,
    engine: &TimerEngine<B, C>,
) {
    let state = engine.state();
    let mut lines = vec![
        Line::raw(""),
        Line::from(Span::styled(
            format_clock(state.remaining_seconds),
            Style::default()
                .fg(mode_color(state.mode))
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        Line::raw(""),
    ];

    if state.mode == TimerMode::Study {
        let saved = if state.session_saved {
            "saved"
        } else if state.session_id.is_some() {
            "in progress"
        } else {
            "not started"
        };
        lines.push(Line::raw(format!("  Session: {}", saved)));
    } else {
        lines.push(Line::raw(format!(
            "  Next study: {}",
            format_duration(engine.settings().study_seconds as i64)
        )));
    }
    if !state.pending_saves.is_empty() {
        lines.push(Line::raw(format!(
            "  Unsaved sessions: {} (retrying)",
            state.pending_saves.len()
        )));
    }

    lines.push(Line::raw(format!(
        "  Cycles: {}",
        engine.cycles_completed()
    )));

    let reminder = match state.next_reminder_epoch_ms {
        Some(ms) => match Local.timestamp_millis_opt(ms).single() {
            Some(at) => at.format("%H:%M").to_string(),
            None => "---".to_string(),
        },
        None if engine.reminders_enabled() => "---".to_string(),
        None => "off".to_string(),
    };
    lines.push(Line::raw(format!("  Next reminder: {}", reminder)));

    let block = Block::default()
        .title(Span::styled(
            format!(" {} ", state.mode.to_string().to_uppercase()),
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_summary_block(frame: &mut Frame, area: Rect, title: &str, summary: &SessionSummary) {
    let lines = vec![
        Line::raw(""),
        Line::from(vec![
            Span::styled("  Study:", Style::default().fg(Color::Green)),
            Span::raw(format!(
                " {}",
                format_duration(summary.total_seconds as i64)
            )),
        ]),
        Line::raw(format!("  Sessions: {}", summary.count)),
        Line::raw(format!(
            "  Avg: {}",
            format_duration(summary.average_seconds() as i64)
        )),
        Line::raw(format!(
            "  Longest: {}",
            format_duration(summary.longest.unwrap_or(0) as i64)
        )),
    ];

    let block = Block::default()
        .title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_chart(frame: &mut Frame, area: Rect, sessions: &[StudySessionRecord]) {
    let chart_block = Block::default()
        .title(" Study Time - Last 7 Days ")
        .borders(Borders::ALL);
    let inner_area = chart_block.inner(area);
    frame.render_widget(chart_block, area);

    if inner_area.height < 2 || inner_area.width < 14 {
        return;
    }

    let progress = weekly_progress(sessions, Local::now().date_naive());
    let max_secs = progress.values().copied().max().unwrap_or(0).max(1);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 7); 7])
        .split(inner_area);

    for (i, (date, secs)) in progress.into_iter().enumerate() {
        let col_area = columns[i];

        let bar_label_split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(col_area);

        let bar_area = bar_label_split[0];
        let label_area = bar_label_split[1];

        // Center the bar horizontally within the column
        let bar_width = 5.min(bar_area.width);
        let bar_x_offset = (bar_area.width - bar_width) / 2;
        let centered_bar_area = Rect::new(
            bar_area.x + bar_x_offset,
            bar_area.y,
            bar_width,
            bar_area.height,
        );

        frame.render_widget(
            Paragraph::new(date.format("%a").to_string()).alignment(Alignment::Center),
            label_area,
        );

        if centered_bar_area.height > 0 {
            let bar_height = (secs * centered_bar_area.height as u64 / max_secs) as u16;
            let bar_chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(centered_bar_area.height.saturating_sub(bar_height)),
                    Constraint::Length(bar_height),
                ])
                .split(centered_bar_area);

            if bar_height > 0 {
                frame.render_widget(Block::default().bg(Color::Green), bar_chunks[1]);
            }
        }
    }
}

fn draw_alerts(frame: &mut Frame, area: Rect, alerts: &Alerts) {
    let line = match alerts.latest() {
        Some(alert) => {
            let color = match alert.kind {
                AlertKind::Info => Color::Cyan,
                AlertKind::Reminder => Color::Magenta,
                AlertKind::Error => Color::Red,
            };
            Line::from(Span::styled(
                alert.text.clone(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ))
        }
        None => Line::raw(""),
    };
    let para = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(para, area);
}

fn draw_footer(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        "'space' start/pause | 'r' reset | 'm' switch study/break | 'q' quit",
    )
    .block(Block::default().borders(Borders::ALL))
    .alignment(Alignment::Center);
    frame.render_widget(help, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::MemoryBackend;
    use crate::clock::ManualClock;
    use crate::config::TimerSettings;
    use crate::notify::testing::RecordingNotifier;
    use crate::storage::LocalStore;
    use ratatui::backend::TestBackend;
    use tempfile::tempdir;

    #[test]
    fn test_frame_reads_sessions_once() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default();
        let engine = TimerEngine::new(
            TimerSettings::default(),
            backend.clone(),
            LocalStore::from_dir(dir.path().join("local")),
            ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()),
            Box::new(RecordingNotifier::default()),
        );
        let alerts = Alerts::default();

        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|frame| draw(frame, &engine, &alerts)).unwrap();
        assert_eq!(backend.reads(), 1);

        terminal.draw(|frame| draw(frame, &engine, &alerts)).unwrap();
        assert_eq!(backend.reads(), 2);
    }

    #[test]
    fn test_alerts_skip_plain_transitions() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let mut alerts = Alerts::default();
        alerts.push_events(
            vec![
                TimerEvent::Started(TimerMode::Study),
                TimerEvent::Paused {
                    remaining_seconds: 10,
                },
            ],
            now,
        );
        assert!(alerts.latest().is_none());
    }

    #[test]
    fn test_alerts_expire() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let mut alerts = Alerts::default();
        alerts.push_events(
            vec![TimerEvent::SaveFailed("Could not save".to_string())],
            now,
        );
        assert_eq!(alerts.latest().map(|a| a.kind), Some(AlertKind::Error));

        alerts.expire(now + Duration::seconds(ALERT_SECS - 1));
        assert!(alerts.latest().is_some());
        alerts.expire(now + Duration::seconds(ALERT_SECS));
        assert!(alerts.latest().is_none());
    }

    #[test]
    fn test_reminder_alert_text() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        let mut alerts = Alerts::default();
        alerts.push_events(vec![TimerEvent::Reminder("Drink some water")], now);
        let alert = alerts.latest().unwrap();
        assert_eq!(alert.text, "Drink some water");
        assert_eq!(alert.kind, AlertKind::Reminder);
    }
}
