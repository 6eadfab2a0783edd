//! Ratatui event loop driving the aggregator.
//!
//! The loop is single-threaded and cooperative: it consumes exactly one
//! event per iteration — key input first, then at most one pending probe
//! result, then a liveness tick once the tick interval elapses. Results are
//! therefore applied to view state strictly in arrival order, with no
//! interleaving of partial updates.

use std::io;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use crate::audit::AuditLog;
use crate::probe::TestResult;
use crate::registry::Registry;
use crate::ui::app::{App, AppEvent, Mode};
use crate::ui::theme::ThemePalette;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn run_tui(registry: Registry, audit: AuditLog, once: bool) -> Result<()> {
    if once
        && std::env::var("TUI_HEADLESS")
            .map(|v| v == "1")
            .unwrap_or(false)
    {
        return run_tui_headless(registry, audit);
    }

    let mut stdout = io::stdout();
    enable_raw_mode()?;
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let palette = ThemePalette::dark();
    let mut app = App::new(registry, audit);
    let tick_rate = Duration::from_millis(120);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| draw(frame, &app, palette))?;

        let event = next_event(&app, tick_rate, &mut last_tick)?;
        app.handle(event);

        if app.should_quit || once {
            break;
        }
    }

    teardown_terminal()?;
    Ok(())
}

/// Block until the next event. Key input wins, then one pending result,
/// then a tick. One event per call keeps the aggregator's suspension point
/// explicit: the stream is re-requested only after the previous result has
/// been fully applied.
fn next_event(app: &App, tick_rate: Duration, last_tick: &mut Instant) -> Result<AppEvent> {
    loop {
        if event::poll(Duration::from_millis(25))?
            && let Event::Key(key) = event::read()?
        {
            return Ok(AppEvent::Key(key));
        }

        if let Some(result) = app.poll_result() {
            return Ok(AppEvent::Result(result));
        }

        if last_tick.elapsed() >= tick_rate {
            *last_tick = Instant::now();
            return Ok(AppEvent::Tick);
        }
    }
}

fn draw(frame: &mut Frame, app: &App, palette: ThemePalette) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(1), // title
                Constraint::Length(1), // status / destination input
                Constraint::Min(0),    // results table
                Constraint::Length(1), // footer
            ]
            .as_ref(),
        )
        .split(frame.area());

    let title = Paragraph::new(Line::from(Span::styled(
        "Network Connectivity Tester",
        palette.title(),
    )));
    frame.render_widget(title, chunks[0]);

    frame.render_widget(Paragraph::new(status_line(app, palette)), chunks[1]);

    let rows = app.results.iter().map(|result| result_row(result, palette));
    let table = Table::new(
        rows,
        [
            Constraint::Length(15),
            Constraint::Length(20),
            Constraint::Length(10),
            Constraint::Length(20),
        ],
    )
    .header(Row::new(["Server", "Target", "Status", "Time"]).style(palette.title()))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border)),
    );
    frame.render_widget(table, chunks[2]);

    let footer =
        Paragraph::new(footer_legend(app.mode)).style(Style::default().fg(palette.hint));
    frame.render_widget(footer, chunks[3]);
}

fn status_line(app: &App, palette: ThemePalette) -> Line<'_> {
    match app.mode {
        Mode::Idle => Line::from(Span::styled(
            app.status.clone(),
            Style::default().fg(palette.hint),
        )),
        Mode::AwaitingDestination => Line::from(vec![
            Span::styled("Destination: ", Style::default().fg(palette.accent)),
            Span::raw(app.input.clone()),
            Span::styled("▏", Style::default().fg(palette.accent)),
        ]),
        Mode::Running => Line::from(vec![
            Span::styled(
                spinner_frame(app.spinner_frame),
                Style::default().fg(palette.spinner),
            ),
            Span::raw(format!(
                " Testing {} ({}/{} done)",
                app.destination,
                app.results.len(),
                app.expected
            )),
        ]),
        Mode::Complete => Line::from(Span::styled(
            format!("{}/{} tests passed", app.passed(), app.expected),
            palette.title(),
        )),
    }
}

fn result_row(result: &TestResult, palette: ThemePalette) -> Row<'_> {
    let (glyph, color) = if result.success {
        ("✔", palette.success)
    } else {
        ("✘", palette.failure)
    };
    Row::new(vec![
        Cell::from(result.server.clone()),
        Cell::from(result.target.clone()),
        Cell::from(Span::styled(glyph, Style::default().fg(color))),
        Cell::from(result.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
    ])
}

pub fn footer_legend(mode: Mode) -> &'static str {
    match mode {
        Mode::AwaitingDestination => "Enter confirm | Esc cancel | Ctrl-C quit",
        Mode::Running => "q quit (abandons in-flight probes)",
        Mode::Idle | Mode::Complete => "t start tests | q quit",
    }
}

fn spinner_frame(frame: usize) -> &'static str {
    SPINNER_FRAMES[frame % SPINNER_FRAMES.len()]
}

/// Render a single frame to an in-memory backend and exit. CI seam: proves
/// the registry loads and the view draws without touching the terminal.
fn run_tui_headless(registry: Registry, audit: AuditLog) -> Result<()> {
    let app = App::new(registry, audit);
    let backend = ratatui::backend::TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|frame| draw(frame, &app, ThemePalette::dark()))?;
    Ok(())
}

fn teardown_terminal() -> Result<()> {
    let mut stdout = io::stdout();
    disable_raw_mode()?;
    stdout.execute(LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VantageHost;
    use tempfile::TempDir;

    fn test_app() -> (App, TempDir) {
        let dir = TempDir::new().unwrap();
        let registry = Registry {
            servers: vec![VantageHost {
                name: "Site1".into(),
                host: "192.0.2.1".into(),
                user: "admin".into(),
                password: "admin".into(),
            }],
        };
        let audit = AuditLog::new(dir.path().join("audit.log"));
        (App::new(registry, audit), dir)
    }

    fn render_to_string(app: &App) -> String {
        let backend = ratatui::backend::TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| draw(frame, app, ThemePalette::dark()))
            .unwrap();

        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn idle_view_shows_title_and_hint() {
        let (app, _dir) = test_app();
        let screen = render_to_string(&app);
        assert!(screen.contains("Network Connectivity Tester"));
        assert!(screen.contains("1 vantage hosts loaded"));
        assert!(screen.contains("t start tests"));
    }

    #[test]
    fn complete_view_shows_summary_and_rows() {
        let (mut app, _dir) = test_app();
        app.mode = Mode::Complete;
        app.expected = 1;
        app.results
            .push(TestResult::new("Site1", "8.8.8.8", true, "ok".into()));

        let screen = render_to_string(&app);
        assert!(screen.contains("1/1 tests passed"));
        assert!(screen.contains("Site1"));
        assert!(screen.contains("8.8.8.8"));
        assert!(screen.contains("✔"));
    }

    #[test]
    fn spinner_frames_cycle() {
        assert_eq!(spinner_frame(0), SPINNER_FRAMES[0]);
        assert_eq!(spinner_frame(SPINNER_FRAMES.len()), SPINNER_FRAMES[0]);
        assert_ne!(spinner_frame(1), spinner_frame(2));
    }

    #[test]
    fn footer_legend_tracks_mode() {
        assert!(footer_legend(Mode::Running).contains("abandons"));
        assert!(footer_legend(Mode::AwaitingDestination).contains("Esc cancel"));
        assert!(footer_legend(Mode::Idle).contains("t start tests"));
    }
}
