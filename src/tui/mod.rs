//! Live dashboard for latency runs.

use std::io::{self, stdout};
use std::time::Duration;

use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};

use crate::domain::latency::{ProbeResult, ProbeTarget};
use crate::services::latency::{BoardCounts, ProbeBoard, RunSummary};
use crate::stats::{LatencyStats, compute_latency_stats};

/// TUI application state, refreshed from a shared [`ProbeBoard`].
pub struct TuiApp {
    pub board: ProbeBoard,
    pub filter_label: String,
    pub entries: Vec<(ProbeTarget, ProbeResult)>,
    pub counts: BoardCounts,
    pub stats: LatencyStats,
    pub run_number: u32,
    pub running: bool,
    pub last_summary: Option<RunSummary>,
    pub should_quit: bool,
    pub cancel_requested: bool,
    pub rerun_requested: bool,
}

impl TuiApp {
    pub fn new(board: ProbeBoard, filter_label: String) -> Self {
        Self {
            board,
            filter_label,
            entries: Vec::new(),
            counts: BoardCounts::default(),
            stats: LatencyStats::default(),
            run_number: 0,
            running: false,
            last_summary: None,
            should_quit: false,
            cancel_requested: false,
            rerun_requested: false,
        }
    }

    pub fn start_run(&mut self) {
        self.run_number += 1;
        self.running = true;
        self.cancel_requested = false;
        self.rerun_requested = false;
        self.last_summary = None;
    }

    pub fn finish_run(&mut self, summary: RunSummary) {
        self.running = false;
        self.last_summary = Some(summary);
        self.refresh();
    }

    /// Pull the latest results from the board.
    pub fn refresh(&mut self) {
        self.entries = self.board.snapshot();
        self.counts = self.board.counts();
        let results: Vec<ProbeResult> = self.entries.iter().map(|(_, r)| *r).collect();
        self.stats = compute_latency_stats(&results);
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('c') | KeyCode::Char('C') if self.running => {
                self.cancel_requested = true;
            }
            KeyCode::Char('r') | KeyCode::Char('R') if !self.running => {
                self.rerun_requested = true;
            }
            _ => {}
        }
    }
}

pub fn ui(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Title
            Constraint::Length(3),  // Progress
            Constraint::Length(6),  // Statistics
            Constraint::Min(10),    // Targets
            Constraint::Length(3),  // Help
        ])
        .split(frame.area());

    render_title(frame, chunks[0], app);
    render_progress(frame, chunks[1], app);
    render_stats(frame, chunks[2], app);
    render_target_list(frame, chunks[3], app);
    render_help(frame, chunks[4], app);
}

fn render_title(frame: &mut Frame, area: Rect, app: &TuiApp) {
    let title = Paragraph::new(format!("driftkit - Endpoint Latency ({})", app.filter_label))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(title, area);
}

fn render_progress(frame: &mut Frame, area: Rect, app: &TuiApp) {
    let total = app.counts.total().max(1);
    let ratio = app.counts.settled() as f64 / total as f64;
    let (label, color) = match (&app.last_summary, app.running, app.cancel_requested) {
        (_, true, true) => (
            format!("Run #{} - cancelling after current batch", app.run_number),
            Color::Yellow,
        ),
        (_, true, false) => (
            format!(
                "Run #{} - {} / {} targets settled",
                app.run_number,
                app.counts.settled(),
                app.counts.total()
            ),
            Color::Green,
        ),
        (Some(s), false, _) if s.cancelled => (
            format!("Run #{} cancelled after {}/{} batches", app.run_number, s.batches_run, s.batches_total),
            Color::Yellow,
        ),
        (Some(s), false, _) => (
            format!("Run #{} finished in {} ms", app.run_number, s.elapsed_ms),
            Color::Cyan,
        ),
        (None, false, _) => ("Idle".to_string(), Color::DarkGray),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Progress"))
        .gauge_style(Style::default().fg(color))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    frame.render_widget(gauge, area);
}

fn render_stats(frame: &mut Frame, area: Rect, app: &TuiApp) {
    let stats_text = vec![
        Line::from(vec![
            Span::raw("Done / Errors / Pending: "),
            Span::styled(format!("{}", app.counts.done), Style::default().fg(Color::Green)),
            Span::raw(" / "),
            Span::styled(format!("{}", app.counts.error), Style::default().fg(Color::Red)),
            Span::raw(" / "),
            Span::styled(
                format!("{}", app.counts.pending + app.counts.testing),
                Style::default().fg(Color::Gray),
            ),
        ]),
        Line::from(vec![
            Span::raw("Latency range: "),
            Span::styled(
                format!("[{}, {}] ms", app.stats.min_ms, app.stats.max_ms),
                Style::default().fg(Color::Magenta),
            ),
        ]),
        Line::from(vec![
            Span::raw("Avg / median: "),
            Span::styled(
                format!("{:.1} / {:.1} ms", app.stats.avg_ms, app.stats.median_ms),
                Style::default().fg(Color::Cyan),
            ),
        ]),
    ];

    let stats = Paragraph::new(stats_text)
        .block(Block::default().borders(Borders::ALL).title("Statistics"));
    frame.render_widget(stats, area);
}

fn render_target_list(frame: &mut Frame, area: Rect, app: &TuiApp) {
    let items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|(target, result)| {
            let (symbol, color) = match result {
                ProbeResult::Pending => ("○", Color::Gray),
                ProbeResult::Testing => ("…", Color::Blue),
                ProbeResult::Done { .. } => ("✓", Color::Green),
                ProbeResult::Error => ("✗", Color::Red),
            };
            let latency = result
                .latency_ms()
                .map(|ms| format!("{:>6} ms", ms))
                .unwrap_or_else(|| format!("{:>9}", result.status()));

            let line = Line::from(vec![
                Span::styled(
                    format!("{} ", symbol),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("{:<8}", target.provider), Style::default().fg(Color::White)),
                Span::styled(format!("{:<26}", target.id), Style::default().fg(Color::White)),
                Span::raw(format!("{:<18}", target.position)),
                Span::styled(latency, Style::default().fg(Color::Yellow)),
            ]);
            ListItem::new(line)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Targets"));
    frame.render_widget(list, area);
}

fn render_help(frame: &mut Frame, area: Rect, app: &TuiApp) {
    let text = if app.running {
        "q: Quit | c: Cancel after current batch"
    } else {
        "q: Quit | r: Run again"
    };
    let help = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(help, area);
}

/// Run the TUI application
pub fn run_tui<F>(app: &mut TuiApp, mut update_fn: F) -> io::Result<()>
where
    F: FnMut(&mut TuiApp) -> io::Result<bool>, // Returns true if should continue
{
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_app(&mut terminal, app, &mut update_fn);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_app<F>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
    update_fn: &mut F,
) -> io::Result<()>
where
    F: FnMut(&mut TuiApp) -> io::Result<bool>,
{
    loop {
        app.refresh();
        terminal.draw(|f| ui(f, app))?;

        // Handle events with a timeout
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit {
            break;
        }

        // Forward cancel/rerun requests and collect finished runs
        if !update_fn(app)? {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::latency::{Continent, Provider};

    fn target(id: &str) -> ProbeTarget {
        ProbeTarget {
            id: id.into(),
            provider: Provider::Gcp,
            region: id.into(),
            position: "Tokyo".into(),
            continent: Continent::Asia,
            country: "JP".into(),
            url: "https://example.com".into(),
        }
    }

    #[test]
    fn keys_depend_on_run_state() {
        let mut app = TuiApp::new(ProbeBoard::new(), "All / All".into());
        app.handle_key(KeyCode::Char('c'));
        assert!(!app.cancel_requested, "nothing to cancel while idle");
        app.handle_key(KeyCode::Char('r'));
        assert!(app.rerun_requested);

        app.start_run();
        assert!(!app.rerun_requested);
        app.handle_key(KeyCode::Char('r'));
        assert!(!app.rerun_requested, "no rerun while running");
        app.handle_key(KeyCode::Char('c'));
        assert!(app.cancel_requested);
        app.handle_key(KeyCode::Esc);
        assert!(app.should_quit);
    }

    #[test]
    fn refresh_reads_board() {
        let board = ProbeBoard::new();
        board.reset(&[target("a"), target("b")]);
        board.set("a", ProbeResult::Done { latency_ms: 33 });
        let mut app = TuiApp::new(board, "GCP / Asia".into());
        app.refresh();
        assert_eq!(app.entries.len(), 2);
        assert_eq!(app.counts.done, 1);
        assert_eq!(app.counts.pending, 1);
        assert_eq!(app.stats.min_ms, 33);
    }
}
