//! Live terminal dashboard.
//!
//! Consumes the pipeline's two subscriptions — metrics snapshots and raw
//! log lines — and renders them until `q`, shutdown, or the end of both
//! streams.

pub mod report;
mod ui;

use crate::pipeline::Pipeline;
use crate::record::MetricsSnapshot;
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::mpsc::error::TryRecvError;

/// Raw log lines kept for display.
const MAX_RAW_LINES: usize = 500;

/// Dashboard state fed from the pipeline subscriptions.
pub struct DashboardApp {
    pub snapshot: Option<MetricsSnapshot>,
    pub raw_lines: VecDeque<String>,
    pub last_update: Option<DateTime<Utc>>,
}

impl DashboardApp {
    pub fn new() -> Self {
        Self {
            snapshot: None,
            raw_lines: VecDeque::with_capacity(MAX_RAW_LINES),
            last_update: None,
        }
    }

    /// Returns true when the key asks to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        matches!(
            key.code,
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc
        )
    }

    pub fn apply_snapshot(&mut self, snapshot: MetricsSnapshot) {
        self.snapshot = Some(snapshot);
        self.last_update = Some(Utc::now());
    }

    pub fn push_raw_line(&mut self, line: String) {
        self.raw_lines.push_back(line);
        if self.raw_lines.len() > MAX_RAW_LINES {
            self.raw_lines.pop_front();
        }
    }
}

impl Default for DashboardApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the dashboard loop.
pub async fn run(mut pipeline: Pipeline, shutdown: broadcast::Sender<()>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = DashboardApp::new();

    let result = loop {
        // Drain whatever the pipeline produced since the last frame
        let mut metrics_open = true;
        loop {
            match pipeline.metrics_rx.try_recv() {
                Ok(snapshot) => app.apply_snapshot(snapshot),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    metrics_open = false;
                    break;
                }
            }
        }
        let mut raw_open = true;
        loop {
            match pipeline.raw_log_rx.try_recv() {
                Ok(line) => app.push_raw_line(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    raw_open = false;
                    break;
                }
            }
        }

        if let Err(e) = terminal.draw(|f| ui::render(f, &app)) {
            break Err(e.into());
        }

        // Both streams ended; nothing further will arrive
        if !metrics_open && !raw_open {
            break Ok(());
        }

        // Handle events with timeout; this also paces the frame rate
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if app.handle_key(key) {
                    let _ = shutdown.send(());
                    break Ok(());
                }
            }
        }
        tokio::task::yield_now().await;
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
