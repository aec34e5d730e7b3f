//! Dashboard rendering.

use super::DashboardApp;
use crate::record::{MetricsSnapshot, WindowedMetrics};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Sparkline, Table},
    Frame,
};
use std::time::Duration;

const STATUS_CATEGORIES: [&str; 6] = ["1xx", "2xx", "3xx", "4xx", "5xx", "Other"];

pub fn render(f: &mut Frame, app: &DashboardApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // Header
            Constraint::Length(8),  // Windows table
            Constraint::Min(8),     // Endpoints / status codes / anomalies
            Constraint::Length(4),  // RPS trend
            Constraint::Length(10), // Raw log tail
        ])
        .split(f.area());

    render_header(f, chunks[0], app);

    match &app.snapshot {
        Some(snapshot) => {
            render_windows(f, chunks[1], snapshot);

            let middle = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(34),
                    Constraint::Percentage(33),
                    Constraint::Percentage(33),
                ])
                .split(chunks[2]);
            render_endpoints(f, middle[0], snapshot);
            render_status_codes(f, middle[1], snapshot);
            render_anomalies(f, middle[2], snapshot);

            render_trend(f, chunks[3], snapshot);
        }
        None => {
            let waiting = Paragraph::new("Waiting for the first snapshot...")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title("Metrics"));
            f.render_widget(waiting, chunks[1]);
        }
    }

    render_raw_log(f, chunks[4], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let uptime = app
        .snapshot
        .as_ref()
        .map(|s| format_uptime(chrono::Utc::now() - s.start_time))
        .unwrap_or_else(|| "-".to_string());

    let last_update = app
        .last_update
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    let title = vec![
        Line::from(vec![
            Span::styled(
                "pulsewatch",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  |  Uptime: "),
            Span::styled(uptime, Style::default().fg(Color::Yellow)),
            Span::raw("  |  Last update: "),
            Span::styled(last_update, Style::default().fg(Color::Green)),
        ]),
        Line::from(Span::styled(
            "Press 'q' to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(title).block(Block::default().borders(Borders::ALL));
    f.render_widget(paragraph, area);
}

fn render_windows(f: &mut Frame, area: Rect, snapshot: &MetricsSnapshot) {
    let header_cells = [
        "Window",
        "RPS",
        "Requests",
        "Errors",
        "P50",
        "P90",
        "P95",
        "P99",
    ]
    .iter()
    .map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1).bottom_margin(1);

    let rows: Vec<Row> = snapshot
        .windows
        .iter()
        .map(|(name, wm)| {
            let errors = if wm.total_errors > 0 {
                format!("{} ({:.1}%)", wm.total_errors, wm.error_rate)
            } else {
                "0".to_string()
            };
            Row::new(vec![
                Cell::from(name.clone()),
                Cell::from(format!("{:.2}", wm.rps)),
                Cell::from(wm.total_requests.to_string()),
                Cell::from(errors).style(error_style(wm)),
                Cell::from(format_ms(wm.p50_latency)),
                Cell::from(format_ms(wm.p90_latency)),
                Cell::from(format_ms(wm.p95_latency)),
                Cell::from(format_ms(wm.p99_latency)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Windows"))
    .column_spacing(1);

    f.render_widget(table, area);
}

fn render_endpoints(f: &mut Frame, area: Rect, snapshot: &MetricsSnapshot) {
    let mut counts: Vec<(&String, &u64)> = snapshot
        .windows
        .values()
        .next_back()
        .map(|wm| wm.top_endpoints.iter().collect())
        .unwrap_or_default();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let items: Vec<ListItem> = counts
        .iter()
        .take(10)
        .map(|(endpoint, count)| ListItem::new(format!("{:>6}  {}", count, endpoint)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Top Endpoints"),
    );
    f.render_widget(list, area);
}

fn render_status_codes(f: &mut Frame, area: Rect, snapshot: &MetricsSnapshot) {
    let items: Vec<ListItem> = snapshot
        .windows
        .values()
        .next_back()
        .map(|wm| {
            STATUS_CATEGORIES
                .iter()
                .filter_map(|category| {
                    wm.status_code_distribution
                        .get(*category)
                        .map(|count| (category, count))
                })
                .map(|(category, count)| {
                    let style = match *category {
                        "4xx" => Style::default().fg(Color::Yellow),
                        "5xx" => Style::default().fg(Color::Red),
                        _ => Style::default(),
                    };
                    ListItem::new(format!("{:>6}  {}", count, category)).style(style)
                })
                .collect()
        })
        .unwrap_or_default();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Status Codes"),
    );
    f.render_widget(list, area);
}

fn render_anomalies(f: &mut Frame, area: Rect, snapshot: &MetricsSnapshot) {
    let visible = (area.height as usize).saturating_sub(2).max(1);
    let items: Vec<ListItem> = snapshot
        .anomalies
        .iter()
        .rev()
        .take(visible)
        .map(|anomaly| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    anomaly.timestamp.format("%H:%M:%S ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    anomaly.kind.clone(),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(": {}", anomaly.message)),
            ]))
        })
        .collect();

    let title = format!("Anomalies ({})", snapshot.anomalies.len());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

fn render_trend(f: &mut Frame, area: Rect, snapshot: &MetricsSnapshot) {
    // Sparkline data is integer; keep two decimals of resolution
    let data: Vec<u64> = snapshot
        .trend_history
        .iter()
        .map(|point| (point.rps * 100.0) as u64)
        .collect();

    let current = snapshot
        .trend_history
        .last()
        .map(|point| format!("RPS Trend ({:.2} now)", point.rps))
        .unwrap_or_else(|| "RPS Trend".to_string());

    let sparkline = Sparkline::default()
        .data(&data)
        .style(Style::default().fg(Color::Cyan))
        .block(Block::default().borders(Borders::ALL).title(current));
    f.render_widget(sparkline, area);
}

fn render_raw_log(f: &mut Frame, area: Rect, app: &DashboardApp) {
    let visible = (area.height as usize).saturating_sub(2).max(1);
    let items: Vec<ListItem> = app
        .raw_lines
        .iter()
        .rev()
        .take(visible)
        .rev()
        .map(|line| ListItem::new(line.as_str()))
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Raw Log"));
    f.render_widget(list, area);
}

fn error_style(wm: &WindowedMetrics) -> Style {
    if wm.total_errors > 0 {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    }
}

fn format_ms(latency: Duration) -> String {
    format!("{}ms", latency.as_millis())
}

fn format_uptime(elapsed: chrono::Duration) -> String {
    let seconds = elapsed.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}
