use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use eyre::Result;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState,
        Wrap,
    },
    Frame, Terminal,
};
use tokio::sync::mpsc::Sender;

use crate::events::NormalizedEvent;
use crate::filters::TimeWindow;
use crate::metrics::Snapshot;
use crate::state::{AppState, LoadState};

const PALETTE: [Color; 8] = [
    Color::Rgb(0x25, 0x63, 0xeb),
    Color::Rgb(0x16, 0xa3, 0x4a),
    Color::Rgb(0xdc, 0x26, 0x26),
    Color::Rgb(0xea, 0x58, 0x0c),
    Color::Rgb(0x93, 0x33, 0xea),
    Color::Rgb(0xea, 0xb3, 0x08),
    Color::Rgb(0x14, 0xb8, 0xa6),
    Color::Rgb(0xf4, 0x3f, 0x5e),
];

fn series_color(idx: usize) -> Color {
    PALETTE[idx % PALETTE.len()]
}

/// Static header text that does not change between loads.
#[derive(Debug, Clone)]
pub struct DashboardInfo {
    pub contract: String,
    pub explorer_tx_url: String,
}

#[derive(Debug)]
struct ViewCursor {
    selected: usize,
    show_legend: bool,
}

impl Default for ViewCursor {
    fn default() -> Self {
        Self {
            selected: 0,
            show_legend: true,
        }
    }
}

pub fn run_tui(state: Arc<AppState>, reload: Sender<()>, info: DashboardInfo) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &state, &reload, &info);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    state: &AppState,
    reload: &Sender<()>,
    info: &DashboardInfo,
) -> std::io::Result<()> {
    let mut cursor = ViewCursor::default();

    loop {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        terminal.draw(|f| draw(f, state, info, &mut cursor, now_ms))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Tab => {
                        state.cycle_window();
                        cursor.selected = 0;
                    }
                    KeyCode::Char('1') => state.set_window(TimeWindow::OneDay),
                    KeyCode::Char('7') => state.set_window(TimeWindow::SevenDays),
                    KeyCode::Char('3') => state.set_window(TimeWindow::ThirtyDays),
                    KeyCode::Char('a') => state.set_window(TimeWindow::All),
                    KeyCode::Char('b') => {
                        state.toggle_blacklist();
                    }
                    KeyCode::Char('l') => cursor.show_legend = !cursor.show_legend,
                    KeyCode::Char('r') => {
                        // A reload already queued covers this one
                        let _ = reload.try_send(());
                    }
                    KeyCode::Down | KeyCode::Char('j') => cursor.selected += 1,
                    KeyCode::Up | KeyCode::Char('k') => {
                        cursor.selected = cursor.selected.saturating_sub(1)
                    }
                    KeyCode::PageDown => cursor.selected += 10,
                    KeyCode::PageUp => cursor.selected = cursor.selected.saturating_sub(10),
                    _ => {}
                }
            }
        }
    }
}

fn draw(
    f: &mut Frame,
    state: &AppState,
    info: &DashboardInfo,
    cursor: &mut ViewCursor,
    now_ms: u64,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(12),   // Chart + legend
            Constraint::Min(8),    // Table
            Constraint::Length(4), // Selected event
            Constraint::Length(1), // Keys
        ])
        .split(f.area());

    let load = state.load_state();
    let selection = state.selection();

    // --- Header ---
    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Percentage(15),
        ])
        .split(chunks[0]);

    let end_block = match &load {
        LoadState::Ready(loaded) => format!("#{}", loaded.end_block),
        _ => "-".to_string(),
    };
    let contract_widget = Paragraph::new(format!("CONTRACT: {}", info.contract))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    let block_widget = Paragraph::new(format!("END BLOCK: {}", end_block))
        .block(Block::default().borders(Borders::ALL));
    let window_widget = Paragraph::new(format!("WINDOW: [{}]", selection.window.label()))
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL));
    let blacklist_text = if selection.blacklist_enabled {
        "BLACKLIST: ON"
    } else {
        "BLACKLIST: OFF"
    };
    let blacklist_widget =
        Paragraph::new(blacklist_text).block(Block::default().borders(Borders::ALL));

    f.render_widget(contract_widget, header[0]);
    f.render_widget(block_widget, header[1]);
    f.render_widget(window_widget, header[2]);
    f.render_widget(blacklist_widget, header[3]);

    let keys = Paragraph::new(
        "q quit | Tab/1/7/3/a window | b blacklist | l legend | r reload | ↑↓ select",
    )
    .style(Style::default().fg(Color::DarkGray));
    f.render_widget(keys, chunks[4]);

    let body = Rect {
        height: chunks[1].height + chunks[2].height + chunks[3].height,
        ..chunks[1]
    };

    let loaded = match load {
        LoadState::Loading => {
            let loading = Paragraph::new("Loading events...")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL));
            f.render_widget(loading, body);
            return;
        }
        LoadState::Failed(message) => {
            let failed = Paragraph::new(message)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
                .block(Block::default().title(" Error ").borders(Borders::ALL));
            f.render_widget(failed, body);
            return;
        }
        LoadState::Ready(loaded) => loaded,
    };

    let snapshot = Snapshot::compute(&loaded.events, &selection, now_ms);

    // --- Chart & legend ---
    if cursor.show_legend {
        let mid = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(chunks[1]);
        draw_chart(f, &snapshot, mid[0]);
        draw_legend(f, &snapshot, mid[1]);
    } else {
        draw_chart(f, &snapshot, chunks[1]);
    }

    cursor.selected = cursor.selected.min(snapshot.events.len().saturating_sub(1));
    draw_table(f, &snapshot, cursor.selected, chunks[2]);
    draw_detail(f, snapshot.events.get(cursor.selected), info, chunks[3]);
}

fn draw_chart(f: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let block = Block::default()
        .title(format!(" Events per day ({}) ", snapshot.window.label()))
        .borders(Borders::ALL);

    if snapshot.series.is_empty() {
        let empty = Paragraph::new("No events in this window")
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let points: Vec<Vec<(f64, f64)>> = snapshot
        .types()
        .map(|event_type| {
            snapshot
                .series
                .iter()
                .enumerate()
                .map(|(x, bucket)| {
                    let count = bucket.counts.get(event_type).copied().unwrap_or(0);
                    (x as f64, count as f64)
                })
                .collect()
        })
        .collect();

    let graph_type = if snapshot.series.len() > 1 {
        GraphType::Line
    } else {
        GraphType::Scatter
    };
    let datasets: Vec<Dataset> = snapshot
        .types()
        .zip(points.iter())
        .enumerate()
        .map(|(idx, (event_type, data))| {
            Dataset::default()
                .name(event_type.to_string())
                .marker(symbols::Marker::Braille)
                .graph_type(graph_type)
                .style(Style::default().fg(series_color(idx)))
                .data(data)
        })
        .collect();

    let last = snapshot.series.len() - 1;
    let x_labels: Vec<Span> = [0, last / 2, last]
        .iter()
        .map(|&i| Span::raw(snapshot.series[i].date.clone()))
        .collect();
    let y_max = snapshot
        .series
        .iter()
        .flat_map(|b| b.counts.values())
        .copied()
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, last.max(1) as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, y_max])
                .labels(vec![Span::raw("0"), Span::raw(format!("{}", y_max as u64))]),
        );
    f.render_widget(chart, area);
}

fn draw_legend(f: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let mut lines: Vec<Line> = snapshot
        .counts
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            Line::from(vec![
                Span::styled("● ", Style::default().fg(series_color(idx))),
                Span::raw(format!("{}: ", c.event_type)),
                Span::styled(c.count.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            ])
        })
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(format!("Total: {}", snapshot.total)));

    let legend = Paragraph::new(lines)
        .block(Block::default().title(" Event Types ").borders(Borders::ALL));
    f.render_widget(legend, area);
}

fn format_timestamp(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `0x1234ab…cdef01` for anything longer than a short tag.
fn short_hash(hash: &str) -> String {
    if hash.len() <= 16 {
        return hash.to_string();
    }
    match (hash.get(..8), hash.get(hash.len() - 6..)) {
        (Some(head), Some(tail)) => format!("{}…{}", head, tail),
        _ => hash.to_string(),
    }
}

fn args_line(event: &NormalizedEvent) -> String {
    if event.args.is_empty() {
        return "(not decoded)".to_string();
    }
    event
        .args
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn draw_table(f: &mut Frame, snapshot: &Snapshot, selected: usize, area: Rect) {
    let headers = Row::new(vec!["BLOCK", "EVENT", "TX", "TIMESTAMP"])
        .style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Yellow),
        )
        .bottom_margin(1);

    let colors: HashMap<&str, Color> = snapshot
        .types()
        .enumerate()
        .map(|(idx, t)| (t, series_color(idx)))
        .collect();

    let rows: Vec<Row> = snapshot
        .events
        .iter()
        .map(|ev| {
            let color = colors
                .get(ev.event_name.as_str())
                .copied()
                .unwrap_or(Color::White);
            let tx = ev
                .transaction_hash
                .as_deref()
                .map(short_hash)
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(ev.block_number.to_string())
                    .style(Style::default().fg(Color::Cyan)),
                Cell::from(ev.event_name.clone()).style(Style::default().fg(color)),
                Cell::from(tx),
                Cell::from(format_timestamp(ev.timestamp_ms))
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let title = if snapshot.events.is_empty() {
        " Event Log (0) ".to_string()
    } else {
        format!(" Event Log ({} of {}) ", selected + 1, snapshot.events.len())
    };
    let widths = [
        Constraint::Length(12),
        Constraint::Fill(1),
        Constraint::Length(16),
        Constraint::Length(24),
    ];
    let table = Table::new(rows, widths)
        .header(headers)
        .block(Block::default().title(title).borders(Borders::ALL))
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .column_spacing(2);

    let mut table_state = TableState::default().with_selected(Some(selected));
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_detail(f: &mut Frame, event: Option<&NormalizedEvent>, info: &DashboardInfo, area: Rect) {
    let lines = match event {
        Some(ev) => {
            let tx = match &ev.transaction_hash {
                Some(hash) => format!("{}{}", info.explorer_tx_url, hash),
                None => "-".to_string(),
            };
            vec![
                Line::from(vec![
                    Span::styled("TX   ", Style::default().fg(Color::Yellow)),
                    Span::raw(tx),
                ]),
                Line::from(vec![
                    Span::styled("ARGS ", Style::default().fg(Color::Yellow)),
                    Span::raw(args_line(ev)),
                ]),
            ]
        }
        None => vec![Line::from("No event selected")],
    };

    let detail = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().title(" Selected ").borders(Borders::ALL));
    f.render_widget(detail, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ArgValue;
    use crate::filters::tests::{event, NOW};
    use crate::state::LoadedEvents;
    use ratatui::backend::TestBackend;

    const TX: &str = "0xabcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789";

    fn info() -> DashboardInfo {
        DashboardInfo {
            contract: "0xc7fC".into(),
            explorer_tx_url: "https://hoodi.etherscan.io/tx/".into(),
        }
    }

    fn render(state: &AppState, cursor: &mut ViewCursor) -> String {
        let mut terminal = Terminal::new(TestBackend::new(160, 40)).unwrap();
        terminal
            .draw(|f| draw(f, state, &info(), cursor, NOW))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn ready_state() -> AppState {
        let state = AppState::new(TimeWindow::SevenDays, Vec::new(), false);
        let generation = state.begin_load();
        let mut events = vec![
            event("Transfer", NOW - 1000, None),
            event("Approval", NOW, None),
        ];
        events[0].block_number = 4242;
        events[1].transaction_hash = Some(TX.to_string());
        events[1]
            .args
            .insert("value".into(), ArgValue::Number("100".into()));
        state.finish_load(
            generation,
            Ok(LoadedEvents {
                events,
                end_block: 9001,
            }),
        );
        state
    }

    #[test]
    fn ready_state_shows_legend_and_table() {
        let screen = render(&ready_state(), &mut ViewCursor::default());
        assert!(screen.contains("END BLOCK: #9001"));
        assert!(screen.contains("Event Types"));
        assert!(screen.contains("Transfer: 1"));
        assert!(screen.contains("4242"));
        assert!(screen.contains("2024-01-02"));
    }

    #[test]
    fn rows_show_the_transaction_and_selection_links_it() {
        let screen = render(&ready_state(), &mut ViewCursor::default());
        // Newest first: the Approval row is selected.
        assert!(screen.contains(&short_hash(TX)));
        assert!(screen.contains("https://hoodi.etherscan.io/tx/0xabcdef"));
        assert!(screen.contains("value=100"));
    }

    #[test]
    fn legend_can_be_hidden() {
        let mut cursor = ViewCursor {
            show_legend: false,
            ..ViewCursor::default()
        };
        let screen = render(&ready_state(), &mut cursor);
        assert!(!screen.contains("Event Types"));
        assert!(screen.contains("Events per day"));
    }

    #[test]
    fn selection_is_clamped_to_the_rows() {
        let mut cursor = ViewCursor {
            selected: 50,
            ..ViewCursor::default()
        };
        let screen = render(&ready_state(), &mut cursor);
        assert_eq!(cursor.selected, 1);
        assert!(screen.contains("(not decoded)"));
    }

    #[test]
    fn failure_suppresses_chart_and_table() {
        let state = AppState::new(TimeWindow::SevenDays, Vec::new(), false);
        let generation = state.begin_load();
        state.finish_load(
            generation,
            Err(crate::error::DashboardError::InterfaceParse("bad".into())),
        );

        let screen = render(&state, &mut ViewCursor::default());
        assert!(screen.contains("Failed to parse ABI: bad"));
        assert!(!screen.contains("Event Log"));
    }

    #[test]
    fn timestamps_render_in_utc() {
        assert_eq!(format_timestamp(1_704_153_599_000), "2024-01-01 23:59:59 UTC");
    }

    #[test]
    fn hashes_are_shortened() {
        assert_eq!(short_hash(TX), "0xabcdef…456789");
        assert_eq!(short_hash("0x1234"), "0x1234");
    }
}
