//! TUI for the proxy checker: live progress, then a sortable results table

use crate::export::{sort_rows, Column};
use crate::proxy::{
    BatchProgress, ProbeFailure, ProbeOutcome, ProxyChecker, ProxyRow, ResultAggregate, RiskLevel,
};
use crate::Result;
use anyhow::anyhow;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Maximum number of recent outcomes to keep for the live view
const MAX_RECENT_OUTCOMES: usize = 100;

/// Proxy checker TUI application state
pub struct ProxyCheckerApp {
    /// Lines still to be handed to the checker
    lines: Vec<String>,
    checker: ProxyChecker,
    /// Total number of lines
    total: usize,
    /// Number of finished probes
    checked: usize,
    good_count: usize,
    bad_count: usize,
    high_risk_count: usize,
    /// Recent outcomes for the live view
    recent: VecDeque<ProbeOutcome>,
    /// Set once every probe has finished
    aggregate: Option<ResultAggregate>,
    /// Result rows in display order
    rows: Vec<ProxyRow>,
    table_state: TableState,
    /// Column the cursor is on for sorting
    sort_cursor: usize,
    /// Column and direction the rows are currently sorted by
    sorted_by: Option<(Column, bool)>,
    show_failures: bool,
    status_message: String,
    should_quit: bool,
}

impl ProxyCheckerApp {
    pub fn new(lines: Vec<String>, checker: ProxyChecker) -> Self {
        Self {
            total: lines.len(),
            lines,
            checker,
            checked: 0,
            good_count: 0,
            bad_count: 0,
            high_risk_count: 0,
            recent: VecDeque::new(),
            aggregate: None,
            rows: Vec::new(),
            table_state: TableState::default(),
            sort_cursor: 0,
            sorted_by: None,
            show_failures: false,
            status_message: "Checking proxies... This may take a moment.".to_string(),
            should_quit: false,
        }
    }

    /// Run the batch inside the TUI and return its results once the user quits
    pub async fn run(mut self) -> Result<ResultAggregate> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result?;
        self.aggregate
            .ok_or_else(|| anyhow!("Batch finished without results"))
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let checker = self.checker.clone();
        let lines = std::mem::take(&mut self.lines);
        let mut batch =
            tokio::spawn(async move { checker.run_batch_with_progress(lines, Some(tx)).await });

        loop {
            terminal.draw(|f| self.ui(f))?;

            // Handle key events with a short timeout
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                    }
                }
            }

            // Every progress event is sent before the batch task finishes
            let finished = batch.is_finished();
            while let Ok(progress) = rx.try_recv() {
                self.on_progress(progress);
            }

            // The batch cannot be cancelled; results are only read after it joins
            if self.aggregate.is_none() && finished {
                let aggregate = (&mut batch).await?;
                self.on_complete(aggregate);
            }

            if self.should_quit && self.aggregate.is_some() {
                break;
            }
        }

        Ok(())
    }

    fn on_progress(&mut self, progress: BatchProgress) {
        self.checked = progress.completed;
        match &progress.outcome {
            ProbeOutcome::Success(row) => {
                self.good_count += 1;
                if row.is_high_risk() {
                    self.high_risk_count += 1;
                }
            }
            ProbeOutcome::Failure(_) => self.bad_count += 1,
        }

        self.recent.push_back(progress.outcome);
        if self.recent.len() > MAX_RECENT_OUTCOMES {
            self.recent.pop_front();
        }

        let percentage = (progress.completed as f64 / progress.total.max(1) as f64 * 100.0) as u32;
        self.status_message = format!(
            "Checking... {}% ({}/{}) | Good: {} | Failed: {}",
            percentage, progress.completed, progress.total, self.good_count, self.bad_count
        );
    }

    fn on_complete(&mut self, aggregate: ResultAggregate) {
        self.rows = aggregate.rows.clone();
        if !self.rows.is_empty() {
            self.table_state.select(Some(0));
        }
        self.checked = aggregate.len();
        self.status_message = format!(
            "Proxies Checked: {} | High Risk: {} | Failed: {} | ←/→ column, s sort, f failures, q quit",
            aggregate.summary.total,
            aggregate.summary.high_risk,
            aggregate.failures.len()
        );
        self.aggregate = Some(aggregate);
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.aggregate.is_none() {
                    self.status_message =
                        "Waiting for running probes to finish before quitting...".to_string();
                }
                self.should_quit = true;
            }
            KeyCode::Down => self.move_selection(1),
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Right => {
                self.sort_cursor = (self.sort_cursor + 1) % Column::ALL.len();
            }
            KeyCode::Left => {
                self.sort_cursor = (self.sort_cursor + Column::ALL.len() - 1) % Column::ALL.len();
            }
            KeyCode::Char('s') => self.sort_by_cursor(),
            KeyCode::Char('f') => self.show_failures = !self.show_failures,
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let len = self.rows.len() as isize;
        let current = self.table_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len);
        self.table_state.select(Some(next as usize));
    }

    /// Sort by the column under the cursor; sorting the same column again flips direction
    fn sort_by_cursor(&mut self) {
        let column = Column::ALL[self.sort_cursor];
        let descending = match self.sorted_by {
            Some((current, descending)) if current == column => !descending,
            _ => false,
        };
        sort_rows(&mut self.rows, column, descending);
        self.sorted_by = Some((column, descending));
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Min(0),    // Results
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new("Proxy Score Checker")
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress = if self.total > 0 {
            (self.checked as f64 / self.total as f64 * 100.0) as u16
        } else {
            100
        };
        let progress_label = format!(
            "{}/{} ({}%) | High Risk: {}",
            self.checked, self.total, progress, self.high_risk_count
        );
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress.min(100))
            .label(progress_label);
        f.render_widget(gauge, chunks[1]);

        let failures = self
            .aggregate
            .as_ref()
            .filter(|_| self.show_failures)
            .map(|aggregate| aggregate.failures.clone());

        if self.aggregate.is_none() {
            self.render_live(f, chunks[2]);
        } else if let Some(failures) = failures {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
                .split(chunks[2]);
            self.render_results(f, halves[0]);
            Self::render_failures(f, halves[1], &failures);
        } else {
            self.render_results(f, chunks[2]);
        }

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.aggregate.is_some() {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[3]);
    }

    fn render_live(&self, f: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .recent
            .iter()
            .rev() // Show newest first
            .map(|outcome| match outcome {
                ProbeOutcome::Success(row) => ListItem::new(format!(
                    "{} -> {} ({}) score {}",
                    row.proxy_host, row.public_ip, row.location, row.fraud_score
                ))
                .style(risk_style(row.risk())),
                ProbeOutcome::Failure(failure) => {
                    ListItem::new(failure.to_string()).style(Style::default().fg(Color::Red))
                }
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Recent ({} good, {} failed)", self.good_count, self.bad_count)),
        );
        f.render_widget(list, area);
    }

    fn render_results(&mut self, f: &mut Frame, area: Rect) {
        let header_cells: Vec<Cell> = Column::ALL
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let arrow = match self.sorted_by {
                    Some((sorted, true)) if sorted == *column => " ▼",
                    Some((sorted, false)) if sorted == *column => " ▲",
                    _ => "",
                };
                let mut style = Style::default().add_modifier(Modifier::BOLD);
                if i == self.sort_cursor {
                    style = style.fg(Color::Cyan).add_modifier(Modifier::UNDERLINED);
                }
                Cell::from(format!("{}{}", column.name(), arrow)).style(style)
            })
            .collect();
        let header = Row::new(header_cells).height(1);

        let rows: Vec<Row> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<Cell> = Column::ALL
                    .iter()
                    .map(|column| Cell::from(column.value(row)))
                    .collect();
                Row::new(cells).style(risk_style(row.risk()))
            })
            .collect();

        let widths = [
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Min(14),
            Constraint::Min(12),
            Constraint::Length(12),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(13),
            Constraint::Length(11),
        ];

        let table = Table::new(rows)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Results ({})", self.rows.len())),
            )
            .widths(&widths)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_failures(f: &mut Frame, area: Rect, failures: &[ProbeFailure]) {
        let items: Vec<ListItem> = failures
            .iter()
            .map(|failure| {
                ListItem::new(failure.to_string()).style(Style::default().fg(Color::Red))
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Failed ({})", failures.len())),
        );
        f.render_widget(list, area);
    }
}

/// Row colouring: high risk red, medium yellow
fn risk_style(risk: RiskLevel) -> Style {
    match risk {
        RiskLevel::High => Style::default().fg(Color::Red),
        RiskLevel::Medium => Style::default().fg(Color::Yellow),
        RiskLevel::Low => Style::default(),
    }
}
