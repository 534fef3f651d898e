use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};
use tracing_subscriber::EnvFilter;

use leaderboard_terminal::config::{FeedConfig, SourceKind};
use leaderboard_terminal::fake_feed::DemoSource;
use leaderboard_terminal::feed::SubscriptionSource;
use leaderboard_terminal::firebase_feed::FirebaseSource;
use leaderboard_terminal::rank_view::ViewFrame;
use leaderboard_terminal::standings::RankedEntry;
use leaderboard_terminal::state::{AppState, InputMode};
use leaderboard_terminal::sync_store::SyncStore;

struct App {
    store: SyncStore<Box<dyn SubscriptionSource>>,
    state: AppState,
    should_quit: bool,
}

impl App {
    fn new(cfg: &FeedConfig) -> Self {
        let (source, label): (Box<dyn SubscriptionSource>, String) = match cfg.source {
            SourceKind::Demo => (
                Box::new(DemoSource::new(cfg.demo_tick).with_fail_after(cfg.demo_fail_after)),
                "DEMO".to_string(),
            ),
            SourceKind::Firebase => {
                let url = cfg.firebase_url.clone().unwrap_or_default();
                let label = format!("FIREBASE {url}");
                (
                    Box::new(FirebaseSource::new(url, cfg.firebase_auth.clone())),
                    label,
                )
            }
        };
        Self {
            store: SyncStore::with_collection(source, cfg.collection.clone()),
            state: AppState::new(label),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.input_mode == InputMode::Search {
            match key.code {
                KeyCode::Enter => self.state.finish_search(),
                KeyCode::Esc => self.state.cancel_search(),
                KeyCode::Backspace => self.state.pop_search_char(),
                KeyCode::Char(c) => self.state.push_search_char(c),
                _ => {}
            }
            return;
        }

        let total = self.state.view.filter(self.store.entries()).len();
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('/') => self.state.begin_search(),
            KeyCode::Esc => self.state.cancel_search(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(total),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(total),
            KeyCode::Char('r') | KeyCode::Char('R') => self.resubscribe(),
            KeyCode::Char('p') | KeyCode::Char('P') => self.toggle_subscription(),
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn resubscribe(&mut self) {
        self.store.stop();
        self.store.start();
        self.state.push_log("[INFO] Resubscribed");
    }

    fn toggle_subscription(&mut self) {
        if self.store.is_subscribed() {
            self.store.stop();
            self.state.push_log("[INFO] Feed paused");
        } else {
            self.store.start();
            self.state.push_log("[INFO] Feed resumed");
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cfg = FeedConfig::from_env()?;
    if let Some(path) = cfg.log_file.as_deref() {
        init_tracing(path)?;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(&cfg);
    app.store.start();
    let res = run_app(&mut terminal, &mut app);
    app.store.stop();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        app.store.pump();
        app.state.observe(&app.store);

        let frame_data = app.state.view.current_view(&app.store);
        app.state.clamp_selection(frame_data.entries.len());

        terminal.draw(|f| ui(f, app, &frame_data))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App, view: &ViewFrame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app, view))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_search(frame, chunks[1], &app.state);
    render_board(frame, chunks[2], &app.state, view);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[3]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[4]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App, view: &ViewFrame) -> String {
    let status = status_label(app.store.is_subscribed(), view);
    let synced = app
        .store
        .last_sync()
        .map(|info| info.at.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let line1 = format!(
        "  LEADERBOARD | {} | /{} | {}",
        app.state.source_label,
        app.store.collection(),
        status
    );
    let line2 = format!("  Teams: {} | Last sync: {synced}", view.total);
    format!("{line1}\n{line2}")
}

fn status_label(subscribed: bool, view: &ViewFrame) -> &'static str {
    if view.error_message.is_some() {
        "ERROR"
    } else if view.loading && subscribed {
        "CONNECTING"
    } else if !subscribed {
        "PAUSED"
    } else if view.stale {
        "STALE"
    } else {
        "LIVE"
    }
}

fn render_search(frame: &mut Frame, area: Rect, state: &AppState) {
    let editing = state.input_mode == InputMode::Search;
    let (text, style) = if state.search_input.is_empty() && !editing {
        (
            "Search teams... (/)".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else if editing {
        (
            format!("{}_", state.search_input),
            Style::default().fg(Color::White),
        )
    } else {
        (state.search_input.clone(), Style::default())
    };
    let border = if editing {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    };
    let search = Paragraph::new(text).style(style).block(
        Block::default()
            .title("Search")
            .borders(Borders::ALL)
            .border_style(border),
    );
    frame.render_widget(search, area);
}

fn render_board(frame: &mut Frame, area: Rect, state: &AppState, view: &ViewFrame) {
    let title = if view.stale && !view.entries.is_empty() {
        "Standings (stale)"
    } else {
        "Standings"
    };
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let mut body = inner;
    if let Some(message) = &view.error_message {
        let banner = Paragraph::new(format!("Error: {message}"))
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
        frame.render_widget(
            banner,
            Rect {
                height: 1,
                ..inner
            },
        );
        body = Rect {
            y: inner.y + 1,
            height: inner.height.saturating_sub(1),
            ..inner
        };
    }
    if body.height == 0 {
        return;
    }

    if view.entries.is_empty() {
        let text = if view.loading {
            "Loading standings...".to_string()
        } else if view.total > 0 {
            format!("No teams match \"{}\"", state.view.search_term())
        } else if view.error_message.is_none() {
            "No teams yet".to_string()
        } else {
            String::new()
        };
        let empty = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, body);
        return;
    }

    let rows: Vec<Row> = view.entries.iter().map(board_row).collect();
    let header = Row::new(vec!["Rank", "Team Name", "Score"])
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(20),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .highlight_style(Style::default().fg(Color::White).bg(Color::DarkGray));

    let mut table_state = TableState::default().with_selected(Some(state.selected));
    frame.render_stateful_widget(table, body, &mut table_state);
}

fn board_row(entry: &RankedEntry) -> Row<'static> {
    let rank = if entry.is_podium() {
        format!("{} 🏆", entry.rank)
    } else {
        entry.rank.to_string()
    };
    let rank_style = if entry.is_podium() {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    Row::new(vec![
        Cell::from(rank).style(rank_style),
        Cell::from(entry.record.team_name.clone()),
        Cell::from(entry.record.overall.to_string())
            .style(Style::default().add_modifier(Modifier::BOLD)),
    ])
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn footer_text(state: &AppState) -> String {
    match state.input_mode {
        InputMode::Search => "Type to filter | Enter Keep | Esc Clear | Backspace Delete".to_string(),
        InputMode::Normal => {
            "/ Search | j/k/↑/↓ Move | r Resubscribe | p Pause/Resume | ? Help | q Quit".to_string()
        }
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Leaderboard - Help",
        "",
        "  /            Search team names",
        "  Esc          Clear search",
        "  j/k or ↑/↓   Move selection",
        "  r            Resubscribe to the feed",
        "  p            Pause / resume the feed",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Ranks always reflect standing among all teams,",
        "even while a search is active.",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
