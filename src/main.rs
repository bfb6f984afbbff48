use std::env;
use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use nrl_terminal::magic::OutcomeKey;
use nrl_terminal::sgm_session::Side;
use nrl_terminal::state::{
    apply_delta, AppState, Delta, ProviderCommand, Screen, MAX_PICK_TRIES,
};
use nrl_terminal::{fake_feed, feed};

/// Points axis ceiling for the ladder bars; two points a win over the whole
/// season plus the end bye bonus.
const LADDER_AXIS_MAX: f64 = 54.0;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: mpsc::Sender<ProviderCommand>,
}

impl App {
    fn new(cmd_tx: mpsc::Sender<ProviderCommand>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider is gone");
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Char('1') => self.state.screen = Screen::Ladder,
            KeyCode::Char('2') => {
                self.state.screen = Screen::Impact;
                self.ensure_impact_table();
            }
            KeyCode::Char('3') => {
                self.state.screen = Screen::Tryscorer;
                if self.state.sgm_matches.is_empty() {
                    self.send(ProviderCommand::FetchSgmMatches);
                }
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.state.push_log("[INFO] Refreshing round snapshot");
                self.send(ProviderCommand::FetchSnapshot);
                self.ensure_impact_table();
            }
            _ => match self.state.screen {
                Screen::Ladder => self.on_ladder_key(key),
                Screen::Impact => self.on_impact_key(key),
                Screen::Tryscorer => self.on_tryscorer_key(key),
            },
        }
    }

    fn on_ladder_key(&mut self, key: KeyEvent) {
        let len = self.state.spreads.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if len > 0 {
                    self.state.ladder_selected = (self.state.ladder_selected + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.ladder_selected = self.state.ladder_selected.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn on_impact_key(&mut self, key: KeyEvent) {
        let len = self.state.impact_matches.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if len > 0 {
                    self.state.impact_selected = (self.state.impact_selected + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.impact_selected = self.state.impact_selected.saturating_sub(1);
            }
            KeyCode::Char(' ') | KeyCode::Enter => self.state.cycle_winner(),
            KeyCode::Char('c') => self.state.clear_winner_selection(),
            KeyCode::Char('o') => {
                let category = self.state.cycle_outcome_category();
                self.state
                    .push_log(format!("[INFO] Outcome market: {}", category.label()));
                self.ensure_impact_table();
            }
            _ => {}
        }
    }

    fn on_tryscorer_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('m') => self.cycle_sgm_match(1),
            KeyCode::Char('M') => self.cycle_sgm_match(-1),
            KeyCode::Tab => {
                self.state.side_focus = match self.state.side_focus {
                    Side::Home => Side::Away,
                    Side::Away => Side::Home,
                };
                self.state.player_selected = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let len = self
                    .state
                    .team_lists
                    .as_ref()
                    .map(|l| l.players(self.state.side_focus).len())
                    .unwrap_or(0);
                if len > 0 {
                    self.state.player_selected = (self.state.player_selected + 1).min(len - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.state.player_selected = self.state.player_selected.saturating_sub(1);
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                if self.state.adjust_pick(1) {
                    self.recompute_sgm();
                }
            }
            KeyCode::Char('-') => {
                if self.state.adjust_pick(-1) {
                    self.recompute_sgm();
                }
            }
            KeyCode::Char('c') => {
                self.state.picks.clear();
                self.recompute_sgm();
            }
            _ => {}
        }
    }

    fn cycle_sgm_match(&mut self, step: i64) {
        let len = self.state.sgm_matches.len();
        if len == 0 {
            self.send(ProviderCommand::FetchSgmMatches);
            return;
        }
        let current = self.state.sgm_match_selected as i64;
        self.state.sgm_match_selected = (current + step).rem_euclid(len as i64) as usize;
        if let Some(m) = self.state.selected_sgm_match() {
            let match_id = m.match_id.clone();
            self.send(ProviderCommand::FetchTeamLists { match_id });
        }
    }

    fn ensure_impact_table(&mut self) {
        let category = self.state.impact_category;
        if !self.state.impact_tables.contains_key(&category) {
            self.send(ProviderCommand::FetchImpactTable { category });
        }
    }

    /// Each pick edit freezes a new request under a fresh generation; late
    /// results for older generations are dropped by apply_delta.
    fn recompute_sgm(&mut self) {
        if let Some(request) = self.state.build_sgm_request() {
            self.send(ProviderCommand::ComputeSgm(request));
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let demo = env::var("NRL_DATA_SOURCE")
        .map(|v| v.trim().eq_ignore_ascii_case("demo"))
        .unwrap_or(false);
    if demo {
        fake_feed::spawn_fake_provider(tx, cmd_rx);
    } else {
        feed::spawn_provider(tx, cmd_rx);
    }

    let mut app = App::new(cmd_tx);
    app.send(ProviderCommand::FetchSnapshot);
    app.send(ProviderCommand::FetchImpactTable {
        category: app.state.impact_category,
    });
    app.send(ProviderCommand::FetchSgmMatches);

    let res = run_app(&mut terminal, &mut app, rx);

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

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

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

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header =
        Paragraph::new(header_text(&app.state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Ladder => render_ladder(frame, chunks[1], &app.state),
        Screen::Impact => render_impact(frame, chunks[1], &app.state),
        Screen::Tryscorer => render_tryscorer(frame, chunks[1], &app.state),
    }

    render_logs(frame, chunks[2], &app.state);

    let footer =
        Paragraph::new(footer_text(&app.state)).block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let round = state
        .round
        .map(|r| format!("Round {r}"))
        .unwrap_or_else(|| "loading...".to_string());
    let screen = match state.screen {
        Screen::Ladder => "LADDER".to_string(),
        Screen::Impact => format!("IMPACT | {}", state.impact_category.label()),
        Screen::Tryscorer => "TRYSCORER SGM".to_string(),
    };
    format!("NRL TERMINAL | {round} | {screen}")
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Ladder => {
            "1 Ladder | 2 Impact | 3 SGM | j/k Move | r Refresh | ? Help | q Quit".to_string()
        }
        Screen::Impact => {
            "Space Pick winner | c Clear | o Outcome | j/k Move | 1/2/3 Screens | q Quit"
                .to_string()
        }
        Screen::Tryscorer => {
            "m Match | Tab Side | +/- Tries | c Clear | j/k Move | 1/2/3 Screens | q Quit"
                .to_string()
        }
    }
}

fn render_ladder(frame: &mut Frame, area: Rect, state: &AppState) {
    let mut lines: Vec<Line> = Vec::new();

    for key in OutcomeKey::ALL {
        let style = Style::default().fg(outcome_color(key));
        let zone = state
            .zones
            .get(&key)
            .map(|z| format!("{:.0}-{:.0} pts", z.min, z.max))
            .unwrap_or_else(|| "decided".to_string());
        let magic = state
            .magic_numbers
            .get(&key)
            .map(|m| format!(" (50% at {m:.0})"))
            .unwrap_or_default();
        lines.push(Line::from(vec![
            Span::styled(format!("{:<12}", key.label()), style.add_modifier(Modifier::BOLD)),
            Span::styled(format!("{zone}{magic}"), style),
        ]));
    }
    lines.push(Line::default());

    if state.spreads.is_empty() {
        lines.push(Line::from(Span::styled(
            "No ladder data yet",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let bar_width = area.width.saturating_sub(30).max(20) as f64;
    let scale = bar_width / LADDER_AXIS_MAX;
    for (idx, spread) in state.spreads.iter().enumerate() {
        let selected = idx == state.ladder_selected;
        let name_style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };

        let lo = (spread.min * scale) as usize;
        let proj = (spread.projected * scale) as usize;
        let hi = (spread.max * scale) as usize;
        let mut bar = String::new();
        bar.push_str(&" ".repeat(lo));
        bar.push_str(&"█".repeat(proj.saturating_sub(lo).max(1)));
        bar.push_str(&"░".repeat(hi.saturating_sub(proj)));

        lines.push(Line::from(vec![
            Span::styled(format!("{:<12}", spread.team), name_style),
            Span::styled(
                format!("{:>3.0} ", spread.current),
                Style::default().fg(Color::Gray),
            ),
            Span::styled(bar, Style::default().fg(Color::Green)),
            Span::styled(
                format!(" {:.1}/{:.0}", spread.projected, spread.max),
                Style::default().fg(Color::Cyan),
            ),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_impact(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(state.impact_matches.len().max(1) as u16 + 2),
            Constraint::Min(1),
        ])
        .split(area);

    let mut match_lines: Vec<Line> = Vec::new();
    if state.impact_matches.is_empty() {
        match_lines.push(Line::from(Span::styled(
            "No predictions for this round",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (idx, m) in state.impact_matches.iter().enumerate() {
        let cursor = if idx == state.impact_selected { ">" } else { " " };
        let winner = state
            .impact_selection
            .get(idx)
            .and_then(|w| w.as_deref());
        let mark = |team: &str| -> Span {
            if winner == Some(team) {
                Span::styled(
                    format!("[{team}]"),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )
            } else {
                Span::raw(format!(" {team} "))
            }
        };
        match_lines.push(Line::from(vec![
            Span::raw(format!("{cursor} ")),
            mark(&m.home_team),
            Span::styled("vs", Style::default().fg(Color::DarkGray)),
            mark(&m.away_team),
        ]));
    }
    match_lines.push(Line::from(Span::styled(
        format!(
            "Chance of all selected outcomes occurring: {:.2}%",
            state.selection_chance * 100.0
        ),
        Style::default().fg(Color::Yellow),
    )));
    frame.render_widget(Paragraph::new(match_lines), sections[0]);

    let mut bar_lines: Vec<Line> = Vec::new();
    if state.impact_rows.is_empty() {
        bar_lines.push(Line::from(Span::styled(
            "Impact table loading...",
            Style::default().fg(Color::DarkGray),
        )));
    }
    let bar_width = sections[1].width.saturating_sub(32).max(20) as f64;
    for row in &state.impact_rows {
        let floor = (row.floor() * bar_width) as usize;
        let gain = (row.gain() * bar_width) as usize;
        let loss = (row.loss() * bar_width) as usize;
        bar_lines.push(Line::from(vec![
            Span::raw(format!("{:<12}", row.team)),
            Span::styled("█".repeat(floor), Style::default().fg(Color::Blue)),
            Span::styled("█".repeat(gain), Style::default().fg(Color::Green)),
            Span::styled("░".repeat(loss), Style::default().fg(Color::Red)),
            Span::raw(format!(
                " {:.1}% ({:+.1})",
                row.current * 100.0,
                (row.current - row.base) * 100.0
            )),
        ]));
    }
    frame.render_widget(Paragraph::new(bar_lines), sections[1]);
}

fn render_tryscorer(frame: &mut Frame, area: Rect, state: &AppState) {
    let mut lines: Vec<Line> = Vec::new();

    match state.selected_sgm_match() {
        Some(m) => {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} vs {}", m.home_team, m.away_team),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  {}", m.short_date()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "No match selected (press m)",
                Style::default().fg(Color::DarkGray),
            )));
        }
    }
    lines.push(Line::default());

    if let Some(lists) = &state.team_lists {
        let side = state.side_focus;
        lines.push(Line::from(Span::styled(
            format!("{} ({})", lists.team_name(side), side.label()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("{:<26}{:>8}{:>12}", "Player", "N Tries", "Anytime"),
            Style::default().fg(Color::DarkGray),
        )));
        for (idx, player) in lists.players(side).iter().enumerate() {
            let selected = idx == state.player_selected;
            let style = if selected {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else {
                Style::default()
            };
            let picks = state.picks.get(&player.id).copied().unwrap_or(0);
            let anytime = state
                .anytime
                .get(&player.id)
                .map(|p| format!("{:.1}%", p * 100.0))
                .unwrap_or_else(|| "-".to_string());
            let position = player.position.as_deref().unwrap_or("");
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{:<26}", format!("{} ({position})", player.name)),
                    style,
                ),
                Span::styled(format!("{picks:>8}/{MAX_PICK_TRIES}"), style),
                Span::styled(format!("{anytime:>12}"), Style::default().fg(Color::Yellow)),
            ]));
        }
    } else {
        lines.push(Line::from(Span::styled(
            "Loading team lists...",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines.push(Line::default());
    if state.sgm_pending {
        lines.push(Line::from(Span::styled(
            "SGM: computing...",
            Style::default().fg(Color::DarkGray),
        )));
    } else if let Some(result) = &state.sgm_result {
        for pick in &result.picks {
            lines.push(Line::from(Span::styled(
                format!("  {pick}"),
                Style::default().fg(Color::Cyan),
            )));
        }
        let odds = result
            .odds
            .map(|o| format!("${o:.2}"))
            .unwrap_or_else(|| "dead".to_string());
        lines.push(Line::from(Span::styled(
            format!("SGM: {:.2}% ({odds})", result.probability * 100.0),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Select one or more tryscorers",
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_logs(frame: &mut Frame, area: Rect, state: &AppState) {
    let visible = area.height.saturating_sub(1) as usize;
    let lines: Vec<Line> = state
        .logs
        .iter()
        .rev()
        .take(visible)
        .rev()
        .map(|msg| {
            let color = if msg.starts_with("[WARN]") {
                Color::Yellow
            } else {
                Color::DarkGray
            };
            Line::from(Span::styled(msg.clone(), Style::default().fg(color)))
        })
        .collect();
    let logs = Paragraph::new(lines).block(Block::default().borders(Borders::TOP).title("Log"));
    frame.render_widget(logs, area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = area.width.min(56);
    let height = area.height.min(14);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    frame.render_widget(Clear, popup);
    let text = "\
1/2/3      Ladder / Impact / Tryscorer\n\
j/k        Move selection\n\
Space      Cycle winner pick (Impact)\n\
o          Cycle outcome market (Impact)\n\
m/M        Cycle match (Tryscorer)\n\
Tab        Switch side (Tryscorer)\n\
+/-        Adjust minimum tries (Tryscorer)\n\
c          Clear picks\n\
r          Refresh round snapshot\n\
q          Quit";
    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, popup);
}

fn outcome_color(key: OutcomeKey) -> Color {
    match key {
        OutcomeKey::Finals => Color::LightYellow,
        OutcomeKey::Top4 => Color::Blue,
        OutcomeKey::MinorPremiership => Color::Yellow,
        OutcomeKey::Spoon => Color::Red,
    }
}
