use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{error, info};

use super::session::{ScorecardSession, ANALYSIS, CONFIRM, REVIEW};
use crate::storage::{DecisionRecord, DecisionStore};
use crate::utils::ellipsize;
use crate::verdict::VerdictLabel;
use crate::wizard::{InputShape, Phase};

/// What the key loop should do after a key press
enum Flow {
    Continue,
    Quit,
}

/// TUI Application State
struct App {
    session: ScorecardSession,
    store: DecisionStore,
    input: String,
    status: String,
    error: Option<String>,
    /// Set after a failed model call so the loop does not retry on its own
    hold: bool,
    saved: Option<DecisionRecord>,
    history_len: usize,
}

impl App {
    fn new(session: ScorecardSession, store: DecisionStore, history_len: usize) -> Self {
        let mut app = Self {
            session,
            store,
            input: String::new(),
            status: "Ready".to_string(),
            error: None,
            hold: false,
            saved: None,
            history_len,
        };
        app.load_input();
        app
    }

    /// Put the current step's stored answer into the input line
    fn load_input(&mut self) {
        let state = self.session.state();
        self.input = self
            .session
            .wizard()
            .current_step(state)
            .and_then(|step| state.answer(&step.key))
            .map(|a| a.to_string())
            .unwrap_or_default();
    }

    fn report<E: std::fmt::Display>(&mut self, result: std::result::Result<(), E>) -> bool {
        match result {
            Ok(()) => {
                self.error = None;
                true
            }
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }

    async fn submit(&mut self) {
        let state = self.session.state();
        match state.phase() {
            Phase::AwaitingDerived(_) => {
                self.hold = false;
                self.error = None;
            }
            Phase::Terminal => {}
            Phase::Collecting(_) => {
                let text = self.input.clone();
                let answered = self.session.answer(text);
                if self.report(answered) {
                    let moved = self.session.next();
                    if self.report(moved) {
                        self.load_input();
                    }
                }
                if self.session.needs_save() {
                    self.save().await;
                }
            }
        }
    }

    async fn save(&mut self) {
        match self.session.save(&self.store).await {
            Ok(record) => {
                self.status = format!("Saved as {}", record.verdict);
                self.history_len += 1;
                self.saved = Some(record);
            }
            Err(e) => {
                error!("Saving failed: {:#}", e);
                self.error = Some(format!("{:#}", e));
            }
        }
    }

    async fn fulfill(&mut self) {
        self.status = "Thinking...".to_string();
        match self.session.fulfill().await {
            Ok(_) => {
                self.status = "Ready".to_string();
                self.error = None;
                self.load_input();
            }
            Err(e) => {
                self.status = "Waiting (Enter to retry)".to_string();
                self.error = Some(e.to_string());
                self.hold = true;
            }
        }
    }

    /// Left/Right on choice and score steps
    fn cycle(&mut self, forward: bool) {
        let Some(step) = self.session.wizard().current_step(self.session.state()) else { return };
        match &step.shape {
            InputShape::Choice { options } if !options.is_empty() => {
                let pos = options.iter().position(|o| o.eq_ignore_ascii_case(self.input.trim()));
                let next = match (pos, forward) {
                    (None, _) => 0,
                    (Some(i), true) => (i + 1) % options.len(),
                    (Some(i), false) => (i + options.len() - 1) % options.len(),
                };
                self.input = options[next].clone();
            }
            InputShape::Score { min, max } => {
                let current = self.input.trim().parse::<i32>().unwrap_or(if *min <= 0 && 0 <= *max { 0 } else { (min + max) / 2 });
                let next = if forward { current + 1 } else { current - 1 };
                self.input = next.clamp(*min, *max).to_string();
            }
            _ => {}
        }
    }

    async fn on_key(&mut self, key: KeyEvent) -> Flow {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('c') if ctrl => return Flow::Quit,
            KeyCode::Char('b') if ctrl => {
                self.session.back();
                self.error = None;
                self.hold = false;
                self.load_input();
            }
            KeyCode::Char('n') if ctrl => {
                self.session.reset();
                self.saved = None;
                self.error = None;
                self.hold = false;
                self.status = "Ready".to_string();
                self.load_input();
            }
            KeyCode::Char('r') if ctrl => {
                let correction = std::mem::take(&mut self.input);
                let redone = self.session.redo(ANALYSIS, correction);
                if self.report(redone) {
                    self.hold = false;
                }
            }
            KeyCode::Enter => self.submit().await,
            KeyCode::Left => self.cycle(false),
            KeyCode::Right => self.cycle(true),
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            _ => {}
        }
        Flow::Continue
    }
}

pub struct ScorecardCLI {
    session: ScorecardSession,
    store: DecisionStore,
}

impl ScorecardCLI {
    pub fn new(session: ScorecardSession, store: DecisionStore) -> Self {
        Self { session, store }
    }

    pub async fn run(self) -> Result<()> {
        let history_len = self.store.load().await.len();

        enable_raw_mode()?;
        if let Err(e) = stdout().execute(EnterAlternateScreen) {
            disable_raw_mode()?;
            return Err(e.into());
        }

        let mut app = App::new(self.session, self.store, history_len);
        info!("Scorecard TUI started");
        let outcome = match Terminal::new(CrosstermBackend::new(stdout())) {
            Ok(mut terminal) => event_loop(&mut terminal, &mut app).await,
            Err(e) => Err(e.into()),
        };

        // restore the terminal whatever the loop returned
        let restored = disable_raw_mode().and_then(|_| stdout().execute(LeaveAlternateScreen).map(|_| ()));
        if let Err(ref e) = outcome {
            error!("Scorecard TUI failed: {:#}", e);
        }
        outcome?;
        restored?;
        Ok(())
    }
}

async fn event_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if app.session.state().is_awaiting() && !app.hold {
            app.status = "Thinking...".to_string();
            terminal.draw(|f| ui(f, app))?;
            app.fulfill().await;
            continue;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Flow::Quit = app.on_key(key).await {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn verdict_color(label: VerdictLabel) -> Color {
    match label {
        VerdictLabel::Act => Color::Green,
        VerdictLabel::Redesign => Color::Yellow,
        VerdictLabel::Wait => Color::Cyan,
        VerdictLabel::No => Color::Red,
    }
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(55),
        ])
        .split(chunks[0]);

    let session = &app.session;
    let wizard = session.wizard();
    let state = session.state();

    // Steps and answers so far
    let cursor = state.cursor();
    let steps: Vec<ListItem> = wizard
        .visible_steps(state)
        .into_iter()
        .filter_map(|i| wizard.step(i).map(|s| (i, s)))
        .map(|(i, step)| {
            let marker = if Some(i) == cursor { "▶" } else { " " };
            let answer = state.answer(&step.key).map(|a| ellipsize(&a.to_string(), 40)).unwrap_or_default();
            let style = if Some(i) == cursor {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} {}: ", marker, ellipsize(&step.prompt, 36)), style),
                Span::styled(answer, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();
    let steps_list = List::new(steps)
        .block(Block::default().borders(Borders::ALL).title(" Decision "));
    f.render_widget(steps_list, main_chunks[0]);

    // Analysis and verdict
    let mut lines: Vec<Line> = Vec::new();
    if let Some(analysis) = session.analysis() {
        for (dimension, score) in &analysis.scores {
            let why = analysis.rationale.get(dimension).map(String::as_str).unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(format!("{:>3} ", score), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{}: ", dimension), Style::default().add_modifier(Modifier::BOLD)),
                Span::from(why.to_string()),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(format!("If acted: {}", analysis.outcome_if_acted)));
        lines.push(Line::from(format!("If not:   {}", analysis.outcome_if_not)));
        let corrections = state.corrections(ANALYSIS);
        if !corrections.is_empty() {
            lines.push(Line::from(format!("Corrections: {}", corrections.join(" | "))));
        }
        lines.push(Line::from(""));
    }
    if let Some(verdict) = session.verdict() {
        lines.push(Line::from(vec![
            Span::styled("Verdict: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                verdict.label.to_string(),
                Style::default().fg(verdict_color(verdict.label)).add_modifier(Modifier::BOLD),
            ),
            Span::from(format!("  aggregate {:.2} | total {}", verdict.aggregate, verdict.total)),
        ]));
        lines.push(Line::from(verdict.reason.to_string()));
        lines.push(Line::from(verdict.label.guidance()));
    }
    if let Some(record) = app.saved.as_ref().filter(|_| session.is_saved()) {
        lines.push(Line::from(""));
        lines.push(Line::from(format!("Saved {} ({} decisions on file)", record.timestamp, app.history_len)));
    }
    let result = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Scorecard "));
    f.render_widget(result, main_chunks[1]);

    // Input Area
    let step = wizard.current_step(state);
    let title = match (state.phase(), step) {
        (Phase::AwaitingDerived(_), Some(s)) => format!(" {} (working...) ", s.prompt),
        (_, Some(s)) => format!(" {} ", s.prompt),
        (Phase::Terminal, None) => " Done ".to_string(),
        _ => String::new(),
    };
    let input_style = match &app.error {
        Some(_) => Style::default().fg(Color::Red),
        None => Style::default().fg(Color::Cyan),
    };
    let input = Paragraph::new(app.input.as_str())
        .style(input_style)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, chunks[1]);

    // Footer
    let keys = match step.map(|s| s.key.as_str()) {
        Some(REVIEW) => "ENTER: Accept | ^R: Redo with correction | ^B: Back",
        Some(CONFIRM) => "ENTER: Save | ^B: Back",
        _ if state.is_terminal() => "^N: New decision | ^B: Back",
        _ => "ENTER: Next | ←/→: Cycle | ^B: Back",
    };
    let footer_text = match &app.error {
        Some(e) => format!(" {} | {} ", e, keys),
        None => format!(" {} | {} | ESC: Quit ", app.status, keys),
    };
    let footer = Paragraph::new(footer_text)
        .style(Style::default().fg(if app.error.is_some() { Color::Red } else { Color::DarkGray }));
    f.render_widget(footer, chunks[2]);
}
