//! TUI module - routine selection, guided execution and history with ratatui

use std::io::{Stdout, Write, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};
use tracing::{error, info};

use crate::db::{Database, WorkoutLog};
use crate::exercises::{Routine, format_duration};
use crate::session::{Phase, Session, SessionSnapshot, Status};
use crate::sounds::Bell;
use crate::stats::{Analytics, LogFilter, estimated_duration, last_used_text};

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Selection,
    Execution,
    History,
}

/// App state for TUI
pub struct App {
    db: Database,
    session: Session,
    bell: Option<Bell>,
    routines: Vec<Routine>,
    logs: Vec<WorkoutLog>,
    log_filter: LogFilter,
    list_state: ListState,
    screen: Screen,
    should_quit: bool,
}

impl App {
    pub fn new(db: Database, session: Session) -> Result<Self> {
        let routines = db.get_routines()?;
        let logs = db.get_workout_logs()?;
        let mut list_state = ListState::default();
        if !routines.is_empty() {
            list_state.select(Some(0));
        }
        Ok(Self {
            db,
            session,
            bell: None,
            routines,
            logs,
            log_filter: LogFilter::All,
            list_state,
            screen: Screen::Selection,
            should_quit: false,
        })
    }

    /// Ring the terminal bell for cues that couldn't be played
    pub fn with_bell(mut self, bell: Bell) -> Self {
        self.bell = Some(bell);
        self
    }

    /// Jump straight into a routine; stays on selection if it can't be loaded
    pub fn open_routine(&mut self, id: &str) -> bool {
        if self.session.select_routine(&self.db, id) {
            self.screen = Screen::Execution;
            true
        } else {
            self.screen = Screen::Selection;
            false
        }
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;
        let result = self.main_loop(&mut terminal);
        restore_terminal()?;
        result
    }

    fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        let mut last = Instant::now();
        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            if self.bell.as_ref().is_some_and(|b| b.take() > 0) {
                let backend = terminal.backend_mut();
                backend.write_all(b"\x07")?;
                Write::flush(backend)?;
            }
            self.handle_events()?;

            let now = Instant::now();
            self.session.advance(now - last);
            last = now;

            self.record_completion()?;
        }
        Ok(())
    }

    /// Append a workout log once the session finishes
    fn record_completion(&mut self) -> Result<()> {
        if let Some(done) = self.session.take_completion() {
            let log = WorkoutLog::from_completion(&done, Utc::now());
            self.db.add_workout_log(&log)?;
            self.logs = self.db.get_workout_logs()?;
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.routines = self.db.get_routines()?;
        self.logs = self.db.get_workout_logs()?;
        let selected = self.list_state.selected().unwrap_or(0);
        if self.routines.is_empty() {
            self.list_state.select(None);
        } else {
            self.list_state.select(Some(selected.min(self.routines.len() - 1)));
        }
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        match self.screen {
            Screen::Selection => self.render_selection(frame),
            Screen::History => self.render_history(frame),
            Screen::Execution => match self.session.snapshot() {
                Some(snap) if snap.completed => self.render_completed(frame, &snap),
                Some(snap) => self.render_execution(frame, &snap),
                None => self.render_selection(frame),
            },
        }
    }

    fn render_selection(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(6),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let header = Paragraph::new("Animated Routines - Start Workout")
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let now = Utc::now();
        let stats = Analytics::new(&self.routines, &self.logs).dashboard(now);
        let summary = Paragraph::new(format!(
            "Routines: {}  |  Exercises: {}  |  Workouts completed: {}  |  This week: {}",
            stats.total_routines, stats.exercises_in_routines, stats.workouts_completed, stats.completed_this_week
        ))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(summary, chunks[1]);

        let items: Vec<ListItem> = self
            .routines
            .iter()
            .map(|r| {
                ListItem::new(format!(
                    "{:24} {:>2} exercises  {:>2} sets  {:>8}  {}",
                    r.name,
                    r.exercises.len(),
                    r.sets,
                    estimated_duration(r),
                    last_used_text(r.last_used, now)
                ))
            })
            .collect();

        let title = if self.routines.is_empty() {
            "No routines available - create one with `create-routine`"
        } else {
            "Choose a routine"
        };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().fg(Color::Yellow).bold())
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, chunks[2], &mut self.list_state);

        let footer = Paragraph::new("enter: start | j/k: move | h: history | q: quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn render_execution(&self, frame: &mut Frame, snap: &SessionSnapshot) {
        let Some(routine) = self.session.routine() else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(12),
                Constraint::Length(routine.exercises.len() as u16 + 3),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let header = Paragraph::new(format!(
            "{}  -  Set {} of {}",
            routine.name, snap.current_set, snap.total_sets
        ))
        .style(Style::default().fg(Color::Cyan).bold())
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green))
            .ratio((snap.progress / 100.0).clamp(0.0, 1.0))
            .label(format!("{}%", snap.progress.round()));
        frame.render_widget(gauge, chunks[1]);

        let panels = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);
        self.render_exercise_panel(frame, panels[0], snap);
        self.render_timer_panel(frame, panels[1], snap);

        let rows: Vec<Row> = routine
            .exercises
            .iter()
            .enumerate()
            .map(|(i, ex)| {
                let style = if i == snap.exercise_index && snap.phase == Phase::Working {
                    Style::default().fg(Color::Cyan).bold()
                } else if i < snap.exercise_index || (i == snap.exercise_index && snap.phase == Phase::Resting) {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Row::new(vec![
                    Cell::from(format!("{}", i + 1)),
                    Cell::from(ex.name.clone()),
                    Cell::from(format!("{}s work", ex.duration)),
                    Cell::from(format!("{}s rest", ex.rest_time)),
                ])
                .style(style)
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Min(20),
                Constraint::Length(10),
                Constraint::Length(10),
            ],
        )
        .header(Row::new(vec!["#", "Exercise", "Work", "Rest"]).style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title("Exercise List"));
        frame.render_widget(table, chunks[3]);

        let footer = Paragraph::new("space: start/pause | s: skip | r: reset | a: animation | b: back | q: quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[4]);
    }

    fn render_exercise_panel(&self, frame: &mut Frame, area: Rect, snap: &SessionSnapshot) {
        let Some(exercise) = self.session.current_exercise() else {
            return;
        };
        let resting = snap.phase == Phase::Resting;
        let title = if resting { "Rest Time".to_string() } else { exercise.name.clone() };

        let mut lines = vec![
            Line::from(format!("Exercise {} of {}", snap.exercise_index + 1, snap.total_exercises))
                .style(Style::default().fg(Color::DarkGray)),
            Line::from(""),
        ];

        if let Some(count) = snap.countdown {
            let text = if count == 0 { "GO!".to_string() } else { count.to_string() };
            lines.push(Line::from(text).style(Style::default().fg(Color::Yellow).bold()));
        } else if resting {
            lines.push(Line::from("Rest and prepare for the next exercise"));
        } else if let Some(desc) = &exercise.description {
            lines.push(Line::from(desc.clone()));
        } else {
            lines.push(Line::from("Follow the animation guide"));
        }
        lines.push(Line::from(""));

        match frame_label(snap) {
            Some(label) => lines.push(Line::from(label)),
            None => lines.push(Line::from("(no image)").style(Style::default().fg(Color::DarkGray))),
        }
        if !resting && exercise.is_animated() {
            let state = if snap.animation_enabled { "Playing" } else { "Paused" };
            lines.push(Line::from(format!("Animation: {}", state)).style(Style::default().fg(Color::DarkGray)));
        }

        let panel = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(panel, area);
    }

    fn render_timer_panel(&self, frame: &mut Frame, area: Rect, snap: &SessionSnapshot) {
        let (big, sub) = if snap.waiting_for_cue {
            ("Get Ready!".to_string(), "Starting soon...")
        } else if snap.halfway_paused {
            ("Half TIME!".to_string(), "Change position")
        } else if snap.phase == Phase::Resting {
            (format_time(snap.remaining_secs), "Rest Time")
        } else {
            (format_time(snap.remaining_secs), "Exercise Time")
        };

        let button = match snap.status {
            Status::WaitingForCue => "Starting...",
            Status::Active | Status::HalfwayPaused => "[space] Pause",
            _ => "[space] Start",
        };

        let mut lines = vec![
            Line::from(big).style(Style::default().fg(Color::Cyan).bold()),
            Line::from(sub).style(Style::default().fg(Color::DarkGray)),
            Line::from(""),
            Line::from(format!("{}   [s] Skip", button)),
            Line::from(""),
        ];

        if let Some(next) = self.session.next_exercise() {
            lines.push(Line::from("Up Next").style(Style::default().bold()));
            lines.push(Line::from(next.name.clone()));
            lines.push(Line::from(format!("{}s - {}s rest", next.duration, next.rest_time)));
        }

        let panel = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Timer"));
        frame.render_widget(panel, area);
    }

    fn render_completed(&self, frame: &mut Frame, snap: &SessionSnapshot) {
        let name = self.session.routine().map(|r| r.name.as_str()).unwrap_or_default();
        let minutes = (snap.total_sets as usize * snap.total_exercises * 45 + 30) / 60;
        let lines = vec![
            Line::from("Routine Complete!").style(Style::default().fg(Color::Green).bold()),
            Line::from(""),
            Line::from(format!("Great job completing \"{}\"", name)),
            Line::from(""),
            Line::from(format!(
                "Sets: {}   Exercises: {}   Minutes: {}",
                snap.total_sets, snap.total_exercises, minutes
            )),
            Line::from(""),
            Line::from("r: do again | b: back | q: quit").style(Style::default().fg(Color::DarkGray)),
        ];
        let panel = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(panel, frame.area());
    }

    fn render_history(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(frame.area());

        let header = Paragraph::new("Workout Log")
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let analytics = Analytics::new(&self.routines, &self.logs);
        let stats = analytics.dashboard(Utc::now());
        let summary = Paragraph::new(format!(
            "Total: {}  |  Completed: {}  |  Total time: {}  |  This week: {}",
            stats.total_workouts,
            stats.workouts_completed,
            format_duration(stats.total_minutes),
            stats.completed_this_week
        ))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(summary, chunks[1]);

        let rows: Vec<Row> = analytics
            .filtered_logs(self.log_filter)
            .into_iter()
            .map(|l| {
                Row::new(vec![
                    Cell::from(l.date.format("%Y-%m-%d").to_string()),
                    Cell::from(l.routine_name.clone()),
                    Cell::from(l.duration.clone()),
                    Cell::from(l.sets.to_string()),
                    Cell::from(l.exercises.join(", ")),
                    Cell::from(if l.completed { "done" } else { "partial" }),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(12),
                Constraint::Length(20),
                Constraint::Length(10),
                Constraint::Length(5),
                Constraint::Min(20),
                Constraint::Length(8),
            ],
        )
        .header(
            Row::new(vec!["Date", "Routine", "Duration", "Sets", "Exercises", "Status"])
                .style(Style::default().bold()),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("History - {}", self.log_filter.label())),
        );
        frame.render_widget(table, chunks[2]);

        let footer = Paragraph::new("f: filter | b: back | q: quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[3]);
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    self.handle_key(key.code)?;
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<()> {
        if code == KeyCode::Char('q') {
            self.should_quit = true;
            return Ok(());
        }

        match self.screen {
            Screen::Selection => match code {
                KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
                KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
                KeyCode::Enter => {
                    if let Some(id) = self.selected_routine_id() {
                        if self.open_routine(&id) {
                            info!("Opened routine {}", id);
                        } else {
                            error!("Could not open routine {}", id);
                            self.refresh()?;
                        }
                    }
                }
                KeyCode::Char('h') => {
                    self.logs = self.db.get_workout_logs()?;
                    self.screen = Screen::History;
                }
                _ => {}
            },
            Screen::History => match code {
                KeyCode::Char('f') => self.log_filter = self.log_filter.next(),
                KeyCode::Char('b') | KeyCode::Esc => self.screen = Screen::Selection,
                _ => {}
            },
            Screen::Execution => match code {
                KeyCode::Char(' ') => self.session.toggle(),
                KeyCode::Char('s') => self.session.skip(),
                KeyCode::Char('r') => self.session.reset(),
                KeyCode::Char('a') => self.session.toggle_animation(),
                KeyCode::Char('b') | KeyCode::Esc => {
                    self.session.back_to_selection();
                    self.screen = Screen::Selection;
                    self.refresh()?;
                }
                _ => {}
            },
        }
        Ok(())
    }

    fn move_selection(&mut self, delta: isize) {
        if self.routines.is_empty() {
            return;
        }
        let len = self.routines.len() as isize;
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len);
        self.list_state.select(Some(next as usize));
    }

    fn selected_routine_id(&self) -> Option<String> {
        let idx = self.list_state.selected()?;
        self.routines.get(idx).map(|r| r.id.clone())
    }
}

/// Frame number and image to show. Frames only move while the session
/// runs with animation on; otherwise the first frame is shown.
fn frame_label(snap: &SessionSnapshot) -> Option<String> {
    let moving = snap.animation_enabled && matches!(snap.status, Status::Active | Status::HalfwayPaused);
    let index = if moving { snap.frame_index } else { 0 };
    let image = snap.frames.get(index)?;
    Some(format!("Frame {}/{}  {}", index + 1, snap.frames.len(), image))
}

/// Seconds as m:ss
pub fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::sounds::SilentPlayer;

    fn app() -> App {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(SessionConfig::default(), Box::new(SilentPlayer));
        App::new(db, session).unwrap()
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(9), "0:09");
        assert_eq!(format_time(75), "1:15");
        assert_eq!(format_time(600), "10:00");
    }

    #[test]
    fn test_enter_opens_selected_routine() {
        let mut app = app();
        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(app.screen, Screen::Execution);
        assert_eq!(app.session.status(), Status::AwaitingFirstStart);

        app.handle_key(KeyCode::Char('b')).unwrap();
        assert_eq!(app.screen, Screen::Selection);
        assert_eq!(app.session.status(), Status::Idle);
        // Selecting stamped the routine as used
        assert!(app.routines[0].last_used.is_some());
    }

    #[test]
    fn test_unknown_routine_stays_on_selection() {
        let mut app = app();
        assert!(!app.open_routine("nope"));
        assert_eq!(app.screen, Screen::Selection);
    }

    #[test]
    fn test_completion_appends_log() {
        let mut app = app();
        assert!(app.open_routine("1"));
        app.handle_key(KeyCode::Char(' ')).unwrap();
        // 8 exercises x 3 sets of skips
        for _ in 0..(8 * 3 * 2) {
            app.handle_key(KeyCode::Char('s')).unwrap();
        }
        assert_eq!(app.session.status(), Status::Completed);

        app.record_completion().unwrap();
        assert_eq!(app.logs.len(), 1);
        assert_eq!(app.logs[0].routine_name, "Morning Stretch");
        assert!(app.logs[0].completed);

        app.record_completion().unwrap();
        assert_eq!(app.logs.len(), 1);
    }

    #[test]
    fn test_frame_label_follows_run_state() {
        let mut app = app();
        assert!(app.open_routine("1"));
        let label = |app: &App| frame_label(&app.session.snapshot().unwrap());
        assert_eq!(label(&app).as_deref(), Some("Frame 1/2  exercises/1.jpg"));

        app.handle_key(KeyCode::Char(' ')).unwrap();
        app.session.advance_ms(3000 + 1000);
        assert_eq!(label(&app).as_deref(), Some("Frame 2/2  exercises/11.jpg"));

        app.handle_key(KeyCode::Char(' ')).unwrap();
        assert_eq!(app.session.status(), Status::Paused);
        assert_eq!(label(&app).as_deref(), Some("Frame 1/2  exercises/1.jpg"));

        app.handle_key(KeyCode::Char(' ')).unwrap();
        assert_eq!(label(&app).as_deref(), Some("Frame 2/2  exercises/11.jpg"));

        app.handle_key(KeyCode::Char('a')).unwrap();
        assert_eq!(label(&app).as_deref(), Some("Frame 1/2  exercises/1.jpg"));
    }

    #[test]
    fn test_history_filter_cycles() {
        let mut app = app();
        app.handle_key(KeyCode::Char('h')).unwrap();
        assert_eq!(app.screen, Screen::History);
        assert_eq!(app.log_filter, LogFilter::All);

        app.handle_key(KeyCode::Char('f')).unwrap();
        assert_eq!(app.log_filter, LogFilter::Completed);
        app.handle_key(KeyCode::Char('f')).unwrap();
        assert_eq!(app.log_filter, LogFilter::Incomplete);
        app.handle_key(KeyCode::Char('f')).unwrap();
        assert_eq!(app.log_filter, LogFilter::All);

        app.handle_key(KeyCode::Esc).unwrap();
        assert_eq!(app.screen, Screen::Selection);
    }

    #[test]
    fn test_selection_wraps() {
        let mut app = app();
        app.move_selection(-1);
        assert_eq!(app.list_state.selected(), Some(0));
        app.move_selection(1);
        assert_eq!(app.list_state.selected(), Some(0));
    }
}
