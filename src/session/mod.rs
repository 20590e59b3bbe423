//! Session module - guided execution of a routine
//!
//! The [`Session`] walks a routine through sets, exercises and rests.
//! All time goes through a virtual clock: the caller reports elapsed
//! wall time with [`Session::advance`] and every timer that came due in
//! between runs in order, one callback at a time.
//!
//! Timers (countdown tick, halfway resume, start-cue wait, pre-start
//! countdown, frame tick) are owned by the state that scheduled them.
//! Every state change cancels them and schedules what the new state
//! needs. Callbacks also carry the phase epoch (or animator generation)
//! they were scheduled under and are dropped if it no longer matches.

pub mod animator;
pub mod scheduler;
pub mod timer;

pub use animator::{FrameAnimator, FrameSource};
pub use scheduler::{Fired, Scheduler};
pub use timer::{Phase, PhaseTimer, TickOutcome, TimerEvent};

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::db::RoutineStore;
use crate::exercises::{Exercise, Routine};
use crate::sounds::{Cue, CuePlayer};

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No routine selected
    Idle,
    /// Routine loaded, first exercise not started yet
    AwaitingFirstStart,
    /// Start cue playing before the first countdown
    WaitingForCue,
    /// 3-2-1-GO between exercises; 0 is GO
    PreStartCountdown { count: u8 },
    Active,
    Paused,
    /// Frozen at the halfway cue, resumes by itself
    HalfwayPaused,
    Completed,
}

impl Status {
    /// Whether the session is moving on its own (not stopped by the user)
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Status::Active | Status::HalfwayPaused | Status::WaitingForCue | Status::PreStartCountdown { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Countdown,
    HalfwayResume,
    CueWait,
    PreStart,
    Frame,
}

/// Summary handed out once a routine is finished
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedWorkout {
    pub routine_id: String,
    pub routine_name: String,
    pub sets: u32,
    pub exercises: Vec<String>,
    pub elapsed_secs: u64,
}

/// Read-only view of the session for display
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: Status,
    pub phase: Phase,
    pub current_set: u32,
    pub total_sets: u32,
    pub exercise_index: usize,
    pub total_exercises: usize,
    pub remaining_secs: u32,
    pub cue_fired: bool,
    pub frame_index: usize,
    pub frames: Vec<String>,
    pub frame: Option<String>,
    pub countdown: Option<u8>,
    pub waiting_for_cue: bool,
    pub halfway_paused: bool,
    pub completed: bool,
    pub animation_enabled: bool,
    pub progress: f64,
}

pub struct Session {
    config: SessionConfig,
    player: Box<dyn CuePlayer>,
    routine: Option<Routine>,
    status: Status,
    current_set: u32,
    exercise_index: usize,
    timer: PhaseTimer,
    animator: FrameAnimator,
    animation_enabled: bool,
    scheduler: Scheduler<TimerKind>,
    epoch: u64,
    /// Unspent halfway freeze, kept while paused out of it
    halfway_left_ms: Option<u64>,
    started_at: Option<u64>,
    completion: Option<CompletedWorkout>,
}

impl Session {
    pub fn new(config: SessionConfig, player: Box<dyn CuePlayer>) -> Self {
        Self {
            config,
            player,
            routine: None,
            status: Status::Idle,
            current_set: 1,
            exercise_index: 0,
            timer: PhaseTimer::new(Phase::Working, 0),
            animator: FrameAnimator::new(),
            animation_enabled: true,
            scheduler: Scheduler::new(),
            epoch: 0,
            halfway_left_ms: None,
            started_at: None,
            completion: None,
        }
    }

    /// Look up a routine and load it, recording it as used now.
    /// A missing routine leaves the session idle.
    pub fn select_routine(&mut self, store: &impl RoutineStore, id: &str) -> bool {
        let routine = match store.get_routine_by_id(id) {
            Ok(Some(r)) => r,
            Ok(None) => {
                warn!("Routine {} not found", id);
                self.back_to_selection();
                return false;
            }
            Err(e) => {
                warn!("Failed to read routine {}: {}", id, e);
                self.back_to_selection();
                return false;
            }
        };

        if !self.load(routine) {
            return false;
        }
        if let Err(e) = store.mark_routine_used(id, Utc::now()) {
            warn!("Failed to mark routine {} as used: {}", id, e);
        }
        true
    }

    /// Load a routine and wait for the first start. Routines without
    /// exercises can't be run; the session stays idle.
    pub fn load(&mut self, routine: Routine) -> bool {
        if routine.exercises.is_empty() || routine.sets == 0 {
            warn!("Routine {} has nothing to run", routine.name);
            self.back_to_selection();
            return false;
        }
        info!(
            "Loaded routine {} ({} exercises x {} sets)",
            routine.name,
            routine.exercises.len(),
            routine.sets
        );
        self.routine = Some(routine);
        self.reset();
        true
    }

    /// Start or pause. The very first start plays the start cue and
    /// waits for it before counting.
    pub fn toggle(&mut self) {
        match self.status {
            Status::AwaitingFirstStart => {
                info!("Session started");
                self.player.play(Cue::Start);
                self.enter(Status::WaitingForCue);
            }
            Status::Paused => match self.halfway_left_ms {
                Some(left) => {
                    debug!("Resumed into halfway pause, {}ms left", left);
                    self.enter(Status::HalfwayPaused);
                }
                None => {
                    debug!("Resumed");
                    self.enter(Status::Active);
                }
            },
            Status::Active | Status::HalfwayPaused => {
                debug!("Paused with {}s left", self.timer.remaining());
                let halfway_left = match self.status {
                    Status::HalfwayPaused => self.scheduler.due_in(TimerKind::HalfwayResume),
                    _ => None,
                };
                self.enter(Status::Paused);
                self.halfway_left_ms = halfway_left;
            }
            other => debug!("Start/pause ignored in {:?}", other),
        }
    }

    /// End the current phase now, as if its countdown ran out
    pub fn skip(&mut self) {
        match self.status {
            Status::Idle | Status::Completed => {}
            Status::PreStartCountdown { .. } => {
                if self.advance_position() {
                    self.enter(Status::Active);
                }
            }
            _ => self.complete_phase(),
        }
    }

    /// Back to set 1, first exercise, stopped
    pub fn reset(&mut self) {
        let Some(first) = self.routine.as_ref().map(|r| r.exercises[0].duration) else {
            return;
        };
        self.current_set = 1;
        self.exercise_index = 0;
        self.timer = PhaseTimer::new(Phase::Working, first);
        self.animation_enabled = true;
        self.animator.rewind();
        self.started_at = None;
        self.completion = None;
        self.enter(Status::AwaitingFirstStart);
    }

    pub fn toggle_animation(&mut self) {
        self.animation_enabled = !self.animation_enabled;
        self.sync_animator();
    }

    /// Drop the routine and everything about the run
    pub fn back_to_selection(&mut self) {
        self.routine = None;
        self.current_set = 1;
        self.exercise_index = 0;
        self.timer = PhaseTimer::new(Phase::Working, 0);
        self.started_at = None;
        self.completion = None;
        self.enter(Status::Idle);
    }

    /// Let wall-clock time pass, running every timer that comes due
    pub fn advance(&mut self, elapsed: Duration) {
        self.advance_ms(elapsed.as_millis() as u64);
    }

    pub fn advance_ms(&mut self, ms: u64) {
        let target = self.scheduler.now() + ms;
        while let Some(fired) = self.scheduler.pop_due(target) {
            self.dispatch(fired);
        }
        self.scheduler.set_now(target);
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn routine(&self) -> Option<&Routine> {
        self.routine.as_ref()
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        self.routine.as_ref()?.exercises.get(self.exercise_index)
    }

    /// The exercise after this slot, if the routine isn't on its last one
    pub fn next_exercise(&self) -> Option<&Exercise> {
        let routine = self.routine.as_ref()?;
        if !self.has_next() {
            return None;
        }
        if self.exercise_index + 1 < routine.exercises.len() {
            routine.exercises.get(self.exercise_index + 1)
        } else {
            routine.exercises.first()
        }
    }

    /// Coarse completion percentage, counting an exercise done once its rest starts
    pub fn progress(&self) -> f64 {
        let Some(routine) = &self.routine else {
            return 0.0;
        };
        if self.status == Status::Completed {
            return 100.0;
        }
        let per_set = routine.exercises.len();
        let total = routine.sets as usize * per_set;
        if total == 0 {
            return 0.0;
        }
        let resting = usize::from(self.timer.phase() == Phase::Resting);
        let done = (self.current_set as usize - 1) * per_set + self.exercise_index + resting;
        100.0 * done as f64 / total as f64
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let routine = self.routine.as_ref()?;
        Some(SessionSnapshot {
            status: self.status,
            phase: self.timer.phase(),
            current_set: self.current_set,
            total_sets: routine.sets,
            exercise_index: self.exercise_index,
            total_exercises: routine.exercises.len(),
            remaining_secs: self.timer.remaining(),
            cue_fired: self.timer.cue_fired(),
            frame_index: self.animator.index(),
            frames: self.animator.frames().to_vec(),
            frame: self.animator.current_frame().map(str::to_string),
            countdown: match self.status {
                Status::PreStartCountdown { count } => Some(count),
                _ => None,
            },
            waiting_for_cue: self.status == Status::WaitingForCue,
            halfway_paused: self.status == Status::HalfwayPaused,
            completed: self.status == Status::Completed,
            animation_enabled: self.animation_enabled,
            progress: self.progress(),
        })
    }

    /// Finished-run summary, handed out once
    pub fn take_completion(&mut self) -> Option<CompletedWorkout> {
        self.completion.take()
    }

    fn has_next(&self) -> bool {
        match &self.routine {
            Some(r) => self.exercise_index + 1 < r.exercises.len() || self.current_set < r.sets,
            None => false,
        }
    }

    /// Switch state and rebuild the timers it owns
    fn enter(&mut self, status: Status) {
        self.status = status;
        self.epoch += 1;
        let halfway_left = self.halfway_left_ms.take();
        for kind in [
            TimerKind::Countdown,
            TimerKind::HalfwayResume,
            TimerKind::CueWait,
            TimerKind::PreStart,
        ] {
            self.scheduler.cancel(kind);
        }

        match status {
            Status::Active => self.scheduler.every(TimerKind::Countdown, self.config.tick_ms, self.epoch),
            Status::HalfwayPaused => {
                let wait = halfway_left.unwrap_or(self.config.halfway_pause_ms);
                self.scheduler.once(TimerKind::HalfwayResume, wait, self.epoch)
            }
            Status::WaitingForCue => self.scheduler.once(TimerKind::CueWait, self.config.cue_wait_ms, self.epoch),
            Status::PreStartCountdown { .. } => {
                self.scheduler
                    .every(TimerKind::PreStart, self.config.countdown_step_ms, self.epoch)
            }
            _ => {}
        }

        if status.is_running() && self.started_at.is_none() {
            self.started_at = Some(self.scheduler.now());
        }
        self.sync_animator();
    }

    /// Point the animator at the current image sequence and restart
    /// its tick if anything about it changed
    fn sync_animator(&mut self) {
        let Some(routine) = &self.routine else {
            self.animator.clear();
            self.scheduler.cancel(TimerKind::Frame);
            return;
        };
        let running = self.animation_enabled && matches!(self.status, Status::Active | Status::HalfwayPaused);

        let set = self.current_set;
        let index = self.exercise_index;
        let (source, frames, interval) = match self.timer.phase() {
            Phase::Working => {
                let ex = &routine.exercises[index];
                (FrameSource::Exercise { set, index }, &ex.images[..], ex.frame_interval_ms())
            }
            Phase::Resting => (
                FrameSource::Rest { set, index },
                &self.config.rest_images[..],
                self.config.rest_frame_interval_ms,
            ),
        };

        if self.animator.configure(source, frames, interval, running) {
            self.scheduler.cancel(TimerKind::Frame);
            if self.animator.is_cycling() {
                self.scheduler.every(TimerKind::Frame, interval, self.animator.generation());
            }
        }
    }

    fn dispatch(&mut self, fired: Fired<TimerKind>) {
        if fired.kind == TimerKind::Frame {
            if fired.token == self.animator.generation() {
                self.animator.tick();
            }
            return;
        }
        if fired.token != self.epoch {
            debug!("Dropping stale {:?} timer", fired.kind);
            return;
        }

        match (fired.kind, self.status) {
            (TimerKind::Countdown, Status::Active) => self.on_countdown_tick(),
            (TimerKind::HalfwayResume, Status::HalfwayPaused) => self.enter(Status::Active),
            (TimerKind::CueWait, Status::WaitingForCue) => self.enter(Status::Active),
            (TimerKind::PreStart, Status::PreStartCountdown { count }) => {
                if count > 0 {
                    self.status = Status::PreStartCountdown { count: count - 1 };
                } else if self.advance_position() {
                    self.enter(Status::Active);
                }
            }
            (kind, status) => debug!("{:?} timer ignored in {:?}", kind, status),
        }
    }

    fn on_countdown_tick(&mut self) {
        let has_next = self.has_next();
        let outcome = self.timer.tick(has_next, self.config.start_cue_lead_secs);
        if let Some(cue) = outcome.cue {
            self.player.play(cue);
        }
        match outcome.event {
            TimerEvent::Counting => {}
            TimerEvent::HalfwayFreeze => {
                debug!("Halfway pause at {}s", self.timer.remaining());
                self.enter(Status::HalfwayPaused);
            }
            TimerEvent::PhaseComplete => self.complete_phase(),
        }
    }

    /// Phase ended, by countdown or skip
    fn complete_phase(&mut self) {
        let running = self.status.is_running();

        match self.timer.phase() {
            Phase::Resting => {
                if !self.has_next() {
                    self.finish();
                    return;
                }
                if self.config.pre_start_countdown && running {
                    self.enter(Status::PreStartCountdown {
                        count: self.config.countdown_from,
                    });
                    return;
                }
                self.advance_position();
            }
            Phase::Working => {
                self.player.play(Cue::Done);
                if !self.has_next() {
                    self.finish();
                    return;
                }
                let rest = self.current_exercise().map(|e| e.rest_time).unwrap_or(0);
                debug!("Exercise {} done, resting {}s", self.exercise_index + 1, rest);
                self.timer = PhaseTimer::new(Phase::Resting, rest);
            }
        }

        self.enter(if running { Status::Active } else { Status::Paused });
    }

    /// Move to the next exercise or set and start its working phase.
    /// Finishes the session when nothing is left.
    fn advance_position(&mut self) -> bool {
        let Some(routine) = &self.routine else {
            return false;
        };
        if self.exercise_index + 1 < routine.exercises.len() {
            self.exercise_index += 1;
        } else if self.current_set < routine.sets {
            self.current_set += 1;
            self.exercise_index = 0;
            info!("Set {} of {}", self.current_set, routine.sets);
        } else {
            self.finish();
            return false;
        }

        let duration = routine.exercises[self.exercise_index].duration;
        self.timer = PhaseTimer::new(Phase::Working, duration);
        self.animator.rewind();
        true
    }

    fn finish(&mut self) {
        self.player.play(Cue::Complete);
        if let Some(routine) = &self.routine {
            let elapsed_ms = self.scheduler.now() - self.started_at.unwrap_or(self.scheduler.now());
            info!("Routine {} complete in {}s", routine.name, elapsed_ms / 1000);
            self.completion = Some(CompletedWorkout {
                routine_id: routine.id.clone(),
                routine_name: routine.name.clone(),
                sets: routine.sets,
                exercises: routine.exercise_names(),
                elapsed_secs: elapsed_ms / 1000,
            });
        }
        self.enter(Status::Completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Cue>>>);

    impl Recorder {
        fn cues(&self) -> Vec<Cue> {
            self.0.borrow().clone()
        }

        fn count(&self, cue: Cue) -> usize {
            self.0.borrow().iter().filter(|c| **c == cue).count()
        }
    }

    impl CuePlayer for Recorder {
        fn play(&self, cue: Cue) {
            self.0.borrow_mut().push(cue);
        }
    }

    fn exercise(name: &str, duration: u32, rest: u32, frames: usize) -> Exercise {
        let mut ex = Exercise::new(name, duration, rest);
        ex.images = (0..frames).map(|i| format!("{}-{}.jpg", name, i)).collect();
        ex
    }

    fn routine(sets: u32, exercises: &[Exercise]) -> Routine {
        let mut r = Routine::new("test", "", sets);
        for ex in exercises {
            r.add_exercise(ex);
        }
        r
    }

    fn session_with(config: SessionConfig, r: Routine) -> (Session, Recorder) {
        let rec = Recorder::default();
        let mut session = Session::new(config, Box::new(rec.clone()));
        assert!(session.load(r));
        (session, rec)
    }

    fn session(r: Routine) -> (Session, Recorder) {
        session_with(SessionConfig::default(), r)
    }

    /// Press start and let the start cue finish
    fn start(session: &mut Session) {
        session.toggle();
        session.advance_ms(3000);
        assert_eq!(session.status(), Status::Active);
    }

    fn snap(session: &Session) -> SessionSnapshot {
        session.snapshot().unwrap()
    }

    #[test]
    fn test_load_waits_for_first_start() {
        let (session, rec) = session(routine(2, &[exercise("a", 30, 10, 2)]));
        let s = snap(&session);
        assert_eq!(s.status, Status::AwaitingFirstStart);
        assert_eq!(s.remaining_secs, 30);
        assert_eq!(s.current_set, 1);
        assert_eq!(s.exercise_index, 0);
        assert!(rec.cues().is_empty());
    }

    #[test]
    fn test_first_start_plays_cue_and_waits() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 30, 10, 2)]));
        session.toggle();
        assert_eq!(rec.cues(), vec![Cue::Start]);
        assert!(snap(&session).waiting_for_cue);

        session.advance_ms(2999);
        assert_eq!(snap(&session).remaining_secs, 30);
        assert_eq!(session.status(), Status::WaitingForCue);

        session.advance_ms(1);
        assert_eq!(session.status(), Status::Active);
        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, 29);
    }

    #[test]
    fn test_toggle_ignored_while_waiting_for_cue() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 30, 10, 2)]));
        session.toggle();
        session.toggle();
        assert_eq!(session.status(), Status::WaitingForCue);
        assert_eq!(rec.count(Cue::Start), 1);
    }

    #[test]
    fn test_halfway_pause_freezes_countdown() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 10, 5, 2)]));
        start(&mut session);

        session.advance_ms(5000);
        assert_eq!(snap(&session).remaining_secs, 5);
        assert_eq!(session.status(), Status::Active);

        session.advance_ms(1000);
        assert_eq!(session.status(), Status::HalfwayPaused);
        assert_eq!(snap(&session).remaining_secs, 5);
        assert_eq!(rec.count(Cue::Halfway), 1);

        session.advance_ms(2999);
        assert_eq!(snap(&session).remaining_secs, 5);
        assert!(snap(&session).halfway_paused);

        session.advance_ms(1);
        assert_eq!(session.status(), Status::Active);
        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, 4);

        session.advance_ms(10_000);
        assert_eq!(rec.count(Cue::Halfway), 1);
    }

    #[test]
    fn test_halfway_fires_once_per_working_phase() {
        let ex = exercise("a", 6, 2, 2);
        let (mut session, rec) = session(routine(2, &[ex.clone(), ex]));
        start(&mut session);

        // 4 working phases of 6s + 3s freeze, 3 rests of 2s, plenty of slack
        session.advance_ms(200_000);
        assert_eq!(session.status(), Status::Completed);
        assert_eq!(rec.count(Cue::Halfway), 4);
        assert_eq!(rec.count(Cue::Done), 4);
        assert_eq!(rec.count(Cue::Complete), 1);
    }

    #[test]
    fn test_start_cue_at_four_seconds_of_rest() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 4, 6, 2), exercise("b", 4, 0, 2)]));
        start(&mut session);
        session.skip();
        assert_eq!(snap(&session).phase, Phase::Resting);
        assert_eq!(snap(&session).remaining_secs, 6);

        session.advance_ms(2000);
        assert_eq!(snap(&session).remaining_secs, 4);
        assert_eq!(rec.count(Cue::Start), 1);

        session.advance_ms(1000);
        assert_eq!(rec.count(Cue::Start), 2);
        assert_eq!(snap(&session).remaining_secs, 3);

        session.advance_ms(2000);
        assert_eq!(rec.count(Cue::Start), 2);
    }

    #[test]
    fn test_short_rest_has_no_start_cue() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 4, 3, 2), exercise("b", 4, 0, 2)]));
        start(&mut session);
        session.skip();
        session.advance_ms(3000);
        assert_eq!(snap(&session).phase, Phase::Working);
        assert_eq!(snap(&session).exercise_index, 1);
        assert_eq!(rec.count(Cue::Start), 1);
    }

    #[test]
    fn test_last_exercise_goes_straight_to_complete() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 3, 30, 2)]));
        start(&mut session);
        session.skip();
        assert_eq!(session.status(), Status::Completed);
        assert_eq!(rec.cues(), vec![Cue::Start, Cue::Done, Cue::Complete]);
        assert_eq!(session.progress(), 100.0);
    }

    #[test]
    fn test_skip_sequencing_counts() {
        let exercises = [exercise("a", 30, 10, 2), exercise("b", 20, 5, 1), exercise("c", 15, 0, 0)];
        let (mut session, rec) = session(routine(2, &exercises));
        start(&mut session);

        let mut work = 0;
        let mut rest = 0;
        while session.status() != Status::Completed {
            match snap(&session).phase {
                Phase::Working => work += 1,
                Phase::Resting => rest += 1,
            }
            session.skip();
            assert!(work + rest < 100);
        }

        assert_eq!(work, 6);
        assert_eq!(rest, 5);
        assert_eq!(rec.count(Cue::Done), 6);
        assert_eq!(rec.count(Cue::Complete), 1);
    }

    #[test]
    fn test_set_rollover() {
        let (mut session, _) = session(routine(2, &[exercise("a", 5, 5, 2), exercise("b", 5, 5, 2)]));
        start(&mut session);
        for _ in 0..4 {
            session.skip();
        }
        let s = snap(&session);
        assert_eq!(s.current_set, 2);
        assert_eq!(s.exercise_index, 0);
        assert_eq!(s.phase, Phase::Working);
        assert_eq!(s.remaining_secs, 5);
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_at_100() {
        let exercises = [exercise("a", 5, 4, 2), exercise("b", 3, 2, 3)];
        let (mut session, _) = session(routine(3, &exercises));
        start(&mut session);

        let mut last = session.progress();
        let mut steps = 0;
        while session.status() != Status::Completed {
            if steps % 3 == 0 {
                session.skip();
            } else {
                session.advance_ms(1000);
            }
            let p = session.progress();
            assert!(p >= last, "progress went back from {} to {}", last, p);
            last = p;
            steps += 1;
            assert!(steps < 10_000);
        }
        assert_eq!(session.progress(), 100.0);
    }

    #[test]
    fn test_progress_formula() {
        let exercises = [exercise("a", 5, 4, 2), exercise("b", 5, 4, 2)];
        let (mut session, _) = session(routine(2, &exercises));
        assert_eq!(session.progress(), 0.0);
        session.skip(); // rest after a, set 1
        assert_eq!(session.progress(), 25.0);
        session.skip(); // b, set 1
        assert_eq!(session.progress(), 25.0);
        session.skip(); // rest after b
        assert_eq!(session.progress(), 50.0);
    }

    #[test]
    fn test_pause_resume_preserves_state() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 20, 5, 2)]));
        start(&mut session);
        session.advance_ms(5_500);
        let before = snap(&session);
        assert_eq!(before.status, Status::Active);
        let cues_before = rec.cues();

        session.toggle();
        session.toggle();
        assert_eq!(snap(&session), before);
        assert_eq!(rec.cues(), cues_before);
    }

    #[test]
    fn test_paused_session_does_not_move() {
        let (mut session, _) = session(routine(1, &[exercise("a", 20, 5, 3)]));
        start(&mut session);
        session.advance_ms(2000);
        session.toggle();
        let before = snap(&session);
        assert_eq!(before.status, Status::Paused);

        session.advance_ms(60_000);
        let after = snap(&session);
        assert_eq!(after.remaining_secs, before.remaining_secs);
        assert_eq!(after.frame_index, before.frame_index);

        // Resume goes straight to counting, no cue replay
        session.toggle();
        assert_eq!(session.status(), Status::Active);
        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, before.remaining_secs - 1);
    }

    #[test]
    fn test_pause_during_halfway_keeps_flag() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 4, 5, 2)]));
        start(&mut session);
        session.advance_ms(3000);
        assert_eq!(session.status(), Status::HalfwayPaused);

        session.toggle();
        assert_eq!(session.status(), Status::Paused);
        session.advance_ms(5000);
        assert_eq!(session.status(), Status::Paused);

        // Paused the moment the freeze began, so all of it is still owed
        session.toggle();
        assert_eq!(session.status(), Status::HalfwayPaused);
        session.advance_ms(2999);
        assert_eq!(snap(&session).remaining_secs, 2);
        session.advance_ms(1);
        assert_eq!(session.status(), Status::Active);
        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, 1);
        assert_eq!(rec.count(Cue::Halfway), 1);
    }

    #[test]
    fn test_pause_resume_inside_halfway_freeze() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 10, 5, 2)]));
        start(&mut session);
        session.advance_ms(6000);
        let before = snap(&session);
        assert_eq!(before.status, Status::HalfwayPaused);
        assert_eq!(before.remaining_secs, 5);

        session.toggle();
        session.toggle();
        assert_eq!(snap(&session), before);

        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, 5);
        assert!(snap(&session).halfway_paused);

        session.advance_ms(2000);
        assert_eq!(session.status(), Status::Active);
        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, 4);
        assert_eq!(rec.count(Cue::Halfway), 1);
    }

    #[test]
    fn test_resume_owes_only_unspent_freeze() {
        let (mut session, _) = session(routine(1, &[exercise("a", 10, 5, 2)]));
        start(&mut session);
        session.advance_ms(7000);
        session.toggle();
        session.advance_ms(30_000);

        session.toggle();
        session.advance_ms(1999);
        assert_eq!(session.status(), Status::HalfwayPaused);
        session.advance_ms(1);
        assert_eq!(session.status(), Status::Active);
    }

    #[test]
    fn test_skip_from_halfway_pause_drops_owed_freeze() {
        let (mut session, _) = session(routine(1, &[exercise("a", 10, 10, 2), exercise("b", 10, 10, 2)]));
        start(&mut session);
        session.advance_ms(6000);
        session.toggle();
        session.skip();
        assert_eq!(snap(&session).phase, Phase::Resting);

        session.toggle();
        assert_eq!(session.status(), Status::Active);
        session.advance_ms(1000);
        assert_eq!(snap(&session).remaining_secs, 9);
    }

    #[test]
    fn test_skip_during_halfway_cancels_resume() {
        let (mut session, _) = session(routine(1, &[exercise("a", 10, 10, 2), exercise("b", 10, 10, 2)]));
        start(&mut session);
        session.advance_ms(6000);
        assert_eq!(session.status(), Status::HalfwayPaused);

        session.skip();
        assert_eq!(session.status(), Status::Active);
        assert_eq!(snap(&session).phase, Phase::Resting);

        session.advance_ms(3000);
        let s = snap(&session);
        assert_eq!(s.status, Status::Active);
        assert_eq!(s.remaining_secs, 7);
    }

    #[test]
    fn test_skip_while_paused_stays_paused() {
        let (mut session, _) = session(routine(1, &[exercise("a", 10, 10, 2), exercise("b", 10, 10, 2)]));
        start(&mut session);
        session.toggle();
        session.skip();
        assert_eq!(session.status(), Status::Paused);
        assert_eq!(snap(&session).phase, Phase::Resting);
        session.advance_ms(5000);
        assert_eq!(snap(&session).remaining_secs, 10);
    }

    #[test]
    fn test_reset_restores_start_state() {
        let exercises = [exercise("a", 8, 4, 2), exercise("b", 6, 4, 2)];
        let (mut session, rec) = session(routine(2, &exercises));
        start(&mut session);
        session.skip();
        session.skip();
        session.advance_ms(4000);
        assert_eq!(session.status(), Status::HalfwayPaused);

        session.reset();
        let s = snap(&session);
        assert_eq!(s.status, Status::AwaitingFirstStart);
        assert_eq!(s.current_set, 1);
        assert_eq!(s.exercise_index, 0);
        assert_eq!(s.phase, Phase::Working);
        assert_eq!(s.remaining_secs, 8);
        assert!(!s.completed);
        assert!(!s.cue_fired);

        // Nothing left scheduled from before the reset
        let cues = rec.cues().len();
        session.advance_ms(30_000);
        assert_eq!(snap(&session), s);
        assert_eq!(rec.cues().len(), cues);

        // Starting again replays the start cue
        session.toggle();
        assert_eq!(rec.cues().last(), Some(&Cue::Start));
    }

    #[test]
    fn test_reset_after_completion() {
        let (mut session, _) = session(routine(1, &[exercise("a", 3, 3, 0)]));
        start(&mut session);
        session.skip();
        assert!(snap(&session).completed);
        session.reset();
        let s = snap(&session);
        assert!(!s.completed);
        assert_eq!(s.remaining_secs, 3);
        assert_eq!(s.progress, 0.0);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 0, 0, 0), exercise("b", 5, 0, 0)]));
        start(&mut session);
        session.advance_ms(1000);
        assert_eq!(snap(&session).phase, Phase::Resting);
        assert_eq!(rec.count(Cue::Halfway), 0);
        session.advance_ms(1000);
        assert_eq!(snap(&session).exercise_index, 1);
    }

    #[test]
    fn test_frames_cycle_only_while_active() {
        let mut ex = exercise("a", 60, 10, 3);
        ex.animation_speed = Some(500);
        let (mut session, _) = session(routine(1, &[ex]));

        session.advance_ms(5000);
        assert_eq!(snap(&session).frame_index, 0);

        session.toggle();
        session.advance_ms(3000);
        assert_eq!(snap(&session).frame_index, 0);

        session.advance_ms(500);
        assert_eq!(snap(&session).frame_index, 1);
        session.advance_ms(500);
        assert_eq!(snap(&session).frame_index, 2);
        session.advance_ms(500);
        assert_eq!(snap(&session).frame_index, 0);
        session.advance_ms(500);
        assert_eq!(snap(&session).frame_index, 1);

        session.toggle_animation();
        session.advance_ms(2000);
        assert_eq!(snap(&session).frame_index, 1);
        assert!(!snap(&session).animation_enabled);

        session.toggle_animation();
        session.advance_ms(500);
        assert_eq!(snap(&session).frame_index, 2);

        session.toggle();
        session.advance_ms(5000);
        assert_eq!(snap(&session).frame_index, 2);
    }

    #[test]
    fn test_frames_keep_cycling_through_halfway_pause() {
        let mut ex = exercise("a", 4, 10, 2);
        ex.animation_speed = Some(1000);
        let (mut session, _) = session(routine(1, &[ex]));
        start(&mut session);
        session.advance_ms(3000);
        assert_eq!(session.status(), Status::HalfwayPaused);
        let idx = snap(&session).frame_index;
        session.advance_ms(1000);
        assert_ne!(snap(&session).frame_index, idx);
    }

    #[test]
    fn test_rest_uses_rest_frames() {
        let (mut session, _) = session(routine(1, &[exercise("a", 5, 10, 3), exercise("b", 5, 0, 3)]));
        start(&mut session);
        session.skip();
        let s = snap(&session);
        assert_eq!(s.frames.len(), 2);
        assert!(s.frame.unwrap().contains("rest"));

        session.advance_ms(1000);
        assert_eq!(snap(&session).frame_index, 1);
    }

    #[test]
    fn test_next_exercise_resets_frame() {
        let mut ex = exercise("a", 30, 5, 3);
        ex.animation_speed = Some(100);
        let (mut session, _) = session(routine(1, &[ex.clone(), ex]));
        start(&mut session);
        session.advance_ms(100);
        assert_eq!(snap(&session).frame_index, 1);
        session.skip();
        session.skip();
        assert_eq!(snap(&session).exercise_index, 1);
        assert_eq!(snap(&session).frame_index, 0);
    }

    #[test]
    fn test_pre_start_countdown_between_exercises() {
        let config = SessionConfig {
            pre_start_countdown: true,
            ..SessionConfig::default()
        };
        let (mut session, _) = session_with(config, routine(1, &[exercise("a", 5, 2, 2), exercise("b", 5, 0, 2)]));
        start(&mut session);
        session.skip();
        session.advance_ms(2000);
        assert_eq!(snap(&session).countdown, Some(3));

        session.advance_ms(1000);
        assert_eq!(snap(&session).countdown, Some(2));
        session.advance_ms(1000);
        assert_eq!(snap(&session).countdown, Some(1));
        session.advance_ms(1000);
        assert_eq!(snap(&session).countdown, Some(0));
        assert_eq!(snap(&session).phase, Phase::Resting);

        session.advance_ms(1000);
        let s = snap(&session);
        assert_eq!(s.status, Status::Active);
        assert_eq!(s.exercise_index, 1);
        assert_eq!(s.remaining_secs, 5);
    }

    #[test]
    fn test_skip_and_reset_during_countdown() {
        let config = SessionConfig {
            pre_start_countdown: true,
            ..SessionConfig::default()
        };
        let exercises = [exercise("a", 5, 1, 2), exercise("b", 5, 1, 2), exercise("c", 5, 0, 2)];
        let (mut session, _) = session_with(config, routine(1, &exercises));
        start(&mut session);
        session.skip();
        session.advance_ms(1000);
        assert!(snap(&session).countdown.is_some());

        session.skip();
        assert_eq!(session.status(), Status::Active);
        assert_eq!(snap(&session).exercise_index, 1);

        session.skip();
        session.advance_ms(1000);
        assert!(snap(&session).countdown.is_some());
        session.reset();
        session.advance_ms(10_000);
        assert_eq!(session.status(), Status::AwaitingFirstStart);
        assert_eq!(snap(&session).exercise_index, 0);
    }

    #[test]
    fn test_back_to_selection_clears_everything() {
        let (mut session, rec) = session(routine(1, &[exercise("a", 10, 5, 2)]));
        start(&mut session);
        session.back_to_selection();
        assert_eq!(session.status(), Status::Idle);
        assert!(session.snapshot().is_none());

        let cues = rec.cues().len();
        session.advance_ms(60_000);
        assert_eq!(rec.cues().len(), cues);

        session.toggle();
        session.skip();
        session.reset();
        assert_eq!(session.status(), Status::Idle);
    }

    #[test]
    fn test_empty_routine_stays_idle() {
        let mut session = Session::new(SessionConfig::default(), Box::new(Recorder::default()));
        assert!(!session.load(routine(3, &[])));
        assert_eq!(session.status(), Status::Idle);
    }

    #[test]
    fn test_completion_is_taken_once() {
        let (mut session, _) = session(routine(1, &[exercise("a", 3, 0, 0), exercise("b", 2, 0, 0)]));
        start(&mut session);
        session.advance_ms(20_000);
        assert_eq!(session.status(), Status::Completed);

        let done = session.take_completion().unwrap();
        assert_eq!(done.exercises, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(done.sets, 1);
        assert!(done.elapsed_secs >= 3 + 5);
        assert!(session.take_completion().is_none());
    }

    #[test]
    fn test_next_exercise_preview() {
        let (mut session, _) = session(routine(2, &[exercise("a", 5, 5, 0), exercise("b", 5, 5, 0)]));
        assert_eq!(session.next_exercise().unwrap().name, "b");
        session.skip();
        session.skip();
        assert_eq!(session.next_exercise().unwrap().name, "a");
        session.skip();
        session.skip();
        session.skip();
        session.skip();
        assert_eq!(session.current_exercise().unwrap().name, "b");
        assert!(session.next_exercise().is_none());
    }

    #[test]
    fn test_select_routine_from_store() {
        let db = Database::open_in_memory().unwrap();
        let mut session = Session::new(SessionConfig::default(), Box::new(Recorder::default()));

        assert!(!session.select_routine(&db, "missing"));
        assert_eq!(session.status(), Status::Idle);

        assert!(session.select_routine(&db, "1"));
        assert_eq!(session.status(), Status::AwaitingFirstStart);
        assert_eq!(session.routine().unwrap().name, "Morning Stretch");
        assert!(db.get_routine_by_id("1").unwrap().unwrap().last_used.is_some());
    }
}
