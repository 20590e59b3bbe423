//! Phase countdown with the halfway and start-cue rules

use crate::sounds::Cue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Working,
    Resting,
}

/// What a tick did to the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Decremented by one second
    Counting,
    /// Halfway reached: held in place, caller freezes the countdown
    HalfwayFreeze,
    /// Reached zero
    PhaseComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub cue: Option<Cue>,
    pub event: TimerEvent,
}

/// Countdown for one phase instance.
///
/// A fresh timer is built for every phase, so the one-shot cue flag
/// belongs to that phase and can't leak into the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTimer {
    phase: Phase,
    duration: u32,
    remaining: u32,
    cue_fired: bool,
}

impl PhaseTimer {
    pub fn new(phase: Phase, duration: u32) -> Self {
        Self {
            phase,
            duration,
            remaining: duration,
            cue_fired: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn cue_fired(&self) -> bool {
        self.cue_fired
    }

    /// Remaining time at which a working phase pauses for the halfway cue
    pub fn halfway_point(&self) -> u32 {
        self.duration.div_ceil(2)
    }

    /// One second of countdown.
    ///
    /// `has_next` says whether another exercise or set follows this one;
    /// the start cue is held back on the final rest.
    pub fn tick(&mut self, has_next: bool, start_cue_lead: u32) -> TickOutcome {
        let mut cue = None;

        if self.phase == Phase::Resting
            && self.remaining == start_cue_lead
            && !self.cue_fired
            && has_next
        {
            self.cue_fired = true;
            cue = Some(Cue::Start);
        }

        if self.phase == Phase::Working
            && !self.cue_fired
            && self.duration > 0
            && self.remaining == self.halfway_point()
        {
            self.cue_fired = true;
            return TickOutcome {
                cue: Some(Cue::Halfway),
                event: TimerEvent::HalfwayFreeze,
            };
        }

        if self.remaining <= 1 {
            self.remaining = 0;
            return TickOutcome {
                cue,
                event: TimerEvent::PhaseComplete,
            };
        }

        self.remaining -= 1;
        TickOutcome {
            cue,
            event: TimerEvent::Counting,
        }
    }
}
