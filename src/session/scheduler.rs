//! Cooperative timer queue on a virtual millisecond clock
//!
//! At most one timer per kind is pending. Scheduling a kind replaces its
//! previous timer, and cancelling removes it, so a superseded callback
//! never comes out of `pop_due`. Each timer also carries the token the
//! owner captured when scheduling it.

/// A timer that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired<K> {
    pub kind: K,
    pub token: u64,
    pub at: u64,
}

#[derive(Debug, Clone)]
struct Pending<K> {
    kind: K,
    due: u64,
    period: Option<u64>,
    token: u64,
    seq: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    now: u64,
    seq: u64,
    pending: Vec<Pending<K>>,
}

impl<K: Copy + Eq> Default for Scheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Eq> Scheduler<K> {
    pub fn new() -> Self {
        Self {
            now: 0,
            seq: 0,
            pending: Vec::new(),
        }
    }

    /// Current clock, ms
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Fire once after `delay_ms`
    pub fn once(&mut self, kind: K, delay_ms: u64, token: u64) {
        self.insert(kind, delay_ms, None, token);
    }

    /// Fire every `period_ms`, first one a full period from now
    pub fn every(&mut self, kind: K, period_ms: u64, token: u64) {
        let period = period_ms.max(1);
        self.insert(kind, period, Some(period), token);
    }

    pub fn cancel(&mut self, kind: K) {
        self.pending.retain(|p| p.kind != kind);
    }

    /// Time left until `kind` fires, if it is pending
    pub fn due_in(&self, kind: K) -> Option<u64> {
        self.pending
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.due.saturating_sub(self.now))
    }

    /// Take the earliest timer due at or before `until`, moving the clock to it.
    /// Periodic timers are re-armed one period later.
    pub fn pop_due(&mut self, until: u64) -> Option<Fired<K>> {
        let idx = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= until)
            .min_by_key(|(_, p)| (p.due, p.seq))
            .map(|(i, _)| i)?;

        let due = self.pending[idx].due;
        let fired = Fired {
            kind: self.pending[idx].kind,
            token: self.pending[idx].token,
            at: due,
        };

        match self.pending[idx].period {
            Some(period) => {
                self.seq += 1;
                let p = &mut self.pending[idx];
                p.due = due + period;
                p.seq = self.seq;
            }
            None => {
                self.pending.swap_remove(idx);
            }
        }

        self.now = self.now.max(due);
        Some(fired)
    }

    /// Move the clock forward without firing anything
    pub fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    fn insert(&mut self, kind: K, delay: u64, period: Option<u64>, token: u64) {
        self.cancel(kind);
        self.seq += 1;
        self.pending.push(Pending {
            kind,
            due: self.now + delay,
            period,
            token,
            seq: self.seq,
        });
    }
}
