//! Frame animator - cycles an image sequence on its own interval

/// Identifies which image sequence is loaded, so the owner can tell
/// a new sequence from the same one shown again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Exercise { set: u32, index: usize },
    Rest { set: u32, index: usize },
}

#[derive(Debug, Clone, Default)]
pub struct FrameAnimator {
    source: Option<FrameSource>,
    frames: Vec<String>,
    interval_ms: u64,
    running: bool,
    index: usize,
    generation: u64,
}

impl FrameAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a sequence and run state.
    ///
    /// Returns true when the tick schedule has to be restarted, i.e. the
    /// source, interval or running flag changed. The generation is bumped
    /// so ticks scheduled for the old configuration are ignored.
    pub fn configure(&mut self, source: FrameSource, frames: &[String], interval_ms: u64, running: bool) -> bool {
        let changed = self.source != Some(source) || self.interval_ms != interval_ms || self.running != running;
        if !changed {
            return false;
        }

        if self.source != Some(source) {
            self.source = Some(source);
            self.frames = frames.to_vec();
            self.index = if self.frames.is_empty() { 0 } else { self.index % self.frames.len() };
        }
        self.interval_ms = interval_ms;
        self.running = running;
        self.generation += 1;
        true
    }

    /// Drop the sequence entirely
    pub fn clear(&mut self) {
        self.source = None;
        self.frames.clear();
        self.running = false;
        self.index = 0;
        self.generation += 1;
    }

    /// Back to the first frame
    pub fn rewind(&mut self) {
        self.index = 0;
    }

    /// Whether periodic ticks should be scheduled at all
    pub fn is_cycling(&self) -> bool {
        self.running && self.frames.len() >= 2
    }

    /// Advance one frame, wrapping. No-op unless cycling.
    pub fn tick(&mut self) {
        if self.is_cycling() {
            self.index = (self.index + 1) % self.frames.len();
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn current_frame(&self) -> Option<&str> {
        self.frames.get(self.index).map(String::as_str)
    }
}
