//! Configuration - session timing constants and runtime settings

use std::path::PathBuf;

/// Timing rules for a guided session.
///
/// `cue_wait_ms` and `halfway_pause_ms` stand in for the length of the
/// start and halfway audio cues. They are fixed approximations; the real
/// clip length is never queried.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Countdown tick
    pub tick_ms: u64,
    /// Delay after the start cue before the first exercise counts down
    pub cue_wait_ms: u64,
    /// Frozen time at the halfway point of a working phase
    pub halfway_pause_ms: u64,
    /// Start cue fires when a rest has exactly this many seconds left
    pub start_cue_lead_secs: u32,
    /// Pre-start countdown between exercises (3-2-1-GO)
    pub pre_start_countdown: bool,
    pub countdown_from: u8,
    pub countdown_step_ms: u64,
    /// Frames shown while resting
    pub rest_images: Vec<String>,
    pub rest_frame_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            cue_wait_ms: 3000,
            halfway_pause_ms: 3000,
            start_cue_lead_secs: 4,
            pre_start_countdown: false,
            countdown_from: 3,
            countdown_step_ms: 1000,
            rest_images: vec![
                "exercises/1rest.jpg".to_string(),
                "exercises/2rest.jpg".to_string(),
            ],
            rest_frame_interval_ms: 1000,
        }
    }
}

/// Settings resolved from CLI flags and environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub sounds_dir: PathBuf,
    pub volume: u8,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn new(db_path: String, sounds_dir: PathBuf, volume: u8, countdown: bool) -> Self {
        Self {
            db_path,
            sounds_dir,
            volume: volume.min(100),
            session: SessionConfig {
                pre_start_countdown: countdown,
                ..SessionConfig::default()
            },
        }
    }
}
