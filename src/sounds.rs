//! Sound cues - fire-and-forget playback in a background task
//!
//! Cues are sent over a channel to a tokio task. Playback failures
//! are logged and dropped; the session never hears about them.
//! When a clip can't be played the task rings a [`Bell`], which the
//! terminal owner turns into a BEL between frames.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Named audio cues issued by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Start,
    Halfway,
    Done,
    Complete,
}

impl Cue {
    /// Clip name inside the sounds directory. `Complete` is synthesized.
    pub fn file_name(&self) -> Option<&'static str> {
        match self {
            Cue::Start => Some("start.mp3"),
            Cue::Halfway => Some("half.mp3"),
            Cue::Done => Some("done.mp3"),
            Cue::Complete => None,
        }
    }
}

/// Receives cue triggers. Must not block and must not fail.
pub trait CuePlayer {
    fn play(&self, cue: Cue);
}

/// Player that drops every cue
pub struct SilentPlayer;

impl CuePlayer for SilentPlayer {
    fn play(&self, cue: Cue) {
        debug!("Cue {:?} (silent)", cue);
    }
}

/// Pending terminal bell rings, shared between the audio task and the UI
#[derive(Debug, Clone, Default)]
pub struct Bell(Arc<AtomicUsize>);

impl Bell {
    pub fn ring(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Rings since the last call
    pub fn take(&self) -> usize {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Player backed by a background audio task
pub struct AudioCuePlayer {
    tx: mpsc::UnboundedSender<Cue>,
}

impl AudioCuePlayer {
    /// Spawn the audio task on the current tokio runtime
    pub fn spawn(sounds_dir: PathBuf, volume: u8, bell: Bell) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = AudioService {
            rx,
            sounds_dir,
            volume,
            bell,
        };
        tokio::spawn(service.run());
        Self { tx }
    }
}

impl CuePlayer for AudioCuePlayer {
    fn play(&self, cue: Cue) {
        if self.tx.send(cue).is_err() {
            warn!("Audio task gone, dropping cue {:?}", cue);
        }
    }
}

struct AudioService {
    rx: mpsc::UnboundedReceiver<Cue>,
    sounds_dir: PathBuf,
    volume: u8,
    bell: Bell,
}

impl AudioService {
    async fn run(mut self) {
        while let Some(cue) = self.rx.recv().await {
            debug!("Playing cue {:?}", cue);
            match cue.file_name() {
                Some(name) => {
                    let path = self.sounds_dir.join(name);
                    if !path.exists() {
                        warn!("Cue file not found: {}", path.display());
                        self.bell.ring();
                        continue;
                    }
                    self.play_file(&path);
                }
                None => self.play_chime(),
            }
        }
    }

    #[cfg(feature = "audio")]
    fn play_file(&self, path: &Path) {
        play_file(path.to_path_buf(), self.volume);
    }

    #[cfg(feature = "audio")]
    fn play_chime(&self) {
        play_chime(self.volume);
    }

    #[cfg(not(feature = "audio"))]
    fn play_file(&self, path: &Path) {
        debug!("Built without audio, ringing bell for {}", path.display());
        self.bell.ring();
    }

    #[cfg(not(feature = "audio"))]
    fn play_chime(&self) {
        self.bell.ring();
    }
}

#[cfg(feature = "audio")]
fn play_file(path: PathBuf, volume: u8) {
    std::thread::spawn(move || {
        use rodio::{Decoder, OutputStream, Sink};
        use std::fs::File;
        use std::io::BufReader;

        let Ok((_stream, handle)) = OutputStream::try_default() else {
            warn!("No audio output device");
            return;
        };
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open {}: {}", path.display(), e);
                return;
            }
        };
        let source = match Decoder::new(BufReader::new(file)) {
            Ok(s) => s,
            Err(e) => {
                warn!("Could not decode {}: {}", path.display(), e);
                return;
            }
        };
        let Ok(sink) = Sink::try_new(&handle) else {
            return;
        };
        sink.set_volume(volume as f32 / 100.0);
        sink.append(source);
        sink.sleep_until_end();
    });
}

/// Rising three-tone chime: 400, 600, 800 Hz
#[cfg(feature = "audio")]
fn play_chime(volume: u8) {
    std::thread::spawn(move || {
        use rodio::source::{SineWave, Source};
        use rodio::{OutputStream, Sink};
        use std::time::Duration;

        let Ok((_stream, handle)) = OutputStream::try_default() else {
            warn!("No audio output device");
            return;
        };
        let Ok(sink) = Sink::try_new(&handle) else {
            return;
        };
        sink.set_volume(volume as f32 / 100.0);
        for freq in [400.0, 600.0, 800.0] {
            sink.append(
                SineWave::new(freq)
                    .take_duration(Duration::from_millis(100))
                    .amplify(0.3),
            );
        }
        sink.sleep_until_end();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_files() {
        assert_eq!(Cue::Start.file_name(), Some("start.mp3"));
        assert_eq!(Cue::Halfway.file_name(), Some("half.mp3"));
        assert_eq!(Cue::Done.file_name(), Some("done.mp3"));
        assert_eq!(Cue::Complete.file_name(), None);
    }

    async fn wait_for_rings(bell: &Bell, want: usize) -> usize {
        let mut rung = 0;
        let wait = async {
            while rung < want {
                rung += bell.take();
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .expect("audio task stopped handling cues");
        rung
    }

    #[tokio::test]
    async fn test_missing_files_are_swallowed() {
        let bell = Bell::default();
        let player = AudioCuePlayer::spawn(PathBuf::from("/nonexistent/sounds"), 70, bell.clone());
        player.play(Cue::Start);
        player.play(Cue::Halfway);
        assert_eq!(wait_for_rings(&bell, 2).await, 2);

        // Task is still alive and serving after the failures
        assert!(!player.tx.is_closed());
        player.play(Cue::Done);
        assert_eq!(wait_for_rings(&bell, 1).await, 1);
    }

    #[test]
    fn test_bell_take_resets() {
        let bell = Bell::default();
        bell.ring();
        bell.clone().ring();
        assert_eq!(bell.take(), 2);
        assert_eq!(bell.take(), 0);
    }

    #[test]
    fn test_send_after_task_gone_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let player = AudioCuePlayer { tx };
        player.play(Cue::Done);
    }
}
