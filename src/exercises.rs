//! Exercise and routine definitions - the library and its default content

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Frame interval used when an exercise doesn't set one
pub const DEFAULT_ANIMATION_SPEED_MS: u64 = 700;
pub const MIN_ANIMATION_SPEED_MS: u64 = 100;
pub const MAX_ANIMATION_SPEED_MS: u64 = 2000;

/// A library exercise with its frame-by-frame image guide.
///
/// Image count decides how it's shown: none, a static picture, or
/// an animated sequence when there are two or more frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub duration: u32,  // Work time, seconds
    pub rest_time: u32, // Rest after it, seconds
    pub animation_speed: Option<u64>,
}

impl Exercise {
    pub fn new(name: impl Into<String>, duration: u32, rest_time: u32) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            description: None,
            images: Vec::new(),
            duration,
            rest_time,
            animation_speed: None,
        }
    }

    /// Frame interval in ms, defaulted and clamped to the supported range
    pub fn frame_interval_ms(&self) -> u64 {
        self.animation_speed
            .unwrap_or(DEFAULT_ANIMATION_SPEED_MS)
            .clamp(MIN_ANIMATION_SPEED_MS, MAX_ANIMATION_SPEED_MS)
    }

    pub fn is_animated(&self) -> bool {
        self.images.len() >= 2
    }
}

/// A routine: sets over an ordered list of exercise snapshots.
///
/// Exercises are copied in when added; later edits to the library
/// exercise do not reach routines that already hold it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    pub description: String,
    pub sets: u32,
    pub exercises: Vec<Exercise>,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl Routine {
    pub fn new(name: impl Into<String>, description: impl Into<String>, sets: u32) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            description: description.into(),
            sets,
            exercises: Vec::new(),
            created_at: Utc::now(),
            last_used: None,
        }
    }

    /// Append a snapshot of a library exercise
    pub fn add_exercise(&mut self, exercise: &Exercise) {
        self.exercises.push(exercise.clone());
    }

    /// Estimated length in seconds: work plus rest for every exercise, times sets
    pub fn total_seconds(&self) -> u64 {
        let per_set: u64 = self
            .exercises
            .iter()
            .map(|e| u64::from(e.duration) + u64::from(e.rest_time))
            .sum();
        per_set * u64::from(self.sets)
    }

    pub fn exercise_names(&self) -> Vec<String> {
        self.exercises.iter().map(|e| e.name.clone()).collect()
    }
}

/// Millisecond timestamp followed by 9 random base-36 characters
pub fn generate_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}", Utc::now().timestamp_millis(), suffix)
}

/// Format minutes as "45 min", "1h 30m" or "2h"
pub fn format_duration(minutes: u64) -> String {
    if minutes < 60 {
        return format!("{} min", minutes);
    }
    let hours = minutes / 60;
    let rest = minutes % 60;
    if rest > 0 {
        format!("{}h {}m", hours, rest)
    } else {
        format!("{}h", hours)
    }
}

/// Read back a duration written by [`format_duration`]. A bare number
/// counts as minutes; anything unreadable counts as zero.
pub fn parse_duration_minutes(text: &str) -> u64 {
    let mut total = 0;
    let mut number: Option<u64> = None;
    for c in text.chars() {
        match (c.to_digit(10), c, number) {
            (Some(d), _, n) => number = Some(n.unwrap_or(0) * 10 + u64::from(d)),
            (None, 'h', Some(n)) => {
                total += n * 60;
                number = None;
            }
            (None, 'm', Some(n)) => {
                total += n;
                number = None;
            }
            _ => {}
        }
    }
    total + number.unwrap_or(0)
}

struct DefaultExercise {
    id: &'static str,
    name: &'static str,
    duration: u32,
    rest_time: u32,
    images: [&'static str; 2],
    description: &'static str,
    animation_speed: u64,
}

/// Built-in stretching library, seeded into an empty store
const DEFAULT_EXERCISES: &[DefaultExercise] = &[
    DefaultExercise {
        id: "1",
        name: "Leg Pull at Back",
        duration: 30,
        rest_time: 10,
        images: ["exercises/1.jpg", "exercises/11.jpg"],
        description: "Stretching exercise for the back of the legs - perform on both sides",
        animation_speed: 1000,
    },
    DefaultExercise {
        id: "2",
        name: "Stretch to the Side",
        duration: 30,
        rest_time: 10,
        images: ["exercises/2.jpg", "exercises/22.jpg"],
        description: "Side stretching exercise for flexibility - perform on both sides",
        animation_speed: 1000,
    },
    DefaultExercise {
        id: "3",
        name: "Leg Up at Front",
        duration: 30,
        rest_time: 10,
        images: ["exercises/3.jpg", "exercises/33.jpg"],
        description: "Front leg stretching exercise - perform on both sides",
        animation_speed: 1000,
    },
    DefaultExercise {
        id: "4",
        name: "Down Legs Open",
        duration: 45,
        rest_time: 15,
        images: ["exercises/4.jpg", "exercises/44.jpg"],
        description: "Deep stretch with legs open - stretch well and hold position",
        animation_speed: 1500,
    },
    DefaultExercise {
        id: "5",
        name: "Calf Stretch",
        duration: 30,
        rest_time: 10,
        images: ["exercises/5.jpg", "exercises/55.jpg"],
        description: "Calf muscle stretching exercise - perform on both sides",
        animation_speed: 1000,
    },
    DefaultExercise {
        id: "6",
        name: "Touch Fingers",
        duration: 30,
        rest_time: 10,
        images: ["exercises/6.jpg", "exercises/66.jpg"],
        description: "Forward bend stretch - reach all the way down with your fingers",
        animation_speed: 1000,
    },
    DefaultExercise {
        id: "7",
        name: "Single Leg Down",
        duration: 30,
        rest_time: 10,
        images: ["exercises/7.jpg", "exercises/77.jpg"],
        description: "Single leg stretching exercise - perform on both sides",
        animation_speed: 1000,
    },
    DefaultExercise {
        id: "8",
        name: "Core Side Stretch",
        duration: 30,
        rest_time: 10,
        images: ["exercises/8.jpg", "exercises/88.jpg"],
        description: "Core and side stretching exercise - use weight or resistance band for added intensity",
        animation_speed: 1000,
    },
];

pub fn default_exercises() -> Vec<Exercise> {
    DEFAULT_EXERCISES
        .iter()
        .map(|d| Exercise {
            id: d.id.to_string(),
            name: d.name.to_string(),
            description: Some(d.description.to_string()),
            images: d.images.iter().map(|s| s.to_string()).collect(),
            duration: d.duration,
            rest_time: d.rest_time,
            animation_speed: Some(d.animation_speed),
        })
        .collect()
}

/// "Morning Stretch": every default exercise, three sets
pub fn default_routine() -> Routine {
    let now = Utc::now();
    Routine {
        id: "1".to_string(),
        name: "Morning Stretch".to_string(),
        description: "A complete morning stretching routine for flexibility and mobility".to_string(),
        sets: 3,
        exercises: default_exercises(),
        created_at: now,
        last_used: None,
    }
}
