//! animated-routines - Personal workout tracker
//!
//! Exercises with frame-by-frame image guides, composed into routines
//! and run through a guided timer with audio cues.

pub mod config;
pub mod db;
pub mod exercises;
pub mod session;
pub mod sounds;
pub mod stats;
pub mod tui;

pub use db::Database;
pub use session::Session;
