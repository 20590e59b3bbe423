//! Dashboard statistics over routines and workout logs

use chrono::{DateTime, Duration, Utc};
use clap::ValueEnum;

use crate::db::WorkoutLog;
use crate::exercises::{Routine, format_duration, parse_duration_minutes};

/// Headline numbers for the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub total_routines: usize,
    pub exercises_in_routines: usize,
    pub total_workouts: usize,
    pub workouts_completed: usize,
    pub completed_this_week: usize,
    /// Sum of logged workout durations
    pub total_minutes: u64,
}

/// Which workout logs to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFilter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl LogFilter {
    pub fn matches(&self, log: &WorkoutLog) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Completed => log.completed,
            LogFilter::Incomplete => !log.completed,
        }
    }

    /// Next filter in the all / completed / incomplete cycle
    pub fn next(self) -> Self {
        match self {
            LogFilter::All => LogFilter::Completed,
            LogFilter::Completed => LogFilter::Incomplete,
            LogFilter::Incomplete => LogFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogFilter::All => "All",
            LogFilter::Completed => "Completed",
            LogFilter::Incomplete => "Incomplete",
        }
    }
}

/// Training analytics
pub struct Analytics<'a> {
    routines: &'a [Routine],
    logs: &'a [WorkoutLog],
}

impl<'a> Analytics<'a> {
    pub fn new(routines: &'a [Routine], logs: &'a [WorkoutLog]) -> Self {
        Self { routines, logs }
    }

    pub fn dashboard(&self, now: DateTime<Utc>) -> Dashboard {
        let week_ago = now - Duration::days(7);
        Dashboard {
            total_routines: self.routines.len(),
            exercises_in_routines: self.routines.iter().map(|r| r.exercises.len()).sum(),
            total_workouts: self.logs.len(),
            workouts_completed: self.logs.iter().filter(|l| l.completed).count(),
            completed_this_week: self
                .logs
                .iter()
                .filter(|l| l.completed && l.date >= week_ago)
                .count(),
            total_minutes: self.logs.iter().map(|l| parse_duration_minutes(&l.duration)).sum(),
        }
    }

    pub fn filtered_logs(&self, filter: LogFilter) -> Vec<&'a WorkoutLog> {
        self.logs.iter().filter(|l| filter.matches(l)).collect()
    }

    /// Routines ordered by most recent use (creation time if never used)
    pub fn recent_routines(&self, limit: usize) -> Vec<&'a Routine> {
        let mut sorted: Vec<&Routine> = self.routines.iter().collect();
        sorted.sort_by_key(|r| std::cmp::Reverse(r.last_used.unwrap_or(r.created_at)));
        sorted.truncate(limit);
        sorted
    }
}

/// Estimated length of a routine, e.g. "16 min"
pub fn estimated_duration(routine: &Routine) -> String {
    let minutes = (routine.total_seconds() + 30) / 60;
    format_duration(minutes)
}

/// Human text for when a routine was last run
pub fn last_used_text(last_used: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(last) = last_used else {
        return "Never used".to_string();
    };
    let days = (now - last).num_days().abs();
    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{} days ago", days),
        7..=29 => format!("{} weeks ago", days / 7),
        _ => format!("{} months ago", days / 30),
    }
}
