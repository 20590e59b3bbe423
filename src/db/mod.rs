//! Database module - SQLite storage for exercises, routines and workout logs

use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::exercises::{Exercise, Routine, default_exercises, default_routine, format_duration, generate_id};
use crate::session::CompletedWorkout;

/// Finished workout record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub id: String,
    pub routine_id: String,
    pub routine_name: String,
    pub date: DateTime<Utc>,
    pub duration: String, // Human readable, e.g. "25 min"
    pub sets: u32,
    pub exercises: Vec<String>,
    pub completed: bool,
}

impl WorkoutLog {
    pub fn from_completion(done: &CompletedWorkout, date: DateTime<Utc>) -> Self {
        let minutes = (done.elapsed_secs + 30) / 60;
        Self {
            id: generate_id(),
            routine_id: done.routine_id.clone(),
            routine_name: done.routine_name.clone(),
            date,
            duration: format_duration(minutes),
            sets: done.sets,
            exercises: done.exercises.clone(),
            completed: true,
        }
    }
}

/// What the session needs from persistent storage
pub trait RoutineStore {
    fn get_routine_by_id(&self, id: &str) -> Result<Option<Routine>>;
    fn mark_routine_used(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self { conn };
        db.init_schema()?;
        db.seed_defaults()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                images TEXT NOT NULL,
                duration INTEGER NOT NULL,
                rest_time INTEGER NOT NULL,
                animation_speed INTEGER
            );
            CREATE TABLE IF NOT EXISTS routines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                sets INTEGER NOT NULL,
                exercises TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used TEXT
            );
            CREATE TABLE IF NOT EXISTS workout_logs (
                id TEXT PRIMARY KEY,
                routine_id TEXT NOT NULL,
                routine_name TEXT NOT NULL,
                date TEXT NOT NULL,
                duration TEXT NOT NULL,
                sets INTEGER NOT NULL,
                exercises TEXT NOT NULL,
                completed INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Fill an empty library with the built-in exercises and routine
    fn seed_defaults(&self) -> Result<()> {
        let exercises: i64 = self.conn.query_row("SELECT COUNT(*) FROM exercises", [], |r| r.get(0))?;
        let routines: i64 = self.conn.query_row("SELECT COUNT(*) FROM routines", [], |r| r.get(0))?;
        if exercises > 0 || routines > 0 {
            return Ok(());
        }

        for exercise in default_exercises() {
            self.save_exercise(&exercise)?;
        }
        self.save_routine(&default_routine())?;
        info!("Seeded default exercise library");
        Ok(())
    }

    // === Exercises ===

    pub fn get_exercises(&self) -> Result<Vec<Exercise>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, images, duration, rest_time, animation_speed FROM exercises ORDER BY rowid",
        )?;
        let exercises = stmt
            .query_map([], exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn get_exercise_by_id(&self, id: &str) -> Result<Option<Exercise>> {
        let exercise = self
            .conn
            .query_row(
                "SELECT id, name, description, images, duration, rest_time, animation_speed FROM exercises WHERE id = ?1",
                params![id],
                exercise_from_row,
            )
            .optional()?;
        Ok(exercise)
    }

    /// Create or update an exercise
    pub fn save_exercise(&self, exercise: &Exercise) -> Result<()> {
        ensure!(!exercise.name.trim().is_empty(), "exercise name must not be empty");
        ensure!(exercise.duration > 0, "exercise duration must be positive");

        self.conn.execute(
            "INSERT INTO exercises (id, name, description, images, duration, rest_time, animation_speed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                images = excluded.images,
                duration = excluded.duration,
                rest_time = excluded.rest_time,
                animation_speed = excluded.animation_speed",
            params![
                exercise.id,
                exercise.name,
                exercise.description,
                serde_json::to_string(&exercise.images)?,
                exercise.duration,
                exercise.rest_time,
                exercise.animation_speed.map(|s| s as i64),
            ],
        )?;
        Ok(())
    }

    pub fn delete_exercise(&self, id: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM exercises WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // === Routines ===

    pub fn get_routines(&self) -> Result<Vec<Routine>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, sets, exercises, created_at, last_used FROM routines ORDER BY rowid",
        )?;
        let routines = stmt
            .query_map([], routine_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(routines)
    }

    /// Create or update a routine
    pub fn save_routine(&self, routine: &Routine) -> Result<()> {
        ensure!(!routine.name.trim().is_empty(), "routine name must not be empty");
        ensure!(routine.sets >= 1, "routine needs at least one set");

        self.conn.execute(
            "INSERT INTO routines (id, name, description, sets, exercises, created_at, last_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                sets = excluded.sets,
                exercises = excluded.exercises,
                last_used = excluded.last_used",
            params![
                routine.id,
                routine.name,
                routine.description,
                routine.sets,
                serde_json::to_string(&routine.exercises)?,
                routine.created_at.to_rfc3339(),
                routine.last_used.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn delete_routine(&self, id: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM routines WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    // === Workout logs ===

    /// Append a finished workout
    pub fn add_workout_log(&self, log: &WorkoutLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO workout_logs (id, routine_id, routine_name, date, duration, sets, exercises, completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.id,
                log.routine_id,
                log.routine_name,
                log.date.to_rfc3339(),
                log.duration,
                log.sets,
                serde_json::to_string(&log.exercises)?,
                log.completed,
            ],
        )?;
        info!("Workout logged: {} ({})", log.routine_name, log.duration);
        Ok(())
    }

    /// All logs, newest first
    pub fn get_workout_logs(&self) -> Result<Vec<WorkoutLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, routine_id, routine_name, date, duration, sets, exercises, completed FROM workout_logs ORDER BY date DESC",
        )?;

        let logs = stmt
            .query_map([], |row| {
                let date_str: String = row.get(3)?;
                let exercises: String = row.get(6)?;
                Ok(WorkoutLog {
                    id: row.get(0)?,
                    routine_id: row.get(1)?,
                    routine_name: row.get(2)?,
                    date: parse_date(&date_str),
                    duration: row.get(4)?,
                    sets: row.get(5)?,
                    exercises: serde_json::from_str(&exercises).unwrap_or_default(),
                    completed: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }
}

impl RoutineStore for Database {
    fn get_routine_by_id(&self, id: &str) -> Result<Option<Routine>> {
        let routine = self
            .conn
            .query_row(
                "SELECT id, name, description, sets, exercises, created_at, last_used FROM routines WHERE id = ?1",
                params![id],
                routine_from_row,
            )
            .optional()?;
        Ok(routine)
    }

    fn mark_routine_used(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE routines SET last_used = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), id],
        )?;
        Ok(())
    }
}

fn parse_date(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn exercise_from_row(row: &Row<'_>) -> rusqlite::Result<Exercise> {
    let images: String = row.get(3)?;
    let speed: Option<i64> = row.get(6)?;
    Ok(Exercise {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        images: serde_json::from_str(&images).unwrap_or_default(),
        duration: row.get(4)?,
        rest_time: row.get(5)?,
        animation_speed: speed.map(|s| s.max(0) as u64),
    })
}

fn routine_from_row(row: &Row<'_>) -> rusqlite::Result<Routine> {
    let exercises: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let last_used: Option<String> = row.get(6)?;
    Ok(Routine {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        sets: row.get(3)?,
        exercises: serde_json::from_str(&exercises).unwrap_or_default(),
        created_at: parse_date(&created_at),
        last_used: last_used.as_deref().map(parse_date),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        for r in db.get_routines().unwrap() {
            db.delete_routine(&r.id).unwrap();
        }
        for e in db.get_exercises().unwrap() {
            db.delete_exercise(&e.id).unwrap();
        }
        db
    }

    #[test]
    fn test_seeds_defaults_on_first_open() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_exercises().unwrap().len(), 8);

        let routines = db.get_routines().unwrap();
        assert_eq!(routines.len(), 1);
        assert_eq!(routines[0].name, "Morning Stretch");
        assert_eq!(routines[0].exercises.len(), 8);
    }

    #[test]
    fn test_exercise_upsert_and_delete() {
        let db = empty_db();
        let mut ex = Exercise::new("burpees", 40, 20);
        ex.images = vec!["a.png".into(), "b.png".into()];
        ex.animation_speed = Some(900);
        db.save_exercise(&ex).unwrap();

        ex.duration = 50;
        db.save_exercise(&ex).unwrap();

        let all = db.get_exercises().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], ex);
        assert_eq!(db.get_exercise_by_id(&ex.id).unwrap().unwrap().duration, 50);

        assert!(db.delete_exercise(&ex.id).unwrap());
        assert!(!db.delete_exercise(&ex.id).unwrap());
        assert!(db.get_exercise_by_id(&ex.id).unwrap().is_none());
    }

    #[test]
    fn test_rejects_invalid_records() {
        let db = empty_db();
        assert!(db.save_exercise(&Exercise::new("zero", 0, 10)).is_err());
        assert!(db.save_exercise(&Exercise::new("  ", 30, 10)).is_err());
        assert!(db.save_routine(&Routine::new("none", "", 0)).is_err());
    }

    #[test]
    fn test_routine_roundtrip_and_mark_used() {
        let db = empty_db();
        let mut routine = Routine::new("core", "abs day", 2);
        routine.add_exercise(&Exercise::new("plank", 60, 15));
        db.save_routine(&routine).unwrap();

        let loaded = db.get_routine_by_id(&routine.id).unwrap().unwrap();
        assert_eq!(loaded.exercises, routine.exercises);
        assert!(loaded.last_used.is_none());

        let now = Utc::now();
        db.mark_routine_used(&routine.id, now).unwrap();
        let loaded = db.get_routine_by_id(&routine.id).unwrap().unwrap();
        assert_eq!(loaded.last_used.unwrap().timestamp(), now.timestamp());

        assert!(db.get_routine_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_routine_update_keeps_created_at() {
        let db = empty_db();
        let mut routine = Routine::new("core", "", 2);
        routine.add_exercise(&Exercise::new("plank", 60, 15));
        db.save_routine(&routine).unwrap();
        let created = db.get_routine_by_id(&routine.id).unwrap().unwrap().created_at;

        routine.name = "core+".into();
        routine.sets = 4;
        routine.created_at = created + chrono::Duration::days(3);
        db.save_routine(&routine).unwrap();

        let all = db.get_routines().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "core+");
        assert_eq!(all[0].sets, 4);
        assert_eq!(all[0].created_at, created);
    }

    #[test]
    fn test_workout_logs_newest_first() {
        let db = empty_db();
        let older = WorkoutLog {
            id: generate_id(),
            routine_id: "1".into(),
            routine_name: "Morning Stretch".into(),
            date: Utc::now() - chrono::Duration::days(2),
            duration: "20 min".into(),
            sets: 3,
            exercises: vec!["Calf Stretch".into()],
            completed: true,
        };
        let newer = WorkoutLog {
            id: generate_id(),
            date: Utc::now(),
            ..older.clone()
        };
        db.add_workout_log(&older).unwrap();
        db.add_workout_log(&newer).unwrap();

        let logs = db.get_workout_logs().unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, newer.id);
        assert_eq!(logs[1].exercises, vec!["Calf Stretch".to_string()]);
    }

    #[test]
    fn test_log_from_completion() {
        let done = CompletedWorkout {
            routine_id: "r1".into(),
            routine_name: "Legs".into(),
            sets: 2,
            exercises: vec!["squats".into(), "lunges".into()],
            elapsed_secs: 25 * 60 + 10,
        };
        let log = WorkoutLog::from_completion(&done, Utc::now());
        assert_eq!(log.duration, "25 min");
        assert_eq!(log.sets, 2);
        assert!(log.completed);
        assert_eq!(log.exercises.len(), 2);
    }
}
