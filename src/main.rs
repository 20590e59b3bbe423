//! animated-routines - Personal workout tracker
//!
//! Build discipline frame by frame.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::Level;

use animated_routines::config::AppConfig;
use animated_routines::db::{Database, RoutineStore};
use animated_routines::exercises::{Exercise, Routine, format_duration};
use animated_routines::session::Session;
use animated_routines::sounds::{AudioCuePlayer, Bell};
use animated_routines::stats::{Analytics, LogFilter, estimated_duration, last_used_text};
use animated_routines::tui::App;

#[derive(Parser)]
#[command(name = "animated-routines")]
#[command(author, version, about = "Personal workout tracker with animated exercise guides")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "ANIMATED_ROUTINES_DB", default_value = "animated-routines.db")]
    db: String,

    /// Directory with start.mp3, half.mp3 and done.mp3
    #[arg(long, global = true, env = "ANIMATED_ROUTINES_SOUNDS", default_value = "audios")]
    sounds: PathBuf,

    /// Cue volume, 0-100
    #[arg(long, global = true, default_value = "70")]
    volume: u8,

    /// Show a 3-2-1-GO countdown between exercises
    #[arg(long, global = true)]
    countdown: bool,

    /// Log file (the terminal belongs to the TUI)
    #[arg(long, global = true, env = "ANIMATED_ROUTINES_LOG", default_value = "animated-routines.log")]
    log_file: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI
    Tui,

    /// Run a routine by id
    Run {
        routine: String,
    },

    /// List routines
    Routines,

    /// List the exercise library
    Exercises,

    /// Add an exercise to the library
    AddExercise {
        name: String,

        /// Work time in seconds
        #[arg(short, long, default_value = "30")]
        duration: u32,

        /// Rest after it in seconds
        #[arg(short, long, default_value = "10")]
        rest: u32,

        /// Image frames, in order (repeat the flag)
        #[arg(short, long = "image")]
        images: Vec<String>,

        /// Frame interval in ms (100-2000)
        #[arg(short, long)]
        speed: Option<u64>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Change an exercise in the library (routines keep their copy)
    EditExercise {
        id: String,

        #[arg(long)]
        name: Option<String>,

        /// Work time in seconds
        #[arg(short, long)]
        duration: Option<u32>,

        /// Rest after it in seconds
        #[arg(short, long)]
        rest: Option<u32>,

        /// Replace the image frames (repeat the flag)
        #[arg(short, long = "image")]
        images: Vec<String>,

        /// Frame interval in ms (100-2000)
        #[arg(short, long)]
        speed: Option<u64>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Remove an exercise from the library
    DeleteExercise {
        id: String,
    },

    /// Compose a routine from library exercise ids
    CreateRoutine {
        name: String,

        #[arg(short, long, default_value = "1")]
        sets: u32,

        /// Exercise ids, in order (repeat the flag)
        #[arg(short, long = "exercise", required = true)]
        exercises: Vec<String>,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Change a routine
    EditRoutine {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(short, long)]
        sets: Option<u32>,

        /// Replace the exercise list with these library ids (repeat the flag)
        #[arg(short, long = "exercise")]
        exercises: Vec<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Remove a routine
    DeleteRoutine {
        id: String,
    },

    /// Show workout history
    History {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(short, long, value_enum, default_value_t = LogFilter::All)]
        filter: LogFilter,
    },

    /// Show training statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = AppConfig::new(cli.db.clone(), cli.sounds.clone(), cli.volume, cli.countdown);
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Some(Commands::Tui) | None => {
            let bell = Bell::default();
            let mut app = App::new(db, new_session(&config, bell.clone()))?.with_bell(bell);
            app.run()?;
        }

        Some(Commands::Run { routine }) => {
            let bell = Bell::default();
            let mut app = App::new(db, new_session(&config, bell.clone()))?.with_bell(bell);
            if !app.open_routine(&routine) {
                eprintln!("Routine {} not found, showing selection", routine);
            }
            app.run()?;
        }

        Some(Commands::Routines) => {
            let now = Utc::now();
            println!("Routines:");
            println!("{:-<80}", "");
            for r in db.get_routines()? {
                println!(
                    "{:16} | {:24} | {:>2} ex x {} sets | {:>8} | {}",
                    r.id,
                    r.name,
                    r.exercises.len(),
                    r.sets,
                    estimated_duration(&r),
                    last_used_text(r.last_used, now)
                );
            }
        }

        Some(Commands::Exercises) => {
            println!("Exercise library:");
            println!("{:-<80}", "");
            for e in db.get_exercises()? {
                println!(
                    "{:16} | {:24} | {:>3}s work {:>3}s rest | {} frames @ {}ms",
                    e.id,
                    e.name,
                    e.duration,
                    e.rest_time,
                    e.images.len(),
                    e.frame_interval_ms()
                );
            }
        }

        Some(Commands::AddExercise { name, duration, rest, images, speed, description }) => {
            let mut exercise = Exercise::new(name, duration, rest);
            exercise.images = images;
            exercise.animation_speed = speed;
            exercise.description = description;
            db.save_exercise(&exercise)?;
            println!("Added: {} (id: {})", exercise.name, exercise.id);
        }

        Some(Commands::EditExercise { id, name, duration, rest, images, speed, description }) => {
            let mut exercise = db
                .get_exercise_by_id(&id)?
                .with_context(|| format!("No exercise with id {}", id))?;
            if let Some(name) = name {
                exercise.name = name;
            }
            if let Some(duration) = duration {
                exercise.duration = duration;
            }
            if let Some(rest) = rest {
                exercise.rest_time = rest;
            }
            if !images.is_empty() {
                exercise.images = images;
            }
            if speed.is_some() {
                exercise.animation_speed = speed;
            }
            if description.is_some() {
                exercise.description = description;
            }
            db.save_exercise(&exercise)?;
            println!("Updated: {} (id: {})", exercise.name, exercise.id);
        }

        Some(Commands::DeleteExercise { id }) => {
            if !db.delete_exercise(&id)? {
                bail!("No exercise with id {}", id);
            }
            println!("Deleted exercise {}", id);
        }

        Some(Commands::CreateRoutine { name, sets, exercises, description }) => {
            let mut routine = Routine::new(name, description, sets);
            for id in &exercises {
                let exercise = db
                    .get_exercise_by_id(id)?
                    .with_context(|| format!("No exercise with id {}", id))?;
                routine.add_exercise(&exercise);
            }
            db.save_routine(&routine)?;
            println!(
                "Created: {} - {} exercises x {} sets (id: {})",
                routine.name,
                routine.exercises.len(),
                routine.sets,
                routine.id
            );
        }

        Some(Commands::EditRoutine { id, name, sets, exercises, description }) => {
            let mut routine = db
                .get_routine_by_id(&id)?
                .with_context(|| format!("No routine with id {}", id))?;
            if let Some(name) = name {
                routine.name = name;
            }
            if let Some(sets) = sets {
                routine.sets = sets;
            }
            if let Some(description) = description {
                routine.description = description;
            }
            if !exercises.is_empty() {
                routine.exercises.clear();
                for ex_id in &exercises {
                    let exercise = db
                        .get_exercise_by_id(ex_id)?
                        .with_context(|| format!("No exercise with id {}", ex_id))?;
                    routine.add_exercise(&exercise);
                }
            }
            db.save_routine(&routine)?;
            println!(
                "Updated: {} - {} exercises x {} sets (id: {})",
                routine.name,
                routine.exercises.len(),
                routine.sets,
                routine.id
            );
        }

        Some(Commands::DeleteRoutine { id }) => {
            if db.get_routine_by_id(&id)?.is_none() {
                bail!("No routine with id {}", id);
            }
            db.delete_routine(&id)?;
            println!("Deleted routine {}", id);
        }

        Some(Commands::History { limit, filter }) => {
            let logs = db.get_workout_logs()?;
            let analytics = Analytics::new(&[], &logs);
            println!("Recent workouts ({}):", filter.label());
            println!("{:-<80}", "");
            for l in analytics.filtered_logs(filter).into_iter().take(limit) {
                println!(
                    "{} | {:24} | {:>8} | {} sets | {}",
                    l.date.format("%Y-%m-%d %H:%M"),
                    l.routine_name,
                    l.duration,
                    l.sets,
                    if l.completed { "completed" } else { "incomplete" }
                );
            }
        }

        Some(Commands::Stats) => {
            let routines = db.get_routines()?;
            let logs = db.get_workout_logs()?;
            let analytics = Analytics::new(&routines, &logs);
            let stats = analytics.dashboard(Utc::now());

            println!("Training Statistics");
            println!("{:-<40}", "");
            println!("Total routines:      {}", stats.total_routines);
            println!("Exercises created:   {}", stats.exercises_in_routines);
            println!("Workouts logged:     {}", stats.total_workouts);
            println!("Workouts completed:  {}", stats.workouts_completed);
            println!("Total time:          {}", format_duration(stats.total_minutes));
            println!("This week:           {}", stats.completed_this_week);

            let recent = analytics.recent_routines(3);
            if !recent.is_empty() {
                println!("\nRecent routines:");
                for r in recent {
                    println!("  {} ({}, {})", r.name, estimated_duration(r), last_used_text(r.last_used, Utc::now()));
                }
            }
        }
    }

    Ok(())
}

fn new_session(config: &AppConfig, bell: Bell) -> Session {
    let player = AudioCuePlayer::spawn(config.sounds_dir.clone(), config.volume, bell);
    Session::new(config.session.clone(), Box::new(player))
}

fn init_logging(cli: &Cli) -> Result<()> {
    let file = File::create(&cli.log_file)
        .with_context(|| format!("Cannot open log file {}", cli.log_file.display()))?;
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
