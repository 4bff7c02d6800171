mod backend;
mod clock;
mod config;
mod engine;
mod models;
mod notify;
mod recorder;
mod reminders;
mod report;
mod stats;
mod storage;
mod tui;
mod utils;

use anyhow::Result;
use backend::FileBackend;
use clap::{Parser, Subcommand};
use clock::SystemClock;
use config::{parse_duration_secs, Config, TimerSettings};
use engine::{TimerEngine, TimerEvent};
use fd_lock::RwLock;
use notify::TerminalNotifier;
use report::Reporter;
use std::fs::OpenOptions;
use storage::{LocalStore, COMPLETED_CYCLES_KEY, STUDY_CYCLES_KEY};
use utils::{format_clock, format_duration};

#[derive(Parser)]
#[command(name = "prepclock")]
#[command(about = "A study timer that records focus sessions for exam preparation", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the study timer
    Start {
        /// Study interval length (e.g. 25m, 1h)
        #[arg(long)]
        study: Option<String>,
        /// Break interval length (e.g. 5m)
        #[arg(long = "break")]
        break_len: Option<String>,
        /// Reminder interval during study (e.g. 20m, 0 to disable)
        #[arg(long)]
        reminder: Option<String>,
        /// Do not start breaks automatically
        #[arg(long)]
        no_auto_break: bool,
    },
    /// Show the saved timer state
    Status,
    /// Reset the timer, recording any elapsed study time
    Reset {
        /// Also clear the completed cycle count
        #[arg(long)]
        cycles: bool,
    },
    /// Generate a report of study time
    Report,
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // The timer view owns the terminal, so logs go to a file.
    let log_path = storage::get_base_dir()?.join("prepclock.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}

fn build_engine(
    config: &Config,
    settings: TimerSettings,
) -> Result<TimerEngine<FileBackend, SystemClock>> {
    let notifier = TerminalNotifier {
        notifications_enabled: config.notifications_enabled,
        sound_enabled: config.sound_enabled,
    };
    Ok(TimerEngine::new(
        settings,
        FileBackend::new()?,
        LocalStore::new()?,
        SystemClock,
        Box::new(notifier),
    ))
}

fn print_events(events: &[TimerEvent]) {
    for event in events {
        match event {
            TimerEvent::Completed { finished, next } => {
                println!("{} interval completed while away, now: {}", finished, next)
            }
            TimerEvent::SessionSaved(record) => println!(
                "Recorded study session of {}",
                format_duration(record.duration_seconds as i64)
            ),
            TimerEvent::SaveFailed(message) => eprintln!("{}", message),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let config = config::load_config()?;

    match cli.command {
        Commands::Start {
            study,
            break_len,
            reminder,
            no_auto_break,
        } => {
            let base_dir = storage::get_base_dir()?;
            let lock_path = base_dir.join("prepclock.lock");
            let lock_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(lock_path)?;

            let mut lock = RwLock::new(lock_file);
            let _guard = lock.try_write().map_err(|_| {
                anyhow::anyhow!("Another prepclock timer is already open. Please close it before starting a new one.")
            })?;

            let mut settings = TimerSettings::from_config(&config);
            if let Some(study) = study {
                settings.study_seconds = parse_duration_secs(&study)?;
            }
            if let Some(break_len) = break_len {
                settings.break_seconds = parse_duration_secs(&break_len)?;
            }
            if let Some(reminder) = reminder {
                settings.reminder_interval_mins = if reminder.trim() == "0" {
                    None
                } else {
                    Some((parse_duration_secs(&reminder)? / 60).max(1))
                };
            }
            if no_auto_break {
                settings.auto_start_breaks = false;
            }

            let mut engine = build_engine(&config, settings)?;
            let restored = engine.restore();
            tui::run_tui(&mut engine, restored)?;

            let today = engine.today_sessions();
            let total: u64 = today.iter().map(|s| s.duration_seconds).sum();
            println!(
                "\nStudied {} today across {} session(s).",
                format_duration(total as i64),
                today.len()
            );
        }
        Commands::Status => {
            let mut engine = build_engine(&config, TimerSettings::from_config(&config))?;
            let events = engine.restore();
            print_events(&events);

            let state = engine.state();
            let status = if state.is_running {
                "running"
            } else if state.elapsed_seconds() > 0 {
                "paused"
            } else {
                "ready"
            };
            println!(
                "{} {} ({})",
                state.mode,
                format_clock(state.remaining_seconds),
                status
            );
            if state.session_saved {
                println!("Current session already recorded.");
            }
            if !state.pending_saves.is_empty() {
                println!(
                    "{} study session(s) waiting to be recorded.",
                    state.pending_saves.len()
                );
            }
            println!("Completed cycles: {}", engine.cycles_completed());
            engine.shutdown();
        }
        Commands::Reset { cycles } => {
            let mut engine = build_engine(&config, TimerSettings::from_config(&config))?;
            let mut events = engine.restore();
            events.extend(engine.reset());
            print_events(&events);

            if cycles {
                let store = LocalStore::new()?;
                store.remove(COMPLETED_CYCLES_KEY)?;
                store.remove(STUDY_CYCLES_KEY)?;
                println!("Cycle count cleared.");
            }
            println!("Timer reset.");
        }
        Commands::Report => {
            let reporter = Reporter::new(FileBackend::new()?, LocalStore::new()?);
            reporter.report()?;
        }
    }

    Ok(())
}
