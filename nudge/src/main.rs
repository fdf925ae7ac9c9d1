//! nudge - CLI for the adaptive suggestion learning engine
//!
//! This tool provides commands for:
//! - Recording and trimming suggestion feedback
//! - Printing the behavioral signals learned from that feedback
//! - Recording calendar import outcomes and applying learned title preferences
//! - Assembling the prompt context for a request
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/nudge/data.db (~/.local/share/nudge/data.db)
//! - Config: $XDG_CONFIG_HOME/nudge/config.toml (~/.config/nudge/config.toml)
//! - Logs: $XDG_STATE_HOME/nudge/ (~/.local/state/nudge/)

use anyhow::{bail, Context, Result};
use chrono::{Local, Timelike, Weekday};
use clap::{Parser, Subcommand, ValueEnum};
use nudge_core::format::format_hour;
use nudge_core::signals::MIN_TOTAL_EVENTS;
use nudge_core::{
    extract, normalize_title, AIContext, BehavioralSignals, CalendarCandidate,
    CompletionPatterns, Config, Database, FeedbackAction, FeedbackEvent, FeedbackLog, RecentTask,
    TaskCategory, TimeContext, TitlePreferenceStore, UserPatterns,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Inspect and drive the adaptive suggestion learning engine")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record and inspect suggestion feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommand,
    },

    /// Show behavioral signals learned from stored feedback
    Signals {
        /// JSON file of completion counts keyed by "<category>_<hour>"
        #[arg(long)]
        patterns: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Learn from calendar event imports
    Titles {
        #[command(subcommand)]
        command: TitlesCommand,
    },

    /// Assemble the prompt context for a request
    Context(ContextArgs),

    /// Show file locations and what has been learned so far
    Status,
}

#[derive(Subcommand)]
enum FeedbackCommand {
    /// Record one reaction to a suggestion
    Add {
        /// Action code (e.g. started_immediately, snoozed_1_hour)
        action: FeedbackAction,

        /// Category code of the suggested task (e.g. work, health)
        category: TaskCategory,

        /// Hour of day (0-23, default: current local hour)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: Option<u32>,
    },

    /// List stored feedback, oldest first
    List {
        /// Show only the most recent N events
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Drop all but the most recent events
    Trim {
        /// Events to keep (default: from config)
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Subcommand)]
enum TitlesCommand {
    /// Record the outcome of a confirmed import
    Record {
        /// Title of an event that was imported (repeatable)
        #[arg(long)]
        selected: Vec<String>,

        /// Title of an event that was left out (repeatable)
        #[arg(long)]
        skipped: Vec<String>,

        /// Mark a title as an all-day event (repeatable)
        #[arg(long = "all-day")]
        all_day: Vec<String>,
    },

    /// Show the default selection learned for candidate events
    Apply {
        /// Candidate event titles
        #[arg(required = true)]
        titles: Vec<String>,

        /// Mark a title as an all-day event (repeatable)
        #[arg(long = "all-day")]
        all_day: Vec<String>,
    },

    /// Show learned preferences
    Show {
        /// Only this title
        title: Option<String>,
    },

    /// Evict stale records and preferences
    Cleanup,

    /// Forget everything learned about calendar events
    Clear,
}

#[derive(clap::Args)]
struct ContextArgs {
    /// Title of the task being worked on
    #[arg(long)]
    title: Option<String>,

    /// Summary of past corrections
    #[arg(long)]
    corrections: Option<String>,

    /// Custom category name (repeatable)
    #[arg(long = "custom-category")]
    custom_categories: Vec<String>,

    /// Recent task as "<category>:<title>", most recent first (repeatable)
    #[arg(long = "recent", value_parser = parse_recent_task)]
    recent: Vec<RecentTask>,

    /// Category usage as "<category>=<count>" (repeatable)
    #[arg(long = "usage", value_parser = parse_usage)]
    usage: Vec<(TaskCategory, u32)>,

    /// Preferred hour for a keyword as "<keyword>=<hour>" (repeatable)
    #[arg(long = "keyword-hour", value_parser = parse_keyword_hour)]
    keyword_hours: Vec<(String, u32)>,

    /// JSON file of completion counts keyed by "<category>_<hour>"
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Hour of day (default: current local hour)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    hour: Option<u32>,

    /// Day of week (default: today)
    #[arg(long)]
    weekday: Option<Weekday>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        nudge_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db = open_database()?;

    match args.command {
        Command::Feedback { command } => match command {
            FeedbackCommand::Add {
                action,
                category,
                hour,
            } => cmd_feedback_add(&db, &config, action, category, hour),
            FeedbackCommand::List { limit } => cmd_feedback_list(&db, limit),
            FeedbackCommand::Trim { keep } => {
                cmd_feedback_trim(&db, keep.unwrap_or(config.learning.feedback_log_limit))
            }
        },
        Command::Signals { patterns, format } => {
            cmd_signals(&db, &config, patterns.as_deref(), format)
        }
        Command::Titles { command } => {
            let store = TitlePreferenceStore::open(Arc::new(db), &config.learning);
            match command {
                TitlesCommand::Record {
                    selected,
                    skipped,
                    all_day,
                } => cmd_titles_record(&store, selected, skipped, &all_day),
                TitlesCommand::Apply { titles, all_day } => {
                    cmd_titles_apply(&store, titles, &all_day)
                }
                TitlesCommand::Show { title } => cmd_titles_show(&store, title.as_deref()),
                TitlesCommand::Cleanup => cmd_titles_cleanup(&store),
                TitlesCommand::Clear => cmd_titles_clear(&store),
            }
        }
        Command::Context(args) => cmd_context(&db, &config, args),
        Command::Status => cmd_status(db, &config),
    }
}

fn open_database() -> Result<Database> {
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

fn load_patterns(path: Option<&Path>) -> Result<CompletionPatterns> {
    let Some(path) = path else {
        return Ok(CompletionPatterns::new());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read patterns file {}", path.display()))?;
    let raw: HashMap<String, i64> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse patterns file {}", path.display()))?;

    Ok(CompletionPatterns::from(&raw))
}

fn load_feedback_log(db: &Database, config: &Config) -> Result<FeedbackLog> {
    let events = db
        .list_feedback_events(Some(config.learning.feedback_log_limit))
        .context("failed to read feedback")?;
    Ok(FeedbackLog::from_events(events))
}

fn load_signals(db: &Database, config: &Config, patterns: Option<&Path>) -> Result<BehavioralSignals> {
    let log = load_feedback_log(db, config)?;
    let patterns = load_patterns(patterns)?;
    Ok(extract(log.events(), &patterns))
}

// ============================================
// Feedback
// ============================================

fn cmd_feedback_add(
    db: &Database,
    config: &Config,
    action: FeedbackAction,
    category: TaskCategory,
    hour: Option<u32>,
) -> Result<()> {
    let hour = hour.unwrap_or_else(|| Local::now().hour());
    let event = FeedbackEvent::new(action, category, hour);

    db.insert_feedback_event(&event)
        .context("failed to record feedback")?;
    db.trim_feedback_events(config.learning.feedback_log_limit)
        .context("failed to trim feedback")?;

    let stored = db.count_feedback_events()?;
    println!(
        "Recorded {} for {} at {} ({} events stored)",
        action.as_str(),
        category.as_str(),
        format_hour(hour),
        stored
    );
    Ok(())
}

fn cmd_feedback_list(db: &Database, limit: Option<usize>) -> Result<()> {
    let events = db.list_feedback_events(limit)?;

    if events.is_empty() {
        println!("No feedback recorded.");
        return Ok(());
    }

    for event in &events {
        println!(
            "{}  {:<22} {:<10} {:>5}",
            event.recorded_at.format("%Y-%m-%d %H:%M"),
            event.action.as_str(),
            event.task_category.as_str(),
            format_hour(event.hour_of_day)
        );
    }
    Ok(())
}

fn cmd_feedback_trim(db: &Database, keep: usize) -> Result<()> {
    let deleted = db.trim_feedback_events(keep)?;
    println!("Removed {} event(s), kept at most {}", deleted, keep);
    Ok(())
}

// ============================================
// Signals
// ============================================

#[derive(Serialize)]
struct SignalsReport<'a> {
    is_cold_start: bool,
    #[serde(flatten)]
    signals: &'a BehavioralSignals,
}

fn cmd_signals(
    db: &Database,
    config: &Config,
    patterns: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let signals = load_signals(db, config, patterns)?;

    match format {
        OutputFormat::Json => {
            let report = SignalsReport {
                is_cold_start: signals.is_cold_start(),
                signals: &signals,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if signals.is_cold_start() {
                println!(
                    "Not enough feedback yet ({} of {} events).",
                    signals.total_events, MIN_TOTAL_EVENTS
                );
                return Ok(());
            }

            let block = signals.to_prompt_string();
            if block.is_empty() {
                println!("No signals passed their thresholds ({} events).", signals.total_events);
            } else {
                println!("{}", block);
            }
        }
    }
    Ok(())
}

// ============================================
// Calendar titles
// ============================================

type Store = TitlePreferenceStore<Arc<Database>>;

fn candidates(titles: Vec<(String, bool)>, all_day: &[String]) -> Vec<CalendarCandidate> {
    let all_day: HashSet<String> = all_day.iter().map(|t| normalize_title(t)).collect();
    titles
        .into_iter()
        .map(|(title, selected)| {
            let is_all_day = all_day.contains(&normalize_title(&title));
            CalendarCandidate::new(title, is_all_day, selected)
        })
        .collect()
}

fn cmd_titles_record(
    store: &Store,
    selected: Vec<String>,
    skipped: Vec<String>,
    all_day: &[String],
) -> Result<()> {
    if selected.is_empty() && skipped.is_empty() {
        bail!("nothing to record: pass --selected and/or --skipped");
    }

    let batch = candidates(
        selected
            .into_iter()
            .map(|t| (t, true))
            .chain(skipped.into_iter().map(|t| (t, false)))
            .collect(),
        all_day,
    );
    let recorded = store.record_selections(&batch);

    println!("Recorded {} calendar selection(s)", recorded);
    Ok(())
}

fn cmd_titles_apply(store: &Store, titles: Vec<String>, all_day: &[String]) -> Result<()> {
    let mut batch = candidates(titles.into_iter().map(|t| (t, true)).collect(), all_day);
    let changed = store.apply_learned_preferences(&mut batch);

    for candidate in &batch {
        let mark = if candidate.selected { "x" } else { " " };
        let suffix = if candidate.is_all_day { " (all day)" } else { "" };
        println!("[{}] {}{}", mark, candidate.title, suffix);
    }
    println!();
    println!("{} candidate(s) adjusted by learned preferences", changed);
    Ok(())
}

fn cmd_titles_show(store: &Store, title: Option<&str>) -> Result<()> {
    let prefs = match title {
        Some(title) => match store.preference(title) {
            Some(pref) => vec![(normalize_title(title), pref)],
            None => {
                println!("No history for \"{}\"", normalize_title(title));
                return Ok(());
            }
        },
        None => store.preferences(),
    };

    let stats = store.stats();
    println!("Calendar Title Preferences");
    println!("==========================");
    println!("Tracked titles:      {}", stats.tracked_titles);
    println!("Selection records:   {}", stats.selection_records);
    println!("Frequently selected: {}", stats.frequently_selected);
    println!("Frequently skipped:  {}", stats.frequently_skipped);

    if prefs.is_empty() {
        return Ok(());
    }

    println!();
    for (title, pref) in &prefs {
        let verdict = if pref.is_frequently_selected() {
            "usually imported"
        } else if pref.is_frequently_skipped() {
            "usually skipped"
        } else if pref.has_enough_data() {
            "mixed"
        } else {
            "learning"
        };
        println!(
            "{:<32} selected {:>3}  skipped {:>3}  last {}  {}",
            title,
            pref.selected_count,
            pref.skipped_count,
            pref.last_interaction.format("%Y-%m-%d"),
            verdict
        );
    }
    Ok(())
}

fn cmd_titles_cleanup(store: &Store) -> Result<()> {
    let report = store.cleanup_stale(chrono::Utc::now());
    println!(
        "Removed {} record(s) and {} title preference(s)",
        report.records_removed, report.preferences_removed
    );
    Ok(())
}

fn cmd_titles_clear(store: &Store) -> Result<()> {
    store.clear_all_learning_data();
    println!("Cleared calendar learning data");
    Ok(())
}

// ============================================
// Context
// ============================================

fn cmd_context(db: &Database, config: &Config, args: ContextArgs) -> Result<()> {
    let signals = load_signals(db, config, args.patterns.as_deref())?;

    let now = TimeContext::now();
    let time = TimeContext::new(
        args.hour.unwrap_or(now.hour),
        args.weekday.unwrap_or(now.weekday),
    );

    let patterns = UserPatterns {
        category_usage: args.usage.into_iter().collect(),
        keyword_hours: args
            .keyword_hours
            .into_iter()
            .map(|(keyword, hour)| (keyword.to_lowercase(), hour))
            .collect(),
    };

    let mut context = AIContext::new(time)
        .with_patterns(patterns)
        .with_recent_tasks(args.recent)
        .with_recent_task_limit(config.learning.recent_task_limit)
        .with_custom_categories(args.custom_categories)
        .with_signals(signals);
    if let Some(title) = args.title {
        context = context.with_task_title(title);
    }
    if let Some(corrections) = args.corrections {
        context = context.with_corrections(corrections);
    }

    println!("{}", context.to_prompt_string());
    Ok(())
}

// ============================================
// Status
// ============================================

fn cmd_status(db: Database, config: &Config) -> Result<()> {
    let log = load_feedback_log(&db, config)?;
    let stored = db.count_feedback_events()?;
    let store = TitlePreferenceStore::open(Arc::new(db), &config.learning);
    let stats = store.stats();

    println!("nudge Status");
    println!("============");
    println!();
    println!("Config:   {}", Config::config_path().display());
    println!("Database: {}", Config::database_path().display());
    println!("Log file: {}", nudge_core::logging::log_file_path().display());
    println!();
    println!(
        "Feedback events:     {} stored, {} used for signals (limit {})",
        stored,
        log.len(),
        config.learning.feedback_log_limit
    );
    println!("Tracked titles:      {}", stats.tracked_titles);
    println!(
        "Selection records:   {} (limit {}, expire after {} days)",
        stats.selection_records,
        config.learning.max_selection_records,
        config.learning.selection_expiry_days
    );
    Ok(())
}

// ============================================
// Argument parsers
// ============================================

fn parse_recent_task(s: &str) -> Result<RecentTask, String> {
    let (category, title) = s
        .split_once(':')
        .ok_or_else(|| format!("expected <category>:<title>, got '{}'", s))?;
    let category: TaskCategory = category.trim().parse()?;
    Ok(RecentTask::new(title.trim(), category, None))
}

fn parse_usage(s: &str) -> Result<(TaskCategory, u32), String> {
    let (category, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <category>=<count>, got '{}'", s))?;
    let category: TaskCategory = category.trim().parse()?;
    let count = count
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid count '{}': {}", count, e))?;
    Ok((category, count))
}

fn parse_keyword_hour(s: &str) -> Result<(String, u32), String> {
    let (keyword, hour) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <keyword>=<hour>, got '{}'", s))?;
    let hour = hour
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid hour '{}': {}", hour, e))?;
    if hour > 23 {
        return Err(format!("hour must be 0-23, got {}", hour));
    }
    Ok((keyword.trim().to_string(), hour))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recent_task() {
        let task = parse_recent_task("health: Morning run").unwrap();
        assert_eq!(task.category, TaskCategory::Health);
        assert_eq!(task.title, "Morning run");
        assert!(parse_recent_task("no separator").is_err());
        assert!(parse_recent_task("chores:Dishes").is_err());
    }

    #[test]
    fn test_parse_usage_and_keyword_hour() {
        assert_eq!(parse_usage("work=7").unwrap(), (TaskCategory::Work, 7));
        assert!(parse_usage("work=many").is_err());
        assert_eq!(parse_keyword_hour("gym=6").unwrap(), ("gym".to_string(), 6));
        assert!(parse_keyword_hour("gym=24").is_err());
    }

    #[test]
    fn test_candidates_mark_all_day_by_normalized_title() {
        let batch = candidates(
            vec![("Holiday".to_string(), true), ("Standup".to_string(), false)],
            &[" holiday ".to_string()],
        );
        assert!(batch[0].is_all_day);
        assert!(!batch[1].is_all_day);
        assert!(!batch[1].selected);
    }
}
