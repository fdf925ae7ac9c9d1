//! # nudge-core
//!
//! Core library for nudge - the adaptive learning engine behind task
//! suggestions.
//!
//! This library provides:
//! - Domain types for feedback, categories, and calendar selections
//! - Signal extraction from feedback history and completion patterns
//! - A decaying preference store for calendar event titles
//! - Prompt context assembly
//! - Database storage layer with SQLite
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way:
//! - **Record:** feedback events and calendar selections are appended
//! - **Extract:** [`signals::extract`] derives gated findings on demand
//! - **Assemble:** [`context::AIContext`] renders a bounded text block
//!
//! ## Example
//!
//! ```rust,no_run
//! use nudge_core::{CompletionPatterns, Config, Database, extract};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let events = db
//!     .list_feedback_events(Some(config.learning.feedback_log_limit))
//!     .expect("failed to read feedback");
//! let signals = extract(&events, &CompletionPatterns::new());
//! println!("{}", signals.to_prompt_string());
//! ```

// Re-export commonly used items at the crate root
pub use completion::CompletionPatterns;
pub use config::Config;
pub use context::{AIContext, RecentTask, TimeContext, UserPatterns};
pub use db::Database;
pub use error::{Error, Result};
pub use feedback::FeedbackLog;
pub use preferences::{CalendarCandidate, LearningStorage, TitlePreferenceStore};
pub use signals::{extract, BehavioralSignals};
pub use types::*;

// Public modules
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod feedback;
pub mod format;
pub mod logging;
pub mod preferences;
pub mod signals;
pub mod types;
