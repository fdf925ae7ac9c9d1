//! Integration tests for the nudge learning pipeline
//!
//! These tests drive feedback through the database, signal extraction and
//! context assembly, and check that calendar learning survives a reopen.

use chrono::{Duration, TimeZone, Utc, Weekday};
use nudge_core::config::LearningConfig;
use nudge_core::db::Database;
use nudge_core::signals::{extract, TimePreference};
use nudge_core::types::{FeedbackAction, FeedbackEvent, TaskCategory, TimeBucket};
use nudge_core::{
    AIContext, CalendarCandidate, CompletionPatterns, FeedbackLog, TimeContext,
    TitlePreferenceStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn open_db(dir: &TempDir) -> Database {
    let db = Database::open(&dir.path().join("data.db")).expect("open database");
    db.migrate().expect("migrate");
    db
}

fn scenario_log() -> FeedbackLog {
    let mut log = FeedbackLog::new();
    for _ in 0..8 {
        log.record(FeedbackAction::StartedImmediately, TaskCategory::Work, 9);
    }
    for _ in 0..4 {
        log.record(FeedbackAction::SkippedNotRelevant, TaskCategory::Social, 20);
    }
    log
}

// ============================================
// Feedback -> signals -> context
// ============================================

#[test]
fn test_twelve_event_scenario() {
    let log = scenario_log();
    let signals = extract(log.events(), &CompletionPatterns::new());

    assert_eq!(signals.total_events, 12);
    assert!(!signals.is_cold_start());
    assert_eq!(
        signals.time_preference,
        Some(TimePreference {
            bucket: TimeBucket::Morning,
            support: 8,
            share: 1.0,
        })
    );
    // Work: support 8, score 16. Social: score -8, filtered.
    assert_eq!(signals.category_affinity.len(), 1);
    assert_eq!(signals.category_affinity[0].category, TaskCategory::Work);
    assert!(signals.snooze_hotspot.is_none());
    assert!(signals.skip_reason_hotspots.is_empty());
}

#[test]
fn test_feedback_survives_database_round_trip() {
    let dir = TempDir::new().unwrap();
    let log = scenario_log();

    {
        let db = open_db(&dir);
        for event in log.events() {
            db.insert_feedback_event(event).unwrap();
        }
    }

    let db = open_db(&dir);
    let stored = db.list_feedback_events(None).unwrap();
    assert_eq!(stored, log.events());
    assert_eq!(
        extract(&stored, &CompletionPatterns::new()),
        extract(log.events(), &CompletionPatterns::new())
    );
}

#[test]
fn test_completion_peak_independent_of_feedback() {
    let mut raw: HashMap<String, i64> = HashMap::new();
    raw.insert("work_9".to_string(), 5);
    raw.insert("personal_14".to_string(), 6);
    raw.insert("garbage".to_string(), 50);

    let signals = extract(&[], &CompletionPatterns::from(&raw));

    let peak = signals.completion_peak.as_ref().expect("peak");
    assert_eq!(peak.category, TaskCategory::Personal);
    assert_eq!(peak.bucket, TimeBucket::Afternoon);
    assert_eq!(peak.count, 6);
    assert!(!signals.is_cold_start());
    assert!(signals.to_prompt_string().contains("n=6"));
}

#[test]
fn test_context_from_stored_feedback() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let at = Utc.with_ymd_and_hms(2025, 4, 7, 9, 0, 0).unwrap();
    for _ in 0..10 {
        db.insert_feedback_event(&FeedbackEvent {
            action: FeedbackAction::ViewedDetails,
            task_category: TaskCategory::Learning,
            hour_of_day: 19,
            recorded_at: at,
        })
        .unwrap();
    }

    let signals = extract(&db.list_feedback_events(None).unwrap(), &CompletionPatterns::new());
    let rendered = AIContext::new(TimeContext::new(19, Weekday::Mon))
        .with_corrections("No preferences learned")
        .with_signals(signals)
        .to_prompt_string();

    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "Current time: Monday 7 PM (evening).");
    assert_eq!(lines[1], "Learned behavior from recent suggestion feedback:");
    assert!(rendered.contains("n=10"));
    assert!(!rendered.contains("No preferences learned"));
}

#[test]
fn test_cold_start_context_has_no_signal_block() {
    let mut log = FeedbackLog::new();
    for _ in 0..9 {
        log.record(FeedbackAction::StartedImmediately, TaskCategory::Work, 9);
    }
    let signals = extract(log.events(), &CompletionPatterns::new());
    assert!(signals.is_cold_start());

    let rendered = AIContext::new(TimeContext::new(9, Weekday::Tue))
        .with_signals(signals)
        .to_prompt_string();
    assert_eq!(rendered, "Current time: Tuesday 9 AM (morning).");
}

// ============================================
// Calendar title learning
// ============================================

#[test]
fn test_title_store_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = LearningConfig::default();
    let now = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();

    {
        let store = TitlePreferenceStore::open_at(Arc::new(open_db(&dir)), &config, now);
        for _ in 0..3 {
            store.record_selections_at(
                &[
                    CalendarCandidate::new("Weekly 1:1", false, true),
                    CalendarCandidate::new("Lunch", false, false),
                ],
                now,
            );
        }
    }

    let store = TitlePreferenceStore::open_at(Arc::new(open_db(&dir)), &config, now);
    assert!(store.is_frequently_selected("weekly 1:1"));
    assert!(store.is_frequently_skipped("LUNCH"));

    let mut candidates = vec![
        CalendarCandidate::new("Weekly 1:1", false, false),
        CalendarCandidate::new("Lunch", false, true),
    ];
    assert_eq!(store.apply_learned_preferences(&mut candidates), 2);
    assert!(candidates[0].selected);
    assert!(!candidates[1].selected);
}

#[test]
fn test_stale_learning_evicted_on_reopen() {
    let dir = TempDir::new().unwrap();
    let config = LearningConfig::default();
    let then = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();

    {
        let store = TitlePreferenceStore::open_at(Arc::new(open_db(&dir)), &config, then);
        store.record_selections_at(&[CalendarCandidate::new("Old offsite", false, true)], then);
    }

    let on_boundary = then + Duration::days(180);
    let store = TitlePreferenceStore::open_at(Arc::new(open_db(&dir)), &config, on_boundary);
    assert!(store.preference("old offsite").is_some());
    drop(store);

    let after = on_boundary + Duration::seconds(1);
    let store = TitlePreferenceStore::open_at(Arc::new(open_db(&dir)), &config, after);
    assert!(store.preference("old offsite").is_none());
    assert!(store.records().is_empty());

    // Eviction was persisted
    let store = TitlePreferenceStore::open_at(Arc::new(open_db(&dir)), &config, then);
    assert!(store.records().is_empty());
}
