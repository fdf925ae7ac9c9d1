//! Database repository layer
//!
//! Provides query and insert operations for the feedback log and the
//! learned-state documents.

use crate::error::{Error, Result};
use crate::types::{FeedbackAction, FeedbackEvent, TaskCategory};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves the connection itself usable
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Feedback event operations
    // ============================================

    /// Append a feedback event, returning its row id.
    pub fn insert_feedback_event(&self, event: &FeedbackEvent) -> Result<i64> {
        if event.time_bucket().is_none() {
            return Err(Error::invalid(
                "hour_of_day",
                format!("{} is outside 0-23", event.hour_of_day),
            ));
        }

        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO feedback_events (action, task_category, hour_of_day, recorded_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                event.action.as_str(),
                event.task_category.as_str(),
                event.hour_of_day,
                event.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List feedback events oldest first.
    ///
    /// With a limit, returns the `limit` most recent events (still oldest first).
    /// Rows with codes this build doesn't know, or an hour outside 0-23, are
    /// skipped.
    pub fn list_feedback_events(&self, limit: Option<usize>) -> Result<Vec<FeedbackEvent>> {
        let conn = self.lock();
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut stmt = conn.prepare(
            r#"
            SELECT action, task_category, hour_of_day, recorded_at FROM (
                SELECT id, action, task_category, hour_of_day, recorded_at
                FROM feedback_events
                ORDER BY id DESC
                LIMIT ?1
            ) ORDER BY id ASC
            "#,
        )?;

        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Value>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let events = rows
            .into_iter()
            .filter_map(|(action, category, hour, recorded_at)| {
                let parsed =
                    Self::row_to_feedback_event(&action, &category, hour.clone(), &recorded_at);
                if parsed.is_none() {
                    tracing::warn!(
                        action = %action,
                        category = %category,
                        hour = ?hour,
                        "Skipping unreadable feedback row"
                    );
                }
                parsed
            })
            .collect();

        Ok(events)
    }

    fn row_to_feedback_event(
        action: &str,
        category: &str,
        hour_of_day: Value,
        recorded_at: &str,
    ) -> Option<FeedbackEvent> {
        let Value::Integer(hour_of_day) = hour_of_day else {
            return None;
        };

        Some(FeedbackEvent {
            action: action.parse::<FeedbackAction>().ok()?,
            task_category: category.parse::<TaskCategory>().ok()?,
            hour_of_day: u32::try_from(hour_of_day).ok().filter(|h| *h < 24)?,
            recorded_at: DateTime::parse_from_rfc3339(recorded_at)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()?,
        })
    }

    /// Count stored feedback events.
    pub fn count_feedback_events(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM feedback_events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Keep only the `keep` most recently appended events.
    ///
    /// Returns the number of events deleted.
    pub fn trim_feedback_events(&self, keep: usize) -> Result<usize> {
        let conn = self.lock();
        let deleted = conn.execute(
            r#"
            DELETE FROM feedback_events
            WHERE id NOT IN (
                SELECT id FROM feedback_events ORDER BY id DESC LIMIT ?1
            )
            "#,
            [keep as i64],
        )?;
        if deleted > 0 {
            tracing::info!(deleted, keep, "Trimmed feedback events");
        }
        Ok(deleted)
    }

    // ============================================
    // Learned state documents
    // ============================================

    /// Get the raw JSON document stored under `key`.
    pub fn get_learning_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM learning_state WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    /// Insert or replace the JSON document stored under `key`.
    pub fn put_learning_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO learning_state (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove the document stored under `key`, if any.
    pub fn delete_learning_state(&self, key: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM learning_state WHERE key = ?", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn feedback(action: FeedbackAction, hour: u32) -> FeedbackEvent {
        FeedbackEvent {
            action,
            task_category: TaskCategory::Work,
            hour_of_day: hour,
            recorded_at: Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_feedback_insert_and_list() {
        let db = test_db();

        let events = vec![
            feedback(FeedbackAction::StartedImmediately, 9),
            feedback(FeedbackAction::Snoozed1Hour, 10),
            feedback(FeedbackAction::SkippedNeedsFocus, 11),
        ];
        for event in &events {
            db.insert_feedback_event(event).unwrap();
        }

        assert_eq!(db.count_feedback_events().unwrap(), 3);
        assert_eq!(db.list_feedback_events(None).unwrap(), events);

        // Limit keeps the most recent, still in order
        let recent = db.list_feedback_events(Some(2)).unwrap();
        assert_eq!(recent, events[1..].to_vec());
    }

    #[test]
    fn test_out_of_range_hour_is_rejected() {
        let db = test_db();
        let mut event = feedback(FeedbackAction::ViewedDetails, 23);
        event.hour_of_day = 24;

        let err = db.insert_feedback_event(&event).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(db.count_feedback_events().unwrap(), 0);
    }

    #[test]
    fn test_unknown_rows_are_skipped() {
        crate::logging::init_test();
        let db = test_db();
        db.insert_feedback_event(&feedback(FeedbackAction::ViewedDetails, 9))
            .unwrap();
        db.connection()
            .execute(
                "INSERT INTO feedback_events (action, task_category, hour_of_day, recorded_at)
                 VALUES ('teleported', 'work', 9, '2025-03-01T09:00:00+00:00')",
                [],
            )
            .unwrap();

        let events = db.list_feedback_events(None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, FeedbackAction::ViewedDetails);
    }

    #[test]
    fn test_rows_with_bad_hours_are_skipped() {
        crate::logging::init_test();
        let db = test_db();
        db.insert_feedback_event(&feedback(FeedbackAction::StartedImmediately, 9))
            .unwrap();
        for hour in [-1_i64, 24, i64::from(u32::MAX) + 1] {
            db.connection()
                .execute(
                    "INSERT INTO feedback_events (action, task_category, hour_of_day, recorded_at)
                     VALUES ('viewed_details', 'work', ?1, '2025-03-01T09:00:00+00:00')",
                    [hour],
                )
                .unwrap();
        }

        db.connection()
            .execute(
                "INSERT INTO feedback_events (action, task_category, hour_of_day, recorded_at)
                 VALUES ('viewed_details', 'work', 'nine', '2025-03-01T09:00:00+00:00')",
                [],
            )
            .unwrap();

        let events = db.list_feedback_events(None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, FeedbackAction::StartedImmediately);
        assert_eq!(db.count_feedback_events().unwrap(), 5);
    }

    #[test]
    fn test_trim_feedback_events() {
        let db = test_db();
        for hour in 0..6 {
            db.insert_feedback_event(&feedback(FeedbackAction::ViewedDetails, hour))
                .unwrap();
        }

        assert_eq!(db.trim_feedback_events(4).unwrap(), 2);
        let hours: Vec<u32> = db
            .list_feedback_events(None)
            .unwrap()
            .iter()
            .map(|e| e.hour_of_day)
            .collect();
        assert_eq!(hours, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_learning_state_documents() {
        let db = test_db();
        assert_eq!(db.get_learning_state("prefs").unwrap(), None);

        db.put_learning_state("prefs", "{}").unwrap();
        db.put_learning_state("prefs", "{\"a\":1}").unwrap();
        assert_eq!(
            db.get_learning_state("prefs").unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        db.delete_learning_state("prefs").unwrap();
        assert_eq!(db.get_learning_state("prefs").unwrap(), None);
    }
}
