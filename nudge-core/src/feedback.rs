//! Append-only log of suggestion feedback.
//!
//! The log is the input to signal extraction. Events are never edited or
//! removed one by one; the only removal is a bulk trim that keeps the most
//! recent entries.

use crate::types::{FeedbackAction, FeedbackEvent, TaskCategory};
use chrono::{DateTime, Utc};

/// In-memory feedback log.
#[derive(Debug, Clone, Default)]
pub struct FeedbackLog {
    events: Vec<FeedbackEvent>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from previously persisted events, oldest first.
    pub fn from_events(events: Vec<FeedbackEvent>) -> Self {
        Self { events }
    }

    /// Record a reaction at the current time.
    ///
    /// Returns `None` without recording when `hour_of_day` is outside 0-23.
    pub fn record(
        &mut self,
        action: FeedbackAction,
        category: TaskCategory,
        hour_of_day: u32,
    ) -> Option<&FeedbackEvent> {
        self.record_at(action, category, hour_of_day, Utc::now())
    }

    pub fn record_at(
        &mut self,
        action: FeedbackAction,
        category: TaskCategory,
        hour_of_day: u32,
        recorded_at: DateTime<Utc>,
    ) -> Option<&FeedbackEvent> {
        if hour_of_day > 23 {
            tracing::debug!(hour_of_day, action = action.as_str(), "Dropping feedback with invalid hour");
            return None;
        }

        self.events.push(FeedbackEvent {
            action,
            task_category: category,
            hour_of_day,
            recorded_at,
        });
        self.events.last()
    }

    pub fn events(&self) -> &[FeedbackEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Keep only the `keep` most recently appended events.
    ///
    /// Returns the number of events dropped.
    pub fn trim_to(&mut self, keep: usize) -> usize {
        let excess = self.events.len().saturating_sub(keep);
        if excess > 0 {
            self.events.drain(..excess);
            tracing::debug!(dropped = excess, kept = self.events.len(), "Trimmed feedback log");
        }
        excess
    }
}
