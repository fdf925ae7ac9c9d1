//! Calendar event title preferences
//!
//! Learns which calendar events a person tends to turn into tasks. Every
//! confirmed import batch appends one [`EventSelectionRecord`] per event and
//! bumps the counters of the event's [`EventTitlePreference`]. Later batches
//! use those counters to pre-select or pre-deselect candidates.
//!
//! ## Retention
//!
//! - The record log keeps the most recently appended `max_selection_records`
//!   entries (by position, not by timestamp).
//! - Records and preferences older than `selection_expiry_days` are evicted on
//!   open and on explicit [`TitlePreferenceStore::cleanup_stale`] calls, never
//!   on write.
//!
//! ## Persistence
//!
//! State lives behind a [`LearningStorage`]. Storage is best-effort: a
//! collection that fails to load starts empty and a failed save is logged and
//! dropped. Callers never see storage errors from the store.

use crate::config::LearningConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::{normalize_title, EventSelectionRecord, EventTitlePreference};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Key of the selection-record document in [`Database`].
pub const SELECTION_RECORDS_KEY: &str = "event_selection_records";
/// Key of the title-preference document in [`Database`].
pub const TITLE_PREFERENCES_KEY: &str = "event_title_preferences";

/// Backing store for the two learned collections.
///
/// The collections are loaded and saved independently.
pub trait LearningStorage: Send + Sync {
    fn load_selection_records(&self) -> Result<Vec<EventSelectionRecord>>;
    fn save_selection_records(&self, records: &[EventSelectionRecord]) -> Result<()>;
    fn load_title_preferences(&self) -> Result<HashMap<String, EventTitlePreference>>;
    fn save_title_preferences(&self, preferences: &HashMap<String, EventTitlePreference>)
        -> Result<()>;
}

impl LearningStorage for Database {
    fn load_selection_records(&self) -> Result<Vec<EventSelectionRecord>> {
        match self.get_learning_state(SELECTION_RECORDS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_selection_records(&self, records: &[EventSelectionRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        self.put_learning_state(SELECTION_RECORDS_KEY, &json)
    }

    fn load_title_preferences(&self) -> Result<HashMap<String, EventTitlePreference>> {
        match self.get_learning_state(TITLE_PREFERENCES_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(HashMap::new()),
        }
    }

    fn save_title_preferences(
        &self,
        preferences: &HashMap<String, EventTitlePreference>,
    ) -> Result<()> {
        let json = serde_json::to_string(preferences)?;
        self.put_learning_state(TITLE_PREFERENCES_KEY, &json)
    }
}

impl<T: LearningStorage + ?Sized> LearningStorage for Arc<T> {
    fn load_selection_records(&self) -> Result<Vec<EventSelectionRecord>> {
        (**self).load_selection_records()
    }

    fn save_selection_records(&self, records: &[EventSelectionRecord]) -> Result<()> {
        (**self).save_selection_records(records)
    }

    fn load_title_preferences(&self) -> Result<HashMap<String, EventTitlePreference>> {
        (**self).load_title_preferences()
    }

    fn save_title_preferences(
        &self,
        preferences: &HashMap<String, EventTitlePreference>,
    ) -> Result<()> {
        (**self).save_title_preferences(preferences)
    }
}

/// A calendar event offered for conversion into a task.
///
/// `selected` is the candidate's current checkbox state; after confirmation it
/// is the outcome that gets recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarCandidate {
    pub title: String,
    pub is_all_day: bool,
    pub selected: bool,
}

impl CalendarCandidate {
    pub fn new(title: impl Into<String>, is_all_day: bool, selected: bool) -> Self {
        Self {
            title: title.into(),
            is_all_day,
            selected,
        }
    }
}

/// What a cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub records_removed: usize,
    pub preferences_removed: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.records_removed == 0 && self.preferences_removed == 0
    }
}

/// Summary counts for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LearningStats {
    pub tracked_titles: usize,
    pub selection_records: usize,
    pub frequently_skipped: usize,
    pub frequently_selected: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<EventSelectionRecord>,
    preferences: HashMap<String, EventTitlePreference>,
}

/// Decayed title-preference aggregator.
///
/// Reads share a lock; every mutation holds the write lock for its whole
/// read-modify-persist sequence, so concurrent batches never interleave on a
/// title's counters.
pub struct TitlePreferenceStore<S: LearningStorage> {
    storage: S,
    max_records: usize,
    /// `None` when the window is too large to represent; nothing expires then.
    expiry: Option<Duration>,
    state: RwLock<StoreState>,
}

impl<S: LearningStorage> TitlePreferenceStore<S> {
    /// Load persisted state and evict anything stale as of now.
    pub fn open(storage: S, config: &LearningConfig) -> Self {
        Self::open_at(storage, config, Utc::now())
    }

    /// Like [`open`](Self::open) with an explicit clock.
    pub fn open_at(storage: S, config: &LearningConfig, now: DateTime<Utc>) -> Self {
        let records = storage.load_selection_records().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load selection records, starting empty");
            Vec::new()
        });
        let preferences = storage.load_title_preferences().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load title preferences, starting empty");
            HashMap::new()
        });

        tracing::debug!(
            records = records.len(),
            titles = preferences.len(),
            "Loaded title preference store"
        );

        let store = Self {
            storage,
            max_records: config.max_selection_records,
            expiry: Duration::try_days(config.selection_expiry_days),
            state: RwLock::new(StoreState {
                records,
                preferences,
            }),
        };
        store.cleanup_stale(now);
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the outcome of a confirmed import batch.
    ///
    /// Only call this for batches the person actually confirmed. A dismissed
    /// sheet would otherwise be learned as "skipped everything".
    ///
    /// Returns the number of candidates recorded (blank titles are ignored).
    pub fn record_selections(&self, batch: &[CalendarCandidate]) -> usize {
        self.record_selections_at(batch, Utc::now())
    }

    pub fn record_selections_at(&self, batch: &[CalendarCandidate], now: DateTime<Utc>) -> usize {
        let mut state = self.write();
        let mut recorded = 0;

        for candidate in batch {
            let title = normalize_title(&candidate.title);
            if title.is_empty() {
                continue;
            }

            state
                .preferences
                .entry(title.clone())
                .or_insert_with(|| EventTitlePreference::new(now))
                .observe(candidate.selected, now);

            state.records.push(EventSelectionRecord {
                normalized_title: title,
                was_selected: candidate.selected,
                is_all_day: candidate.is_all_day,
                timestamp: now,
            });
            recorded += 1;
        }

        if recorded == 0 {
            return 0;
        }

        let excess = state.records.len().saturating_sub(self.max_records);
        if excess > 0 {
            state.records.drain(..excess);
        }

        tracing::debug!(
            recorded,
            trimmed = excess,
            records = state.records.len(),
            titles = state.preferences.len(),
            "Recorded calendar selections"
        );

        self.save_records(&state);
        self.save_preferences(&state);
        recorded
    }

    /// Evict records and preferences strictly older than the expiry window.
    ///
    /// Persists only the collections that changed.
    pub fn cleanup_stale(&self, now: DateTime<Utc>) -> CleanupReport {
        let Some(cutoff) = self.expiry.and_then(|expiry| now.checked_sub_signed(expiry)) else {
            tracing::debug!(now = %now, "Expiry window out of range, nothing is stale");
            return CleanupReport::default();
        };
        let mut state = self.write();

        let records_before = state.records.len();
        state.records.retain(|r| r.timestamp >= cutoff);
        let records_removed = records_before - state.records.len();

        let preferences_before = state.preferences.len();
        state.preferences.retain(|_, p| p.last_interaction >= cutoff);
        let preferences_removed = preferences_before - state.preferences.len();

        if records_removed > 0 {
            self.save_records(&state);
        }
        if preferences_removed > 0 {
            self.save_preferences(&state);
        }

        let report = CleanupReport {
            records_removed,
            preferences_removed,
        };
        if !report.is_empty() {
            tracing::info!(
                records_removed,
                preferences_removed,
                cutoff = %cutoff,
                "Evicted stale calendar learning data"
            );
        }
        report
    }

    /// Learned preference for a title, if it has been seen.
    pub fn preference(&self, title: &str) -> Option<EventTitlePreference> {
        self.read().preferences.get(&normalize_title(title)).cloned()
    }

    pub fn is_frequently_skipped(&self, title: &str) -> bool {
        self.preference(title)
            .is_some_and(|p| p.is_frequently_skipped())
    }

    pub fn is_frequently_selected(&self, title: &str) -> bool {
        self.preference(title)
            .is_some_and(|p| p.is_frequently_selected())
    }

    /// Adjust default selection states from learned preferences.
    ///
    /// Frequently skipped titles are deselected. Frequently selected titles are
    /// selected unless the event is all-day; all-day events are only ever
    /// deselected. Returns how many candidates changed state.
    pub fn apply_learned_preferences(&self, candidates: &mut [CalendarCandidate]) -> usize {
        let state = self.read();
        let mut changed = 0;

        for candidate in candidates.iter_mut() {
            let Some(pref) = state.preferences.get(&normalize_title(&candidate.title)) else {
                continue;
            };

            let target = if pref.is_frequently_skipped() {
                false
            } else if pref.is_frequently_selected() && !candidate.is_all_day {
                true
            } else {
                continue;
            };

            if candidate.selected != target {
                candidate.selected = target;
                changed += 1;
            }
        }

        changed
    }

    /// Snapshot of the record log, oldest first.
    pub fn records(&self) -> Vec<EventSelectionRecord> {
        self.read().records.clone()
    }

    /// Snapshot of all tracked titles, sorted by title.
    pub fn preferences(&self) -> Vec<(String, EventTitlePreference)> {
        let mut prefs: Vec<(String, EventTitlePreference)> = self
            .read()
            .preferences
            .iter()
            .map(|(title, pref)| (title.clone(), pref.clone()))
            .collect();
        prefs.sort_by(|a, b| a.0.cmp(&b.0));
        prefs
    }

    pub fn stats(&self) -> LearningStats {
        let state = self.read();
        LearningStats {
            tracked_titles: state.preferences.len(),
            selection_records: state.records.len(),
            frequently_skipped: state
                .preferences
                .values()
                .filter(|p| p.is_frequently_skipped())
                .count(),
            frequently_selected: state
                .preferences
                .values()
                .filter(|p| p.is_frequently_selected())
                .count(),
        }
    }

    /// Forget everything learned about calendar events.
    pub fn clear_all_learning_data(&self) {
        let mut state = self.write();
        state.records.clear();
        state.preferences.clear();
        self.save_records(&state);
        self.save_preferences(&state);
        tracing::info!("Cleared calendar learning data");
    }

    fn save_records(&self, state: &StoreState) {
        if let Err(e) = self.storage.save_selection_records(&state.records) {
            tracing::warn!(error = %e, "Failed to save selection records");
        }
    }

    fn save_preferences(&self, state: &StoreState) {
        if let Err(e) = self.storage.save_title_preferences(&state.preferences) {
            tracing::warn!(error = %e, "Failed to save title preferences");
        }
    }
}
