//! Core domain types for nudge
//!
//! These types describe what the learning engine observes about a person's
//! reactions to suggestions, and what it remembers about calendar events.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Suggestion** | A task proposed to the person by the assistant |
//! | **Feedback** | One reaction to a suggestion (start, snooze, skip, ...) |
//! | **Category** | The task's category, a closed set with stable codes |
//! | **Bucket** | One of four fixed segments of the day derived from an hour |
//! | **Selection** | Whether a calendar event was converted into a task |
//! | **Support** | Number of observations behind a finding |
//!
//! Every string code in this module (`as_str`) is a stable identifier: it is
//! persisted, used as a map key, and used for lexicographic tie-breaks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Task categories
// ============================================

/// Category of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Errands,
    Finance,
    Health,
    Home,
    Learning,
    Other,
    Personal,
    Shopping,
    Social,
    Work,
}

impl TaskCategory {
    /// All categories, in code order.
    pub const ALL: [TaskCategory; 10] = [
        TaskCategory::Errands,
        TaskCategory::Finance,
        TaskCategory::Health,
        TaskCategory::Home,
        TaskCategory::Learning,
        TaskCategory::Other,
        TaskCategory::Personal,
        TaskCategory::Shopping,
        TaskCategory::Social,
        TaskCategory::Work,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Errands => "errands",
            TaskCategory::Finance => "finance",
            TaskCategory::Health => "health",
            TaskCategory::Home => "home",
            TaskCategory::Learning => "learning",
            TaskCategory::Other => "other",
            TaskCategory::Personal => "personal",
            TaskCategory::Shopping => "shopping",
            TaskCategory::Social => "social",
            TaskCategory::Work => "work",
        }
    }

    /// Human-readable name used in rendered context.
    pub fn display_name(&self) -> &'static str {
        match self {
            TaskCategory::Errands => "Errands",
            TaskCategory::Finance => "Finance",
            TaskCategory::Health => "Health",
            TaskCategory::Home => "Home",
            TaskCategory::Learning => "Learning",
            TaskCategory::Other => "Other",
            TaskCategory::Personal => "Personal",
            TaskCategory::Shopping => "Shopping",
            TaskCategory::Social => "Social",
            TaskCategory::Work => "Work",
        }
    }
}

impl std::str::FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown task category: {}", s))
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Feedback actions
// ============================================

/// What the person did with a presented suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackAction {
    #[serde(rename = "started_immediately")]
    StartedImmediately,
    #[serde(rename = "viewed_details")]
    ViewedDetails,
    #[serde(rename = "snoozed_1_hour")]
    Snoozed1Hour,
    #[serde(rename = "snoozed_evening")]
    SnoozedEvening,
    #[serde(rename = "snoozed_tomorrow")]
    SnoozedTomorrow,
    #[serde(rename = "skipped_not_relevant")]
    SkippedNotRelevant,
    #[serde(rename = "skipped_wrong_time")]
    SkippedWrongTime,
    #[serde(rename = "skipped_needs_focus")]
    SkippedNeedsFocus,
}

impl FeedbackAction {
    pub const ALL: [FeedbackAction; 8] = [
        FeedbackAction::StartedImmediately,
        FeedbackAction::ViewedDetails,
        FeedbackAction::Snoozed1Hour,
        FeedbackAction::SnoozedEvening,
        FeedbackAction::SnoozedTomorrow,
        FeedbackAction::SkippedNotRelevant,
        FeedbackAction::SkippedWrongTime,
        FeedbackAction::SkippedNeedsFocus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackAction::StartedImmediately => "started_immediately",
            FeedbackAction::ViewedDetails => "viewed_details",
            FeedbackAction::Snoozed1Hour => "snoozed_1_hour",
            FeedbackAction::SnoozedEvening => "snoozed_evening",
            FeedbackAction::SnoozedTomorrow => "snoozed_tomorrow",
            FeedbackAction::SkippedNotRelevant => "skipped_not_relevant",
            FeedbackAction::SkippedWrongTime => "skipped_wrong_time",
            FeedbackAction::SkippedNeedsFocus => "skipped_needs_focus",
        }
    }

    /// Started or opened the suggestion.
    pub fn is_positive_engagement(&self) -> bool {
        matches!(
            self,
            FeedbackAction::StartedImmediately | FeedbackAction::ViewedDetails
        )
    }

    pub fn is_snooze(&self) -> bool {
        matches!(
            self,
            FeedbackAction::Snoozed1Hour
                | FeedbackAction::SnoozedEvening
                | FeedbackAction::SnoozedTomorrow
        )
    }

    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            FeedbackAction::SkippedNotRelevant
                | FeedbackAction::SkippedWrongTime
                | FeedbackAction::SkippedNeedsFocus
        )
    }

    /// Contribution of this action to a category's affinity score.
    pub fn affinity_delta(&self) -> i32 {
        match self {
            FeedbackAction::StartedImmediately => 2,
            FeedbackAction::ViewedDetails => 1,
            FeedbackAction::Snoozed1Hour
            | FeedbackAction::SnoozedEvening
            | FeedbackAction::SnoozedTomorrow => -1,
            FeedbackAction::SkippedNotRelevant
            | FeedbackAction::SkippedWrongTime
            | FeedbackAction::SkippedNeedsFocus => -2,
        }
    }
}

impl std::str::FromStr for FeedbackAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown feedback action: {}", s))
    }
}

// ============================================
// Time buckets
// ============================================

/// Segment of the day an hour falls into.
///
/// Declaration order is the canonical bucket order used for tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    /// 05:00-11:59
    Morning,
    /// 12:00-16:59
    Afternoon,
    /// 17:00-20:59
    Evening,
    /// 21:00-04:59
    Night,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 4] = [
        TimeBucket::Morning,
        TimeBucket::Afternoon,
        TimeBucket::Evening,
        TimeBucket::Night,
    ];

    /// Bucket for an hour of day, `None` for hours outside 0-23.
    pub fn from_hour(hour: u32) -> Option<TimeBucket> {
        match hour {
            5..=11 => Some(TimeBucket::Morning),
            12..=16 => Some(TimeBucket::Afternoon),
            17..=20 => Some(TimeBucket::Evening),
            21..=23 | 0..=4 => Some(TimeBucket::Night),
            _ => None,
        }
    }

    /// Position in the canonical order (morning = 0).
    pub fn order_index(&self) -> usize {
        match self {
            TimeBucket::Morning => 0,
            TimeBucket::Afternoon => 1,
            TimeBucket::Evening => 2,
            TimeBucket::Night => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::Morning => "morning",
            TimeBucket::Afternoon => "afternoon",
            TimeBucket::Evening => "evening",
            TimeBucket::Night => "night",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TimeBucket::Morning => "Morning",
            TimeBucket::Afternoon => "Afternoon",
            TimeBucket::Evening => "Evening",
            TimeBucket::Night => "Night",
        }
    }
}

// ============================================
// Feedback events
// ============================================

/// One reaction to a presented suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// What the person did
    pub action: FeedbackAction,
    /// Category of the suggested task
    pub task_category: TaskCategory,
    /// Local hour the reaction happened (0-23)
    pub hour_of_day: u32,
    /// When the event was recorded
    pub recorded_at: DateTime<Utc>,
}

impl FeedbackEvent {
    pub fn new(action: FeedbackAction, task_category: TaskCategory, hour_of_day: u32) -> Self {
        Self {
            action,
            task_category,
            hour_of_day,
            recorded_at: Utc::now(),
        }
    }

    pub fn time_bucket(&self) -> Option<TimeBucket> {
        TimeBucket::from_hour(self.hour_of_day)
    }
}

// ============================================
// Calendar event selection learning
// ============================================

/// Observations needed before a title preference is trusted.
pub const MIN_TITLE_OBSERVATIONS: u32 = 3;

/// A title is "frequent" at this share of selections or skips, as
/// `FREQUENT_NUMERATOR / FREQUENT_DENOMINATOR` (80%).
const FREQUENT_NUMERATOR: u32 = 4;
const FREQUENT_DENOMINATOR: u32 = 5;

/// Lowercase + trim. Idempotent.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// One observation of whether a calendar event became a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSelectionRecord {
    pub normalized_title: String,
    pub was_selected: bool,
    pub is_all_day: bool,
    pub timestamp: DateTime<Utc>,
}

/// Aggregated selection history for a normalized event title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTitlePreference {
    pub selected_count: u32,
    pub skipped_count: u32,
    pub last_interaction: DateTime<Utc>,
}

impl EventTitlePreference {
    pub fn new(last_interaction: DateTime<Utc>) -> Self {
        Self {
            selected_count: 0,
            skipped_count: 0,
            last_interaction,
        }
    }

    pub fn total_count(&self) -> u32 {
        self.selected_count + self.skipped_count
    }

    /// Share of observations that were skipped (0.0 with no data).
    pub fn skip_rate(&self) -> f64 {
        match self.total_count() {
            0 => 0.0,
            total => self.skipped_count as f64 / total as f64,
        }
    }

    /// Share of observations that were selected (0.0 with no data).
    pub fn selection_rate(&self) -> f64 {
        match self.total_count() {
            0 => 0.0,
            total => self.selected_count as f64 / total as f64,
        }
    }

    pub fn has_enough_data(&self) -> bool {
        self.total_count() >= MIN_TITLE_OBSERVATIONS
    }

    pub fn is_frequently_skipped(&self) -> bool {
        self.has_enough_data()
            && self.skipped_count * FREQUENT_DENOMINATOR >= self.total_count() * FREQUENT_NUMERATOR
    }

    pub fn is_frequently_selected(&self) -> bool {
        self.has_enough_data()
            && self.selected_count * FREQUENT_DENOMINATOR
                >= self.total_count() * FREQUENT_NUMERATOR
    }

    pub(crate) fn observe(&mut self, selected: bool, at: DateTime<Utc>) {
        if selected {
            self.selected_count += 1;
        } else {
            self.skipped_count += 1;
        }
        self.last_interaction = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preference(selected: u32, skipped: u32) -> EventTitlePreference {
        EventTitlePreference {
            selected_count: selected,
            skipped_count: skipped,
            last_interaction: Utc::now(),
        }
    }

    #[test]
    fn test_time_bucket_boundaries() {
        assert_eq!(TimeBucket::from_hour(4), Some(TimeBucket::Night));
        assert_eq!(TimeBucket::from_hour(5), Some(TimeBucket::Morning));
        assert_eq!(TimeBucket::from_hour(11), Some(TimeBucket::Morning));
        assert_eq!(TimeBucket::from_hour(12), Some(TimeBucket::Afternoon));
        assert_eq!(TimeBucket::from_hour(16), Some(TimeBucket::Afternoon));
        assert_eq!(TimeBucket::from_hour(17), Some(TimeBucket::Evening));
        assert_eq!(TimeBucket::from_hour(20), Some(TimeBucket::Evening));
        assert_eq!(TimeBucket::from_hour(21), Some(TimeBucket::Night));
        assert_eq!(TimeBucket::from_hour(0), Some(TimeBucket::Night));
        assert_eq!(TimeBucket::from_hour(24), None);
    }

    #[test]
    fn test_category_codes_round_trip() {
        for category in TaskCategory::ALL {
            assert_eq!(category.as_str().parse::<TaskCategory>(), Ok(category));
        }
        assert!("chores".parse::<TaskCategory>().is_err());
    }

    #[test]
    fn test_action_serde_uses_codes() {
        let json = serde_json::to_string(&FeedbackAction::Snoozed1Hour).unwrap();
        assert_eq!(json, "\"snoozed_1_hour\"");
        for action in FeedbackAction::ALL {
            assert_eq!(action.as_str().parse::<FeedbackAction>(), Ok(action));
        }
    }

    #[test]
    fn test_action_classes_are_disjoint() {
        for action in FeedbackAction::ALL {
            let classes = [
                action.is_positive_engagement(),
                action.is_snooze(),
                action.is_skip(),
            ];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{:?}", action);
        }
    }

    #[test]
    fn test_frequently_skipped_thresholds() {
        // 3 of 4 skipped is 75%, below the 80% bar
        assert!(!preference(1, 3).is_frequently_skipped());
        assert_eq!(preference(1, 3).skip_rate(), 0.75);
        assert!(preference(0, 4).is_frequently_skipped());
        assert!(preference(1, 4).is_frequently_skipped());
        // Not enough data even at 100%
        assert!(!preference(0, 2).is_frequently_skipped());
    }

    #[test]
    fn test_frequently_selected_thresholds() {
        assert!(preference(3, 0).is_frequently_selected());
        assert!(preference(4, 1).is_frequently_selected());
        assert!(!preference(3, 1).is_frequently_selected());
        assert!(!preference(2, 0).is_frequently_selected());
    }

    #[test]
    fn test_rates_with_no_data() {
        let pref = preference(0, 0);
        assert_eq!(pref.skip_rate(), 0.0);
        assert_eq!(pref.selection_rate(), 0.0);
        assert!(!pref.has_enough_data());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Team   Sync "), "team   sync");
        let once = normalize_title("\tWEEKLY Review\n");
        assert_eq!(normalize_title(&once), once);
    }
}
