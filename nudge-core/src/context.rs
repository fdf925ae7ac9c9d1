//! Prompt context assembly
//!
//! [`AIContext`] gathers everything the assistant should know about the person
//! for one request and renders it as a single text block. It is built fresh per
//! request and never persisted.
//!
//! Sections are rendered in a fixed order and each one is dropped when its
//! source is empty, so sparse inputs produce shorter output rather than
//! placeholders.

use crate::format::format_hour;
use crate::signals::BehavioralSignals;
use crate::types::{TaskCategory, TimeBucket};
use chrono::{Datelike, Local, Timelike, Weekday};
use std::collections::{HashMap, HashSet};

/// Corrections summary that means "nothing learned yet".
pub const NO_PREFERENCES_SENTINEL: &str = "No preferences learned";

/// Recent tasks rendered by default.
pub const DEFAULT_RECENT_TASK_LIMIT: usize = 3;

/// Category usage entries rendered.
const TOP_CATEGORY_COUNT: usize = 3;

/// Keywords taken from a task title.
const MAX_KEYWORDS: usize = 5;

const MIN_KEYWORD_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "been", "before", "but", "can", "did",
    "for", "from", "get", "got", "had", "has", "have", "her", "his", "how", "into", "its", "just",
    "make", "more", "need", "needs", "not", "now", "off", "one", "our", "out", "over", "some",
    "than", "that", "the", "their", "them", "then", "there", "they", "this", "too", "via", "was",
    "were", "what", "when", "will", "with", "you", "your",
];

/// Wall-clock context for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeContext {
    pub hour: u32,
    pub weekday: Weekday,
}

impl TimeContext {
    pub fn new(hour: u32, weekday: Weekday) -> Self {
        Self { hour, weekday }
    }

    /// Current local time.
    pub fn now() -> Self {
        let now = Local::now();
        Self::new(now.hour(), now.weekday())
    }

    pub fn bucket(&self) -> Option<TimeBucket> {
        TimeBucket::from_hour(self.hour)
    }

    fn to_line(self) -> Option<String> {
        let bucket = self.bucket()?;
        Some(format!(
            "Current time: {} {} ({}).",
            weekday_name(self.weekday),
            format_hour(self.hour),
            bucket.as_str()
        ))
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Aggregates carried over from earlier sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatterns {
    /// Tasks created per category.
    pub category_usage: HashMap<TaskCategory, u32>,
    /// Preferred hour of day for tasks mentioning a keyword.
    pub keyword_hours: HashMap<String, u32>,
}

impl UserPatterns {
    /// Up to `n` most used categories, count descending then code ascending.
    pub fn top_categories(&self, n: usize) -> Vec<(TaskCategory, u32)> {
        let mut usage: Vec<(TaskCategory, u32)> = self
            .category_usage
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(category, count)| (*category, *count))
            .collect();
        usage.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        usage.truncate(n);
        usage
    }

    /// Learned hour for a keyword, ignoring out-of-range values.
    pub fn preferred_hour(&self, keyword: &str) -> Option<u32> {
        self.keyword_hours
            .get(keyword)
            .copied()
            .filter(|hour| *hour < 24)
    }
}

/// A recently created task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentTask {
    pub title: String,
    pub category: TaskCategory,
    /// Hour the task was scheduled for, if any.
    pub hour: Option<u32>,
}

impl RecentTask {
    pub fn new(title: impl Into<String>, category: TaskCategory, hour: Option<u32>) -> Self {
        Self {
            title: title.into(),
            category,
            hour,
        }
    }

    fn to_line(&self) -> Option<String> {
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }
        let line = match self.hour.filter(|h| *h < 24) {
            Some(hour) => format!(
                "Recent task: \"{}\" filed as {} at {}.",
                title,
                self.category.display_name(),
                format_hour(hour)
            ),
            None => format!(
                "Recent task: \"{}\" filed as {}.",
                title,
                self.category.display_name()
            ),
        };
        Some(line)
    }
}

/// Request-scoped prompt context.
#[derive(Debug, Clone)]
pub struct AIContext {
    pub time: TimeContext,
    pub patterns: UserPatterns,
    /// Most recent first.
    pub recent_tasks: Vec<RecentTask>,
    pub recent_task_limit: usize,
    pub corrections_summary: String,
    pub custom_categories: Vec<String>,
    /// Title of the task being worked on, if any.
    pub task_title: Option<String>,
    pub signals: Option<BehavioralSignals>,
}

impl AIContext {
    pub fn new(time: TimeContext) -> Self {
        Self {
            time,
            patterns: UserPatterns::default(),
            recent_tasks: Vec::new(),
            recent_task_limit: DEFAULT_RECENT_TASK_LIMIT,
            corrections_summary: String::new(),
            custom_categories: Vec::new(),
            task_title: None,
            signals: None,
        }
    }

    pub fn with_patterns(mut self, patterns: UserPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_recent_tasks(mut self, tasks: Vec<RecentTask>) -> Self {
        self.recent_tasks = tasks;
        self
    }

    pub fn with_recent_task_limit(mut self, limit: usize) -> Self {
        self.recent_task_limit = limit;
        self
    }

    pub fn with_corrections(mut self, summary: impl Into<String>) -> Self {
        self.corrections_summary = summary.into();
        self
    }

    pub fn with_custom_categories(mut self, names: Vec<String>) -> Self {
        self.custom_categories = names;
        self
    }

    pub fn with_task_title(mut self, title: impl Into<String>) -> Self {
        self.task_title = Some(title.into());
        self
    }

    pub fn with_signals(mut self, signals: BehavioralSignals) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Render the context block.
    pub fn to_prompt_string(&self) -> String {
        let mut sections: Vec<String> = Vec::new();

        if let Some(line) = self.time.to_line() {
            sections.push(line);
        }

        let top = self.patterns.top_categories(TOP_CATEGORY_COUNT);
        if !top.is_empty() {
            let usage: Vec<String> = top
                .iter()
                .map(|(category, count)| format!("{} ({})", category.display_name(), count))
                .collect();
            sections.push(format!("Most used categories: {}.", usage.join(", ")));
        }

        if let Some(line) = self.keyword_line() {
            sections.push(line);
        }

        sections.extend(
            self.recent_tasks
                .iter()
                .filter_map(RecentTask::to_line)
                .take(self.recent_task_limit),
        );

        let corrections = self.corrections_summary.trim();
        if !corrections.is_empty() && !is_no_preferences_sentinel(corrections) {
            sections.push(format!("Past corrections: {}", corrections));
        }

        let custom: Vec<&str> = self
            .custom_categories
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if !custom.is_empty() {
            sections.push(format!("Custom categories: {}.", custom.join(", ")));
        }

        if let Some(signals) = &self.signals {
            let block = signals.to_prompt_string();
            if !block.is_empty() {
                sections.push(block);
            }
        }

        sections.join("\n").trim().to_string()
    }

    fn keyword_line(&self) -> Option<String> {
        let title = self.task_title.as_deref()?;
        extract_keywords(title).into_iter().find_map(|keyword| {
            let hour = self.patterns.preferred_hour(&keyword)?;
            Some(format!(
                "Tasks mentioning \"{}\" are usually scheduled around {}.",
                keyword,
                format_hour(hour)
            ))
        })
    }
}

fn is_no_preferences_sentinel(summary: &str) -> bool {
    summary
        .trim_end_matches('.')
        .trim()
        .eq_ignore_ascii_case(NO_PREFERENCES_SENTINEL)
}

/// Significant words of a task title, lowercased, first occurrence order.
pub fn extract_keywords(title: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|token| !STOPWORDS.contains(token))
        .filter(|token| seen.insert(token.to_string()))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionPatterns;
    use crate::signals::extract;
    use crate::types::{FeedbackAction, FeedbackEvent};
    use chrono::{TimeZone, Utc};

    fn monday_morning() -> TimeContext {
        TimeContext::new(9, Weekday::Mon)
    }

    fn warm_signals() -> BehavioralSignals {
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let events: Vec<FeedbackEvent> = (0..10)
            .map(|_| FeedbackEvent {
                action: FeedbackAction::StartedImmediately,
                task_category: TaskCategory::Work,
                hour_of_day: 9,
                recorded_at: at,
            })
            .collect();
        extract(&events, &CompletionPatterns::new())
    }

    #[test]
    fn test_extract_keywords() {
        assert_eq!(
            extract_keywords("Call the dentist about the dentist appointment!"),
            vec!["call", "dentist", "appointment"]
        );
        assert_eq!(
            extract_keywords("Go to GYM, gym & yoga; run 5k with Sam"),
            vec!["gym", "yoga", "run", "sam"]
        );
        assert!(extract_keywords("a to do").is_empty());
    }

    #[test]
    fn test_extract_keywords_caps_at_five() {
        let keywords = extract_keywords("alpha bravo charlie delta echo foxtrot golf");
        assert_eq!(keywords, vec!["alpha", "bravo", "charlie", "delta", "echo"]);
    }

    #[test]
    fn test_empty_context_renders_time_only() {
        let context = AIContext::new(monday_morning());
        assert_eq!(context.to_prompt_string(), "Current time: Monday 9 AM (morning).");
    }

    #[test]
    fn test_invalid_hour_drops_everything() {
        let context = AIContext::new(TimeContext::new(30, Weekday::Fri))
            .with_corrections("no preferences learned.")
            .with_signals(BehavioralSignals::default());
        assert_eq!(context.to_prompt_string(), "");
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let mut patterns = UserPatterns::default();
        patterns.category_usage.insert(TaskCategory::Work, 7);
        patterns.category_usage.insert(TaskCategory::Health, 4);
        patterns.category_usage.insert(TaskCategory::Errands, 4);
        patterns.category_usage.insert(TaskCategory::Social, 1);
        patterns.keyword_hours.insert("yoga".to_string(), 18);

        let recent = vec![
            RecentTask::new("Pay rent", TaskCategory::Finance, Some(10)),
            RecentTask::new("Morning run", TaskCategory::Health, None),
            RecentTask::new("  ", TaskCategory::Other, None),
            RecentTask::new("Water plants", TaskCategory::Home, Some(8)),
            RecentTask::new("Book flights", TaskCategory::Personal, Some(20)),
        ];

        let context = AIContext::new(monday_morning())
            .with_patterns(patterns)
            .with_task_title("Quick yoga and stretch")
            .with_recent_tasks(recent)
            .with_corrections("  Prefers health tasks before noon.  ")
            .with_custom_categories(vec!["Garden".to_string(), " ".to_string(), "Band".to_string()])
            .with_signals(warm_signals());

        let rendered = context.to_prompt_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Current time: Monday 9 AM (morning).");
        assert_eq!(lines[1], "Most used categories: Work (7), Errands (4), Health (4).");
        assert_eq!(
            lines[2],
            "Tasks mentioning \"yoga\" are usually scheduled around 6 PM."
        );
        assert_eq!(lines[3], "Recent task: \"Pay rent\" filed as Finance at 10 AM.");
        assert_eq!(lines[4], "Recent task: \"Morning run\" filed as Health.");
        assert_eq!(lines[5], "Recent task: \"Water plants\" filed as Home at 8 AM.");
        assert_eq!(lines[6], "Past corrections: Prefers health tasks before noon.");
        assert_eq!(lines[7], "Custom categories: Garden, Band.");
        assert_eq!(lines[8], "Learned behavior from recent suggestion feedback:");
        assert!(!rendered.contains("Book flights"));
        assert!(!rendered.ends_with('\n'));
    }

    #[test]
    fn test_first_matching_keyword_wins() {
        let mut patterns = UserPatterns::default();
        patterns.keyword_hours.insert("groceries".to_string(), 17);
        patterns.keyword_hours.insert("milk".to_string(), 8);
        patterns.keyword_hours.insert("bread".to_string(), 99);

        let context = AIContext::new(monday_morning())
            .with_patterns(patterns)
            .with_task_title("bread, milk and groceries");

        let rendered = context.to_prompt_string();
        assert!(rendered.contains("\"milk\" are usually scheduled around 8 AM"));
        assert!(!rendered.contains("groceries"));
    }

    #[test]
    fn test_sentinel_corrections_are_omitted() {
        for summary in ["No preferences learned", "  no PREFERENCES learned. ", ""] {
            let context = AIContext::new(monday_morning()).with_corrections(summary);
            assert!(!context.to_prompt_string().contains("Past corrections"));
        }
    }

    #[test]
    fn test_cold_start_signals_add_nothing() {
        let context = AIContext::new(monday_morning()).with_signals(BehavioralSignals::default());
        assert_eq!(context.to_prompt_string(), "Current time: Monday 9 AM (morning).");
    }

    #[test]
    fn test_recent_task_limit() {
        let recent = (0..5)
            .map(|i| RecentTask::new(format!("task {}", i), TaskCategory::Work, None))
            .collect();
        let context = AIContext::new(monday_morning())
            .with_recent_tasks(recent)
            .with_recent_task_limit(1);

        let rendered = context.to_prompt_string();
        assert!(rendered.contains("\"task 0\""));
        assert!(!rendered.contains("\"task 1\""));
    }
}
