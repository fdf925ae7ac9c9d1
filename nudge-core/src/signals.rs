//! Behavioral signal extraction
//!
//! Turns the feedback log and the completion pattern map into a small set of
//! independently gated findings, and renders them as a prompt block.
//!
//! ## Signals
//!
//! | Signal | Input | Gate |
//! |--------|-------|------|
//! | Time preference | positive engagement | >= 6 events, winning bucket >= 40% |
//! | Category affinity | all events | support >= 3, score >= 2, top 2 |
//! | Snooze hotspot | snoozes | >= 4 snoozes, hotspot >= 3 |
//! | Skip-reason hotspots | wrong-time / needs-focus skips | >= 3 of the reason, category >= 3 |
//! | Completion peak | completion map | count >= 4 |
//!
//! Every feedback-derived signal additionally requires at least
//! [`MIN_TOTAL_EVENTS`] events. The completion peak reads a different input and
//! is not subject to that gate.
//!
//! Tie-breaks are part of the contract:
//! - time preference: earliest bucket in canonical order
//! - category affinity: smallest category code
//! - snooze / skip hotspots and completion peak: greatest key

use crate::completion::CompletionPatterns;
use crate::format::format_percent;
use crate::types::{FeedbackAction, FeedbackEvent, TaskCategory, TimeBucket};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const MIN_TOTAL_EVENTS: usize = 10;
pub const MIN_POSITIVE_EVENTS: usize = 6;
/// Winning bucket share, as `TIME_SHARE_NUMERATOR / TIME_SHARE_DENOMINATOR` (40%)
const TIME_SHARE_NUMERATOR: usize = 2;
const TIME_SHARE_DENOMINATOR: usize = 5;
pub const MIN_AFFINITY_SUPPORT: usize = 3;
pub const MIN_AFFINITY_SCORE: i32 = 2;
pub const MAX_AFFINITY_ENTRIES: usize = 2;
pub const MIN_TOTAL_SNOOZES: usize = 4;
pub const MIN_SNOOZE_HOTSPOT: usize = 3;
pub const MIN_SKIP_REASON_EVENTS: usize = 3;
pub const MIN_SKIP_HOTSPOT: usize = 3;
pub const MIN_COMPLETION_COUNT: i64 = 4;

const CALIBRATION_LINE: &str = "Treat these as soft preferences: let them shift ordering by at most one or two positions, and never drop a relevant task because of them.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePreference {
    pub bucket: TimeBucket,
    /// Positive events in the winning bucket
    pub support: usize,
    /// `support / positive events`
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryAffinity {
    pub category: TaskCategory,
    pub score: i32,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnoozeHotspot {
    pub category: TaskCategory,
    pub bucket: TimeBucket,
    pub count: usize,
}

/// Skip reasons that carry a usable hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    WrongTime,
    NeedsFocus,
}

impl SkipReason {
    /// Rendering order.
    pub const ALL: [SkipReason; 2] = [SkipReason::WrongTime, SkipReason::NeedsFocus];

    pub fn action(&self) -> FeedbackAction {
        match self {
            SkipReason::WrongTime => FeedbackAction::SkippedWrongTime,
            SkipReason::NeedsFocus => FeedbackAction::SkippedNeedsFocus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReasonHotspot {
    pub reason: SkipReason,
    pub category: TaskCategory,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionPeak {
    pub category: TaskCategory,
    pub bucket: TimeBucket,
    pub count: i64,
}

/// Findings derived from feedback history and completion patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BehavioralSignals {
    pub total_events: usize,
    pub time_preference: Option<TimePreference>,
    pub category_affinity: Vec<CategoryAffinity>,
    pub snooze_hotspot: Option<SnoozeHotspot>,
    pub skip_reason_hotspots: Vec<SkipReasonHotspot>,
    pub completion_peak: Option<CompletionPeak>,
}

impl BehavioralSignals {
    /// Too little history for any finding.
    pub fn is_cold_start(&self) -> bool {
        self.total_events < MIN_TOTAL_EVENTS && self.completion_peak.is_none()
    }

    /// One bullet line per finding, in fixed order.
    pub fn signal_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(pref) = &self.time_preference {
            lines.push(format!(
                "- Most engaged in the {} ({} of starts and opens, n={})",
                pref.bucket.display_name(),
                format_percent(pref.share),
                pref.support
            ));
        }

        for affinity in &self.category_affinity {
            lines.push(format!(
                "- Responds well to {} tasks (affinity {:+}, n={})",
                affinity.category.display_name(),
                affinity.score,
                affinity.support
            ));
        }

        if let Some(hotspot) = &self.snooze_hotspot {
            lines.push(format!(
                "- Often snoozes {} tasks in the {} (n={})",
                hotspot.category.display_name(),
                hotspot.bucket.display_name(),
                hotspot.count
            ));
        }

        for reason in SkipReason::ALL {
            let Some(hotspot) = self
                .skip_reason_hotspots
                .iter()
                .find(|h| h.reason == reason)
            else {
                continue;
            };
            let line = match reason {
                SkipReason::WrongTime => format!(
                    "- Skips {} tasks as the wrong time (n={})",
                    hotspot.category.display_name(),
                    hotspot.count
                ),
                SkipReason::NeedsFocus => format!(
                    "- Skips {} tasks when they need more focus (n={})",
                    hotspot.category.display_name(),
                    hotspot.count
                ),
            };
            lines.push(line);
        }

        if let Some(peak) = &self.completion_peak {
            lines.push(format!(
                "- Usually completes {} tasks in the {} (n={})",
                peak.category.display_name(),
                peak.bucket.display_name(),
                peak.count
            ));
        }

        lines
    }

    /// Prompt block for these signals; empty on cold start or with no findings.
    pub fn to_prompt_string(&self) -> String {
        if self.is_cold_start() {
            return String::new();
        }

        let lines = self.signal_lines();
        if lines.is_empty() {
            return String::new();
        }

        let mut out = String::from("Learned behavior from recent suggestion feedback:\n");
        for line in &lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(CALIBRATION_LINE);
        out
    }
}

/// Derive signals from feedback history and completion counts.
///
/// Events with an hour outside 0-23 are ignored entirely.
pub fn extract(events: &[FeedbackEvent], completion: &CompletionPatterns) -> BehavioralSignals {
    let events: Vec<(&FeedbackEvent, TimeBucket)> = events
        .iter()
        .filter_map(|e| e.time_bucket().map(|b| (e, b)))
        .collect();

    let completion_peak = completion_peak(completion);

    if events.len() < MIN_TOTAL_EVENTS {
        tracing::debug!(
            total_events = events.len(),
            has_completion_peak = completion_peak.is_some(),
            "Not enough feedback for behavioral signals"
        );
        return BehavioralSignals {
            total_events: events.len(),
            completion_peak,
            ..Default::default()
        };
    }

    let signals = BehavioralSignals {
        total_events: events.len(),
        time_preference: time_preference(&events),
        category_affinity: category_affinity(&events),
        snooze_hotspot: snooze_hotspot(&events),
        skip_reason_hotspots: skip_reason_hotspots(&events),
        completion_peak,
    };

    tracing::debug!(
        total_events = signals.total_events,
        time_preference = signals.time_preference.is_some(),
        affinities = signals.category_affinity.len(),
        snooze_hotspot = signals.snooze_hotspot.is_some(),
        skip_hotspots = signals.skip_reason_hotspots.len(),
        completion_peak = signals.completion_peak.is_some(),
        "Extracted behavioral signals"
    );

    signals
}

fn time_preference(events: &[(&FeedbackEvent, TimeBucket)]) -> Option<TimePreference> {
    let mut counts = [0usize; 4];
    let mut positive_total = 0;
    for (event, bucket) in events {
        if event.action.is_positive_engagement() {
            counts[bucket.order_index()] += 1;
            positive_total += 1;
        }
    }

    if positive_total < MIN_POSITIVE_EVENTS {
        return None;
    }

    // Strictly greater keeps the earliest bucket on ties
    let mut best = TimeBucket::Morning;
    for bucket in TimeBucket::ALL {
        if counts[bucket.order_index()] > counts[best.order_index()] {
            best = bucket;
        }
    }
    let support = counts[best.order_index()];

    if support * TIME_SHARE_DENOMINATOR < positive_total * TIME_SHARE_NUMERATOR {
        return None;
    }

    Some(TimePreference {
        bucket: best,
        support,
        share: support as f64 / positive_total as f64,
    })
}

fn category_affinity(events: &[(&FeedbackEvent, TimeBucket)]) -> Vec<CategoryAffinity> {
    let mut tally: BTreeMap<TaskCategory, (i32, usize)> = BTreeMap::new();
    for (event, _) in events {
        let entry = tally.entry(event.task_category).or_insert((0, 0));
        entry.0 += event.action.affinity_delta();
        entry.1 += 1;
    }

    let mut affinities: Vec<CategoryAffinity> = tally
        .into_iter()
        .filter(|(_, (score, support))| {
            *support >= MIN_AFFINITY_SUPPORT && *score >= MIN_AFFINITY_SCORE
        })
        .map(|(category, (score, support))| CategoryAffinity {
            category,
            score,
            support,
        })
        .collect();

    affinities.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.support.cmp(&a.support))
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    affinities.truncate(MAX_AFFINITY_ENTRIES);
    affinities
}

fn snooze_hotspot(events: &[(&FeedbackEvent, TimeBucket)]) -> Option<SnoozeHotspot> {
    let snoozes: Vec<_> = events.iter().filter(|(e, _)| e.action.is_snooze()).collect();
    if snoozes.len() < MIN_TOTAL_SNOOZES {
        return None;
    }

    let mut groups: HashMap<(TaskCategory, TimeBucket), usize> = HashMap::new();
    for (event, bucket) in snoozes {
        *groups.entry((event.task_category, *bucket)).or_default() += 1;
    }

    let ((category, bucket), count) = groups
        .into_iter()
        .map(|(key, count)| (key, count, format!("{}_{}", key.0.as_str(), key.1.as_str())))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)))
        .map(|(key, count, _)| (key, count))?;

    (count >= MIN_SNOOZE_HOTSPOT).then_some(SnoozeHotspot {
        category,
        bucket,
        count,
    })
}

fn skip_reason_hotspots(events: &[(&FeedbackEvent, TimeBucket)]) -> Vec<SkipReasonHotspot> {
    SkipReason::ALL
        .iter()
        .filter_map(|&reason| {
            let action = reason.action();
            let mut counts: HashMap<TaskCategory, usize> = HashMap::new();
            let mut total = 0;
            for (event, _) in events {
                if event.action == action {
                    *counts.entry(event.task_category).or_default() += 1;
                    total += 1;
                }
            }

            if total < MIN_SKIP_REASON_EVENTS {
                return None;
            }

            let (category, count) = counts.into_iter().max_by(|a, b| {
                a.1.cmp(&b.1)
                    .then_with(|| a.0.as_str().cmp(b.0.as_str()))
            })?;

            (count >= MIN_SKIP_HOTSPOT).then_some(SkipReasonHotspot {
                reason,
                category,
                count,
            })
        })
        .collect()
}

fn completion_peak(completion: &CompletionPatterns) -> Option<CompletionPeak> {
    completion
        .entries()
        .iter()
        .filter(|entry| entry.count >= MIN_COMPLETION_COUNT)
        .map(|entry| CompletionPeak {
            category: entry.key.category,
            bucket: entry.key.bucket(),
            count: entry.count,
        })
        .max_by(|a, b| {
            a.count
                .cmp(&b.count)
                .then_with(|| a.category.as_str().cmp(b.category.as_str()))
                .then_with(|| a.bucket.order_index().cmp(&b.bucket.order_index()))
        })
}
