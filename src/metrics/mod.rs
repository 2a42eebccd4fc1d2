//! Per-type counts, per-day series, and the assembled dashboard view.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::events::NormalizedEvent;
use crate::filters::{apply_blacklist, apply_time_window, TimeWindow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventTypeCount {
    #[serde(rename = "type")]
    pub event_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: String,
    pub counts: IndexMap<String, u64>,
}

/// UTC calendar date of a millisecond timestamp.
pub fn day_key(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// Counts by event name, highest first. Ties keep first-seen order.
pub fn count_by_type(events: &[NormalizedEvent]) -> Vec<EventTypeCount> {
    let mut counts: IndexMap<&str, u64> = IndexMap::new();
    for event in events {
        *counts.entry(event.event_name.as_str()).or_insert(0) += 1;
    }

    let mut out: Vec<EventTypeCount> = counts
        .into_iter()
        .map(|(event_type, count)| EventTypeCount {
            event_type: event_type.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// One bucket per UTC day that has events, ascending. Every type in
/// `ordered_types` is present in each bucket, zero-filled.
pub fn build_daily_series(events: &[NormalizedEvent], ordered_types: &[String]) -> Vec<DayBucket> {
    if events.is_empty() || ordered_types.is_empty() {
        return Vec::new();
    }

    let mut days: BTreeMap<String, IndexMap<String, u64>> = BTreeMap::new();
    for event in events {
        let counts = days.entry(day_key(event.timestamp_ms)).or_insert_with(|| {
            ordered_types.iter().map(|t| (t.clone(), 0)).collect()
        });
        *counts.entry(event.event_name.clone()).or_insert(0) += 1;
    }

    days.into_iter()
        .map(|(date, counts)| DayBucket { date, counts })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSelection {
    pub window: TimeWindow,
    pub blacklist: Vec<String>,
    pub blacklist_enabled: bool,
}

/// Everything the dashboard draws for one selection, recomputed from scratch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub window: TimeWindow,
    pub total: usize,
    pub counts: Vec<EventTypeCount>,
    pub series: Vec<DayBucket>,
    /// Filtered events, newest first.
    pub events: Vec<NormalizedEvent>,
}

impl Snapshot {
    pub fn compute(events: &[NormalizedEvent], selection: &ViewSelection, now_ms: u64) -> Self {
        let allowed = apply_blacklist(events, &selection.blacklist, selection.blacklist_enabled);
        let mut filtered = apply_time_window(&allowed, selection.window, now_ms);

        let counts = count_by_type(&filtered);
        let ordered_types: Vec<String> = counts.iter().map(|c| c.event_type.clone()).collect();
        let series = build_daily_series(&filtered, &ordered_types);
        filtered.reverse();

        Self {
            window: selection.window,
            total: filtered.len(),
            counts,
            series,
            events: filtered,
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.counts.iter().map(|c| c.event_type.as_str())
    }
}
