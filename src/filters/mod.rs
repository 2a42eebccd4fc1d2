use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::events::NormalizedEvent;

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "1d")]
    OneDay,
    #[default]
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "all")]
    All,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::OneDay,
        TimeWindow::SevenDays,
        TimeWindow::ThirtyDays,
        TimeWindow::All,
    ];

    /// Window length in milliseconds, `None` for all-time.
    pub fn window_ms(self) -> Option<u64> {
        match self {
            TimeWindow::OneDay => Some(DAY_MS),
            TimeWindow::SevenDays => Some(7 * DAY_MS),
            TimeWindow::ThirtyDays => Some(30 * DAY_MS),
            TimeWindow::All => None,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            TimeWindow::OneDay => "1d",
            TimeWindow::SevenDays => "7d",
            TimeWindow::ThirtyDays => "30d",
            TimeWindow::All => "all",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeWindow::OneDay => "1 Day",
            TimeWindow::SevenDays => "7 Days",
            TimeWindow::ThirtyDays => "30 Days",
            TimeWindow::All => "All Time",
        }
    }

    pub fn next(self) -> Self {
        match self {
            TimeWindow::OneDay => TimeWindow::SevenDays,
            TimeWindow::SevenDays => TimeWindow::ThirtyDays,
            TimeWindow::ThirtyDays => TimeWindow::All,
            TimeWindow::All => TimeWindow::OneDay,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeWindow::ALL
            .into_iter()
            .find(|w| w.token() == s)
            .ok_or_else(|| format!("unknown window '{}', expected one of 1d, 7d, 30d, all", s))
    }
}

pub trait EventFilter: Send + Sync + Debug {
    fn keep(&self, event: &NormalizedEvent) -> bool;
}

/// Drops events emitted from blacklisted addresses (case-insensitive).
#[derive(Debug)]
pub struct Blacklist {
    addresses: HashSet<String>,
}

impl Blacklist {
    pub fn new(addresses: &[String]) -> Self {
        Self {
            addresses: addresses.iter().map(|a| a.to_lowercase()).collect(),
        }
    }
}

impl EventFilter for Blacklist {
    fn keep(&self, event: &NormalizedEvent) -> bool {
        match &event.address {
            Some(address) => !self.addresses.contains(&address.to_lowercase()),
            None => true,
        }
    }
}

/// Keeps events with `now - timestamp <= window`. Boundary inclusive.
#[derive(Debug)]
pub struct WindowFilter {
    window_ms: u64,
    now_ms: u64,
}

impl WindowFilter {
    pub fn new(window: TimeWindow, now_ms: u64) -> Option<Self> {
        window.window_ms().map(|window_ms| Self { window_ms, now_ms })
    }
}

impl EventFilter for WindowFilter {
    fn keep(&self, event: &NormalizedEvent) -> bool {
        self.now_ms.saturating_sub(event.timestamp_ms) <= self.window_ms
    }
}

fn retain(events: &[NormalizedEvent], filter: &dyn EventFilter) -> Vec<NormalizedEvent> {
    events.iter().filter(|e| filter.keep(e)).cloned().collect()
}

pub fn apply_blacklist(
    events: &[NormalizedEvent],
    blacklist: &[String],
    enabled: bool,
) -> Vec<NormalizedEvent> {
    if !enabled || blacklist.is_empty() {
        return events.to_vec();
    }
    retain(events, &Blacklist::new(blacklist))
}

pub fn apply_time_window(
    events: &[NormalizedEvent],
    window: TimeWindow,
    now_ms: u64,
) -> Vec<NormalizedEvent> {
    match WindowFilter::new(window, now_ms) {
        Some(filter) => retain(events, &filter),
        None => events.to_vec(),
    }
}
