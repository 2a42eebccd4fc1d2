use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::DashboardError;
use crate::events::NormalizedEvent;
use crate::filters::TimeWindow;
use crate::metrics::ViewSelection;

/// One completed fetch, normalized. Replaced wholesale by the next load.
#[derive(Debug, Clone, Default)]
pub struct LoadedEvents {
    pub events: Vec<NormalizedEvent>,
    pub end_block: u64,
}

#[derive(Debug, Clone)]
pub enum LoadState {
    Loading,
    Failed(String),
    Ready(Arc<LoadedEvents>),
}

#[derive(Debug)]
pub struct AppState {
    generation: AtomicU64,
    closed: AtomicBool,
    load: Mutex<LoadState>,
    window: Mutex<TimeWindow>,
    blacklist: Vec<String>,
    blacklist_enabled: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AppState {
    pub fn new(window: TimeWindow, blacklist: Vec<String>, blacklist_enabled: bool) -> Self {
        Self {
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            load: Mutex::new(LoadState::Loading),
            window: Mutex::new(window),
            blacklist,
            blacklist_enabled: AtomicBool::new(blacklist_enabled),
        }
    }

    /// Starts a new load and returns its generation. Any load still in
    /// flight becomes stale.
    pub fn begin_load(&self) -> u64 {
        let mut slot = lock(&self.load);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = LoadState::Loading;
        generation
    }

    /// Applies a load result unless it is stale or the view has closed.
    /// Returns whether it was applied.
    pub fn finish_load(
        &self,
        generation: u64,
        result: Result<LoadedEvents, DashboardError>,
    ) -> bool {
        let mut slot = lock(&self.load);
        let stale = generation != self.generation.load(Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) || stale {
            debug!("Discarding result of load {}", generation);
            return false;
        }
        *slot = match result {
            Ok(loaded) => LoadState::Ready(Arc::new(loaded)),
            Err(e) => {
                warn!("Load {} failed: {}", generation, e);
                LoadState::Failed(e.to_string())
            }
        };
        true
    }

    /// Terminal failure, e.g. an interface that could not be parsed.
    pub fn fail(&self, error: &DashboardError) {
        *lock(&self.load) = LoadState::Failed(error.to_string());
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn load_state(&self) -> LoadState {
        lock(&self.load).clone()
    }

    pub fn window(&self) -> TimeWindow {
        *lock(&self.window)
    }

    pub fn set_window(&self, window: TimeWindow) {
        *lock(&self.window) = window;
    }

    pub fn cycle_window(&self) -> TimeWindow {
        let mut window = lock(&self.window);
        *window = window.next();
        *window
    }

    pub fn blacklist_enabled(&self) -> bool {
        self.blacklist_enabled.load(Ordering::Relaxed)
    }

    pub fn toggle_blacklist(&self) -> bool {
        !self.blacklist_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn selection(&self) -> ViewSelection {
        ViewSelection {
            window: self.window(),
            blacklist: self.blacklist.clone(),
            blacklist_enabled: self.blacklist_enabled() && !self.blacklist.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;

    fn loaded(end_block: u64) -> LoadedEvents {
        LoadedEvents {
            events: Vec::new(),
            end_block,
        }
    }

    #[test]
    fn current_load_is_applied() {
        let state = AppState::new(TimeWindow::default(), Vec::new(), true);
        let generation = state.begin_load();
        assert!(matches!(state.load_state(), LoadState::Loading));

        assert!(state.finish_load(generation, Ok(loaded(7))));
        match state.load_state() {
            LoadState::Ready(l) => assert_eq!(l.end_block, 7),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[test]
    fn stale_load_is_discarded() {
        let state = AppState::new(TimeWindow::default(), Vec::new(), true);
        let first = state.begin_load();
        let second = state.begin_load();

        assert!(!state.finish_load(first, Ok(loaded(1))));
        assert!(matches!(state.load_state(), LoadState::Loading));
        assert!(state.finish_load(second, Ok(loaded(2))));
    }

    #[test]
    fn closed_view_discards_in_flight_result() {
        let state = AppState::new(TimeWindow::default(), Vec::new(), true);
        let generation = state.begin_load();
        state.close();
        assert!(!state.finish_load(generation, Ok(loaded(1))));
    }

    #[test]
    fn failure_replaces_previous_data() {
        let state = AppState::new(TimeWindow::default(), Vec::new(), true);
        let generation = state.begin_load();
        state.finish_load(generation, Ok(loaded(1)));

        let generation = state.begin_load();
        state.finish_load(generation, Err(DashboardError::Fetch(FetchError::MissingLogs)));
        match state.load_state() {
            LoadState::Failed(message) => assert_eq!(message, "Failed to fetch logs."),
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[test]
    fn empty_blacklist_behaves_as_disabled() {
        let state = AppState::new(TimeWindow::OneDay, Vec::new(), true);
        assert!(!state.selection().blacklist_enabled);

        let state = AppState::new(TimeWindow::OneDay, vec!["0x01".into()], true);
        assert!(state.selection().blacklist_enabled);
        assert!(!state.toggle_blacklist());
        assert!(!state.selection().blacklist_enabled);
        assert!(state.toggle_blacklist());
    }

    #[test]
    fn window_cycles() {
        let state = AppState::new(TimeWindow::All, Vec::new(), false);
        assert_eq!(state.cycle_window(), TimeWindow::OneDay);
        state.set_window(TimeWindow::ThirtyDays);
        assert_eq!(state.window(), TimeWindow::ThirtyDays);
    }
}
