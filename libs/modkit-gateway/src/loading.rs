//! Reference-counted loading indicator.
//!
//! Many requests can ask for the overlay at once; the UI sees exactly one
//! `show_loading` on the 0→1 transition and one `hide_loading` on 1→0.
//!
//! The count and the UI call change together under one lock, so the UI sees
//! show/hide strictly alternating even when requests finish on different
//! threads. [`Ui`] implementations must not call back into the counter.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::ui::Ui;

/// Shared counter guarding the single loading overlay.
pub struct LoadingCounter {
    count: Mutex<usize>,
    ui: Arc<dyn Ui>,
}

impl LoadingCounter {
    #[must_use]
    pub fn new(ui: Arc<dyn Ui>) -> Self {
        Self {
            count: Mutex::new(0),
            ui,
        }
    }

    /// Register one more request wanting the overlay.
    pub fn acquire(&self, message: &str) {
        let mut count = self.count.lock();
        *count += 1;
        if *count == 1 {
            self.ui.show_loading(message);
        }
    }

    /// Drop one registration. No-op when nothing is registered.
    pub fn release(&self) {
        let mut count = self.count.lock();
        match *count {
            0 => tracing::trace!("loading release without matching acquire ignored"),
            1 => {
                *count = 0;
                self.ui.hide_loading();
            }
            _ => *count -= 1,
        }
    }

    /// Number of requests currently holding the overlay.
    #[must_use]
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Acquire and return a guard that releases on drop.
    #[must_use]
    pub fn guard(self: &Arc<Self>, message: &str) -> LoadingGuard {
        self.acquire(message);
        LoadingGuard {
            counter: Arc::clone(self),
        }
    }
}

impl std::fmt::Debug for LoadingCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadingCounter")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

/// One acquired slot of the loading overlay, released exactly once on drop.
#[must_use = "dropping the guard releases the loading indicator immediately"]
#[derive(Debug)]
pub struct LoadingGuard {
    counter: Arc<LoadingCounter>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.counter.release();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{RecordingUi, UiEvent};

    #[test]
    fn overlapping_requests_show_and_hide_once() {
        let ui = Arc::new(RecordingUi::default());
        let counter = Arc::new(LoadingCounter::new(ui.clone()));

        let a = counter.guard("Loading");
        let b = counter.guard("Loading");
        let c = counter.guard("Loading");
        assert_eq!(counter.count(), 3);

        drop(b);
        drop(a);
        assert_eq!(ui.count(|e| matches!(e, UiEvent::HideLoading)), 0);
        drop(c);

        assert_eq!(ui.count(|e| matches!(e, UiEvent::ShowLoading(_))), 1);
        assert_eq!(ui.count(|e| matches!(e, UiEvent::HideLoading)), 1);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn show_and_hide_alternate_across_threads() {
        let ui = Arc::new(RecordingUi::default());
        let counter = Arc::new(LoadingCounter::new(ui.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let guard = counter.guard("Loading");
                        std::thread::yield_now();
                        drop(guard);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = ui.events();
        assert_eq!(counter.count(), 0);
        assert_eq!(events.last(), Some(&UiEvent::HideLoading));
        for pair in events.chunks(2) {
            assert!(matches!(pair, [UiEvent::ShowLoading(_), UiEvent::HideLoading]), "{pair:?}");
        }
    }

    #[test]
    fn release_below_zero_is_noop() {
        let ui = Arc::new(RecordingUi::default());
        let counter = LoadingCounter::new(ui.clone());

        counter.release();
        assert_eq!(counter.count(), 0);
        assert!(ui.events().is_empty());
    }

    #[test]
    fn show_uses_first_requests_message() {
        let ui = Arc::new(RecordingUi::default());
        let counter = LoadingCounter::new(ui.clone());

        counter.acquire("Submitting order");
        counter.acquire("Refreshing cart");
        counter.release();
        counter.release();
        counter.acquire("Again");

        assert_eq!(
            ui.events(),
            vec![
                UiEvent::ShowLoading("Submitting order".into()),
                UiEvent::HideLoading,
                UiEvent::ShowLoading("Again".into()),
            ]
        );
    }
}
