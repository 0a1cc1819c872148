//! Progress accounting for one restore
//!
//! Section tasks and the manga loop all report through one [`RestoreProgress`],
//! which serializes increments so observers see `completed` rise by exactly
//! one per report.

use crate::errors::{BackupResult, SafeLock};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Final report of a restore that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub elapsed: Duration,
    pub error_count: usize,
    pub error_log: Option<PathBuf>,
    pub completed: usize,
    pub total: usize,
}

/// Receives progress from a running restore.
pub trait RestoreObserver: Send + Sync {
    /// Called after every completed unit: one section or one manga entry.
    fn on_progress(&self, label: &str, completed: usize, total: usize);

    /// Called once when a restore finishes without a fatal error or cancellation.
    fn on_complete(&self, _report: &RestoreReport) {}
}

/// Observer that logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RestoreObserver for TracingObserver {
    fn on_progress(&self, label: &str, completed: usize, total: usize) {
        tracing::info!(completed, total, "restored {label}");
    }

    fn on_complete(&self, report: &RestoreReport) {
        tracing::info!(
            elapsed_ms = report.elapsed.as_millis() as u64,
            errors = report.error_count,
            log = ?report.error_log,
            "restore complete"
        );
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub completed: usize,
    pub total: usize,
}

/// Shared progress counter.
pub struct RestoreProgress {
    state: Mutex<ProgressState>,
    observer: Arc<dyn RestoreObserver>,
}

impl RestoreProgress {
    pub fn new(total: usize, observer: Arc<dyn RestoreObserver>) -> Self {
        Self {
            state: Mutex::new(ProgressState { completed: 0, total }),
            observer,
        }
    }

    /// Count one finished unit and tell the observer.
    ///
    /// The observer is called while the counter is held so reports arrive in
    /// increment order.
    pub fn increment_and_report(&self, label: &str) -> BackupResult<ProgressState> {
        let mut state = self.state.safe_lock()?;
        if state.completed < state.total {
            state.completed += 1;
        } else {
            tracing::warn!(label, total = state.total, "progress already at total");
        }
        self.observer.on_progress(label, state.completed, state.total);
        Ok(*state)
    }

    pub fn snapshot(&self) -> ProgressState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, usize, usize)>>);

    impl RestoreObserver for Collect {
        fn on_progress(&self, label: &str, completed: usize, total: usize) {
            self.0.lock().unwrap().push((label.to_string(), completed, total));
        }
    }

    #[test]
    fn increments_are_reported_in_order() {
        let observer = Arc::new(Collect::default());
        let progress = RestoreProgress::new(2, observer.clone());

        progress.increment_and_report("Categories").unwrap();
        progress.increment_and_report("App settings").unwrap();

        let seen = observer.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![("Categories".to_string(), 1, 2), ("App settings".to_string(), 2, 2)]
        );
    }

    #[test]
    fn completed_never_passes_total() {
        let progress = RestoreProgress::new(1, Arc::new(TracingObserver));
        progress.increment_and_report("a").unwrap();
        let state = progress.increment_and_report("b").unwrap();
        assert_eq!(state, ProgressState { completed: 1, total: 1 });
    }

    #[test]
    fn concurrent_increments_are_all_counted() {
        let progress = Arc::new(RestoreProgress::new(400, Arc::new(Collect::default())));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let progress = Arc::clone(&progress);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        progress.increment_and_report("entry").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.snapshot().completed, 400);
    }
}
