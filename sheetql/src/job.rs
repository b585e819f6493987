//! Cooperative cancellation and progress reporting, shared by every
//! long-running producer (stream sources, SQL execution, `Future`
//! producers).
//!
//! Progress reports are delivered through a notification callback that
//! stands in for the UI/main-loop channel described in §5: producers run on
//! background threads, but every user-visible callback is expected to be
//! marshaled onto that channel by its caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type ProgressDelegate = dyn Fn(f64) + Send + Sync;

#[derive(Clone)]
pub struct Job {
    cancelled: Arc<AtomicBool>,
    components: Arc<Mutex<HashMap<String, f64>>>,
    delegate: Option<Arc<ProgressDelegate>>,
}

impl Job {
    pub fn new() -> Self {
        Job {
            cancelled: Arc::new(AtomicBool::new(false)),
            components: Arc::new(Mutex::new(HashMap::new())),
            delegate: None,
        }
    }

    pub fn with_progress_delegate<F>(delegate: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        Job {
            delegate: Some(Arc::new(delegate)),
            ..Job::new()
        }
    }

    /// Cooperative: producers must poll this between batches and stop
    /// delivering rows once it is set. Idempotent and thread-safe.
    pub fn cancel(&self) {
        log::debug!("job cancelled");
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Records `progress` for the named component, clamped to `[0, 1]`;
    /// out-of-range values are clamped rather than rejected. Notifies the
    /// delegate, if any, with the new overall [`Job::progress`].
    pub fn report_progress(&self, progress: f64, for_key: &str) {
        let clamped = progress.clamp(0.0, 1.0);
        let overall = {
            let mut components = self.components.lock().expect("job progress lock poisoned");
            components.insert(for_key.to_string(), clamped);
            Self::mean(&components)
        };
        if let Some(delegate) = &self.delegate {
            delegate(overall);
        }
    }

    /// Arithmetic mean of all reported components; `0.0` when none have
    /// been reported yet.
    pub fn progress(&self) -> f64 {
        let components = self.components.lock().expect("job progress lock poisoned");
        Self::mean(&components)
    }

    fn mean(components: &HashMap<String, f64>) -> f64 {
        if components.is_empty() {
            0.0
        } else {
            components.values().sum::<f64>() / components.len() as f64
        }
    }
}

impl Default for Job {
    fn default() -> Self {
        Job::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn progress_is_mean_of_components() {
        let job = Job::new();
        job.report_progress(0.2, "a");
        job.report_progress(0.8, "b");
        assert!((job.progress() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let job = Job::new();
        job.report_progress(5.0, "a");
        assert_eq!(job.progress(), 1.0);
        job.report_progress(-5.0, "a");
        assert_eq!(job.progress(), 0.0);
    }

    #[test]
    fn cancel_is_idempotent_and_observable() {
        let job = Job::new();
        assert!(!job.cancelled());
        job.cancel();
        job.cancel();
        assert!(job.cancelled());
    }

    #[test]
    fn delegate_is_notified_on_report() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let job = Job::with_progress_delegate(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        job.report_progress(0.5, "x");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
