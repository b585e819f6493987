//! A memoizing, cancellable future: many callers can [`Future::get`] the
//! same value, the producer runs at most once, and late joiners after
//! satisfaction receive the cached value immediately.
//!
//! Unlike [`crate::lazy::LazyRaster`] (which is purely synchronous), a
//! `Future` runs its producer on a background thread and delivers results
//! through callbacks, modeling the "background pool + UI channel" split
//! described in §5: `get` returns right away with a [`Job`] the caller can
//! poll or cancel, and the callback fires later from whichever thread
//! produced the value.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::job::Job;

/// Delivered to a single waiter, exactly once.
pub type Callback<T> = Box<dyn FnOnce(T) + Send>;

/// Handed to the producer; calling it hands the value to every current and
/// future waiter.
pub type Satisfy<T> = Arc<dyn Fn(T) + Send + Sync>;

type ProducerFn<T> = dyn Fn(Job, Satisfy<T>) + Send + Sync;

enum BatchState<T> {
    Waiting(Vec<Callback<T>>),
    Satisfied(T),
    Cancelled,
}

/// The single in-flight (or completed) production behind a `Future`.
pub struct Batch<T> {
    job: Job,
    state: Mutex<BatchState<T>>,
}

impl<T: Clone> Batch<T> {
    fn new() -> Self {
        Batch {
            job: Job::new(),
            state: Mutex::new(BatchState::Waiting(Vec::new())),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Enqueues `cb`. Delivers the cached value immediately if this batch
    /// already satisfied; panics if it was cancelled.
    fn enqueue(&self, cb: Callback<T>) {
        let mut state = self.state.lock().expect("batch lock poisoned");
        match &mut *state {
            BatchState::Waiting(waiters) => waiters.push(cb),
            BatchState::Satisfied(value) => {
                let value = value.clone();
                drop(state);
                cb(value);
            }
            BatchState::Cancelled => panic!("enqueued on a cancelled batch"),
        }
    }

    /// Delivers `value` to every waiter enqueued so far and caches it for
    /// later joiners. Calling this more than once is a contract violation.
    fn satisfy(&self, value: T) {
        let waiters = {
            let mut state = self.state.lock().expect("batch lock poisoned");
            match &*state {
                BatchState::Satisfied(_) => panic!("batch satisfied more than once"),
                BatchState::Cancelled => return,
                BatchState::Waiting(_) => {
                    let waiters = match std::mem::replace(&mut *state, BatchState::Satisfied(value.clone())) {
                        BatchState::Waiting(w) => w,
                        _ => unreachable!(),
                    };
                    waiters
                }
            }
        };
        for cb in waiters {
            cb(value.clone());
        }
    }

    /// Drops all waiters without calling them and flips the job's
    /// cancellation flag. A cancelled batch never accepts new waiters.
    fn cancel(&self) {
        self.job.cancel();
        let mut state = self.state.lock().expect("batch lock poisoned");
        *state = BatchState::Cancelled;
    }

    /// Flips the job's cancellation flag as a hint for the producer to wrap
    /// up, but leaves existing waiters in place — a producer that finishes
    /// anyway still delivers its value to them.
    fn expire(&self) {
        self.job.cancel();
    }
}

/// Holds a producer closure and, once [`Future::get`] is first called, the
/// single [`Batch`] that serves every caller for the rest of this
/// `Future`'s life.
pub struct Future<T> {
    producer: Arc<ProducerFn<T>>,
    time_limit: Option<Duration>,
    active: Mutex<Option<Arc<Batch<T>>>>,
}

impl<T: Clone + Send + 'static> Future<T> {
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn(Job, Satisfy<T>) + Send + Sync + 'static,
    {
        Future {
            producer: Arc::new(producer),
            time_limit: None,
            active: Mutex::new(None),
        }
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Enqueues `cb` for the value, starting production if this is the
    /// first call. Returns the [`Job`] governing this future's (one and
    /// only) batch, which the caller may poll or cancel.
    pub fn get(&self, cb: Callback<T>) -> Job {
        let mut active = self.active.lock().expect("future lock poisoned");
        if let Some(batch) = active.as_ref() {
            batch.enqueue(cb);
            return batch.job().clone();
        }

        let batch = Arc::new(Batch::new());
        batch.enqueue(cb);
        *active = Some(batch.clone());
        drop(active);

        let job = batch.job().clone();
        let producer = self.producer.clone();
        let producer_batch = batch.clone();
        let producer_job = job.clone();
        std::thread::spawn(move || {
            let satisfy: Satisfy<T> = {
                let batch = producer_batch;
                Arc::new(move |value: T| batch.satisfy(value))
            };
            (producer)(producer_job, satisfy);
        });

        if let Some(limit) = self.time_limit {
            let timer_batch = batch.clone();
            std::thread::spawn(move || {
                std::thread::sleep(limit);
                timer_batch.expire();
            });
        }

        job
    }

    /// Cancels the active batch, if any, dropping its waiters without
    /// calling them. A no-op if `get` has never been called.
    pub fn cancel(&self) {
        if let Some(batch) = self.active.lock().expect("future lock poisoned").as_ref() {
            batch.cancel();
        }
    }

    /// Flips the job's cancellation flag as a hint, but leaves waiters in
    /// place — a producer that satisfies anyway still delivers to them. A
    /// no-op if `get` has never been called.
    pub fn expire(&self) {
        if let Some(batch) = self.active.lock().expect("future lock poisoned").as_ref() {
            batch.expire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn satisfy_delivers_to_every_waiter_and_caches() {
        let batch: Batch<i64> = Batch::new();
        let (tx1, rx1) = mpsc::channel();
        let (tx2, rx2) = mpsc::channel();
        batch.enqueue(Box::new(move |v| tx1.send(v).unwrap()));
        batch.enqueue(Box::new(move |v| tx2.send(v).unwrap()));
        batch.satisfy(7);
        assert_eq!(rx1.recv().unwrap(), 7);
        assert_eq!(rx2.recv().unwrap(), 7);

        let (tx3, rx3) = mpsc::channel();
        batch.enqueue(Box::new(move |v| tx3.send(v).unwrap()));
        assert_eq!(rx3.recv().unwrap(), 7);
    }

    #[test]
    fn double_satisfy_is_a_contract_violation() {
        let batch: Batch<i64> = Batch::new();
        batch.satisfy(1);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batch.satisfy(2);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn cancel_drops_waiters_without_calling_them() {
        let batch: Batch<i64> = Batch::new();
        let delivered = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let delivered2 = delivered.clone();
        batch.enqueue(Box::new(move |_| {
            delivered2.store(true, std::sync::atomic::Ordering::SeqCst);
        }));
        batch.cancel();
        assert!(batch.job().cancelled());
        assert!(!delivered.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn enqueue_on_cancelled_batch_panics() {
        let batch: Batch<i64> = Batch::new();
        batch.cancel();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            batch.enqueue(Box::new(|_| {}));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn future_runs_producer_once_for_many_waiters() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let calls2 = calls.clone();
        let future = Future::new(move |_job, satisfy| {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            satisfy(42);
        });

        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        future.get(Box::new(move |v| tx.send(v).unwrap()));
        future.get(Box::new(move |v| tx2.send(v).unwrap()));

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelling_the_job_alone_still_delivers_a_late_value() {
        let future: Arc<Future<i64>> = Arc::new(Future::new(|job, satisfy| {
            std::thread::sleep(Duration::from_millis(50));
            if !job.cancelled() {
                return;
            }
            satisfy(99);
        }));
        let (tx, rx) = mpsc::channel();
        let job = future.get(Box::new(move |v| tx.send(v).unwrap()));
        std::thread::sleep(Duration::from_millis(10));
        job.cancel();
        let value = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(value, 99);
    }

    #[test]
    fn time_limit_expires_the_job_on_its_own() {
        let future = Future::new(|job, satisfy| {
            while !job.cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            satisfy(1);
        })
        .with_time_limit(Duration::from_millis(20));

        let (tx, rx) = mpsc::channel();
        future.get(Box::new(move |v| tx.send(v).unwrap()));
        let value = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn manual_expire_still_delivers_a_late_value() {
        let future = Future::new(|job, satisfy| {
            while !job.cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            satisfy(7);
        });

        let (tx, rx) = mpsc::channel();
        future.get(Box::new(move |v| tx.send(v).unwrap()));
        std::thread::sleep(Duration::from_millis(10));
        future.expire();
        let value = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(value, 7);
    }
}
