//! A `Once`-guarded cell carrying either a producer closure or its cached
//! result. Cloning a [`LazyRaster`] shares the cell, so a pipeline of
//! `RasterData` transformations materializes its source raster at most once
//! no matter how many downstream operations are chained or cloned.

use std::sync::{Arc, Mutex, OnceLock};

use crate::raster::Raster;

enum State {
    Pending(Box<dyn FnOnce() -> Raster + Send>),
    Taken,
}

struct Inner {
    cached: OnceLock<Raster>,
    producer: Mutex<State>,
}

#[derive(Clone)]
pub struct LazyRaster {
    inner: Arc<Inner>,
}

impl LazyRaster {
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce() -> Raster + Send + 'static,
    {
        LazyRaster {
            inner: Arc::new(Inner {
                cached: OnceLock::new(),
                producer: Mutex::new(State::Pending(Box::new(producer))),
            }),
        }
    }

    pub fn ready(raster: Raster) -> Self {
        let lazy = LazyRaster::new(|| unreachable!("ready() never runs its producer"));
        let _ = lazy.inner.cached.set(raster);
        lazy
    }

    /// Compute (once) and return a clone of the cached raster.
    pub fn get(&self) -> Raster {
        if let Some(r) = self.inner.cached.get() {
            return r.clone();
        }
        let mut guard = self.inner.producer.lock().expect("lazy raster producer lock poisoned");
        if let Some(r) = self.inner.cached.get() {
            return r.clone();
        }
        let state = std::mem::replace(&mut *guard, State::Taken);
        let raster = match state {
            State::Pending(f) => f(),
            State::Taken => {
                drop(guard);
                // Another thread is computing it right now; block on the cell.
                return self
                    .inner
                    .cached
                    .get()
                    .cloned()
                    .unwrap_or_else(|| unreachable!("producer taken without caching a result"));
            }
        };
        let _ = self.inner.cached.set(raster.clone());
        raster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetql_parser::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn producer_runs_at_most_once_across_clones() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let lazy = LazyRaster::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Raster::new(vec![], vec![vec![Value::Int(1)]])
        });
        let clone_a = lazy.clone();
        let clone_b = lazy.clone();
        let _ = clone_a.get();
        let _ = clone_b.get();
        let _ = lazy.get();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
