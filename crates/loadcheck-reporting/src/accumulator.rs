use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Folds values reported by many worker threads into a single result.
///
/// `add` must be commutative and associative so the result does not depend on interleaving.
/// `reset` starts a new reporting period.
pub trait Accumulator<T>: Send + Sync {
    fn add(&self, value: T);
    fn result(&self) -> T;
    fn reset(&self);
}

/// An `f64` stored as its bit pattern in an [`AtomicU64`].
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Compare-and-swap loop; `f` returns `None` to leave the value untouched.
    fn update(&self, mut f: impl FnMut(f64) -> Option<f64>) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                f(f64::from_bits(bits)).map(f64::to_bits)
            });
    }
}

/// Sum of all reported values. Lock-free.
#[derive(Debug)]
pub struct SumAccumulator {
    sum: AtomicF64,
}

impl SumAccumulator {
    pub fn new() -> Self {
        Self {
            sum: AtomicF64::new(0.0),
        }
    }
}

impl Default for SumAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator<f64> for SumAccumulator {
    fn add(&self, value: f64) {
        self.sum.update(|sum| Some(sum + value));
    }

    fn result(&self) -> f64 {
        self.sum.load()
    }

    fn reset(&self) {
        self.sum.store(0.0);
    }
}

/// Smallest reported value; `+inf` until something is added. `NaN` values are ignored.
#[derive(Debug)]
pub struct MinAccumulator {
    min: AtomicF64,
}

impl MinAccumulator {
    pub fn new() -> Self {
        Self {
            min: AtomicF64::new(f64::INFINITY),
        }
    }
}

impl Default for MinAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator<f64> for MinAccumulator {
    fn add(&self, value: f64) {
        self.min
            .update(|current| (value < current).then_some(value));
    }

    fn result(&self) -> f64 {
        self.min.load()
    }

    fn reset(&self) {
        self.min.store(f64::INFINITY);
    }
}

/// Largest reported value; `-inf` until something is added. `NaN` values are ignored.
#[derive(Debug)]
pub struct MaxAccumulator {
    max: AtomicF64,
}

impl MaxAccumulator {
    pub fn new() -> Self {
        Self {
            max: AtomicF64::new(f64::NEG_INFINITY),
        }
    }
}

impl Default for MaxAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator<f64> for MaxAccumulator {
    fn add(&self, value: f64) {
        self.max
            .update(|current| (value > current).then_some(value));
    }

    fn result(&self) -> f64 {
        self.max.load()
    }

    fn reset(&self) {
        self.max.store(f64::NEG_INFINITY);
    }
}

/// Arithmetic mean of reported values; `0.0` when nothing was reported.
///
/// Sum and count have to move together, so they share one short critical section.
#[derive(Debug, Default)]
pub struct AvgAccumulator {
    inner: Mutex<AvgState>,
}

#[derive(Debug, Default)]
struct AvgState {
    sum: f64,
    count: u64,
}

impl AvgAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }
}

impl Accumulator<f64> for AvgAccumulator {
    fn add(&self, value: f64) {
        let mut inner = self.inner.lock();
        inner.sum += value;
        inner.count = inner.count.saturating_add(1);
    }

    fn result(&self) -> f64 {
        let inner = self.inner.lock();
        if inner.count == 0 {
            0.0
        } else {
            inner.sum / inner.count as f64
        }
    }

    fn reset(&self) {
        *self.inner.lock() = AvgState::default();
    }
}
