use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in seconds
pub type Timestamp = u64;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to
///
/// Clones share the same underlying time.
#[derive(Default, Clone, Debug)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Wraps a clock so that observed time never goes backwards
pub(crate) struct MonotonicClock {
    inner: Arc<dyn Clock>,
    high_water: AtomicU64,
}

impl MonotonicClock {
    pub(crate) fn new(inner: Arc<dyn Clock>) -> Self {
        MonotonicClock {
            inner,
            high_water: AtomicU64::new(0),
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        let observed = self.inner.now();
        let previous = self.high_water.fetch_max(observed, Ordering::SeqCst);
        previous.max(observed)
    }
}
