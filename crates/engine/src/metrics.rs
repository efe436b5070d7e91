use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-operation counters since the engine was opened.
///
/// Counters are atomic because reads go through `&self`. An operation is
/// counted once it passes argument checks, whether or not it later fails.
#[derive(Debug)]
pub(crate) struct OpMetrics {
    puts: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
    opened_at: Instant,
}

/// A copy of [`OpMetrics`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpCounts {
    pub puts: u64,
    pub gets: u64,
    pub deletes: u64,
}

impl OpCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.puts + self.gets + self.deletes
    }
}

impl OpMetrics {
    pub(crate) fn new() -> Self {
        Self {
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            opened_at: Instant::now(),
        }
    }

    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn counts(&self) -> OpCounts {
        OpCounts {
            puts: self.puts.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.opened_at.elapsed()
    }
}
