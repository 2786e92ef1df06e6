//! Global atomic counters for DragonArt observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. when a command finishes).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Atomic counters, no allocation and no locking.
pub struct Metrics {
    artifacts_generated: AtomicU64,
    saves_written: AtomicU64,
    capacity_failures: AtomicU64,
    generation_retries: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            artifacts_generated: AtomicU64::new(0),
            saves_written: AtomicU64::new(0),
            capacity_failures: AtomicU64::new(0),
            generation_retries: AtomicU64::new(0),
        }
    }

    pub fn inc_artifacts_generated(&self) {
        self.artifacts_generated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_generated", "counter incremented");
    }

    pub fn inc_saves(&self) {
        self.saves_written.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "saves_written", "counter incremented");
    }

    pub fn inc_capacity_failures(&self) {
        self.capacity_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "capacity_failures", "counter incremented");
    }

    pub fn inc_generation_retries(&self) {
        self.generation_retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "generation_retries", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            artifacts_generated = self.artifacts_generated(),
            saves_written = self.saves_written(),
            capacity_failures = self.capacity_failures(),
            generation_retries = self.generation_retries(),
        );
    }

    pub fn artifacts_generated(&self) -> u64 {
        self.artifacts_generated.load(Ordering::Relaxed)
    }

    pub fn saves_written(&self) -> u64 {
        self.saves_written.load(Ordering::Relaxed)
    }

    pub fn capacity_failures(&self) -> u64 {
        self.capacity_failures.load(Ordering::Relaxed)
    }

    pub fn generation_retries(&self) -> u64 {
        self.generation_retries.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.artifacts_generated.store(0, Ordering::Relaxed);
        self.saves_written.store(0, Ordering::Relaxed);
        self.capacity_failures.store(0, Ordering::Relaxed);
        self.generation_retries.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_reset() {
        let m = Metrics::new();
        m.inc_artifacts_generated();
        m.inc_artifacts_generated();
        m.inc_saves();
        m.inc_capacity_failures();
        m.inc_generation_retries();
        m.inc_generation_retries();
        m.inc_generation_retries();
        assert_eq!(m.artifacts_generated(), 2);
        assert_eq!(m.saves_written(), 1);
        assert_eq!(m.capacity_failures(), 1);
        assert_eq!(m.generation_retries(), 3);

        m.reset();
        assert_eq!(m.artifacts_generated(), 0);
        assert_eq!(m.generation_retries(), 0);
    }
}
