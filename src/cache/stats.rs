use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic (until reset) atomic counters for the tiered cache.
///
/// All fields use relaxed ordering: readers may observe a torn-but-internally-
/// consistent snapshot, which is acceptable for an observability surface.
#[derive(Debug, Default)]
pub struct Stats {
    total_operations: AtomicU64,
    total_reads: AtomicU64,
    total_writes: AtomicU64,
    total_hits: AtomicU64,
    total_misses: AtomicU64,
    total_read_bytes: AtomicI64,
    total_write_bytes: AtomicI64,
    time_start: AtomicU64,
}

/// A point-in-time copy of `Stats`, safe to hand to callers without exposing
/// the atomics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_operations: u64,
    pub total_reads: u64,
    pub total_writes: u64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_read_bytes: i64,
    pub total_write_bytes: i64,
    pub time_start: u64,
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl Stats {
    pub fn new() -> Self {
        let s = Self::default();
        s.time_start.store(now_epoch_secs(), Ordering::Relaxed);
        s
    }

    pub fn record_write(&self, bytes: usize) {
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.total_write_bytes
            .fetch_add(bytes as i64, Ordering::Relaxed);
    }

    /// Records a read op/operation. Byte accounting is tracked separately
    /// via `add_read_bytes`, since a `Get` only learns the payload size on
    /// a hit.
    pub fn record_read_op(&self) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_read_bytes(&self, bytes: usize) {
        self.total_read_bytes
            .fetch_add(bytes as i64, Ordering::Relaxed);
    }

    pub fn record_operation(&self) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.total_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.total_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.total_operations.store(0, Ordering::Relaxed);
        self.total_reads.store(0, Ordering::Relaxed);
        self.total_writes.store(0, Ordering::Relaxed);
        self.total_hits.store(0, Ordering::Relaxed);
        self.total_misses.store(0, Ordering::Relaxed);
        self.total_read_bytes.store(0, Ordering::Relaxed);
        self.total_write_bytes.store(0, Ordering::Relaxed);
        self.time_start.store(now_epoch_secs(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_operations: self.total_operations.load(Ordering::Relaxed),
            total_reads: self.total_reads.load(Ordering::Relaxed),
            total_writes: self.total_writes.load(Ordering::Relaxed),
            total_hits: self.total_hits.load(Ordering::Relaxed),
            total_misses: self.total_misses.load(Ordering::Relaxed),
            total_read_bytes: self.total_read_bytes.load(Ordering::Relaxed),
            total_write_bytes: self.total_write_bytes.load(Ordering::Relaxed),
            time_start: self.time_start.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Formats the labeled multi-line stats report, field order preserved
    /// exactly.
    pub fn report(&self) -> String {
        let now = now_epoch_secs();
        let duration = (now.saturating_sub(self.time_start)).max(1) as f64;
        let total_other = self
            .total_operations
            .saturating_sub(self.total_writes)
            .saturating_sub(self.total_reads);

        format!(
            "#Cache Stat\n\
             Total ops: {}\n\
             Total write ops: {}\n\
             Total read ops: {}\n\
             Total other ops: {}\n\
             Total write bytes: {}\n\
             Total read bytes: {}\n\
             Read ops/sec: {:.2}\n\
             Write ops/sec: {:.2}\n\
             Total hits: {}\n\
             Total misses: {}",
            self.total_operations,
            self.total_writes,
            self.total_reads,
            total_other,
            self.total_write_bytes,
            self.total_read_bytes,
            self.total_reads as f64 / duration,
            self.total_writes as f64 / duration,
            self.total_hits,
            self.total_misses,
        )
    }

    pub fn hit_rate_percent(&self) -> f64 {
        let total = self.total_hits + self.total_misses;
        if total == 0 {
            0.0
        } else {
            (self.total_hits as f64 / total as f64) * 100.0
        }
    }
}
