use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of monotonic presentation timestamps, in milliseconds.
pub trait Clock: Clone + Send + Sync {
    fn now_ms(&self) -> u64;

    fn elapsed_ms(&self, since: u64) -> u64 {
        self.now_ms().saturating_sub(since)
    }
}

/// Wall-independent clock counting from the moment it was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin_ns: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin_ns: raw_monotonic_ns(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        raw_monotonic_ns().saturating_sub(self.origin_ns) / 1_000_000
    }
}

#[cfg(target_os = "linux")]
fn raw_monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC is always available on Linux; on failure `ts` stays zeroed.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

#[cfg(not(target_os = "linux"))]
fn raw_monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Hand-driven clock. Clones share the same time, so a test can keep one
/// handle and move time forward under a sequencer that owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Moves time forward and returns the new reading.
    pub fn advance(&self, ms: u64) -> u64 {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
