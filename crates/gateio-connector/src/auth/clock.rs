/*
[INPUT]:  Local wall clock and optional server time samples
[OUTPUT]: Signing timestamps in seconds since epoch
[POS]:    Auth layer - timestamp source for request signatures
[UPDATE]: When changing clock synchronization or timestamp units
*/

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of signing timestamps (seconds since epoch)
pub trait TimestampSource: Send + Sync + Debug {
    fn now_secs(&self) -> u64;
}

/// Wall clock adjusted by the last observed server offset
#[derive(Debug, Default)]
pub struct SystemClock {
    offset_ms: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset (server - local) in milliseconds
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    /// Record a server time sample and return the resulting offset in milliseconds
    pub fn observe_server_time(&self, server_time_ms: i64) -> i64 {
        let offset = server_time_ms - Utc::now().timestamp_millis();
        self.offset_ms.store(offset, Ordering::Relaxed);
        offset
    }

    /// Current time in milliseconds, offset applied
    pub fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis() + self.offset_ms()
    }
}

impl TimestampSource for SystemClock {
    fn now_secs(&self) -> u64 {
        (self.now_millis().max(0) / 1000) as u64
    }
}

/// Constant timestamp, for deterministic signing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTimestamp(pub u64);

impl TimestampSource for FixedTimestamp {
    fn now_secs(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_timestamp() {
        assert_eq!(FixedTimestamp(1_700_000_000).now_secs(), 1_700_000_000);
    }

    #[test]
    fn test_system_clock_applies_offset() {
        let clock = SystemClock::new();
        let before = clock.now_secs();

        let ahead = Utc::now().timestamp_millis() + 120_000;
        let offset = clock.observe_server_time(ahead);
        assert!(offset >= 119_000 && offset <= 120_000);

        let after = clock.now_secs();
        assert!(after >= before + 119);
    }
}
