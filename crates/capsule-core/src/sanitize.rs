//! Sample sanitizer: clamps raw analog readings into `[0, 4095]`
//! and keeps process-wide corruption counters. Total function, no failure
//! modes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel value taken to mean "bus glitch".
const GLITCH_SENTINEL: u16 = 0xFFFF;
/// Substitute used for a glitch sample.
const GLITCH_SUBSTITUTE: u16 = 2048;
/// Maximum valid analog reading.
const MAX_VALID: u16 = 4095;

/// Sanitize a single raw sample, recording any substitution in `counters`.
///
/// Idempotent: `sanitize(sanitize(x), c) == sanitize(x, c)` for the returned
/// value (counters still advance on repeated calls, matching "resettable
/// in one operation" rather than "never touched twice").
pub fn sanitize(raw: u16, counters: &SanitizerCounters) -> u16 {
    if raw == GLITCH_SENTINEL {
        counters.ffff_count.fetch_add(1, Ordering::Relaxed);
        GLITCH_SUBSTITUTE
    } else if raw > MAX_VALID {
        counters.oob_count.fetch_add(1, Ordering::Relaxed);
        MAX_VALID
    } else {
        raw
    }
}

/// Process-wide, read-only-from-the-outside corruption counters.
#[derive(Debug, Default)]
pub struct SanitizerCounters {
    ffff_count: AtomicU64,
    oob_count: AtomicU64,
}

impl SanitizerCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ffff_count(&self) -> u64 {
        self.ffff_count.load(Ordering::Relaxed)
    }

    pub fn oob_count(&self) -> u64 {
        self.oob_count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.ffff_count() + self.oob_count()
    }

    /// Resets both counters to zero in one operation.
    pub fn reset(&self) {
        self.ffff_count.store(0, Ordering::Relaxed);
        self.oob_count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_valid_samples() {
        let counters = SanitizerCounters::new();
        assert_eq!(sanitize(0, &counters), 0);
        assert_eq!(sanitize(4095, &counters), 4095);
        assert_eq!(sanitize(2048, &counters), 2048);
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn substitutes_glitch_sentinel() {
        let counters = SanitizerCounters::new();
        assert_eq!(sanitize(0xFFFF, &counters), 2048);
        assert_eq!(counters.ffff_count(), 1);
        assert_eq!(counters.oob_count(), 0);
    }

    #[test]
    fn clamps_out_of_band_values() {
        let counters = SanitizerCounters::new();
        assert_eq!(sanitize(4096, &counters), 4095);
        assert_eq!(sanitize(u16::MAX - 1, &counters), 4095);
        assert_eq!(counters.oob_count(), 2);
    }

    #[test]
    fn is_idempotent() {
        let counters = SanitizerCounters::new();
        let once = sanitize(0xFFFF, &counters);
        let twice = sanitize(once, &counters);
        assert_eq!(once, twice);
    }

    #[test]
    fn reset_zeroes_both_counters() {
        let counters = SanitizerCounters::new();
        sanitize(0xFFFF, &counters);
        sanitize(5000, &counters);
        assert_eq!(counters.total(), 2);
        counters.reset();
        assert_eq!(counters.total(), 0);
    }
}
