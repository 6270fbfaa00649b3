//! Conversions between wall-clock time, sample counts and tick time bases.
//!
//! Every conversion rounds half up.

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// `round(nanos * time_base / 1e9)`.
pub fn nanos_to_ticks(nanos: u128, time_base: u32) -> u64 {
    ((nanos * time_base as u128 + NANOS_PER_SEC / 2) / NANOS_PER_SEC) as u64
}

/// Wall-clock duration in ticks of `time_base`.
pub fn duration_to_ticks(duration: Duration, time_base: u32) -> u64 {
    nanos_to_ticks(duration.as_nanos(), time_base)
}

/// Ticks back to a wall-clock duration.
pub fn ticks_to_duration(ticks: u64, time_base: u32) -> Duration {
    if time_base == 0 {
        return Duration::ZERO;
    }
    let nanos = (ticks as u128 * NANOS_PER_SEC + time_base as u128 / 2) / time_base as u128;
    Duration::from_nanos(nanos as u64)
}

/// Ticks in milliseconds, as embedded in segment file names.
pub fn ticks_to_millis(ticks: u64, time_base: u32) -> u64 {
    if time_base == 0 {
        return 0;
    }
    ((ticks as u128 * 1000 + time_base as u128 / 2) / time_base as u128) as u64
}

/// A sample count at `sample_rate` expressed in ticks of `time_base`.
pub fn samples_to_ticks(samples: u64, sample_rate: u32, time_base: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    ((samples as u128 * time_base as u128 + sample_rate as u128 / 2) / sample_rate as u128) as u64
}
