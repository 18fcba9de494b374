//! Numeric conversion helpers centralizing safe numeric casts.

use chrono::TimeDelta;
use num_traits::cast::cast;

/// Convert a content duration in (possibly fractional) seconds to whole
/// milliseconds. Negative and non-finite values collapse to zero.
#[must_use]
pub fn seconds_to_millis(seconds: f64) -> i64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let millis = (seconds * 1000.0).round().min(max);
    cast::<f64, i64>(millis).unwrap_or(0)
}

/// Content duration in seconds as a [`TimeDelta`].
#[must_use]
pub fn seconds_to_delta(seconds: f64) -> TimeDelta {
    TimeDelta::milliseconds(seconds_to_millis(seconds))
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Ratio of two deltas in milliseconds, clamped to `[0, 1]`.
/// A zero denominator yields 0.0.
#[must_use]
pub fn delta_ratio(numerator: TimeDelta, denominator: TimeDelta) -> f64 {
    let den = denominator.num_milliseconds();
    if den <= 0 {
        return 0.0;
    }
    let ratio = i64_to_f64(numerator.num_milliseconds()) / i64_to_f64(den);
    ratio.clamp(0.0, 1.0)
}
