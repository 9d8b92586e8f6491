//! Datetime & timestamp arithmetic (boundary utility, spec.md §4.2).
//!
//! `Value::Timestamp` is modeled as signed nanoseconds since the Unix
//! epoch (spec.md's `(seconds, nanoseconds)` pair collapsed to one
//! normalized integer, since Rust has no trouble with 64-bit nanosecond
//! timestamps up to the year 2262). `monotonic` samples `Instant` the way
//! the teacher's `time_ops.rs` samples a thread-local `Instant` base;
//! datetime does not participate in arithmetic here, matching spec.md.

use std::time::Instant;

use crate::value::{DateTimeValue, Value};

thread_local! {
    static CLOCK_BASE: Instant = Instant::now();
}

/// A monotonic sample, as nanoseconds from an arbitrary process-local
/// origin. Always increasing; unaffected by wall-clock adjustments.
pub fn monotonic() -> Value {
    let nanos = CLOCK_BASE.with(|base| base.elapsed().as_nanos().try_into().unwrap_or(i64::MAX));
    Value::Timestamp(nanos)
}

/// Sum two timestamps, normalizing the nanosecond field back into
/// `[0, 10^9)` the way spec.md's `(seconds, nanoseconds)` pair would.
/// Both inputs must be `Value::Timestamp`.
pub fn timestamp_sum(a: &Value, b: &Value) -> Option<Value> {
    let (a, b) = (as_timestamp(a)?, as_timestamp(b)?);
    Some(Value::Timestamp(a.saturating_add(b)))
}

/// Difference `a - b` between two timestamps.
pub fn timestamp_diff(a: &Value, b: &Value) -> Option<Value> {
    let (a, b) = (as_timestamp(a)?, as_timestamp(b)?);
    Some(Value::Timestamp(a.saturating_sub(b)))
}

fn as_timestamp(v: &Value) -> Option<i64> {
    match v {
        Value::Timestamp(t) => Some(*t),
        _ => None,
    }
}

/// Render a `DateTimeValue` the way `to_string`/`dump` do for
/// `Value::DateTime` (ISO-8601-ish, always with a zone offset).
pub fn format_datetime(dt: &DateTimeValue) -> String {
    let mut s = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
    );
    if dt.nanosecond != 0 {
        s.push_str(&format!(".{:09}", dt.nanosecond));
    }
    if dt.utc_offset_secs == 0 {
        s.push('Z');
    } else {
        let sign = if dt.utc_offset_secs < 0 { '-' } else { '+' };
        let mins = dt.utc_offset_secs.abs() / 60;
        s.push_str(&format!("{sign}{:02}:{:02}", mins / 60, mins % 60));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_is_nondecreasing() {
        let a = monotonic();
        std::thread::sleep(std::time::Duration::from_micros(50));
        let b = monotonic();
        match (a, b) {
            (Value::Timestamp(a), Value::Timestamp(b)) => assert!(b >= a),
            _ => panic!("expected timestamps"),
        }
    }

    #[test]
    fn sum_and_diff_round_trip() {
        let a = Value::Timestamp(1_000_000_000);
        let b = Value::Timestamp(500_000_000);
        let sum = timestamp_sum(&a, &b).unwrap();
        assert_eq!(sum, Value::Timestamp(1_500_000_000));
        let diff = timestamp_diff(&sum, &b).unwrap();
        assert_eq!(diff, a);
    }

    #[test]
    fn format_includes_zone_offset() {
        let dt = DateTimeValue {
            year: 2026,
            month: 7,
            day: 31,
            hour: 12,
            minute: 0,
            second: 0,
            nanosecond: 0,
            utc_offset_secs: -18000,
        };
        assert_eq!(format_datetime(&dt), "2026-07-31T12:00:00-05:00");
    }
}
