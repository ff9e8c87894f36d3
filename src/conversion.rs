//! Timestamp conversion helpers.
//!
//! All arithmetic is done in `i128` nanoseconds so that long inputs with
//! fine time bases (1/90000, 1/1000000) do not lose precision the way an
//! `f64` round trip would.

use std::time::Duration;

use ffmpeg_next::Rational;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Convert a [`Duration`] to a timestamp in the stream's time base.
///
/// Truncates toward zero. A degenerate time base yields 0.
pub fn duration_to_stream_timestamp(duration: Duration, time_base: Rational) -> i64 {
    let numerator = time_base.numerator() as i128;
    let denominator = time_base.denominator() as i128;
    if numerator <= 0 || denominator <= 0 {
        return 0;
    }

    let nanos = duration.as_nanos() as i128;
    let timestamp = nanos * denominator / (numerator * NANOS_PER_SECOND);
    timestamp.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Convert a stream timestamp back to a [`Duration`].
///
/// Negative timestamps clamp to zero.
pub fn stream_timestamp_to_duration(timestamp: i64, time_base: Rational) -> Duration {
    let numerator = time_base.numerator() as i128;
    let denominator = time_base.denominator() as i128;
    if numerator <= 0 || denominator <= 0 || timestamp <= 0 {
        return Duration::ZERO;
    }

    let nanos = timestamp as i128 * numerator * NANOS_PER_SECOND / denominator;
    Duration::from_nanos(nanos.min(u64::MAX as i128) as u64)
}

/// Seconds represented by a rational (e.g. a frame rate), or `0.0` when the
/// denominator is zero.
pub fn rational_to_f64(value: Rational) -> f64 {
    if value.denominator() == 0 {
        0.0
    } else {
        value.numerator() as f64 / value.denominator() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_timestamp_in_mpeg_clock() {
        let time_base = Rational::new(1, 90_000);
        assert_eq!(
            duration_to_stream_timestamp(Duration::from_secs(10), time_base),
            900_000
        );
        assert_eq!(
            duration_to_stream_timestamp(Duration::from_millis(1), time_base),
            90
        );
    }

    #[test]
    fn duration_to_timestamp_truncates() {
        // 1/30 s units: 0.05 s is 1.5 ticks.
        let time_base = Rational::new(1, 30);
        assert_eq!(
            duration_to_stream_timestamp(Duration::from_millis(50), time_base),
            1
        );
    }

    #[test]
    fn timestamp_to_duration_inverts_exactly() {
        let time_base = Rational::new(1001, 30_000);
        let duration = stream_timestamp_to_duration(30_000, time_base);
        assert_eq!(duration, Duration::from_millis(1001));
    }

    #[test]
    fn negative_timestamp_is_zero_duration() {
        assert_eq!(
            stream_timestamp_to_duration(-5, Rational::new(1, 1000)),
            Duration::ZERO
        );
    }

    #[test]
    fn degenerate_time_base() {
        assert_eq!(
            duration_to_stream_timestamp(Duration::from_secs(1), Rational::new(0, 1)),
            0
        );
        assert_eq!(rational_to_f64(Rational::new(30, 0)), 0.0);
        assert_eq!(rational_to_f64(Rational::new(60_000, 1001)), 60_000.0 / 1001.0);
    }
}
