use std::time::{Duration, Instant};

mod bitstream;
pub(crate) use bitstream::{BitReader, BitWriter};

/// Offset of `t` from `epoch`, saturating at zero when `t` is earlier.
pub(crate) fn since(epoch: Instant, t: Instant) -> Duration {
    t.saturating_duration_since(epoch)
}

/// Signed nanoseconds of a duration, saturating at `i64::MAX`.
pub(crate) fn as_nanos_i64(d: Duration) -> i64 {
    d.as_nanos().min(i64::MAX as u128) as i64
}

/// Duration from signed nanoseconds. Negative values clamp to zero.
pub(crate) fn from_nanos_i64(n: i64) -> Duration {
    Duration::from_nanos(n.max(0) as u64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nanos_conversions() {
        assert_eq!(as_nanos_i64(Duration::from_micros(250)), 250_000);
        assert_eq!(from_nanos_i64(-5), Duration::ZERO);
        assert_eq!(from_nanos_i64(1_000), Duration::from_micros(1));

        let now = Instant::now();
        assert_eq!(since(now + Duration::from_secs(1), now), Duration::ZERO);
    }
}
