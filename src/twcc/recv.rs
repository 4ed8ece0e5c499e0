use std::time::Duration;

use crate::rtp::compare16;
use crate::rtp::rtcp::DELTA_UNIT;

/// Largest sequence number span one report describes. Beyond this the
/// circular order of the log is no longer well defined.
const MAX_SPAN: u32 = 0x7fff;

/// Time spread of a log that still fits signed 16 bit deltas. The first delta
/// can use up to 64ms on top of the spread.
const MAX_ARRIVAL_SPREAD: Duration = Duration::from_micros(i16::MAX as u64 * 250 - 64_000);

/// Arrival of one tagged packet, before serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvRecord {
    pub seq: u16,
    /// Arrival as offset from the manager epoch.
    pub arrival: Duration,
}

/// The packets received since the last feedback report, in arrival order.
#[derive(Debug, Default)]
pub struct ReceivedPacketLog {
    records: Vec<RecvRecord>,
    // Sequence number extremes in circular order.
    min_seq: u16,
    max_seq: u16,
    min_arrival: Duration,
    max_arrival: Duration,
}

impl ReceivedPacketLog {
    pub fn new() -> Self {
        ReceivedPacketLog::default()
    }

    pub fn push(&mut self, seq: u16, arrival: Duration) {
        if self.records.is_empty() {
            self.min_seq = seq;
            self.max_seq = seq;
            self.min_arrival = arrival;
            self.max_arrival = arrival;
        } else {
            if compare16(self.min_seq, seq) < 0 {
                self.min_seq = seq;
            }
            if compare16(self.max_seq, seq) > 0 {
                self.max_seq = seq;
            }
            self.min_arrival = self.min_arrival.min(arrival);
            self.max_arrival = self.max_arrival.max(arrival);
        }
        self.records.push(RecvRecord { seq, arrival });
    }

    /// First record in arrival order.
    pub fn first(&self) -> Option<&RecvRecord> {
        self.records.first()
    }

    /// Last record in arrival order.
    pub fn last(&self) -> Option<&RecvRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence number span the log would cover with `seq` added.
    pub fn span_with(&self, seq: u16) -> u32 {
        if self.records.is_empty() {
            return 1;
        }
        let min = if compare16(self.min_seq, seq) < 0 {
            seq
        } else {
            self.min_seq
        };
        let max = if compare16(self.max_seq, seq) > 0 {
            seq
        } else {
            self.max_seq
        };
        max.wrapping_sub(min) as u32 + 1
    }

    /// Whether adding `arrival` would need a delta outside the signed 16 bit range.
    pub fn delta_overflows_with(&self, arrival: Duration) -> bool {
        if self.records.is_empty() {
            return false;
        }
        let min = self.min_arrival.min(arrival);
        let max = self.max_arrival.max(arrival);
        max - min > MAX_ARRIVAL_SPREAD
    }

    /// Take the records sorted by sequence number with duplicates removed.
    ///
    /// The sort is stable, so the first arrival of a duplicated number is kept.
    /// The log is empty afterwards.
    pub fn drain_sorted(&mut self) -> Vec<RecvRecord> {
        let mut records = std::mem::take(&mut self.records);

        if let Some(anchor) = records.first().map(|r| r.seq) {
            records.sort_by_key(|r| compare16(anchor, r.seq));
            records.dedup_by_key(|r| r.seq);
        }

        records
    }
}

/// Decides when the received packets are turned into a feedback report.
#[derive(Debug)]
pub struct FlushPolicy {
    max_packets: usize,
    interval: Option<Duration>,
    deadline: Option<Duration>,
    no_marker: usize,
    lost_min_received: usize,
    lost_min_no_marker: usize,
    lost_threshold: usize,
}

impl FlushPolicy {
    pub fn new(
        mtu: usize,
        interval: Option<Duration>,
        lost_min_received: usize,
        lost_min_no_marker: usize,
        lost_threshold: usize,
    ) -> Self {
        FlushPolicy {
            max_packets: max_packets_per_report(mtu),
            interval,
            deadline: None,
            no_marker: 0,
            lost_min_received,
            lost_min_no_marker,
            lost_threshold,
        }
    }

    pub fn max_packets(&self) -> usize {
        self.max_packets
    }

    pub fn set_mtu(&mut self, mtu: usize) {
        self.max_packets = max_packets_per_report(mtu);
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Change between periodic and marker mode. Restarts the deadline.
    pub fn set_interval(&mut self, interval: Option<Duration>) {
        self.interval = interval;
        self.deadline = None;
    }

    /// Whether the log must be flushed before a packet with `seq` arriving at
    /// `arrival` can be added.
    pub fn must_flush_before(&self, log: &ReceivedPacketLog, seq: u16, arrival: Duration) -> bool {
        if log.is_empty() {
            return false;
        }

        if log.len() + 1 > self.max_packets {
            debug!("Flush, exceeds max packets per report: {}", self.max_packets);
            return true;
        }

        if log.span_with(seq) > MAX_SPAN {
            debug!("Flush, sequence span too large for seq: {}", seq);
            return true;
        }

        if log.delta_overflows_with(arrival) {
            debug!("Flush, arrival delta out of range");
            return true;
        }

        false
    }

    /// Whether the log must be flushed after appending the packet.
    pub fn must_flush_after(
        &mut self,
        log: &ReceivedPacketLog,
        seq: u16,
        marker: bool,
        arrival: Duration,
    ) -> bool {
        if !marker {
            self.no_marker += 1;
        }

        if let Some(interval) = self.interval {
            let deadline = *self.deadline.get_or_insert(arrival + interval);
            if arrival < deadline {
                return false;
            }
            self.advance_deadline(arrival, interval);
            return true;
        }

        if marker || self.many_packets_some_lost(log, seq) {
            self.no_marker = 0;
            return true;
        }

        false
    }

    fn advance_deadline(&mut self, now: Duration, interval: Duration) {
        if interval.is_zero() {
            self.deadline = Some(now);
            return;
        }
        let mut deadline = self.deadline.unwrap_or(now);
        while now >= deadline {
            deadline += interval;
        }
        self.deadline = Some(deadline);
    }

    // Catches frames where the marker carrying packet itself was lost.
    fn many_packets_some_lost(&self, log: &ReceivedPacketLog, seq: u16) -> bool {
        let Some(first) = log.first() else {
            return false;
        };

        // A number just before the first wraps the count to zero.
        let packet_count = seq.wrapping_sub(first.seq).wrapping_add(1) as usize;
        let received = log.len();

        // Many duplicates makes the count useless.
        if received > packet_count {
            return false;
        }

        let lost = packet_count - received;
        if lost < self.lost_threshold {
            return false;
        }

        let fire = received >= self.lost_min_received || self.no_marker >= self.lost_min_no_marker;
        if fire {
            debug!(
                "Flush, many packets without marker: received {} lost {}",
                received, lost
            );
        }
        fire
    }

    /// Next feedback deadline in periodic mode.
    pub fn poll_timeout(&self) -> Option<Duration> {
        self.interval?;
        self.deadline
    }

    /// Whether the periodic deadline passed. Advances the deadline when it did.
    pub fn timeout_due(&mut self, now: Duration) -> bool {
        let (Some(interval), Some(deadline)) = (self.interval, self.deadline) else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.advance_deadline(now, interval);
        true
    }
}

/// How many packets fit one report given the path MTU.
///
/// Assumes the worst case of 2 bit symbols and 2 byte deltas, leaving room
/// for the RTCP and FCI headers.
pub fn max_packets_per_report(mtu: usize) -> usize {
    (mtu.saturating_sub(32) * 7 / 16).max(1)
}

/// Signed number of delta units between two offsets, rounded to nearest.
pub fn delta_units(from: Duration, to: Duration) -> i64 {
    let unit = DELTA_UNIT.as_nanos() as i64;
    let diff = crate::util::as_nanos_i64(to) - crate::util::as_nanos_i64(from);
    (diff + unit / 2).div_euclid(unit)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn drain_sorts_circular_and_dedups() {
        let mut log = ReceivedPacketLog::new();
        log.push(1, ms(1));
        log.push(65535, ms(2));
        log.push(0, ms(3));
        log.push(1, ms(4));
        log.push(2, ms(5));

        let seqs: Vec<_> = log.drain_sorted().iter().map(|r| (r.seq, r.arrival)).collect();
        assert_eq!(seqs, vec![(65535, ms(2)), (0, ms(3)), (1, ms(1)), (2, ms(5))]);
        assert!(log.is_empty());
    }

    #[test]
    fn span_includes_new_seq() {
        let mut log = ReceivedPacketLog::new();
        assert_eq!(log.span_with(5), 1);
        log.push(10, ms(0));
        log.push(12, ms(0));
        assert_eq!(log.span_with(11), 3);
        assert_eq!(log.span_with(20), 11);
        assert_eq!(log.span_with(8), 5);
    }

    #[test]
    fn capacity_from_mtu() {
        assert_eq!(max_packets_per_report(1400), 598);
        assert_eq!(max_packets_per_report(0), 1);

        let p = FlushPolicy::new(64, None, 30, 10, 60);
        let mut log = ReceivedPacketLog::new();
        for seq in 0..14 {
            assert!(!p.must_flush_before(&log, seq, ms(0)));
            log.push(seq, ms(0));
        }
        assert!(p.must_flush_before(&log, 14, ms(0)));
    }

    #[test]
    fn flush_before_delta_overflow() {
        let p = FlushPolicy::new(1400, None, 30, 10, 60);
        let mut log = ReceivedPacketLog::new();
        log.push(0, ms(0));
        assert!(!p.must_flush_before(&log, 1, ms(8000)));
        assert!(p.must_flush_before(&log, 1, ms(8200)));
    }

    #[test]
    fn marker_flushes() {
        let mut p = FlushPolicy::new(1400, None, 30, 10, 60);
        let mut log = ReceivedPacketLog::new();
        log.push(0, ms(0));
        assert!(!p.must_flush_after(&log, 0, false, ms(0)));
        log.push(1, ms(1));
        assert!(p.must_flush_after(&log, 1, true, ms(1)));
    }

    #[test]
    fn many_lost_without_marker_flushes() {
        let mut p = FlushPolicy::new(1400, None, 30, 10, 60);
        let mut log = ReceivedPacketLog::new();

        // Every 8th packet arrives, none with marker.
        let mut flushed = false;
        for i in 0..10 {
            let seq = i * 8;
            log.push(seq, ms(i as u64));
            flushed = p.must_flush_after(&log, seq, false, ms(i as u64));
            if flushed {
                assert_eq!(i, 9);
            }
        }
        assert!(flushed);
    }

    #[test]
    fn reordered_predecessor_is_not_loss() {
        let mut p = FlushPolicy::new(1400, None, 30, 10, 60);
        let mut log = ReceivedPacketLog::new();

        for seq in 100..=110 {
            log.push(seq, ms(seq as u64));
            assert!(!p.must_flush_after(&log, seq, false, ms(seq as u64)));
        }

        // Arrives after its successors, nothing is missing.
        log.push(99, ms(111));
        assert!(!p.must_flush_after(&log, 99, false, ms(111)));
    }

    #[test]
    fn interval_deadline_advances_whole_steps() {
        let mut p = FlushPolicy::new(1400, Some(ms(50)), 30, 10, 60);
        let log = ReceivedPacketLog::new();

        assert!(!p.must_flush_after(&log, 0, false, ms(0)));
        assert_eq!(p.poll_timeout(), Some(ms(50)));
        assert!(p.must_flush_after(&log, 1, true, ms(66)));
        assert_eq!(p.poll_timeout(), Some(ms(100)));
        assert!(!p.must_flush_after(&log, 2, false, ms(99)));
        assert!(p.must_flush_after(&log, 3, false, ms(260)));
        assert_eq!(p.poll_timeout(), Some(ms(300)));

        assert!(!p.timeout_due(ms(299)));
        assert!(p.timeout_due(ms(300)));
        assert_eq!(p.poll_timeout(), Some(ms(350)));
    }

    #[test]
    fn delta_units_round_to_nearest() {
        assert_eq!(delta_units(ms(0), Duration::from_micros(250)), 1);
        assert_eq!(delta_units(ms(0), Duration::from_micros(374)), 1);
        assert_eq!(delta_units(ms(0), Duration::from_micros(375)), 2);
        assert_eq!(delta_units(Duration::from_micros(500), Duration::from_micros(250)), -1);
        assert_eq!(delta_units(Duration::from_micros(500), Duration::from_micros(376)), 0);
        assert_eq!(delta_units(ms(0), Duration::from_nanos(250_062_500)), 1000);
    }
}
