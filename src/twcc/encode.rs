use std::time::Duration;

use crate::rtp::rtcp::{Delta, FciHeader, PacketChunk, PacketStatus};
use crate::rtp::rtcp::{DELTA_UNIT, MAX_RUN_LENGTH, ONE_BIT_CAPACITY, REF_TIME_UNIT, TWO_BIT_CAPACITY};
use crate::util::BitWriter;

use super::recv::{delta_units, ReceivedPacketLog, RecvRecord};

/// Serializes received packets into transport-wide feedback FCI.
#[derive(Debug, Default)]
pub struct FeedbackEncoder {
    fb_pkt_count: u8,
}

// One received packet, after quantization.
#[derive(Debug, Clone, Copy)]
struct Entry {
    delta: Delta,
    // Numbers not received between the previous entry and this one.
    missing: u32,
}

impl Entry {
    fn status(&self) -> PacketStatus {
        self.delta.status()
    }
}

impl FeedbackEncoder {
    pub fn new() -> Self {
        FeedbackEncoder::default()
    }

    /// Feedback packet count the next report will carry.
    pub fn fb_pkt_count(&self) -> u8 {
        self.fb_pkt_count
    }

    /// Drain the log into one report. [`None`] if the log is empty.
    pub fn encode(&mut self, log: &mut ReceivedPacketLog) -> Option<Vec<u8>> {
        let records = log.drain_sorted();
        self.encode_records(&records)
    }

    /// Encode records that are sorted by sequence number and free of duplicates.
    ///
    /// The FCI is zero padded to a 32 bit boundary.
    pub fn encode_records(&mut self, records: &[RecvRecord]) -> Option<Vec<u8>> {
        let first = records.first()?;
        let last = records.last()?;

        let ref_units = first.arrival.as_nanos() / REF_TIME_UNIT.as_nanos();
        let header = FciHeader {
            base_seq: first.seq,
            packet_count: last.seq.wrapping_sub(first.seq).wrapping_add(1),
            reference_time: (ref_units & 0xff_ffff) as u32,
            fb_pkt_count: self.fb_pkt_count,
        };

        let mut running = Duration::from_nanos((ref_units * REF_TIME_UNIT.as_nanos()) as u64);
        let mut prev_seq = first.seq.wrapping_sub(1);
        let mut entries = Vec::with_capacity(records.len());

        // Status positions, counting lost numbers, of every large delta.
        let mut large = Vec::new();
        let mut pos = 0_u32;

        for r in records {
            let missing = r.seq.wrapping_sub(prev_seq).wrapping_sub(1) as u32;
            prev_seq = r.seq;

            let delta = Delta::from_units(delta_units(running, r.arrival));
            running = advance(running, delta);

            pos += missing;
            if delta.status() == PacketStatus::LargeOrNegativeDelta {
                large.push(pos);
            }
            pos += 1;

            entries.push(Entry { delta, missing });
        }

        let mut chunks = ChunkWriter::new(large);
        pack_chunks(&entries, &mut chunks);

        let mut fci = Vec::with_capacity(64);
        header.write_to(&mut fci);
        fci.extend_from_slice(&chunks.into_bytes());
        for e in &entries {
            e.delta.write_to(&mut fci);
        }
        while fci.len() % 4 != 0 {
            fci.push(0);
        }

        trace!(
            "Encoded feedback {:?} entries: {} bytes: {}",
            header,
            entries.len(),
            fci.len()
        );

        self.fb_pkt_count = self.fb_pkt_count.wrapping_add(1);

        Some(fci)
    }
}

// Move the running reference by the quantized delta.
fn advance(running: Duration, delta: Delta) -> Duration {
    let units = delta.units();
    let step = DELTA_UNIT * units.unsigned_abs() as u32;
    if units < 0 {
        running.saturating_sub(step)
    } else {
        running + step
    }
}

/// Greedy choice between run length and status vector chunks.
///
/// Runs are used for gaps that do not fit the vector in progress, and for
/// runs of equal status long enough to fill a chunk, or that end the report,
/// or that are followed by such a run. Everything else goes into vectors.
fn pack_chunks(entries: &[Entry], chunks: &mut ChunkWriter) {
    // Length of the equal status run starting at each entry.
    let mut equal_run = vec![1_u32; entries.len()];
    for i in (0..entries.len().saturating_sub(1)).rev() {
        let next = &entries[i + 1];
        if next.missing == 0 && next.status() == entries[i].status() {
            equal_run[i] = equal_run[i + 1] + 1;
        }
    }

    let mut i = 0;
    while i < entries.len() {
        let e = &entries[i];
        let mut missing = e.missing;

        if chunks.is_empty() && missing > chunks.capacity() as u32 {
            chunks.write_run(PacketStatus::NotReceived, missing);
            missing = 0;
        }

        if chunks.is_empty() && missing == 0 {
            let cap = chunks.capacity() as u32;
            let eq = equal_run[i];
            let remaining = (entries.len() - i) as u32;
            let next = i + eq as usize;
            let followed_by_run =
                next < entries.len() && entries[next].missing == 0 && equal_run[next] >= cap;

            if eq >= cap || eq == remaining || followed_by_run {
                chunks.write_run(e.status(), eq);
                i += eq as usize;
                continue;
            }
        }

        if missing > 0 {
            let available = chunks.available() as u32;
            if missing > available + chunks.capacity() as u32 {
                chunks.push_n(PacketStatus::NotReceived, available);
                chunks.write_run(PacketStatus::NotReceived, missing - available);
            } else {
                chunks.push_n(PacketStatus::NotReceived, missing);
            }
        }

        chunks.push(e.status());
        i += 1;
    }
}

// Writes chunks, building status vectors one symbol at a time.
//
// The symbol size is picked when a vector starts: 2 bit symbols only when a
// large delta falls within the slots a 1 bit vector would cover.
struct ChunkWriter {
    w: BitWriter,
    // Sorted status positions of large deltas.
    large: Vec<u32>,
    // Status position of the next symbol or run.
    pos: u32,
    two_bit: bool,
    symbols: u16,
    filled: u16,
}

impl ChunkWriter {
    fn new(large: Vec<u32>) -> Self {
        ChunkWriter {
            w: BitWriter::with_capacity(32),
            large,
            pos: 0,
            two_bit: false,
            symbols: 0,
            filled: 0,
        }
    }

    fn large_ahead(&self) -> bool {
        let idx = self.large.partition_point(|p| *p < self.pos);
        self.large
            .get(idx)
            .map(|p| *p < self.pos + ONE_BIT_CAPACITY as u32)
            .unwrap_or(false)
    }

    // Symbol size of the vector in progress, or of the next one when empty.
    fn uses_two_bit(&self) -> bool {
        if self.filled == 0 {
            self.large_ahead()
        } else {
            self.two_bit
        }
    }

    fn capacity(&self) -> u16 {
        if self.uses_two_bit() {
            TWO_BIT_CAPACITY
        } else {
            ONE_BIT_CAPACITY
        }
    }

    fn symbol_bits(&self) -> u16 {
        if self.two_bit {
            2
        } else {
            1
        }
    }

    fn available(&self) -> u16 {
        self.capacity() - self.filled
    }

    fn is_empty(&self) -> bool {
        self.filled == 0
    }

    fn push(&mut self, status: PacketStatus) {
        if !self.two_bit && status == PacketStatus::LargeOrNegativeDelta {
            self.flush_vector();
        }
        if self.filled == 0 {
            self.two_bit = self.large_ahead();
        }
        self.symbols = self.symbols << self.symbol_bits() | u8::from(status) as u16;
        self.filled += 1;
        self.pos += 1;
        if self.filled == self.capacity() {
            self.flush_vector();
        }
    }

    fn push_n(&mut self, status: PacketStatus, n: u32) {
        for _ in 0..n {
            self.push(status);
        }
    }

    // Unused slots are padded with "not received".
    fn flush_vector(&mut self) {
        if self.filled == 0 {
            return;
        }
        let symbols = self.symbols << (self.available() * self.symbol_bits());
        let chunk = if self.two_bit {
            PacketChunk::VectorDouble(symbols)
        } else {
            PacketChunk::VectorSingle(symbols)
        };
        chunk.write_to(&mut self.w);
        self.symbols = 0;
        self.filled = 0;
    }

    fn write_run(&mut self, status: PacketStatus, mut n: u32) {
        self.flush_vector();
        self.pos += n;
        while n > 0 {
            let len = n.min(MAX_RUN_LENGTH as u32);
            PacketChunk::Run(status, len as u16).write_to(&mut self.w);
            n -= len;
        }
    }

    fn into_bytes(mut self) -> Vec<u8> {
        self.flush_vector();
        self.w.into_bytes()
    }
}
