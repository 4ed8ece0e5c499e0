use std::time::{Duration, Instant};

use crate::error::FeedbackError;
use crate::rtp::rtcp::{Delta, FciHeader, PacketChunk, PacketStatus};
use crate::rtp::rtcp::{DELTA_UNIT, FCI_HEADER_LEN, REF_TIME_UNIT};
use crate::rtp::{compare16, compare8, RefTimeUnwrapper};
use crate::util::{from_nanos_i64, BitReader};

use super::send::SentPacketStore;

/// Smallest FCI that can be parsed: header and one chunk.
const MIN_FCI_LEN: usize = FCI_HEADER_LEN + 2;

/// One packet reported by a feedback report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedPacket {
    /// Transport-wide sequence number.
    pub seq: u16,
    pub status: PacketStatus,
    /// When the remote side received the packet, in the remote time base.
    ///
    /// Only differences between these values are meaningful.
    pub remote_arrival: Option<Duration>,
    /// When we sent the packet, if it is still known.
    pub local_send: Option<Instant>,
    pub size: Option<usize>,
    pub payload_type: Option<u8>,
}

impl DecodedPacket {
    fn stub(seq: u16, status: PacketStatus) -> Self {
        DecodedPacket {
            seq,
            status,
            remote_arrival: None,
            local_send: None,
            size: None,
            payload_type: None,
        }
    }
}

/// Parses feedback reports and reconstructs packets lost between them.
#[derive(Debug, Default)]
pub struct FeedbackDecoder {
    /// Expected (base_seq, fb_pkt_count) of the next report. [`None`] before
    /// the first report.
    expected: Option<(u16, u8)>,
    ref_time: RefTimeUnwrapper,
}

impl FeedbackDecoder {
    pub fn new() -> Self {
        FeedbackDecoder::default()
    }

    /// Decode one FCI.
    ///
    /// Packets found in `store` are enriched with the local send details, and
    /// the store is pruned up to the last reported sequence number.
    pub fn decode(
        &mut self,
        fci: &[u8],
        store: &mut SentPacketStore,
    ) -> Result<Vec<DecodedPacket>, FeedbackError> {
        if fci.len() < MIN_FCI_LEN {
            return Err(FeedbackError::TooShort { len: fci.len() });
        }

        let header = FciHeader::parse(fci).ok_or(FeedbackError::TooShort { len: fci.len() })?;
        trace!("Decode feedback {:?}", header);

        let lost_before = self.reconcile(&header);

        let (stubs, delta_start) = parse_chunks(&fci[FCI_HEADER_LEN..], header);
        let deltas = parse_deltas(&stubs, &fci[FCI_HEADER_LEN + delta_start..])?;

        // Only a fully parsed report moves the reference time.
        let ext = self.ref_time.unwrap(header.reference_time);
        let mut running = ext * REF_TIME_UNIT.as_nanos() as i64;
        let unit = DELTA_UNIT.as_nanos() as i64;

        let mut packets = Vec::with_capacity(lost_before.len() + stubs.len());
        packets.extend(lost_before);

        let mut deltas = deltas.into_iter();
        for mut p in stubs {
            if p.status.is_received() {
                // parse_deltas produced one delta per received stub
                if let Some(d) = deltas.next() {
                    running += d.units() * unit;
                    p.remote_arrival = Some(from_nanos_i64(running));
                }
            }
            packets.push(p);
        }

        for p in &mut packets {
            if let Some(sent) = store.find(p.seq) {
                p.local_send = Some(sent.local_send());
                p.size = Some(sent.size);
                p.payload_type = Some(sent.payload_type);
            }
        }

        if let Some(last) = packets.last() {
            store.prune_up_to(last.seq);
        }

        Ok(packets)
    }

    // Compare against the previous report. Returns packets lost in between.
    fn reconcile(&mut self, header: &FciHeader) -> Vec<DecodedPacket> {
        let mut lost = vec![];
        let mut update = true;

        if let Some((expected_seq, expected_fb)) = self.expected {
            let gap = compare8(expected_fb, header.fb_pkt_count);

            if gap < 0 {
                debug!(
                    "Reordered feedback, fb_pkt_count: {} expected: {}",
                    header.fb_pkt_count, expected_fb
                );
                update = false;
            } else if gap > 0 {
                // What the lost reports covered is unknown.
                debug!("Lost {} feedback reports", gap);
            } else if compare16(expected_seq, header.base_seq) < 0 {
                debug!(
                    "Stale feedback, base_seq: {} expected: {}",
                    header.base_seq, expected_seq
                );
                update = false;
            } else {
                let mut seq = expected_seq;
                while seq != header.base_seq {
                    lost.push(DecodedPacket::stub(seq, PacketStatus::NotReceived));
                    seq = seq.wrapping_add(1);
                }
            }
        }

        if update {
            self.expected = Some((
                header.base_seq.wrapping_add(header.packet_count),
                header.fb_pkt_count.wrapping_add(1),
            ));
        }

        lost
    }
}

// Statuses for up to packet_count packets, and where the deltas start.
fn parse_chunks(buf: &[u8], header: FciHeader) -> (Vec<DecodedPacket>, usize) {
    let count = header.packet_count as usize;
    let mut stubs = Vec::with_capacity(count);
    let mut r = BitReader::new(buf);
    let mut seq = header.base_seq;

    while stubs.len() < count {
        let Some(chunk) = PacketChunk::read_from(&mut r) else {
            trace!("Chunks ended at {} of {} statuses", stubs.len(), count);
            break;
        };

        let n = (chunk.status_count() as usize).min(count - stubs.len());
        for i in 0..n {
            stubs.push(DecodedPacket::stub(seq, chunk.status_at(i as u16)));
            seq = seq.wrapping_add(1);
        }
    }

    (stubs, r.byte_pos())
}

fn parse_deltas(stubs: &[DecodedPacket], buf: &[u8]) -> Result<Vec<Delta>, FeedbackError> {
    let mut deltas = Vec::with_capacity(stubs.len());
    let mut pos = 0;

    for p in stubs {
        if !p.status.is_received() {
            continue;
        }
        let rest = &buf[pos..];
        let Some(d) = Delta::read(p.status, rest) else {
            return Err(FeedbackError::DeltaOverrun {
                needed: p.status.delta_len(),
                remaining: rest.len(),
            });
        };
        pos += d.byte_len();
        deltas.push(d);
    }

    Ok(deltas)
}
