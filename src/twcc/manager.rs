use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::config::TwccConfig;
use crate::rtp::rtcp::{FciHeader, TransportFeedback};
use crate::rtp::{compare16, read_transport_cc, write_transport_cc, RtpHeader};
use crate::util::since;

use super::decode::{DecodedPacket, FeedbackDecoder};
use super::encode::FeedbackEncoder;
use super::recv::{FlushPolicy, ReceivedPacketLog};
use super::send::SentPacketStore;

/// Transport-wide congestion control feedback for one RTP session.
///
/// This is Sans I/O. Outgoing RTP packets are tagged with
/// [`TwccManager::tag_outgoing`], incoming ones recorded with
/// [`TwccManager::record_incoming`]. Produced feedback is taken with
/// [`TwccManager::poll_feedback`], received feedback decoded with
/// [`TwccManager::decode_rtcp`].
///
/// ```
/// # use rtp_twcc::TwccConfig;
/// # use std::time::Instant;
/// let now = Instant::now();
/// let mut twcc = TwccConfig::new().set_recv_ext_id(3).build(now).unwrap();
///
/// // No tagged packets seen, nothing to send.
/// assert!(twcc.poll_feedback().is_none());
/// ```
#[derive(Debug)]
pub struct TwccManager {
    epoch: Instant,
    send_ext_id: u8,
    recv_ext_id: u8,
    sender_ssrc: u32,
    /// SSRC of the first tracked incoming packet.
    media_ssrc: Option<u32>,
    next_send_seq: u16,
    /// Only set once a report was produced.
    expected_recv_seq: Option<u16>,
    recv_log: ReceivedPacketLog,
    policy: FlushPolicy,
    encoder: FeedbackEncoder,
    decoder: FeedbackDecoder,
    sent: SentPacketStore,
    pending: VecDeque<TransportFeedback>,
}

impl TwccManager {
    pub(crate) fn new(config: TwccConfig, epoch: Instant) -> Self {
        let (min_received, min_no_marker, threshold) = config.loss_heuristic();

        TwccManager {
            epoch,
            send_ext_id: config.send_ext_id(),
            recv_ext_id: config.recv_ext_id(),
            sender_ssrc: config.sender_ssrc(),
            media_ssrc: None,
            next_send_seq: 0,
            expected_recv_seq: None,
            recv_log: ReceivedPacketLog::new(),
            policy: FlushPolicy::new(
                config.mtu(),
                config.feedback_interval(),
                min_received,
                min_no_marker,
                threshold,
            ),
            encoder: FeedbackEncoder::new(),
            decoder: FeedbackDecoder::new(),
            sent: SentPacketStore::new(config.max_retained()),
            pending: VecDeque::new(),
        }
    }

    /// Stamp an outgoing RTP packet with the next transport-wide sequence number.
    ///
    /// The packet must already carry a two byte header extension element with
    /// the send extension id. Returns the number written, or [`None`] if the
    /// packet is not tracked.
    pub fn tag_outgoing(&mut self, packet: &mut [u8], now: Instant) -> Option<u16> {
        if self.send_ext_id == 0 {
            return None;
        }

        let header = RtpHeader::parse(packet)?;
        let seq = self.next_send_seq;

        if !write_transport_cc(packet, &header, self.send_ext_id, seq) {
            trace!("No transport-cc slot for id {}", self.send_ext_id);
            return None;
        }

        trace!("Tag outgoing {} with twcc {}", header.sequence_number, seq);
        self.sent
            .record(seq, now, packet.len(), header.payload_type);
        self.next_send_seq = seq.wrapping_add(1);

        Some(seq)
    }

    /// Record the time the packet with transport-wide `seq` left the socket.
    pub fn set_socket_timestamp(&mut self, seq: u16, ts: Instant) -> bool {
        self.sent.set_socket_timestamp(seq, ts)
    }

    /// Record an incoming RTP packet.
    ///
    /// Returns `true` when this produced feedback to send.
    pub fn record_incoming(&mut self, packet: &[u8], arrival: Instant) -> bool {
        if self.recv_ext_id == 0 {
            return false;
        }

        let Some(header) = RtpHeader::parse(packet) else {
            return false;
        };
        let Some(seq) = read_transport_cc(packet, &header, self.recv_ext_id) else {
            return false;
        };

        self.record_seq(seq, header.marker, header.ssrc, arrival)
    }

    /// Record an incoming packet whose transport-wide sequence number was
    /// already extracted.
    ///
    /// Returns `true` when this produced feedback to send.
    pub fn record_seq(&mut self, seq: u16, marker: bool, ssrc: u32, arrival: Instant) -> bool {
        let arrival = since(self.epoch, arrival);
        self.media_ssrc.get_or_insert(ssrc);

        if let Some(expected) = self.expected_recv_seq {
            if compare16(expected, seq) < 0 {
                trace!("Drop late twcc {}, expected: {}", seq, expected);
                return false;
            }
        }

        if self.recv_log.last().map(|r| r.seq) == Some(seq) {
            trace!("Drop duplicate twcc {}", seq);
            return false;
        }

        let mut produced = false;

        if self.policy.must_flush_before(&self.recv_log, seq, arrival) {
            produced |= self.flush();
        }

        trace!("Record twcc {} at {:?}", seq, arrival);
        self.recv_log.push(seq, arrival);

        if self
            .policy
            .must_flush_after(&self.recv_log, seq, marker, arrival)
        {
            produced |= self.flush();
        }

        produced
    }

    fn flush(&mut self) -> bool {
        let Some(fci) = self.encoder.encode(&mut self.recv_log) else {
            return false;
        };

        if let Some(h) = FciHeader::parse(&fci) {
            debug!(
                "Feedback base_seq: {} packet_count: {} fb_pkt_count: {}",
                h.base_seq, h.packet_count, h.fb_pkt_count
            );
            self.expected_recv_seq = Some(h.base_seq.wrapping_add(h.packet_count));
        }

        self.pending.push_back(TransportFeedback {
            sender_ssrc: self.sender_ssrc,
            media_ssrc: self.media_ssrc.unwrap_or(0),
            fci,
        });

        true
    }

    /// Next produced feedback packet, oldest first.
    pub fn poll_feedback(&mut self) -> Option<TransportFeedback> {
        self.pending.pop_front()
    }

    pub fn has_feedback(&self) -> bool {
        !self.pending.is_empty()
    }

    /// When [`TwccManager::handle_timeout`] should be called next.
    ///
    /// Only in periodic mode, and only after the first tracked packet.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.policy.poll_timeout().map(|d| self.epoch + d)
    }

    /// Drive the periodic feedback timer.
    ///
    /// Returns `true` when this produced feedback to send.
    pub fn handle_timeout(&mut self, now: Instant) -> bool {
        if !self.policy.timeout_due(since(self.epoch, now)) {
            return false;
        }
        if self.recv_log.is_empty() {
            return false;
        }
        debug!("Flush, feedback interval elapsed");
        self.flush()
    }

    /// Decode the FCI of a received feedback report.
    ///
    /// Malformed reports are logged and give no packets.
    pub fn decode(&mut self, fci: &[u8]) -> Vec<DecodedPacket> {
        match self.decoder.decode(fci, &mut self.sent) {
            Ok(v) => v,
            Err(e) => {
                warn!("Malformed transport-wide feedback: {}", e);
                vec![]
            }
        }
    }

    /// Decode a whole RTCP transport-wide feedback packet.
    pub fn decode_rtcp(&mut self, buf: &[u8]) -> Vec<DecodedPacket> {
        match TransportFeedback::try_from(buf) {
            Ok(fb) => self.decode(&fb.fci),
            Err(e) => {
                debug!("Not transport-wide feedback: {}", e);
                vec![]
            }
        }
    }

    /// Change the path MTU. Affects the next report.
    pub fn set_mtu(&mut self, mtu: usize) {
        self.policy.set_mtu(mtu);
    }

    /// Switch between periodic (`Some`) and marker driven (`None`) feedback.
    pub fn set_feedback_interval(&mut self, interval: Option<Duration>) {
        self.policy.set_interval(interval.filter(|d| !d.is_zero()));
    }

    pub fn feedback_interval(&self) -> Option<Duration> {
        self.policy.interval()
    }

    pub fn set_send_ext_id(&mut self, id: u8) {
        self.send_ext_id = id;
    }

    pub fn set_recv_ext_id(&mut self, id: u8) {
        self.recv_ext_id = id;
    }

    pub fn set_sender_ssrc(&mut self, ssrc: u32) {
        self.sender_ssrc = ssrc;
    }

    /// How many packets fit one report at the current MTU.
    pub fn max_packets_per_report(&self) -> usize {
        self.policy.max_packets()
    }

    /// Sequence number the next tagged packet gets.
    pub fn next_send_seq(&self) -> u16 {
        self.next_send_seq
    }

    /// Feedback packet count of the next produced report.
    pub fn fb_pkt_count(&self) -> u8 {
        self.encoder.fb_pkt_count()
    }

    /// Packets sent and not yet pruned by feedback.
    pub fn sent_packets(&self) -> &SentPacketStore {
        &self.sent
    }
}
