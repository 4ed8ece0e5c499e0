use std::collections::VecDeque;
use std::time::Instant;

/// Upper bound for retained send records. Keeps offset lookups unambiguous
/// in the 16 bit sequence space.
pub const MAX_RETAINED: usize = 32_768;

/// A packet we tagged with a transport-wide sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentPacket {
    /// Transport-wide sequence number.
    pub seq: u16,
    /// When the packet was tagged.
    pub send_ts: Instant,
    /// When the packet left the socket, if the transport reported it.
    pub socket_ts: Option<Instant>,
    /// Size of the whole RTP packet in bytes.
    pub size: usize,
    pub payload_type: u8,
}

impl SentPacket {
    /// Best known local send time.
    pub fn local_send(&self) -> Instant {
        self.socket_ts.unwrap_or(self.send_ts)
    }
}

/// Contiguous log of tagged packets, pruned from the front.
#[derive(Debug)]
pub struct SentPacketStore {
    max_retained: usize,
    queue: VecDeque<SentPacket>,
}

impl SentPacketStore {
    pub fn new(max_retained: usize) -> Self {
        let max_retained = max_retained.clamp(1, MAX_RETAINED);
        SentPacketStore {
            max_retained,
            queue: VecDeque::with_capacity(max_retained.min(1024)),
        }
    }

    /// Append a newly tagged packet.
    ///
    /// `seq` is expected to follow the previously recorded number. A jump
    /// restarts the store since offsets would no longer match.
    pub fn record(&mut self, seq: u16, send_ts: Instant, size: usize, payload_type: u8) {
        if let Some(last) = self.queue.back() {
            if last.seq.wrapping_add(1) != seq {
                debug!(
                    "Non-contiguous send seq {} after {}, clear store",
                    seq, last.seq
                );
                self.queue.clear();
            }
        }

        self.queue.push_back(SentPacket {
            seq,
            send_ts,
            socket_ts: None,
            size,
            payload_type,
        });

        while self.queue.len() > self.max_retained {
            self.queue.pop_front();
        }
    }

    fn index_of(&self, seq: u16) -> Option<usize> {
        let first = self.queue.front()?.seq;
        let offset = seq.wrapping_sub(first) as usize;
        (offset < self.queue.len()).then_some(offset)
    }

    /// Look up a retained packet. Pruned or never sent numbers are [`None`].
    pub fn find(&self, seq: u16) -> Option<&SentPacket> {
        self.queue.get(self.index_of(seq)?)
    }

    /// Record when the packet actually left the socket.
    pub fn set_socket_timestamp(&mut self, seq: u16, ts: Instant) -> bool {
        let Some(idx) = self.index_of(seq) else {
            return false;
        };
        if let Some(p) = self.queue.get_mut(idx) {
            p.socket_ts = Some(ts);
            return true;
        }
        false
    }

    /// Drop every packet sent before `seq`. Numbers outside the retained range
    /// leave the store untouched.
    pub fn prune_up_to(&mut self, seq: u16) {
        if let Some(idx) = self.index_of(seq) {
            if idx > 0 {
                trace!("Prune {} sent packets before {}", idx, seq);
            }
            self.queue.drain(..idx);
        }
    }

    pub fn first_seq(&self) -> Option<u16> {
        self.queue.front().map(|p| p.seq)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
