use std::fmt;

use crate::error::RtcpError;

mod twcc;
pub use twcc::{Delta, FciHeader, PacketChunk, PacketStatus};
pub use twcc::{DELTA_UNIT, FCI_HEADER_LEN, MAX_RUN_LENGTH, REF_TIME_UNIT};
pub use twcc::{ONE_BIT_CAPACITY, TWO_BIT_CAPACITY};

/// RTCP_PT_RTPFB
// https://tools.ietf.org/html/rfc4585
pub const TRANSPORT_LAYER_FEEDBACK: u8 = 205;

// https://tools.ietf.org/html/draft-holmer-rmcat-transport-wide-cc-extensions-01
pub const FMT_TRANSPORT_WIDE: u8 = 15;

/// RTCP transport-wide congestion control feedback packet.
///
/// Wraps the FCI produced by the encoder with the common RTCP header and the
/// sender and media SSRC.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportFeedback {
    /// Sender of this feedback. Mostly irrelevant, but part of RTCP packets.
    pub sender_ssrc: u32,
    /// The SSRC this report is for.
    pub media_ssrc: u32,
    /// Feedback control information, unpadded.
    pub fci: Vec<u8>,
}

impl TransportFeedback {
    /// Length of the packet in 32 bit words, padding included.
    pub fn length_words(&self) -> usize {
        // header: 1
        // sender ssrc: 1
        // media ssrc: 1
        // fci rounded up to whole words
        3 + (self.fci.len() + 3) / 4
    }

    /// Write the packet to `buf`, which must hold `length_words() * 4` bytes.
    ///
    /// The FCI is zero padded to a word boundary. The padding bit is not set
    /// since the padding belongs to the FCI.
    pub fn write_to(&self, buf: &mut [u8]) -> usize {
        let total = self.length_words() * 4;

        buf[0] = 0b10_0_00000 | FMT_TRANSPORT_WIDE;
        buf[1] = TRANSPORT_LAYER_FEEDBACK;
        buf[2..4].copy_from_slice(&((self.length_words() - 1) as u16).to_be_bytes());
        buf[4..8].copy_from_slice(&self.sender_ssrc.to_be_bytes());
        buf[8..12].copy_from_slice(&self.media_ssrc.to_be_bytes());

        let fci_end = 12 + self.fci.len();
        buf[12..fci_end].copy_from_slice(&self.fci);
        for b in &mut buf[fci_end..total] {
            *b = 0;
        }

        total
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0; self.length_words() * 4];
        self.write_to(&mut buf);
        buf
    }
}

impl<'a> TryFrom<&'a [u8]> for TransportFeedback {
    type Error = RtcpError;

    fn try_from(buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 12 {
            return Err(RtcpError::TooShort(buf.len()));
        }

        let version = (buf[0] & 0b1100_0000) >> 6;
        if version != 2 {
            return Err(RtcpError::BadVersion);
        }
        let has_padding = buf[0] & 0b0010_0000 > 0;
        let fmt = buf[0] & 0b0001_1111;
        let pt = buf[1];

        if pt != TRANSPORT_LAYER_FEEDBACK || fmt != FMT_TRANSPORT_WIDE {
            return Err(RtcpError::NotTransportFeedback { pt, fmt });
        }

        // https://tools.ietf.org/html/rfc3550#section-6.4.1
        //   The length of this RTCP packet in 32-bit words minus one,
        //   including the header and any padding.
        let length = (u16::from_be_bytes([buf[2], buf[3]]) as usize + 1) * 4;
        if buf.len() < length {
            return Err(RtcpError::BadLength);
        }

        let mut end = length;
        if has_padding {
            let pad = buf[length - 1] as usize;
            if pad == 0 || 12 + pad > length {
                return Err(RtcpError::BadLength);
            }
            end -= pad;
        }

        let sender_ssrc = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let media_ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        Ok(TransportFeedback {
            sender_ssrc,
            media_ssrc,
            fci: buf[12..end].to_vec(),
        })
    }
}

impl fmt::Debug for TransportFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportFeedback")
            .field("sender_ssrc", &self.sender_ssrc)
            .field("media_ssrc", &self.media_ssrc)
            .field("fci_len", &self.fci.len())
            .finish()
    }
}
