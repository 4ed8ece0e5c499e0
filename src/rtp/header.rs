use std::ops::Range;

use super::ext::ExtensionsForm;

/// Parsed header from an RTP packet.
///
/// Only what the transport-wide feedback needs is kept. The header extension
/// block is remembered by location so elements can be read or rewritten in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// For video, this marker signifies the end of a series of packets that
    /// together form a single video frame.
    pub marker: bool,
    /// Type of payload being carried.
    pub payload_type: u8,
    /// Sequence number increasing by 1 for each RTP packet.
    pub sequence_number: u16,
    /// Timestamp in media time for the RTP packet.
    pub timestamp: u32,
    /// Sender source identifier.
    pub ssrc: u32,
    /// Length of header including extensions.
    pub header_len: usize,
    pub(crate) ext: Option<ExtensionBlock>,
}

/// The elements of an RFC 8285 header extension block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtensionBlock {
    pub form: ExtensionsForm,
    /// Byte range of the elements within the whole packet.
    pub range: Range<usize>,
}

impl RtpHeader {
    /// Parse the header of a raw RTP packet.
    pub fn parse(buf: &[u8]) -> Option<RtpHeader> {
        if buf.len() < 12 {
            trace!("RTP header too short < 12: {}", buf.len());
            return None;
        }

        let version = (buf[0] & 0b1100_0000) >> 6;
        if version != 2 {
            trace!("RTP version is not 2");
            return None;
        }
        let has_extension = buf[0] & 0b0001_0000 > 0;
        let csrc_count = (buf[0] & 0b0000_1111) as usize;
        let marker = buf[1] & 0b1000_0000 > 0;
        let payload_type = buf[1] & 0b0111_1111;
        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);

        let mut header_len = 12 + csrc_count * 4;
        if buf.len() < header_len {
            trace!("RTP header invalid, not enough len for CSRC");
            return None;
        }

        let mut ext = None;

        if has_extension {
            if buf.len() < header_len + 4 {
                trace!("RTP bad header extension");
                return None;
            }

            let profile = [buf[header_len], buf[header_len + 1]];
            let ext_words = u16::from_be_bytes([buf[header_len + 2], buf[header_len + 3]]);
            let start = header_len + 4;
            let end = start + ext_words as usize * 4;

            if buf.len() < end {
                trace!("RTP ext len larger than header");
                return None;
            }

            // Profiles other than RFC 8285 are skipped over but not understood.
            ext = ExtensionsForm::parse(profile).map(|form| ExtensionBlock {
                form,
                range: start..end,
            });

            header_len = end;
        }

        Some(RtpHeader {
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            header_len,
            ext,
        })
    }
}
