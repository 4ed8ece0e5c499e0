use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{BitReader, BitWriter};

/// Bytes in the fixed part of the FCI.
pub const FCI_HEADER_LEN: usize = 8;

/// Resolution of a receive delta.
pub const DELTA_UNIT: Duration = Duration::from_micros(250);

/// Resolution of the reference time.
pub const REF_TIME_UNIT: Duration = Duration::from_millis(64);

/// Longest run a single run length chunk can hold (13 bits).
pub const MAX_RUN_LENGTH: u16 = 0x1fff;

/// Symbols in a status vector with 1 bit symbols.
pub const ONE_BIT_CAPACITY: u16 = 14;

/// Symbols in a status vector with 2 bit symbols.
pub const TWO_BIT_CAPACITY: u16 = 7;

/// Receive status of one packet in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketStatus {
    NotReceived = 0b00,
    SmallDelta = 0b01,
    LargeOrNegativeDelta = 0b10,
}

impl PacketStatus {
    /// Status from its 2 bit wire value. The reserved value `0b11` reads as not received.
    pub fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b01 => PacketStatus::SmallDelta,
            0b10 => PacketStatus::LargeOrNegativeDelta,
            0b00 => PacketStatus::NotReceived,
            _ => {
                trace!("Reserved packet status symbol");
                PacketStatus::NotReceived
            }
        }
    }

    pub fn is_received(&self) -> bool {
        *self != PacketStatus::NotReceived
    }

    /// Bytes of receive delta following this status.
    pub fn delta_len(&self) -> usize {
        match self {
            PacketStatus::NotReceived => 0,
            PacketStatus::SmallDelta => 1,
            PacketStatus::LargeOrNegativeDelta => 2,
        }
    }
}

impl From<PacketStatus> for u8 {
    fn from(val: PacketStatus) -> Self {
        val as u8
    }
}

/// Receive delta in multiples of [`DELTA_UNIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delta {
    Small(u8),
    Large(i16),
}

impl Delta {
    /// Classify a delta given in units. Values outside i16 are clamped.
    pub fn from_units(units: i64) -> Delta {
        if (0..=255).contains(&units) {
            Delta::Small(units as u8)
        } else {
            let clamped = units.clamp(i16::MIN as i64, i16::MAX as i64);
            if clamped != units {
                debug!("Clamp receive delta {} to {}", units, clamped);
            }
            Delta::Large(clamped as i16)
        }
    }

    pub fn status(&self) -> PacketStatus {
        match self {
            Delta::Small(_) => PacketStatus::SmallDelta,
            Delta::Large(_) => PacketStatus::LargeOrNegativeDelta,
        }
    }

    pub fn units(&self) -> i64 {
        match self {
            Delta::Small(v) => *v as i64,
            Delta::Large(v) => *v as i64,
        }
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) -> usize {
        match self {
            Delta::Small(v) => {
                buf.push(*v);
                1
            }
            Delta::Large(v) => {
                buf.extend_from_slice(&v.to_be_bytes());
                2
            }
        }
    }

    /// Read a delta of the size given by `status` from the start of `buf`.
    pub fn read(status: PacketStatus, buf: &[u8]) -> Option<Delta> {
        match status {
            PacketStatus::NotReceived => None,
            PacketStatus::SmallDelta => buf.first().map(|v| Delta::Small(*v)),
            PacketStatus::LargeOrNegativeDelta => {
                if buf.len() < 2 {
                    return None;
                }
                Some(Delta::Large(i16::from_be_bytes([buf[0], buf[1]])))
            }
        }
    }

    pub fn byte_len(&self) -> usize {
        self.status().delta_len()
    }
}

/// One 16 bit unit of the packet status stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketChunk {
    /// Status repeated for a 13 bit run length.
    Run(PacketStatus, u16),
    /// 14 symbols of 1 bit, most significant first.
    VectorSingle(u16),
    /// 7 symbols of 2 bits, most significant first.
    VectorDouble(u16),
}

impl PacketChunk {
    /// Number of statuses the chunk describes.
    pub fn status_count(&self) -> u16 {
        match self {
            PacketChunk::Run(_, n) => *n,
            PacketChunk::VectorSingle(_) => ONE_BIT_CAPACITY,
            PacketChunk::VectorDouble(_) => TWO_BIT_CAPACITY,
        }
    }

    /// Status at `index` within the chunk.
    pub fn status_at(&self, index: u16) -> PacketStatus {
        match self {
            PacketChunk::Run(s, _) => *s,
            PacketChunk::VectorSingle(v) => {
                // In the 1 bit form a set bit means "received small delta".
                if v >> (13 - index) & 1 == 1 {
                    PacketStatus::SmallDelta
                } else {
                    PacketStatus::NotReceived
                }
            }
            PacketChunk::VectorDouble(v) => {
                PacketStatus::from_bits((v >> (12 - index * 2) & 0b11) as u8)
            }
        }
    }

    pub fn write_to(&self, w: &mut BitWriter) {
        match self {
            //     0                   1
            //     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            //    |T| S |       Run Length        |
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            PacketChunk::Run(s, n) => {
                assert!(*n <= MAX_RUN_LENGTH);
                w.write_bit(false);
                w.write_bits(*s as u64, 2);
                w.write_bits(*n as u64, 13);
            }
            //     0                   1
            //     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            //    |T|S|       symbol list         |
            //    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
            PacketChunk::VectorSingle(v) => {
                w.write_bit(true);
                w.write_bit(false);
                w.write_bits(*v as u64, 14);
            }
            PacketChunk::VectorDouble(v) => {
                w.write_bit(true);
                w.write_bit(true);
                w.write_bits(*v as u64, 14);
            }
        }
    }

    /// Read one chunk. [`None`] if fewer than 16 bits remain.
    pub fn read_from(r: &mut BitReader) -> Option<PacketChunk> {
        let x = r.read_bits(16)? as u16;

        let chunk = if x & 0x8000 == 0 {
            let s = PacketStatus::from_bits((x >> 13) as u8);
            PacketChunk::Run(s, x & MAX_RUN_LENGTH)
        } else if x & 0x4000 == 0 {
            PacketChunk::VectorSingle(x & 0x3fff)
        } else {
            PacketChunk::VectorDouble(x & 0x3fff)
        };

        Some(chunk)
    }
}

/// The fixed 8 bytes starting every transport-wide feedback FCI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FciHeader {
    /// Sequence number of the first reported packet.
    pub base_seq: u16,
    /// Number of statuses reported, received or not.
    pub packet_count: u16,
    /// Reference time in 64ms units. Only 24 bits go on the wire.
    pub reference_time: u32,
    /// Counter incremented for every report sent.
    pub fb_pkt_count: u8,
}

impl FciHeader {
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.base_seq.to_be_bytes());
        buf.extend_from_slice(&self.packet_count.to_be_bytes());
        let ref_time = self.reference_time.to_be_bytes();
        buf.extend_from_slice(&ref_time[1..4]);
        buf.push(self.fb_pkt_count);
    }

    pub fn parse(buf: &[u8]) -> Option<FciHeader> {
        if buf.len() < FCI_HEADER_LEN {
            return None;
        }
        Some(FciHeader {
            base_seq: u16::from_be_bytes([buf[0], buf[1]]),
            packet_count: u16::from_be_bytes([buf[2], buf[3]]),
            reference_time: u32::from_be_bytes([0, buf[4], buf[5], buf[6]]),
            fb_pkt_count: buf[7],
        })
    }
}
