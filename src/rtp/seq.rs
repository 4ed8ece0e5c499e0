//! Wraparound-safe arithmetic for the small counters in RTP and RTCP.

/// Circular distance from `a` to `b` in the 16 bit space.
///
/// Positive when `b` comes after `a`, negative when it comes before. Differences
/// up to ±32767 are well ordered. Exactly half the space apart reads as -32768.
pub fn compare16(a: u16, b: u16) -> i32 {
    b.wrapping_sub(a) as i16 as i32
}

/// Like [`compare16`] for 8 bit counters such as the feedback packet count.
pub fn compare8(a: u8, b: u8) -> i32 {
    b.wrapping_sub(a) as i8 as i32
}

/// Like [`compare16`] for 15 bit identifiers. The top bit of the inputs is ignored.
pub fn compare15(a: u16, b: u16) -> i32 {
    let d = b.wrapping_sub(a) & 0x7fff;
    // sign extend from bit 14
    ((d << 1) as i16 >> 1) as i32
}

fn sign_extend24(v: u32) -> i64 {
    ((v << 8) as i32 >> 8) as i64
}

/// Extends the 24 bit reference time of consecutive feedback reports.
///
/// The first value lands one full 24 bit period in, which keeps the extended
/// time positive when later reports step backwards.
#[derive(Debug, Default)]
pub struct RefTimeUnwrapper {
    last: Option<(u32, i64)>,
}

impl RefTimeUnwrapper {
    pub fn new() -> Self {
        RefTimeUnwrapper::default()
    }

    pub fn unwrap(&mut self, value: u32) -> i64 {
        let value = value & 0xff_ffff;

        let ext = match self.last {
            None => (1 << 24) + sign_extend24(value),
            Some((prev, prev_ext)) => prev_ext + sign_extend24(value.wrapping_sub(prev) & 0xff_ffff),
        };

        self.last = Some((value, ext));
        ext
    }
}
