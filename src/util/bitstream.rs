/// Reads big-endian bit fields from a byte slice, most significant bit first.
pub struct BitReader<'a> {
    data: &'a [u8],
    idx: usize,
    remain: usize,
    tmp: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            idx: 0,
            remain: 0,
            tmp: 0,
        }
    }

    /// Read `num` bits (at most 64). [`None`] if the input runs out.
    #[inline(always)]
    pub fn read_bits(&mut self, mut num: usize) -> Option<u64> {
        let mut r = 0;

        while num > 0 {
            if self.remain == 0 {
                if self.idx >= self.data.len() {
                    return None;
                }
                self.tmp = self.data[self.idx];
                self.idx += 1;
                self.remain = 8;
            }

            num -= 1;
            self.remain -= 1;
            if self.tmp & (1 << self.remain) > 0 {
                r |= 1 << num;
            }
        }

        Some(r)
    }

    /// Number of whole bytes consumed, counting a partially read byte.
    pub fn byte_pos(&self) -> usize {
        self.idx
    }
}

/// Packs bit fields into a growable byte buffer, most significant bit first.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    // Bits used in the last byte of buf. 0 means byte aligned.
    used: usize,
}

impl BitWriter {
    pub fn with_capacity(bytes: usize) -> Self {
        BitWriter {
            buf: Vec::with_capacity(bytes),
            used: 0,
        }
    }

    /// Write the lowest `num` bits of `value`.
    pub fn write_bits(&mut self, value: u64, num: usize) {
        assert!(num <= 64);

        for i in (0..num).rev() {
            if self.used == 0 {
                self.buf.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            let last = self.buf.len() - 1;
            self.buf[last] |= bit << (7 - self.used);
            self.used = (self.used + 1) % 8;
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u64, 1);
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn flush(&mut self) {
        self.used = 0;
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.flush();
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_read_bits() {
        let data = [0b1000_0011, 0b1100_1001];
        let mut bs = BitReader::new(&data);

        assert_eq!(bs.read_bits(1), Some(1));
        assert_eq!(bs.read_bits(2), Some(0));
        assert_eq!(bs.read_bits(7), Some(0b000_1111));
        assert_eq!(bs.byte_pos(), 2);
        assert_eq!(bs.read_bits(6), Some(0b1001));
        assert_eq!(bs.read_bits(1), None);
    }

    #[test]
    fn write_across_byte_boundary() {
        let mut w = BitWriter::with_capacity(2);
        w.write_bit(true);
        w.write_bits(0b01, 2);
        w.write_bits(0x1fff, 13);
        assert_eq!(w.into_bytes(), vec![0b1011_1111, 0xff]);
    }

    #[test]
    fn flush_pads_with_zero() {
        let mut w = BitWriter::default();
        w.write_bits(0b101, 3);
        w.flush();
        w.write_bits(0xaa, 8);
        assert_eq!(w.into_bytes(), vec![0b1010_0000, 0xaa]);
    }

    #[test]
    fn writer_output_reads_back() {
        let mut w = BitWriter::default();
        w.write_bits(1, 1);
        w.write_bits(1, 1);
        w.write_bits(0b01_10_00_11, 8);
        w.write_bits(0, 6);
        let bytes = w.into_bytes();

        let mut r = BitReader::new(&bytes);
        assert_eq!(r.read_bits(2), Some(0b11));
        assert_eq!(r.read_bits(8), Some(0b01_10_00_11));
        assert_eq!(r.byte_pos(), 2);
    }
}
