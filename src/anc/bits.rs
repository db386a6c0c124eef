//! MSB-first bit cursors for the SMPTE 2038 payload bitstream.
use {ErrorKind, Result};

/// Reads MSB-first bit fields from a byte slice.
#[derive(Debug)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    pos: usize,
}
impl<'a> BitReader<'a> {
    /// Makes a new `BitReader` instance.
    pub fn new(buf: &'a [u8]) -> Self {
        BitReader { buf, pos: 0 }
    }

    /// Returns the number of unread bits.
    pub fn remaining_bits(&self) -> usize {
        self.buf.len() * 8 - self.pos
    }

    /// Reads the next `n` bits (at most 32) as an unsigned integer.
    ///
    /// # Errors
    ///
    /// If fewer than `n` bits remain, it will return an
    /// `ErrorKind::InvalidInput` error.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        track_assert!(n <= 32, ErrorKind::InvalidInput, "Too wide field: {}", n);
        track_assert!(
            self.remaining_bits() >= n as usize,
            ErrorKind::InvalidInput,
            "Bitstream exhausted"
        );
        let mut value = 0;
        for _ in 0..n {
            let byte = self.buf[self.pos / 8];
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = value << 1 | u32::from(bit);
            self.pos += 1;
        }
        Ok(value)
    }

    /// Returns the next `n` bits without advancing the cursor.
    pub fn peek_bits(&mut self, n: u32) -> Result<u32> {
        let pos = self.pos;
        let value = self.read_bits(n);
        self.pos = pos;
        value
    }

    /// Advances the cursor to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        self.pos = (self.pos + 7) / 8 * 8;
    }
}

/// Builds a byte buffer from MSB-first bit fields.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: Vec<u8>,
    len_bits: usize,
}
impl BitWriter {
    /// Makes a new `BitWriter` instance.
    pub fn new() -> Self {
        BitWriter::default()
    }

    /// Appends the low `n` bits of `value`, most significant first.
    pub fn write_bits(&mut self, n: u32, value: u32) {
        for i in (0..n).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    /// Pads to the next byte boundary with `1` stuffing bits.
    pub fn align_with_ones(&mut self) {
        while self.len_bits % 8 != 0 {
            self.push_bit(true);
        }
    }

    /// Returns the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn push_bit(&mut self, bit: bool) {
        if self.len_bits % 8 == 0 {
            self.buf.push(0);
        }
        if bit {
            let i = self.len_bits / 8;
            self.buf[i] |= 1 << (7 - self.len_bits % 8);
        }
        self.len_bits += 1;
    }
}
