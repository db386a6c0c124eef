//! Timestamps.
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use {ErrorKind, Result};

/// Presentation timestamp in 90 kHz clock units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);
impl Timestamp {
    /// Maximum timestamp value (33 bits).
    pub const MAX: u64 = (1 << 33) - 1;

    /// Timestamp resolution (90 kHz).
    pub const RESOLUTION: u64 = 90_000;

    /// Makes a new `Timestamp` instance.
    ///
    /// # Errors
    ///
    /// If `n` exceeds `Timestamp::MAX`, it will return an `ErrorKind::InvalidInput` error.
    pub fn new(n: u64) -> Result<Self> {
        track_assert!(
            n <= Self::MAX,
            ErrorKind::InvalidInput,
            "Too large timestamp: {}",
            n
        );
        Ok(Timestamp(n))
    }

    /// Returns the value of the timestamp.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn read_from<R: Read>(mut reader: R, check_bits: u8) -> Result<Self> {
        let b = track_io!(reader.read_u8())?;
        track_assert_eq!(
            b >> 4,
            check_bits,
            ErrorKind::InvalidInput,
            "Unexpected check bits"
        );
        track_assert_eq!(b & 1, 1, ErrorKind::InvalidInput, "Missing marker bit");
        let hi = u64::from((b >> 1) & 0b111) << 30;

        let b = track_io!(reader.read_u16::<BigEndian>())?;
        track_assert_eq!(b & 1, 1, ErrorKind::InvalidInput, "Missing marker bit");
        let mid = u64::from(b >> 1) << 15;

        let b = track_io!(reader.read_u16::<BigEndian>())?;
        track_assert_eq!(b & 1, 1, ErrorKind::InvalidInput, "Missing marker bit");
        let lo = u64::from(b >> 1);

        Ok(Timestamp(hi | mid | lo))
    }

    pub(crate) fn write_to<W: Write>(&self, mut writer: W, check_bits: u8) -> Result<()> {
        let b = check_bits << 4 | (((self.0 >> 30) & 0b111) as u8) << 1 | 1;
        track_io!(writer.write_u8(b))?;

        let b = (((self.0 >> 15) & 0x7FFF) as u16) << 1 | 1;
        track_io!(writer.write_u16::<BigEndian>(b))?;

        let b = ((self.0 & 0x7FFF) as u16) << 1 | 1;
        track_io!(writer.write_u16::<BigEndian>(b))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip() {
        for &n in &[0, 1, 90_000, Timestamp::MAX] {
            let ts = Timestamp::new(n).unwrap();
            let mut buf = Vec::new();
            ts.write_to(&mut buf, 0b0010).unwrap();
            assert_eq!(buf.len(), 5);
            assert_eq!(Timestamp::read_from(&buf[..], 0b0010).unwrap(), ts);
        }
    }

    #[test]
    fn timestamp_rejects_out_of_range() {
        assert!(Timestamp::new(Timestamp::MAX + 1).is_err());
    }

    #[test]
    fn timestamp_rejects_bad_marker() {
        let buf = [0b0010_0000, 0, 0, 0, 1];
        assert!(Timestamp::read_from(&buf[..], 0b0010).is_err());
    }
}
