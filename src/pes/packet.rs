use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use es::StreamId;
use time::Timestamp;
use {ErrorKind, Result};

/// PES packet header.
///
/// Only the fields an ancillary data stream carries are modelled: SMPTE 2038
/// PES packets have no DTS, no ESCR and no scrambling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    /// Stream identifier.
    pub stream_id: StreamId,

    /// Length of the PES packet body following the length field.
    pub pes_packet_len: u16,

    /// Presentation timestamp declared by the PES packet.
    pub pts: Option<Timestamp>,
}
impl PesHeader {
    /// Reads a PES header from `reader`, leaving the reader positioned at the
    /// first payload byte.
    ///
    /// # Errors
    ///
    /// If the start code prefix, the marker bits or the optional header
    /// layout is malformed, it will return an `ErrorKind::InvalidInput`
    /// error.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let start_code = track_io!(reader.read_u24::<BigEndian>())?;
        track_assert_eq!(
            start_code,
            0x00_0001,
            ErrorKind::InvalidInput,
            "Invalid PES start code prefix: {:#08x}",
            start_code
        );
        let stream_id = StreamId::new(track_io!(reader.read_u8())?);
        let pes_packet_len = track_io!(reader.read_u16::<BigEndian>())?;

        let b = track_io!(reader.read_u8())?;
        track_assert_eq!(
            b >> 6,
            0b10,
            ErrorKind::InvalidInput,
            "Invalid marker bits: {:#04x}",
            b
        );
        let b = track_io!(reader.read_u8())?;
        let pts_dts_flags = b >> 6;
        track_assert_ne!(
            pts_dts_flags,
            0b01,
            ErrorKind::InvalidInput,
            "Forbidden PTS-DTS flags"
        );
        let pes_header_len = track_io!(reader.read_u8())?;

        let pts = if (pts_dts_flags & 0b10) != 0 {
            Some(track!(Timestamp::read_from(&mut reader, pts_dts_flags))?)
        } else {
            None
        };

        // Skip stuffing and unmodelled optional fields.
        let consumed = pts.map_or(0, |_| 5);
        track_assert!(
            u64::from(pes_header_len) >= consumed,
            ErrorKind::InvalidInput,
            "Inconsistent PES header length: {}",
            pes_header_len
        );
        let unread = u64::from(pes_header_len) - consumed;
        track_io!(io::copy(
            &mut reader.by_ref().take(unread),
            &mut io::sink()
        ))?;

        Ok(PesHeader {
            stream_id,
            pes_packet_len,
            pts,
        })
    }

    /// Writes the PES header to `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        track_io!(writer.write_u24::<BigEndian>(0x00_0001))?;
        track_io!(writer.write_u8(self.stream_id.as_u8()))?;
        track_io!(writer.write_u16::<BigEndian>(self.pes_packet_len))?;
        track_io!(writer.write_u8(0b1000_0000))?;
        if let Some(pts) = self.pts {
            track_io!(writer.write_u8(0b1000_0000))?;
            track_io!(writer.write_u8(5))?;
            track!(pts.write_to(&mut writer, 0b0010))?;
        } else {
            track_io!(writer.write_u8(0))?;
            track_io!(writer.write_u8(0))?;
        }
        Ok(())
    }

    /// Returns the number of bytes occupied by the encoded header.
    pub fn header_len(&self) -> usize {
        9 + self.pts.map_or(0, |_| 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = PesHeader {
            stream_id: StreamId::new(StreamId::PRIVATE_STREAM_1),
            pes_packet_len: 42,
            pts: Some(Timestamp::new(123_456).unwrap()),
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), header.header_len());

        let decoded = PesHeader::read_from(&buf[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_without_pts() {
        let header = PesHeader {
            stream_id: StreamId::new(StreamId::PRIVATE_STREAM_1),
            pes_packet_len: 7,
            pts: None,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        let decoded = PesHeader::read_from(&buf[..]).unwrap();
        assert_eq!(decoded.pts, None);
    }

    #[test]
    fn rejects_bad_start_code() {
        let buf = [0, 0, 2, 0xBD, 0, 0, 0x80, 0, 0];
        assert!(PesHeader::read_from(&buf[..]).is_err());
    }
}
