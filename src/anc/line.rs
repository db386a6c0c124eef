use std::io::Write;

use anc::bits::{BitReader, BitWriter};
use es::StreamId;
use pes::PesHeader;
use time::Timestamp;
use {ErrorKind, Result};

/// Ancillary data flag: the three words opening every SMPTE 291M packet.
const ADF: [u16; 3] = [0x000, 0x3FF, 0x3FF];

/// Smallest encodable ANC line: header fields plus checksum, no user words.
const MIN_LINE_BITS: usize = 6 + 1 + 11 + 12 + 10 + 10 + 10 + 10;

/// One ancillary data line recovered from a SMPTE 2038 PES packet.
///
/// `did`, `sdid`, `data_count` and `checksum` keep the raw 10-bit words as
/// carried on the wire; parity is validated when the line is expanded with
/// [`to_words`].
///
/// [`to_words`]: #method.to_words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncDataLine {
    /// `true` if the line belongs to the chroma channel.
    pub c_not_y_channel: bool,

    /// Video line number the ancillary data is positioned on.
    pub line_number: u16,

    /// Horizontal offset within the line.
    pub horizontal_offset: u16,

    /// Data identifier (10-bit word).
    pub did: u16,

    /// Secondary data identifier (10-bit word).
    pub sdid: u16,

    /// User data word count (10-bit word; the count itself is the low byte).
    pub data_count: u16,

    /// User data words, carried verbatim.
    pub user_words: Vec<u16>,

    /// Checksum word.
    pub checksum: u16,
}
impl AncDataLine {
    /// Builds a line from a raw payload, applying SMPTE 291M parity and
    /// checksum to every word.
    ///
    /// This is the encode-side boundary used to wrap byte-oriented messages
    /// (e.g. SCTE-104) into a VANC line.
    ///
    /// # Errors
    ///
    /// If `payload` exceeds 255 bytes or `line_number` does not fit in 11
    /// bits, it will return an `ErrorKind::InvalidInput` error.
    pub fn from_payload(line_number: u16, did: u8, sdid: u8, payload: &[u8]) -> Result<Self> {
        track_assert!(
            payload.len() <= 0xFF,
            ErrorKind::InvalidInput,
            "Too long ANC payload: {} bytes",
            payload.len()
        );
        track_assert!(
            line_number < (1 << 11),
            ErrorKind::InvalidInput,
            "Too large line number: {}",
            line_number
        );

        let did = with_parity(did);
        let sdid = with_parity(sdid);
        let data_count = with_parity(payload.len() as u8);
        let user_words: Vec<u16> = payload.iter().map(|&b| with_parity(b)).collect();
        let checksum = checksum_word(did, sdid, data_count, &user_words);
        Ok(AncDataLine {
            c_not_y_channel: false,
            line_number,
            horizontal_offset: 0,
            did,
            sdid,
            data_count,
            user_words,
            checksum,
        })
    }

    /// Returns the data identifier value.
    pub fn data_id(&self) -> u8 {
        (self.did & 0xFF) as u8
    }

    /// Returns the secondary data identifier value.
    pub fn secondary_data_id(&self) -> u8 {
        (self.sdid & 0xFF) as u8
    }

    /// Expands the line into the explicit SMPTE 291M word sequence:
    /// ADF, DID, SDID, DC, user words, checksum.
    ///
    /// # Errors
    ///
    /// If the parity bits of any word are inconsistent or the checksum word
    /// does not match, it will return an `ErrorKind::InvalidInput` error;
    /// the error is scoped to this line only.
    pub fn to_words(&self) -> Result<Vec<u16>> {
        for &(word, name) in &[
            (self.did, "DID"),
            (self.sdid, "SDID"),
            (self.data_count, "data count"),
        ] {
            track_assert!(
                has_valid_parity(word),
                ErrorKind::InvalidInput,
                "Parity error in {} word: {:#05x}",
                name,
                word
            );
        }
        for &word in &self.user_words {
            track_assert!(
                has_valid_parity(word),
                ErrorKind::InvalidInput,
                "Parity error in user data word: {:#05x}",
                word
            );
        }
        let expected = checksum_word(self.did, self.sdid, self.data_count, &self.user_words);
        track_assert_eq!(
            self.checksum,
            expected,
            ErrorKind::InvalidInput,
            "ANC checksum mismatch"
        );

        let mut words = Vec::with_capacity(self.user_words.len() + 7);
        words.extend_from_slice(&ADF);
        words.push(self.did);
        words.push(self.sdid);
        words.push(self.data_count);
        words.extend_from_slice(&self.user_words);
        words.push(self.checksum);
        Ok(words)
    }

    /// Reads one line from the 2038 bitstream.
    ///
    /// Returns `Ok(None)` once the stuffing region at the end of the payload
    /// is reached (the six reserved zero bits are absent).
    pub(crate) fn read_from(reader: &mut BitReader) -> Result<Option<Self>> {
        if reader.remaining_bits() < MIN_LINE_BITS || track!(reader.peek_bits(6))? != 0 {
            return Ok(None);
        }
        reader.read_bits(6)?;
        let c_not_y_channel = track!(reader.read_bits(1))? == 1;
        let line_number = track!(reader.read_bits(11))? as u16;
        let horizontal_offset = track!(reader.read_bits(12))? as u16;
        let did = track!(reader.read_bits(10))? as u16;
        let sdid = track!(reader.read_bits(10))? as u16;
        let data_count = track!(reader.read_bits(10))? as u16;

        let count = usize::from(data_count & 0xFF);
        let mut user_words = Vec::with_capacity(count);
        for _ in 0..count {
            user_words.push(track!(reader.read_bits(10))? as u16);
        }
        let checksum = track!(reader.read_bits(10))? as u16;
        reader.align_to_byte();

        Ok(Some(AncDataLine {
            c_not_y_channel,
            line_number,
            horizontal_offset,
            did,
            sdid,
            data_count,
            user_words,
            checksum,
        }))
    }

    pub(crate) fn write_to(&self, writer: &mut BitWriter) {
        writer.write_bits(6, 0);
        writer.write_bits(1, u32::from(self.c_not_y_channel));
        writer.write_bits(11, u32::from(self.line_number));
        writer.write_bits(12, u32::from(self.horizontal_offset));
        writer.write_bits(10, u32::from(self.did));
        writer.write_bits(10, u32::from(self.sdid));
        writer.write_bits(10, u32::from(self.data_count));
        for &word in &self.user_words {
            writer.write_bits(10, u32::from(word));
        }
        writer.write_bits(10, u32::from(self.checksum));
        writer.align_with_ones();
    }
}

/// A parsed SMPTE 2038 PES packet: the declared PTS plus its ancillary lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncDataPacket {
    /// Presentation timestamp declared by the PES header.
    pub pts: Timestamp,

    /// Ancillary data lines, in carriage order.
    pub lines: Vec<AncDataLine>,
}
impl AncDataPacket {
    /// Parses a complete PES packet (header bytes included).
    ///
    /// Corruption in the middle of the line sequence ends the iteration and
    /// keeps the lines already parsed; only a malformed PES header makes the
    /// whole packet undecodable.
    ///
    /// # Errors
    ///
    /// If the PES header is malformed, carries an unexpected stream id or
    /// declares no PTS, it will return an `ErrorKind::InvalidInput` error.
    pub fn parse(pes: &[u8]) -> Result<Self> {
        let mut reader = pes;
        let header = track!(PesHeader::read_from(&mut reader))?;
        track_assert!(
            header.stream_id.is_private_stream_1(),
            ErrorKind::InvalidInput,
            "Unexpected stream id: {:#04x}",
            header.stream_id.as_u8()
        );
        let pts = track_assert_some!(
            header.pts,
            ErrorKind::InvalidInput,
            "SMPTE 2038 PES packet without PTS"
        );

        let mut bits = BitReader::new(reader);
        let mut lines = Vec::new();
        loop {
            match AncDataLine::read_from(&mut bits) {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => break,
                Err(e) => {
                    log::trace!(
                        "Truncated ANC line; keeping {} parsed lines: {:?}",
                        lines.len(),
                        e
                    );
                    break;
                }
            }
        }
        Ok(AncDataPacket { pts, lines })
    }

    /// Writes the packet as a complete SMPTE 2038 PES packet.
    ///
    /// # Errors
    ///
    /// If the encoded payload does not fit the 16-bit PES length field, it
    /// will return an `ErrorKind::InvalidInput` error.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut bits = BitWriter::new();
        for line in &self.lines {
            line.write_to(&mut bits);
        }
        let payload = bits.into_bytes();

        let body_len = 8 + payload.len();
        track_assert!(
            body_len <= usize::from(u16::max_value()),
            ErrorKind::InvalidInput,
            "Too large PES packet: {} bytes",
            body_len
        );
        let header = PesHeader {
            stream_id: StreamId::new(StreamId::PRIVATE_STREAM_1),
            pes_packet_len: body_len as u16,
            pts: Some(self.pts),
        };
        track!(header.write_to(&mut writer))?;
        track_io!(writer.write_all(&payload))?;
        Ok(())
    }
}

fn with_parity(value: u8) -> u16 {
    let b8 = u16::from(value.count_ones() as u8 & 1);
    (!b8 & 1) << 9 | b8 << 8 | u16::from(value)
}

fn has_valid_parity(word: u16) -> bool {
    with_parity((word & 0xFF) as u8) == word & 0x3FF
}

fn checksum_word(did: u16, sdid: u16, data_count: u16, user_words: &[u16]) -> u16 {
    let mut sum = u32::from(did & 0x1FF) + u32::from(sdid & 0x1FF) + u32::from(data_count & 0x1FF);
    for &word in user_words {
        sum += u32::from(word & 0x1FF);
    }
    let sum = (sum & 0x1FF) as u16;
    (!(sum >> 8) & 1) << 9 | sum
}
