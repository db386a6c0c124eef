use std::collections::VecDeque;

use byteorder::{BigEndian, ByteOrder};

use ts::{Pid, TsPacketRef};
use {ErrorKind, Result};

/// Length of the PES start code prefix plus stream id and length field.
const PES_PREFIX_LEN: usize = 6;

/// PES packet extractor.
///
/// Recovers discrete PES packets from blocks of demuxed 188-byte transport
/// packets. Payload bytes are accumulated across calls to [`push`], so a PES
/// packet may be assembled from any number of transport packets, and a single
/// transport packet may complete more than one PES packet (the tail of one
/// followed by the whole of a next). Completed packets are drained with
/// [`pop_payload`].
///
/// [`push`]: #method.push
/// [`pop_payload`]: #method.pop_payload
#[derive(Debug)]
pub struct PesExtractor {
    pid: Option<Pid>,
    buf: Vec<u8>,
    complete: VecDeque<Vec<u8>>,
}
impl PesExtractor {
    /// Makes a new `PesExtractor` instance.
    ///
    /// If `pid` is `Some`, transport packets carrying any other PID are
    /// ignored; `None` accepts every PES-bearing packet pushed.
    pub fn new(pid: Option<Pid>) -> Self {
        PesExtractor {
            pid,
            buf: Vec::new(),
            complete: VecDeque::new(),
        }
    }

    /// Ingests a block of whole 188-byte transport packets.
    ///
    /// Returns the number of PES packets completed by this push. Transport
    /// packets that fail to frame (bad sync byte, broken adaptation field)
    /// are dropped and scanning continues with the next packet.
    ///
    /// # Errors
    ///
    /// If `packets` is not a multiple of 188 bytes long, it will return an
    /// `ErrorKind::InvalidInput` error.
    pub fn push(&mut self, packets: &[u8]) -> Result<usize> {
        track_assert_eq!(
            packets.len() % TsPacketRef::SIZE,
            0,
            ErrorKind::InvalidInput,
            "Pushed block is not whole TS packets: len={}",
            packets.len()
        );

        let before = self.complete.len();
        for chunk in packets.chunks(TsPacketRef::SIZE) {
            let packet = match TsPacketRef::parse(chunk) {
                Ok(packet) => packet,
                Err(e) => {
                    log::trace!("Dropped packet: {:?}", e);
                    continue;
                }
            };
            if let Some(pid) = self.pid {
                if packet.pid != pid {
                    continue;
                }
            }
            if packet.payload.is_empty() {
                continue;
            }
            self.buf.extend_from_slice(packet.payload);
            self.scan();
        }
        Ok(self.complete.len() - before)
    }

    /// Takes the next completed PES packet, header bytes included.
    pub fn pop_payload(&mut self) -> Option<Vec<u8>> {
        self.complete.pop_front()
    }

    /// Discards all buffered state (stream discontinuity).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.complete.clear();
    }

    fn scan(&mut self) {
        loop {
            let start = match find_start_code(&self.buf) {
                Some(i) => i,
                None => {
                    // Keep a possible partial start code prefix at the tail.
                    if self.buf.len() > 2 {
                        let garbage = self.buf.len() - 2;
                        self.buf.drain(..garbage);
                    }
                    return;
                }
            };
            if start > 0 {
                self.buf.drain(..start);
            }
            if self.buf.len() < PES_PREFIX_LEN {
                return;
            }

            let pes_packet_len = usize::from(BigEndian::read_u16(&self.buf[4..6]));
            if pes_packet_len == 0 {
                // Unbounded packets cannot be framed from a byte stream;
                // resync past this start code.
                log::trace!("PES packet with zero length field; resyncing");
                self.buf.drain(..3);
                continue;
            }

            let total = PES_PREFIX_LEN + pes_packet_len;
            if self.buf.len() < total {
                return;
            }
            let packet = self.buf.drain(..total).collect();
            self.complete.push_back(packet);
        }
    }
}

fn find_start_code(buf: &[u8]) -> Option<usize> {
    buf.windows(3).position(|w| w == [0, 0, 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use es::StreamId;
    use pes::PesHeader;
    use time::Timestamp;

    fn pes_packet(pts: u64, body: &[u8]) -> Vec<u8> {
        let header = PesHeader {
            stream_id: StreamId::new(StreamId::PRIVATE_STREAM_1),
            pes_packet_len: (8 + body.len()) as u16,
            pts: Some(Timestamp::new(pts).unwrap()),
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        buf.extend_from_slice(body);
        buf
    }

    fn ts_packets(pid: u16, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, chunk) in bytes.chunks(184).enumerate() {
            let mut packet = vec![0xFFu8; 188];
            packet[0] = 0x47;
            packet[1] = (pid >> 8) as u8 | if i == 0 { 0b0100_0000 } else { 0 };
            packet[2] = pid as u8;
            packet[3] = 0b0001_0000;
            packet[4..4 + chunk.len()].copy_from_slice(chunk);
            out.extend_from_slice(&packet);
        }
        out
    }

    #[test]
    fn extracts_single_pes_packet() {
        let pes = pes_packet(1000, b"hello vanc");
        let block = ts_packets(0x65, &pes);

        let mut extractor = PesExtractor::new(Some(Pid::new(0x65).unwrap()));
        assert_eq!(extractor.push(&block).unwrap(), 1);
        assert_eq!(extractor.pop_payload().unwrap(), pes);
        assert!(extractor.pop_payload().is_none());
    }

    #[test]
    fn chunk_boundary_invariance() {
        let pes = pes_packet(2000, &[0xABu8; 400]);
        let block = ts_packets(0x65, &pes);
        assert!(block.len() > 188 * 2);

        // Whole block in one push.
        let mut one = PesExtractor::new(None);
        one.push(&block).unwrap();
        let expected = one.pop_payload().unwrap();
        assert_eq!(expected, pes);

        // One packet per push.
        let mut split = PesExtractor::new(None);
        let mut emitted = 0;
        for chunk in block.chunks(188) {
            emitted += split.push(chunk).unwrap();
        }
        assert_eq!(emitted, 1);
        assert_eq!(split.pop_payload().unwrap(), expected);
    }

    #[test]
    fn two_pes_packets_in_one_transport_packet() {
        let first = pes_packet(1000, b"one");
        let second = pes_packet(2000, b"two");
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second);
        assert!(bytes.len() <= 184);

        let block = ts_packets(0x65, &bytes);
        let mut extractor = PesExtractor::new(None);
        assert_eq!(extractor.push(&block).unwrap(), 2);
        assert_eq!(extractor.pop_payload().unwrap(), first);
        assert_eq!(extractor.pop_payload().unwrap(), second);
    }

    #[test]
    fn pusi_packet_with_trailing_tail_of_previous_pes() {
        let first = pes_packet(1000, &[0x11u8; 200]);
        let second = pes_packet(2000, b"tail");

        // First transport packet: head of `first`.
        let mut stream = ts_packets(0x65, &first[..184]);
        // Second transport packet: marked as a unit start, but still opens
        // with the tail of `first` before `second` begins.
        let mut rest = first[184..].to_vec();
        rest.extend_from_slice(&second);
        stream.extend_from_slice(&ts_packets(0x65, &rest));

        let mut extractor = PesExtractor::new(None);
        assert_eq!(extractor.push(&stream).unwrap(), 2);
        assert_eq!(extractor.pop_payload().unwrap(), first);
        assert_eq!(extractor.pop_payload().unwrap(), second);
    }

    #[test]
    fn garbage_before_start_code_is_skipped() {
        let pes = pes_packet(1000, b"ok");
        let mut bytes = vec![0xDE, 0xAD, 0xBE, 0xEF];
        bytes.extend_from_slice(&pes);

        let mut extractor = PesExtractor::new(None);
        extractor.push(&ts_packets(0x65, &bytes)).unwrap();
        assert_eq!(extractor.pop_payload().unwrap(), pes);
    }

    #[test]
    fn ignores_other_pids() {
        let pes = pes_packet(1000, b"ignored");
        let block = ts_packets(0x66, &pes);
        let mut extractor = PesExtractor::new(Some(Pid::new(0x65).unwrap()));
        assert_eq!(extractor.push(&block).unwrap(), 0);
        assert!(extractor.pop_payload().is_none());
    }

    #[test]
    fn rejects_partial_block() {
        let mut extractor = PesExtractor::new(None);
        assert!(extractor.push(&[0u8; 100]).is_err());
    }

    #[test]
    fn bad_sync_byte_is_not_fatal() {
        let pes = pes_packet(1000, b"after garbage");
        let mut block = vec![0u8; 188];
        block[0] = 0x00; // corrupt sync byte
        block.extend_from_slice(&ts_packets(0x65, &pes));

        let mut extractor = PesExtractor::new(None);
        assert_eq!(extractor.push(&block).unwrap(), 1);
        assert_eq!(extractor.pop_payload().unwrap(), pes);
    }
}
