//! Top-level SMPTE 2038 decoder.
use frame::Frame;
use pes::PesExtractor;
use reassembly::FrameReassembler;
use time::Timestamp;
use ts::Pid;
use Result;

/// SMPTE 2038 ancillary data decoder.
///
/// Glues the extraction pipeline together: demuxed TS packet blocks go in,
/// empty [`Frame`] placeholders come out as new presentation timestamps are
/// observed, and the host fills each frame later through
/// [`Frame::update`] at its own display cadence.
///
/// The ingestion side (`decode`) and the display side (`Frame::update`) may
/// run on different threads; the pending packet queue between them carries
/// its own lock.
///
/// [`Frame`]: ../frame/struct.Frame.html
/// [`Frame::update`]: ../frame/struct.Frame.html#method.update
#[derive(Debug)]
pub struct Smpte2038Decoder {
    extractor: PesExtractor,
    reassembler: FrameReassembler,
}
impl Smpte2038Decoder {
    /// Makes a new `Smpte2038Decoder` instance.
    ///
    /// If `pid` is `Some`, only transport packets carrying that PID are
    /// examined.
    pub fn new(pid: Option<Pid>) -> Self {
        Smpte2038Decoder {
            extractor: PesExtractor::new(pid),
            reassembler: FrameReassembler::new(),
        }
    }

    /// Ingests one demuxed block of whole 188-byte transport packets.
    ///
    /// `demux_pts` is the upstream demux clock at the block's arrival; it
    /// seeds the PTS skew correction on the first extracted PES packet.
    /// Returns the frames newly opened by this block, each an empty
    /// placeholder to be populated at display time.
    ///
    /// PES packets that fail to parse are logged and skipped; the worst
    /// observable effect of corrupt input is missing ancillary lines, never
    /// a hard failure.
    ///
    /// # Errors
    ///
    /// If `block` is not a multiple of 188 bytes long, it will return an
    /// `ErrorKind::InvalidInput` error.
    pub fn decode(&mut self, block: &[u8], demux_pts: Timestamp) -> Result<Vec<Frame>> {
        track!(self.extractor.push(block))?;

        let mut frames = Vec::new();
        while let Some(payload) = self.extractor.pop_payload() {
            match self.reassembler.ingest(payload, demux_pts) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {}
                Err(e) => log::trace!("Dropped undecodable PES packet: {:?}", e),
            }
        }
        Ok(frames)
    }

    /// Returns the number of PES packets awaiting display-time parsing.
    pub fn pending(&self) -> usize {
        self.reassembler.pending()
    }

    /// Drops all buffered state (decoder stop or stream discontinuity).
    /// Queued packets are released and the PTS skew is recomputed from the
    /// next stream.
    pub fn reset(&mut self) {
        self.extractor.reset();
        self.reassembler.reset();
    }
}
