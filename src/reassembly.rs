//! Frame reassembly and PES timing correlation.
//!
//! Parsed-at-display-time by design: at ingestion time there is no way to
//! know whether more PES packets for the same frame are still arriving, so
//! raw PES packets are queued keyed by their (skew-corrected) PTS and only
//! expanded into ancillary lines when the host drains a frame.
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};

use frame::{Frame, FrameInner};
use pes::PesHeader;
use time::Timestamp;
use {ErrorKind, Result};

/// FIFO of PES packets awaiting display-time parsing.
///
/// The sole resource shared between the ingestion thread (push) and the
/// host's display thread (pop); both sides are non-blocking.
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Mutex<VecDeque<QueuedPes>>,
}
impl PendingQueue {
    /// Appends a raw PES packet keyed by its corrected PTS.
    pub fn push(&self, key: u64, payload: Vec<u8>) {
        let mut entries = self.entries.lock().expect("Never fails");
        entries.push_back(QueuedPes { key, payload });
    }

    /// Pops the front entry if its key is not past `target`.
    ///
    /// Entries keyed after `target` belong to a future frame and stay
    /// queued, as does everything behind them. Ordering is evaluated on the
    /// wrapping 33-bit clock, so entries keyed just past a PTS wrap are not
    /// drained by pre-wrap frames.
    pub fn pop_eligible(&self, target: u64) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().expect("Never fails");
        if pts_is_after(entries.front()?.key, target) {
            return None;
        }
        entries.pop_front().map(|e| e.payload)
    }

    /// Returns the number of queued packets.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("Never fails").len()
    }

    /// Returns `true` if no packets are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self) {
        self.entries.lock().expect("Never fails").clear();
    }
}

#[derive(Debug)]
struct QueuedPes {
    key: u64,
    payload: Vec<u8>,
}

/// Reassembles SMPTE 2038 PES packets into per-frame ancillary line sets.
///
/// The ancillary stream's PTS is often valid only as a relative clock; the
/// first packet's discrepancy against the demux clock is captured as a
/// constant skew and applied to every subsequent PTS until [`reset`].
///
/// [`reset`]: #method.reset
#[derive(Debug)]
pub struct FrameReassembler {
    queue: Arc<PendingQueue>,
    pts_skew: Option<i64>,
    last_seen_pts: Option<u64>,
    open_frames: BTreeMap<u64, Weak<FrameInner>>,
    max_open_frames: usize,
}
impl FrameReassembler {
    /// Default bound on frames awaiting their display callback.
    pub const DEFAULT_MAX_OPEN_FRAMES: usize = 4;

    /// Makes a new `FrameReassembler` instance with the default bound.
    pub fn new() -> Self {
        Self::with_max_open_frames(Self::DEFAULT_MAX_OPEN_FRAMES)
    }

    /// Makes a new `FrameReassembler` instance tracking at most
    /// `max_open_frames` outstanding frame handles.
    ///
    /// A bound of 1 approximates the classic single-pending-slot decoders,
    /// except that the oldest frame is evicted (with a warning) instead of
    /// new PTS values being silently folded into the open frame.
    pub fn with_max_open_frames(max_open_frames: usize) -> Self {
        FrameReassembler {
            queue: Arc::new(PendingQueue::default()),
            pts_skew: None,
            last_seen_pts: None,
            open_frames: BTreeMap::new(),
            max_open_frames: max_open_frames.max(1),
        }
    }

    /// Returns the computed PTS skew, once known.
    pub fn pts_skew(&self) -> Option<i64> {
        self.pts_skew
    }

    /// Returns the number of PES packets awaiting display-time parsing.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Ingests one complete PES packet.
    ///
    /// The packet is always enqueued for deferred parsing; a new [`Frame`]
    /// placeholder is returned when this PTS has not been seen yet and no
    /// live handle exists for it.
    ///
    /// `demux_pts` is the upstream demux clock at the packet's arrival and
    /// seeds the skew correction on the first packet.
    ///
    /// # Errors
    ///
    /// If the PES header is malformed or declares no PTS, it will return an
    /// `ErrorKind::InvalidInput` error (the packet is not enqueued).
    ///
    /// [`Frame`]: ../frame/struct.Frame.html
    pub fn ingest(&mut self, pes: Vec<u8>, demux_pts: Timestamp) -> Result<Option<Frame>> {
        let header = track!(PesHeader::read_from(&pes[..]))?;
        let pts = track_assert_some!(
            header.pts,
            ErrorKind::InvalidInput,
            "PES packet without PTS"
        );
        let p = pts.as_u64();

        let skew = match self.pts_skew {
            Some(skew) => skew,
            None => {
                let skew = demux_pts.as_u64() as i64 - p as i64;
                log::trace!("PTS skew locked at {}", skew);
                self.pts_skew = Some(skew);
                skew
            }
        };
        let key = apply_skew(p, skew);
        self.queue.push(key, pes);

        if self.last_seen_pts == Some(p) {
            return Ok(None);
        }
        self.last_seen_pts = Some(p);
        Ok(self.open_frame(key))
    }

    /// Clears all reassembly state: the queue, the skew, the last seen PTS
    /// and the open frame tracking (decoder stop or stream discontinuity).
    pub fn reset(&mut self) {
        self.queue.clear();
        self.pts_skew = None;
        self.last_seen_pts = None;
        self.open_frames.clear();
    }

    fn open_frame(&mut self, key: u64) -> Option<Frame> {
        if let Some(weak) = self.open_frames.get(&key) {
            if weak.upgrade().is_some() {
                return None;
            }
        }
        let dead: Vec<u64> = self
            .open_frames
            .iter()
            .filter(|&(_, w)| w.upgrade().is_none())
            .map(|(&k, _)| k)
            .collect();
        for k in dead {
            self.open_frames.remove(&k);
        }
        while self.open_frames.len() >= self.max_open_frames {
            let oldest = *self.open_frames.keys().next().expect("Never fails");
            self.open_frames.remove(&oldest);
            log::warn!(
                "Too many frames in flight; dropped tracking of frame pts={}",
                oldest
            );
        }

        let frame = Frame::new(key, Arc::clone(&self.queue));
        self.open_frames.insert(key, frame.downgrade());
        Some(frame)
    }
}
impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_skew(pts: u64, skew: i64) -> u64 {
    // PTS wraps on the 33-bit clock; keep the corrected key on it too.
    const MODULUS: i64 = (Timestamp::MAX + 1) as i64;
    (pts as i64 + skew).rem_euclid(MODULUS) as u64
}

/// Returns `true` if `key` lies ahead of `target` on the wrapping 33-bit
/// clock (less than half the clock period away in the forward direction).
fn pts_is_after(key: u64, target: u64) -> bool {
    const MODULUS: u64 = Timestamp::MAX + 1;
    let ahead = (key + MODULUS - target) % MODULUS;
    ahead != 0 && ahead < MODULUS / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use anc::{AncDataLine, AncDataPacket};

    fn pes(pts: u64) -> Vec<u8> {
        let packet = AncDataPacket {
            pts: Timestamp::new(pts).unwrap(),
            lines: vec![AncDataLine::from_payload(9, 0x61, 0x01, &[1, 2]).unwrap()],
        };
        let mut buf = Vec::new();
        packet.write_to(&mut buf).unwrap();
        buf
    }

    fn ts(n: u64) -> Timestamp {
        Timestamp::new(n).unwrap()
    }

    #[test]
    fn skew_is_computed_once_and_held() {
        let mut reassembler = FrameReassembler::new();
        reassembler.ingest(pes(100), ts(1100)).unwrap();
        assert_eq!(reassembler.pts_skew(), Some(1000));

        // Later drift between the two clocks must not move the skew.
        reassembler.ingest(pes(200), ts(1500)).unwrap();
        reassembler.ingest(pes(300), ts(9999)).unwrap();
        assert_eq!(reassembler.pts_skew(), Some(1000));
    }

    #[test]
    fn skew_can_be_negative() {
        let mut reassembler = FrameReassembler::new();
        let frame = reassembler.ingest(pes(5000), ts(2000)).unwrap().unwrap();
        assert_eq!(reassembler.pts_skew(), Some(-3000));
        assert_eq!(frame.target_pts(), 2000);
    }

    #[test]
    fn same_pts_packets_share_one_frame() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.ingest(pes(100), ts(100)).unwrap().is_some());
        assert!(reassembler.ingest(pes(100), ts(105)).unwrap().is_none());
        assert_eq!(reassembler.pending(), 2);
    }

    #[test]
    fn new_pts_opens_new_frame() {
        let mut reassembler = FrameReassembler::new();
        let a = reassembler.ingest(pes(100), ts(100)).unwrap().unwrap();
        let b = reassembler.ingest(pes(200), ts(210)).unwrap().unwrap();
        assert_eq!(a.target_pts(), 100);
        assert_eq!(b.target_pts(), 200);
    }

    #[test]
    fn live_handle_blocks_duplicate_frame_for_same_pts() {
        let mut reassembler = FrameReassembler::new();
        let first = reassembler.ingest(pes(100), ts(100)).unwrap();
        // Interleaved PTS values: 100, 200, then 100 again.
        reassembler.ingest(pes(200), ts(205)).unwrap();
        let again = reassembler.ingest(pes(100), ts(208)).unwrap();
        assert!(first.is_some());
        assert!(again.is_none());
        assert_eq!(reassembler.pending(), 3);
    }

    #[test]
    fn bounded_open_frames_evicts_oldest() {
        let mut reassembler = FrameReassembler::with_max_open_frames(2);
        let a = reassembler.ingest(pes(100), ts(100)).unwrap().unwrap();
        let b = reassembler.ingest(pes(200), ts(200)).unwrap().unwrap();
        let c = reassembler.ingest(pes(300), ts(300)).unwrap().unwrap();
        // `a` was evicted from tracking but its handle stays usable.
        assert_eq!(a.target_pts(), 100);
        assert_eq!(b.target_pts(), 200);
        assert_eq!(c.target_pts(), 300);
    }

    #[test]
    fn dropped_handles_are_pruned() {
        let mut reassembler = FrameReassembler::with_max_open_frames(2);
        drop(reassembler.ingest(pes(100), ts(100)).unwrap());
        drop(reassembler.ingest(pes(200), ts(200)).unwrap());
        drop(reassembler.ingest(pes(300), ts(300)).unwrap());
        // Seeing PTS 100 again after its handle died opens a fresh frame.
        reassembler.ingest(pes(400), ts(400)).unwrap();
        let again = reassembler.ingest(pes(100), ts(410)).unwrap();
        assert!(again.is_some());
    }

    #[test]
    fn ingest_rejects_headerless_bytes() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.ingest(vec![0xFF; 32], ts(0)).is_err());
        assert_eq!(reassembler.pending(), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut reassembler = FrameReassembler::new();
        reassembler.ingest(pes(100), ts(400)).unwrap();
        reassembler.reset();
        assert_eq!(reassembler.pending(), 0);
        assert_eq!(reassembler.pts_skew(), None);

        // Skew is recomputed after a reset.
        reassembler.ingest(pes(100), ts(700)).unwrap();
        assert_eq!(reassembler.pts_skew(), Some(600));
    }

    #[test]
    fn skew_keys_wrap_on_the_33_bit_clock() {
        assert_eq!(apply_skew(10, -20), Timestamp::MAX - 9);
        assert_eq!(apply_skew(Timestamp::MAX, 1), 0);
        assert_eq!(apply_skew(100, 50), 150);
    }

    #[test]
    fn drain_gating_survives_the_pts_wrap() {
        let queue = PendingQueue::default();
        queue.push(Timestamp::MAX - 5, vec![1]);
        queue.push(3, vec![2]); // keyed just past the wrap

        // The pre-wrap frame takes its own packet but not the post-wrap one.
        assert_eq!(queue.pop_eligible(Timestamp::MAX - 5), Some(vec![1]));
        assert_eq!(queue.pop_eligible(Timestamp::MAX - 5), None);

        // The post-wrap frame drains it, along with anything overdue.
        assert_eq!(queue.pop_eligible(3), Some(vec![2]));
        assert!(queue.is_empty());
    }

    #[test]
    fn pts_ordering_is_modular() {
        assert!(pts_is_after(3, Timestamp::MAX - 5));
        assert!(!pts_is_after(Timestamp::MAX - 5, 3));
        assert!(!pts_is_after(100, 100));
        assert!(pts_is_after(200, 100));
    }
}
