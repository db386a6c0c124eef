//! Host-facing ancillary data frames.
use std::sync::{Arc, Mutex, Weak};

use anc::AncDataPacket;
use reassembly::PendingQueue;
use time::Timestamp;

/// Display format description supplied by the host at display time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    /// Picture width in pixels.
    pub width: u32,

    /// Picture height in pixels.
    pub height: u32,

    /// Sample aspect ratio numerator.
    pub sar_num: u32,

    /// Sample aspect ratio denominator.
    pub sar_den: u32,
}

/// One VANC line positioned for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRegion {
    /// Horizontal position (always 0 for full ancillary lines).
    pub x: u16,

    /// Target video line number.
    pub line_number: u16,

    /// Expanded SMPTE 291M word sequence for the line.
    pub words: Vec<u16>,
}

/// A frame of ancillary data lines being assembled for one display instant.
///
/// A `Frame` is handed to the host as an empty placeholder as soon as a new
/// PTS is observed and is only populated when the host invokes [`update`] at
/// its own display cadence. Clones share the same underlying frame; dropping
/// the last clone releases it.
///
/// [`update`]: #method.update
#[derive(Debug, Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

#[derive(Debug)]
pub(crate) struct FrameInner {
    target_pts: u64,
    queue: Arc<PendingQueue>,
    regions: Mutex<Vec<LineRegion>>,
}

impl Frame {
    /// Display window assigned to each produced frame, in 90 kHz units
    /// (1/30 second).
    pub const DISPLAY_WINDOW: u64 = Timestamp::RESOLUTION / 30;

    pub(crate) fn new(target_pts: u64, queue: Arc<PendingQueue>) -> Self {
        Frame {
            inner: Arc::new(FrameInner {
                target_pts,
                queue,
                regions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<FrameInner> {
        Arc::downgrade(&self.inner)
    }

    /// Returns the (skew-corrected) presentation timestamp of the frame.
    pub fn target_pts(&self) -> u64 {
        self.inner.target_pts
    }

    /// Returns the display interval `(start, stop)` in 90 kHz units.
    pub fn display_window(&self) -> (u64, u64) {
        (
            self.inner.target_pts,
            self.inner.target_pts + Self::DISPLAY_WINDOW,
        )
    }

    /// Display-time callback: drains all queued PES packets due at or before
    /// this frame's PTS and appends one positioned region per ancillary line.
    ///
    /// Queued packets keyed after this frame are left for future frames. A
    /// packet that fails to parse is dropped without affecting its siblings;
    /// a line that fails word expansion ends the line walk for that packet
    /// only. Nothing here blocks: when no eligible packet remains, the drain
    /// simply stops.
    ///
    /// `display_ts` is the host display clock instant; eligibility is keyed
    /// on the frame's own PTS, so it is accepted for interface compatibility
    /// only. An invalid destination aspect ratio makes the call a no-op, as
    /// hosts probe with zeroed formats during renegotiation.
    pub fn update(&self, _fmt_src: &VideoFormat, fmt_dst: &VideoFormat, _display_ts: Timestamp) {
        if fmt_dst.sar_num == 0 || fmt_dst.sar_den == 0 {
            return;
        }

        while let Some(payload) = self.inner.queue.pop_eligible(self.inner.target_pts) {
            let packet = match AncDataPacket::parse(&payload) {
                Ok(packet) => packet,
                Err(e) => {
                    log::trace!("Dropped undecodable PES packet: {:?}", e);
                    continue;
                }
            };
            let mut regions = self.inner.regions.lock().expect("Never fails");
            for line in &packet.lines {
                match line.to_words() {
                    Ok(words) => regions.push(LineRegion {
                        x: 0,
                        line_number: line.line_number,
                        words,
                    }),
                    Err(e) => {
                        log::trace!("Corrupt ANC line {}: {:?}", line.line_number, e);
                        break;
                    }
                }
            }
        }
    }

    /// Returns a snapshot of the regions populated so far.
    pub fn regions(&self) -> Vec<LineRegion> {
        self.inner.regions.lock().expect("Never fails").clone()
    }
}
