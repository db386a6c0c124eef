//! SMPTE 2038 ancillary data (VANC) extraction and frame reassembly for MPEG2-TS.
//!
//! This crate recovers PES packets carrying SMPTE 2038-2008 encapsulated
//! ancillary data from a demuxed transport stream, decodes them into VANC
//! lines (SMPTE 291M 10-bit words) and reassembles the lines belonging to the
//! same video frame, correlating the ancillary stream's presentation
//! timestamps with the host demux clock.
//!
//! # Pipeline
//!
//! ```text
//! TS packet blocks -> PesExtractor -> PES payloads -> FrameReassembler
//!                                                          |  (enqueue)
//!                   host display callback -> Frame::update |  (drain)
//!                                                          v
//!                                              positioned LineRegions
//! ```
//!
//! # References
//!
//! - SMPTE ST 2038-2008: Carriage of Ancillary Data Packets in an MPEG-2 TS
//! - SMPTE ST 291M: Ancillary Data Packet and Space Formatting
extern crate byteorder;
extern crate log;
#[macro_use]
extern crate trackable;

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| {
            use trackable::error::ErrorKindExt;
            track!(::Error::from(::ErrorKind::Other.cause(e)))
        })
    };
}

pub use error::{Error, ErrorKind};

pub mod anc;
pub mod decoder;
pub mod es;
pub mod frame;
pub mod pes;
pub mod reassembly;
pub mod time;
pub mod ts;

mod error;

/// This crate specific `Result` type.
pub type Result<T> = ::std::result::Result<T, Error>;
