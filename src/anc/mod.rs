//! SMPTE 2038 ancillary data payloads.
//!
//! # References
//!
//! - SMPTE ST 2038-2008: Carriage of Ancillary Data Packets in an MPEG-2 TS
//! - SMPTE ST 291M: Ancillary Data Packet and Space Formatting
pub use self::line::{AncDataLine, AncDataPacket};

pub mod bits;

mod line;
