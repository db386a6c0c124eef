//! Transport stream packet framing.
//!
//! Only the pieces of the TS layer needed to pull PES bytes out of demuxed
//! 188-byte packets live here; full demultiplexing (PAT/PMT handling) is the
//! caller's business.
pub use self::packet::TsPacketRef;

mod packet;

use {ErrorKind, Result};

/// Packet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);
impl Pid {
    /// Maximum PID value.
    pub const MAX: u16 = 0x1FFF;

    /// Makes a new `Pid` instance.
    ///
    /// # Errors
    ///
    /// If `pid` exceeds `Pid::MAX`, it will return an `ErrorKind::InvalidInput` error.
    pub fn new(pid: u16) -> Result<Self> {
        track_assert!(
            pid <= Self::MAX,
            ErrorKind::InvalidInput,
            "Too large PID: {}",
            pid
        );
        Ok(Pid(pid))
    }

    /// Returns the value of the PID.
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}
