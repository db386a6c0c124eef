use super::Pid;
use {ErrorKind, Result};

/// Borrowed view of one transport stream packet.
#[derive(Debug, Clone)]
pub struct TsPacketRef<'a> {
    /// Packet identifier.
    pub pid: Pid,

    /// Indicates that this packet begins a new PES packet (or PSI section).
    pub payload_unit_start_indicator: bool,

    /// Payload bytes (empty if the packet carries only an adaptation field).
    pub payload: &'a [u8],
}
impl<'a> TsPacketRef<'a> {
    /// Size of a transport stream packet in bytes.
    pub const SIZE: usize = 188;

    /// Synchronization byte.
    pub const SYNC_BYTE: u8 = 0x47;

    /// Parses one 188-byte transport packet.
    ///
    /// # Errors
    ///
    /// If the packet is malformed (wrong size, missing sync byte, transport
    /// error indicator set, or an adaptation field overrunning the packet),
    /// it will return an `ErrorKind::InvalidInput` error.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        track_assert_eq!(
            bytes.len(),
            Self::SIZE,
            ErrorKind::InvalidInput,
            "Not a whole TS packet"
        );
        track_assert_eq!(
            bytes[0],
            Self::SYNC_BYTE,
            ErrorKind::InvalidInput,
            "Missing sync byte: {:#04x}",
            bytes[0]
        );
        track_assert_eq!(
            bytes[1] & 0b1000_0000,
            0,
            ErrorKind::InvalidInput,
            "Transport error indicator is set"
        );

        let payload_unit_start_indicator = (bytes[1] & 0b0100_0000) != 0;
        let pid = track!(Pid::new(
            u16::from(bytes[1] & 0b0001_1111) << 8 | u16::from(bytes[2])
        ))?;

        let adaptation_field_control = (bytes[3] >> 4) & 0b11;
        let has_adaptation_field = (adaptation_field_control & 0b10) != 0;
        let has_payload = (adaptation_field_control & 0b01) != 0;

        let mut offset = 4;
        if has_adaptation_field {
            let adaptation_field_len = usize::from(bytes[4]);
            offset += 1 + adaptation_field_len;
            track_assert!(
                offset <= Self::SIZE,
                ErrorKind::InvalidInput,
                "Adaptation field overruns packet: len={}",
                adaptation_field_len
            );
        }

        let payload = if has_payload {
            &bytes[offset..]
        } else {
            &bytes[Self::SIZE..]
        };
        Ok(TsPacketRef {
            pid,
            payload_unit_start_indicator,
            payload,
        })
    }
}
