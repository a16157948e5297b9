use crate::datastructures::{read_array, write_bytes, WireFormat, WireFormatError};

/// Timestamp as it appears in PTP messages.
///
/// Use [`Time`](`crate::time::Time`) for anything but reading and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireTimestamp {
    /// The seconds field of the timestamp.
    /// 48-bit, must be less than 281474976710656
    pub seconds: u64,
    /// The nanoseconds field of the timestamp.
    /// Must be less than 10^9
    pub nanos: u32,
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        write_bytes(buffer, 0, &self.seconds.to_be_bytes()[2..8])?;
        write_bytes(buffer, 6, &self.nanos.to_be_bytes())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let mut seconds_buffer = [0; 8];
        seconds_buffer[2..8].copy_from_slice(&read_array::<6>(buffer, 0)?);

        Ok(Self {
            seconds: u64::from_be_bytes(seconds_buffer),
            nanos: u32::from_be_bytes(read_array(buffer, 6)?),
        })
    }
}
