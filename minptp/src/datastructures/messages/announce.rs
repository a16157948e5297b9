use super::Header;
use crate::{
    datastructures::{common::ClockInfo, read_array, write_bytes, WireFormat, WireFormatError},
    time::Time,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: Time,
    pub(crate) current_utc_offset: i16,
    pub(crate) clock_info: ClockInfo,
}

impl AnnounceMessage {
    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }

        self.origin_timestamp.write_to(&mut buffer[0..10])?;
        write_bytes(buffer, 10, &self.current_utc_offset.to_be_bytes())?;
        buffer[12] = 0;
        self.clock_info.serialize(&mut buffer[13..30])?;

        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 30 {
            return Err(WireFormatError::BufferTooShort);
        }

        Ok(Self {
            header,
            origin_timestamp: Time::read_from(&buffer[0..10])?,
            current_utc_offset: i16::from_be_bytes(read_array(buffer, 10)?),
            clock_info: ClockInfo::deserialize(&buffer[13..30])?,
        })
    }
}
