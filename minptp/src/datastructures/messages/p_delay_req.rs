use super::Header;
use crate::{datastructures::WireFormatError, time::Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PDelayReqMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: Time,
}

impl PDelayReqMessage {
    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }

        self.origin_timestamp.write_to(&mut buffer[0..10])?;
        // Reserved, keeps the request as long as the response
        buffer[10..20].fill(0);

        Ok(())
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        if buffer.len() < 20 {
            return Err(WireFormatError::BufferTooShort);
        }

        Ok(Self {
            header,
            origin_timestamp: Time::read_from(&buffer[0..10])?,
        })
    }
}
