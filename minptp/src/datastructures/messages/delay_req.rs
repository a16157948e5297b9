use super::Header;
use crate::{datastructures::WireFormatError, time::Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayReqMessage {
    pub(crate) header: Header,
    pub(crate) origin_timestamp: Time,
}

impl DelayReqMessage {
    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.origin_timestamp.write_to(buffer)
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        Ok(Self {
            header,
            origin_timestamp: Time::read_from(buffer)?,
        })
    }
}
