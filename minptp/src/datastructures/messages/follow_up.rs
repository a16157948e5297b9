use super::Header;
use crate::{datastructures::WireFormatError, time::Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowUpMessage {
    pub(crate) header: Header,
    pub(crate) precise_origin_timestamp: Time,
}

impl FollowUpMessage {
    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.precise_origin_timestamp.write_to(buffer)
    }

    pub(crate) fn deserialize_content(
        header: Header,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        Ok(Self {
            header,
            precise_origin_timestamp: Time::read_from(buffer)?,
        })
    }
}
