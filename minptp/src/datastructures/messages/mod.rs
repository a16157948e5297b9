//! Ptp network messages

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::{common::TlvIter, WireFormatError};

mod announce;
mod delay_req;
mod delay_resp;
mod follow_up;
mod header;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod sync;

pub use announce::*;
pub use delay_req::*;
pub use delay_resp::*;
pub use follow_up::*;
pub use header::*;
pub use p_delay_req::*;
pub use p_delay_resp::*;
pub use p_delay_resp_follow_up::*;
pub use sync::*;

/// Length of the common header
pub const HEADER_LENGTH: usize = 34;

/// Length of the longest message this crate sends (an announce without TLVs)
pub const MAX_DATA_LEN: usize = 64;

/// Room for TLVs appended to a sent message
pub const MAX_TLV_LEN: usize = 64;

#[derive(Debug, Clone, Copy, TryFromPrimitive, IntoPrimitive, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

impl MessageType {
    /// Length of the fixed part of the body, see *IEEE1588-2019 section 13*
    pub fn content_length(self) -> usize {
        match self {
            MessageType::Sync | MessageType::DelayReq | MessageType::FollowUp => 10,
            MessageType::DelayResp
            | MessageType::PDelayReq
            | MessageType::PDelayResp
            | MessageType::PDelayRespFollowUp => 20,
            MessageType::Announce => 30,
            MessageType::Signaling => 10,
            MessageType::Management => 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Sync(SyncMessage),
    DelayReq(DelayReqMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    DelayResp(DelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling(Header),
    Management(Header),
}

impl Message {
    pub fn header(&self) -> &Header {
        match self {
            Message::Sync(m) => &m.header,
            Message::DelayReq(m) => &m.header,
            Message::PDelayReq(m) => &m.header,
            Message::PDelayResp(m) => &m.header,
            Message::FollowUp(m) => &m.header,
            Message::DelayResp(m) => &m.header,
            Message::PDelayRespFollowUp(m) => &m.header,
            Message::Announce(m) => &m.header,
            Message::Signaling(h) => h,
            Message::Management(h) => h,
        }
    }

    /// The byte size on the wire of this message
    pub fn wire_size(&self) -> usize {
        self.header().wire_size() + self.content_type().content_length()
    }

    pub fn content_type(&self) -> MessageType {
        match self {
            Message::Sync(_) => MessageType::Sync,
            Message::DelayReq(_) => MessageType::DelayReq,
            Message::PDelayReq(_) => MessageType::PDelayReq,
            Message::PDelayResp(_) => MessageType::PDelayResp,
            Message::FollowUp(_) => MessageType::FollowUp,
            Message::DelayResp(_) => MessageType::DelayResp,
            Message::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            Message::Announce(_) => MessageType::Announce,
            Message::Signaling(_) => MessageType::Signaling,
            Message::Management(_) => MessageType::Management,
        }
    }

    /// Serializes the object into the PTP wire format.
    ///
    /// Returns the used buffer size that contains the message or an error.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        let content_length = self.content_type().content_length();
        let total = HEADER_LENGTH + content_length;
        let buffer = buffer
            .get_mut(..total)
            .ok_or(WireFormatError::BufferTooShort)?;

        self.header()
            .serialize_header(self.content_type(), content_length, buffer)?;
        let content = &mut buffer[HEADER_LENGTH..];
        match self {
            Message::Sync(m) => m.serialize_content(content)?,
            Message::DelayReq(m) => m.serialize_content(content)?,
            Message::PDelayReq(m) => m.serialize_content(content)?,
            Message::PDelayResp(m) => m.serialize_content(content)?,
            Message::FollowUp(m) => m.serialize_content(content)?,
            Message::DelayResp(m) => m.serialize_content(content)?,
            Message::PDelayRespFollowUp(m) => m.serialize_content(content)?,
            Message::Announce(m) => m.serialize_content(content)?,
            // Only ever parsed, never sent
            Message::Signaling(_) | Message::Management(_) => {
                return Err(WireFormatError::Invalid)
            }
        }

        Ok(total)
    }

    /// Deserializes a message from the PTP wire format.
    ///
    /// The buffer may extend past the declared message length, any trailing
    /// bytes (TLVs, padding) are ignored.
    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let header_data = Header::deserialize_header(buffer)?;
        let message_length = header_data.message_length as usize;
        let content_length = header_data.message_type.content_length();

        if message_length < HEADER_LENGTH + content_length {
            return Err(WireFormatError::Invalid);
        }

        // Skip the header bytes and only keep the content
        let content_buffer = buffer
            .get(HEADER_LENGTH..message_length)
            .ok_or(WireFormatError::BufferTooShort)?;
        let header = header_data.header;

        Ok(match header_data.message_type {
            MessageType::Sync => {
                Message::Sync(SyncMessage::deserialize_content(header, content_buffer)?)
            }
            MessageType::DelayReq => {
                Message::DelayReq(DelayReqMessage::deserialize_content(header, content_buffer)?)
            }
            MessageType::PDelayReq => Message::PDelayReq(PDelayReqMessage::deserialize_content(
                header,
                content_buffer,
            )?),
            MessageType::PDelayResp => Message::PDelayResp(
                PDelayRespMessage::deserialize_content(header, content_buffer)?,
            ),
            MessageType::FollowUp => {
                Message::FollowUp(FollowUpMessage::deserialize_content(header, content_buffer)?)
            }
            MessageType::DelayResp => Message::DelayResp(DelayRespMessage::deserialize_content(
                header,
                content_buffer,
            )?),
            MessageType::PDelayRespFollowUp => Message::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(header, content_buffer)?,
            ),
            MessageType::Announce => {
                Message::Announce(AnnounceMessage::deserialize_content(header, content_buffer)?)
            }
            MessageType::Signaling => Message::Signaling(header),
            MessageType::Management => Message::Management(header),
        })
    }

    /// The TLVs that follow the body of this message in `buffer`.
    ///
    /// `buffer` is the one this message was deserialized from.
    pub fn tlvs<'a>(&self, buffer: &'a [u8]) -> TlvIter<'a> {
        let start = HEADER_LENGTH + self.content_type().content_length();
        let end = buffer
            .get(2..4)
            .map_or(0, |length| u16::from_be_bytes([length[0], length[1]]) as usize);
        TlvIter::new(buffer.get(start..end).unwrap_or_default())
    }

    /// Fix up the message length field of a serialized message after
    /// `extra` bytes of TLVs were appended to it
    pub fn extend_length(buffer: &mut [u8], extra: usize) -> Result<usize, WireFormatError> {
        let length = u16::from_be_bytes(super::read_array(buffer, 2)?) as usize + extra;
        let field = u16::try_from(length).map_err(|_| WireFormatError::Invalid)?;
        super::write_bytes(buffer, 2, &field.to_be_bytes())?;
        Ok(length)
    }
}
