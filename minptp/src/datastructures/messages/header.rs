use getset::CopyGetters;

use super::{MessageType, HEADER_LENGTH};
use crate::datastructures::{
    common::{PortIdentity, TimeInterval},
    read_array, window_mut, write_bytes, WireFormat, WireFormatError,
};

/// The common header of every PTP message.
///
/// For more details see *IEEE1588-2019 section 13.3*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct Header {
    pub(crate) sdo_id: SdoId,
    pub(crate) version: PtpVersion,
    pub(crate) domain_number: u8,
    pub(crate) alternate_master_flag: bool,
    pub(crate) two_step_flag: bool,
    pub(crate) unicast_flag: bool,
    pub(crate) ptp_profile_specific_1: bool,
    pub(crate) ptp_profile_specific_2: bool,
    pub(crate) leap61: bool,
    pub(crate) leap59: bool,
    pub(crate) current_utc_offset_valid: bool,
    pub(crate) ptp_timescale: bool,
    pub(crate) time_tracable: bool,
    pub(crate) frequency_tracable: bool,
    pub(crate) synchronization_uncertain: bool,
    pub(crate) correction_field: TimeInterval,
    pub(crate) source_port_identity: PortIdentity,
    pub(crate) sequence_id: u16,
    pub(crate) log_message_interval: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeserializedHeader {
    pub(crate) header: Header,
    pub(crate) message_type: MessageType,
    pub(crate) message_length: u16,
}

impl Header {
    pub(crate) fn new() -> Self {
        Self {
            sdo_id: SdoId(0),
            version: PtpVersion { major: 2, minor: 1 },
            domain_number: 0,
            alternate_master_flag: false,
            two_step_flag: false,
            unicast_flag: false,
            ptp_profile_specific_1: false,
            ptp_profile_specific_2: false,
            leap59: false,
            leap61: false,
            current_utc_offset_valid: false,
            ptp_timescale: false,
            time_tracable: false,
            frequency_tracable: false,
            synchronization_uncertain: false,
            correction_field: TimeInterval::default(),
            source_port_identity: PortIdentity::default(),
            sequence_id: 0,
            log_message_interval: 0,
        }
    }

    pub(crate) fn wire_size(&self) -> usize {
        HEADER_LENGTH
    }

    pub(crate) fn serialize_header(
        &self,
        content_type: MessageType,
        content_length: usize,
        buffer: &mut [u8],
    ) -> Result<(), WireFormatError> {
        let buffer = window_mut(buffer, 0, HEADER_LENGTH)?;
        let message_length =
            u16::try_from(content_length + HEADER_LENGTH).map_err(|_| WireFormatError::Invalid)?;

        buffer[0] = (self.sdo_id.high_nibble() << 4) | (u8::from(content_type) & 0x0f);
        buffer[1] = self.version.as_byte();
        buffer[2..4].copy_from_slice(&message_length.to_be_bytes());
        buffer[4] = self.domain_number;
        buffer[5] = self.sdo_id.low_byte();
        buffer[6] = 0;
        buffer[7] = 0;
        buffer[6] |= self.alternate_master_flag as u8;
        buffer[6] |= (self.two_step_flag as u8) << 1;
        buffer[6] |= (self.unicast_flag as u8) << 2;
        buffer[6] |= (self.ptp_profile_specific_1 as u8) << 5;
        buffer[6] |= (self.ptp_profile_specific_2 as u8) << 6;
        buffer[7] |= self.leap61 as u8;
        buffer[7] |= (self.leap59 as u8) << 1;
        buffer[7] |= (self.current_utc_offset_valid as u8) << 2;
        buffer[7] |= (self.ptp_timescale as u8) << 3;
        buffer[7] |= (self.time_tracable as u8) << 4;
        buffer[7] |= (self.frequency_tracable as u8) << 5;
        buffer[7] |= (self.synchronization_uncertain as u8) << 6;
        self.correction_field.serialize(&mut buffer[8..16])?;
        buffer[16..20].copy_from_slice(&[0, 0, 0, 0]);
        self.source_port_identity.serialize(&mut buffer[20..30])?;
        write_bytes(buffer, 30, &self.sequence_id.to_be_bytes())?;
        buffer[32] = control_field(content_type);
        buffer[33] = self.log_message_interval as u8;

        Ok(())
    }

    pub(crate) fn deserialize_header(buffer: &[u8]) -> Result<DeserializedHeader, WireFormatError> {
        let buffer: [u8; HEADER_LENGTH] = read_array(buffer, 0)?;

        let version = PtpVersion::from_byte(buffer[1]);
        let sdo_id = SdoId((((buffer[0] & 0xf0) as u16) << 4) | (buffer[5] as u16));

        Ok(DeserializedHeader {
            header: Self {
                sdo_id,
                version,
                domain_number: buffer[4],
                alternate_master_flag: (buffer[6] & (1 << 0)) > 0,
                two_step_flag: (buffer[6] & (1 << 1)) > 0,
                unicast_flag: (buffer[6] & (1 << 2)) > 0,
                ptp_profile_specific_1: (buffer[6] & (1 << 5)) > 0,
                ptp_profile_specific_2: (buffer[6] & (1 << 6)) > 0,
                leap61: (buffer[7] & (1 << 0)) > 0,
                leap59: (buffer[7] & (1 << 1)) > 0,
                current_utc_offset_valid: (buffer[7] & (1 << 2)) > 0,
                ptp_timescale: (buffer[7] & (1 << 3)) > 0,
                time_tracable: (buffer[7] & (1 << 4)) > 0,
                frequency_tracable: (buffer[7] & (1 << 5)) > 0,
                synchronization_uncertain: (buffer[7] & (1 << 6)) > 0,
                correction_field: TimeInterval::deserialize(&buffer[8..16])?,
                source_port_identity: PortIdentity::deserialize(&buffer[20..30])?,
                sequence_id: u16::from_be_bytes(read_array(&buffer, 30)?),
                log_message_interval: buffer[33] as i8,
            },
            message_type: (buffer[0] & 0x0f).try_into()?,
            message_length: u16::from_be_bytes(read_array(&buffer, 2)?),
        })
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

// Obsolete in v2.1, but still filled in for v1 hardware.
fn control_field(message_type: MessageType) -> u8 {
    match message_type {
        MessageType::Sync => 0x00,
        MessageType::DelayReq => 0x01,
        MessageType::FollowUp => 0x02,
        MessageType::DelayResp => 0x03,
        MessageType::Management => 0x04,
        _ => 0x05,
    }
}

/// A wrapper type for PTP Sdo Identifiers.
///
/// This is a separate type as sdo identifiers should be in the range 0-4095
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct SdoId(u16);

impl core::fmt::Display for SdoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl SdoId {
    /// Create a new sdo id
    ///
    /// This function only returns an `SdoId` instance if the given identifier
    /// is actually between 0 and 4095. Otherwise, `None` is returned.
    pub fn new(sdo_id: u16) -> Option<Self> {
        (0..0x1000).contains(&sdo_id).then_some(Self(sdo_id))
    }

    /// The raw identifier
    pub fn get(self) -> u16 {
        self.0
    }

    const fn high_nibble(self) -> u8 {
        ((self.0 >> 8) & 0x0f) as u8
    }

    const fn low_byte(self) -> u8 {
        self.0 as u8
    }
}

/// PTP version of a message; only the major version is checked on receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpVersion {
    major: u8,
    minor: u8,
}

impl PtpVersion {
    /// The major version number
    pub fn major(&self) -> u8 {
        self.major
    }

    fn as_byte(&self) -> u8 {
        self.minor << 4 | self.major
    }

    fn from_byte(byte: u8) -> Self {
        Self {
            major: byte & 0x0f,
            minor: byte >> 4,
        }
    }
}
