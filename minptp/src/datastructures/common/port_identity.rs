use super::clock_identity::ClockIdentity;
use crate::datastructures::{read_array, WireFormat, WireFormatError};

/// Identity of a single port of a PTP node.
///
/// Together with the domain, sdo id and sequence id, this is what ties the
/// messages of one exchange together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortIdentity {
    /// Identity of the clock this port belongs to
    pub clock_identity: ClockIdentity,
    /// Index of the port on its clock, starting at 1
    pub port_number: u16,
}

impl WireFormat for PortIdentity {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.clock_identity.serialize(buffer)?;
        crate::datastructures::write_bytes(buffer, 8, &self.port_number.to_be_bytes())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(Self {
            clock_identity: ClockIdentity::deserialize(buffer)?,
            port_number: u16::from_be_bytes(read_array(buffer, 8)?),
        })
    }
}

impl core::fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.clock_identity, self.port_number)
    }
}
