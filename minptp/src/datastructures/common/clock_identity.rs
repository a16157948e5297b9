use crate::datastructures::{read_array, write_bytes, WireFormat, WireFormatError};

/// The EUI-64 naming a PTP instance, unique within the network.
///
/// See *IEEE1588-2019 section 7.5.2.2.2*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Widen an EUI-48 (a mac address) to an EUI-64 by putting `ff:fe` in
    /// the middle.
    ///
    /// ```
    /// # use minptp::ClockIdentity;
    /// let identity = ClockIdentity::from_mac_address([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    /// assert_eq!(identity.to_string(), "00:11:22:ff:fe:33:44:55");
    /// ```
    pub const fn from_mac_address(mac: [u8; 6]) -> Self {
        let [a, b, c, d, e, f] = mac;
        Self([a, b, c, 0xff, 0xfe, d, e, f])
    }
}

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        self.0.len()
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        write_bytes(buffer, 0, &self.0)
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        read_array(buffer, 0).map(Self)
    }
}

impl core::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let [first, rest @ ..] = &self.0;
        write!(f, "{first:02x}")?;
        rest.iter().try_for_each(|byte| write!(f, ":{byte:02x}"))
    }
}
