use crate::datastructures::{read_array, window_mut, write_bytes, WireFormat, WireFormatError};

/// The type of a TLV, see *IEEE1588-2019 section 14.1.1*
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TlvType(pub u16);

impl TlvType {
    /// Management TLV
    pub const MANAGEMENT: Self = Self(0x0001);
    /// Organization extension, only for the recipient
    pub const ORGANIZATION_EXTENSION: Self = Self(0x0003);
    /// Path trace
    pub const PATH_TRACE: Self = Self(0x0008);
    /// Organization extension that boundary clocks forward
    pub const ORGANIZATION_EXTENSION_PROPAGATE: Self = Self(0x4000);
    /// Organization extension that boundary clocks drop
    pub const ORGANIZATION_EXTENSION_DO_NOT_PROPAGATE: Self = Self(0x8000);
    /// Padding
    pub const PAD: Self = Self(0x8008);
    /// Authentication
    pub const AUTHENTICATION: Self = Self(0x8009);

    /// Whether the TLV starts with an organization id and sub type
    pub fn is_organization_extension(self) -> bool {
        self == Self::ORGANIZATION_EXTENSION
            || self == Self::ORGANIZATION_EXTENSION_PROPAGATE
            || self == Self::ORGANIZATION_EXTENSION_DO_NOT_PROPAGATE
    }

    /// Whether a boundary clock forwards this TLV on announce messages, even
    /// when it does not understand it. See *IEEE1588-2019 table 52*.
    pub fn propagates(self) -> bool {
        match self.0 {
            0x0000..=0x0007 => false,
            0x0008..=0x0009 => true,
            0x000a..=0x3fff => false,
            0x4000..=0x7fff => true,
            _ => false,
        }
    }
}

/// Header of a single TLV.
///
/// `length` counts the value only. For organization extensions the
/// organization id and sub type (24 bits each) are part of the header, and
/// not of `length`, even though the wire format counts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlvHeader {
    /// Type of the TLV
    pub tlv_type: TlvType,
    /// Length of the value in bytes
    pub length: u16,
    /// Organization id, zero outside of organization extensions
    pub organization_id: u32,
    /// Organization sub type, zero outside of organization extensions
    pub organization_sub_type: u32,
}

impl TlvHeader {
    /// Whether both headers name the same kind of TLV, ignoring the length
    pub fn matches(&self, other: &TlvHeader) -> bool {
        self.tlv_type == other.tlv_type
            && self.organization_id == other.organization_id
            && self.organization_sub_type == other.organization_sub_type
    }

    /// The length of this header on the wire
    pub fn header_length(&self) -> usize {
        if self.tlv_type.is_organization_extension() {
            10
        } else {
            4
        }
    }

    /// The length of this header plus its value on the wire
    pub fn total_length(&self) -> usize {
        self.header_length() + self.length as usize
    }
}

impl WireFormat for TlvHeader {
    fn wire_size(&self) -> usize {
        self.header_length()
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let buffer = window_mut(buffer, 0, self.header_length())?;
        buffer[0..2].copy_from_slice(&self.tlv_type.0.to_be_bytes());

        if self.tlv_type.is_organization_extension() {
            let length = self.length.checked_add(6).ok_or(WireFormatError::Invalid)?;
            buffer[2..4].copy_from_slice(&length.to_be_bytes());
            buffer[4..7].copy_from_slice(&self.organization_id.to_be_bytes()[1..]);
            buffer[7..10].copy_from_slice(&self.organization_sub_type.to_be_bytes()[1..]);
        } else {
            buffer[2..4].copy_from_slice(&self.length.to_be_bytes());
        }

        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let tlv_type = TlvType(u16::from_be_bytes(read_array(buffer, 0)?));
        let length = u16::from_be_bytes(read_array(buffer, 2)?);

        if !tlv_type.is_organization_extension() {
            return Ok(Self {
                tlv_type,
                length,
                ..Default::default()
            });
        }

        if length < 6 {
            return Err(WireFormatError::Invalid);
        }
        let [a, b, c, d, e, f] = read_array::<6>(buffer, 4)?;
        Ok(Self {
            tlv_type,
            length: length - 6,
            organization_id: u32::from_be_bytes([0, a, b, c]),
            organization_sub_type: u32::from_be_bytes([0, d, e, f]),
        })
    }
}

/// A TLV with its value, borrowed from a message buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// The header, with `length` equal to the length of `value`
    pub header: TlvHeader,
    /// The value field
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// A TLV of `tlv_type` holding `value`
    pub fn new(tlv_type: TlvType, value: &'a [u8]) -> Result<Self, WireFormatError> {
        Ok(Self {
            header: TlvHeader {
                tlv_type,
                length: u16::try_from(value.len()).map_err(|_| WireFormatError::Invalid)?,
                ..Default::default()
            },
            value,
        })
    }

    /// An organization extension TLV holding `value`
    pub fn organization(
        tlv_type: TlvType,
        organization_id: u32,
        organization_sub_type: u32,
        value: &'a [u8],
    ) -> Result<Self, WireFormatError> {
        if !tlv_type.is_organization_extension()
            || organization_id > 0xff_ffff
            || organization_sub_type > 0xff_ffff
        {
            return Err(WireFormatError::Invalid);
        }

        let mut tlv = Self::new(tlv_type, value)?;
        tlv.header.organization_id = organization_id;
        tlv.header.organization_sub_type = organization_sub_type;
        Ok(tlv)
    }

    /// The byte size on the wire of this TLV
    pub fn wire_size(&self) -> usize {
        self.header.total_length()
    }

    /// Write this TLV to the start of `buffer`, returning the bytes used
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        if self.header.length as usize != self.value.len() {
            return Err(WireFormatError::Invalid);
        }

        self.header.serialize(buffer)?;
        write_bytes(buffer, self.header.header_length(), self.value)?;
        Ok(self.wire_size())
    }
}

/// The TLVs following the body of a message.
///
/// Iteration stops at the first TLV that does not fit the remaining bytes.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    buffer: &'a [u8],
}

impl<'a> TlvIter<'a> {
    /// Iterate over the TLVs in `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Tlv<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            return None;
        }

        let header = match TlvHeader::deserialize(self.buffer) {
            Ok(header) => header,
            Err(error) => {
                log::debug!("malformed TLV header: {:?}", error);
                self.buffer = &[];
                return None;
            }
        };

        let Some(value) = self
            .buffer
            .get(header.header_length()..header.total_length())
        else {
            log::debug!("TLV of {} bytes does not fit the message", header.length);
            self.buffer = &[];
            return None;
        };

        self.buffer = &self.buffer[header.total_length()..];
        Some(Tlv { header, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tlv_header_wireformat() {
        let representations: [(&[u8], TlvHeader); 2] = [
            (
                &[0x00, 0x08, 0x00, 0x10],
                TlvHeader {
                    tlv_type: TlvType::PATH_TRACE,
                    length: 16,
                    ..Default::default()
                },
            ),
            (
                &[0x40, 0x00, 0x00, 0x08, 0x35, 0xa7, 0x4c, 0x01, 0x02, 0x03],
                TlvHeader {
                    tlv_type: TlvType::ORGANIZATION_EXTENSION_PROPAGATE,
                    length: 2,
                    organization_id: 0x35a74c,
                    organization_sub_type: 0x010203,
                },
            ),
        ];

        for (byte_representation, object_representation) in representations {
            let mut serialization_buffer = [0; 10];
            object_representation
                .serialize(&mut serialization_buffer)
                .unwrap();
            assert_eq!(
                &serialization_buffer[..byte_representation.len()],
                byte_representation
            );
            assert_eq!(object_representation.wire_size(), byte_representation.len());

            let deserialized_data = TlvHeader::deserialize(byte_representation).unwrap();
            assert_eq!(deserialized_data, object_representation);
        }
    }

    #[test]
    fn short_organization_extension() {
        assert_eq!(
            TlvHeader::deserialize(&[0x00, 0x03, 0x00, 0x05, 0, 0, 0, 0, 0, 0]),
            Err(WireFormatError::Invalid)
        );
        assert_eq!(
            TlvHeader::deserialize(&[0x80, 0x00, 0x00, 0x06, 0, 0]),
            Err(WireFormatError::BufferTooShort)
        );
    }

    #[test]
    fn propagation() {
        let cases = [
            (0x0001, false),
            (0x0007, false),
            (0x0008, true),
            (0x0009, true),
            (0x000a, false),
            (0x20ae, false),
            (0x4000, true),
            (0x7fff, true),
            (0x8000, false),
            (0x8009, false),
        ];
        for (tlv_type, propagates) in cases {
            assert_eq!(TlvType(tlv_type).propagates(), propagates, "{tlv_type:#x}");
        }
    }

    #[test]
    fn matching_ignores_length() {
        let a = Tlv::organization(TlvType::ORGANIZATION_EXTENSION, 0x1234, 7, &[1, 2])
            .unwrap()
            .header;
        let b = Tlv::organization(TlvType::ORGANIZATION_EXTENSION, 0x1234, 7, &[])
            .unwrap()
            .header;
        let c = Tlv::organization(TlvType::ORGANIZATION_EXTENSION, 0x1234, 8, &[])
            .unwrap()
            .header;
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
        assert!(Tlv::organization(TlvType::PAD, 1, 1, &[]).is_err());
        assert!(Tlv::organization(TlvType::ORGANIZATION_EXTENSION, 1 << 24, 1, &[]).is_err());
    }

    #[test]
    fn iterate_tlvs() {
        let mut buffer = [0u8; 32];
        let pad = Tlv::new(TlvType::PAD, &[0, 0]).unwrap();
        let org =
            Tlv::organization(TlvType::ORGANIZATION_EXTENSION, 0xabcdef, 1, &[9, 8, 7]).unwrap();
        let mut used = pad.serialize(&mut buffer).unwrap();
        used += org.serialize(&mut buffer[used..]).unwrap();
        assert_eq!(used, 6 + 13);

        let found: std::vec::Vec<_> = TlvIter::new(&buffer[..used]).collect();
        assert_eq!(found, [pad, org]);

        // the second TLV is cut off, the first is still reported
        let found: std::vec::Vec<_> = TlvIter::new(&buffer[..used - 1]).collect();
        assert_eq!(found, [pad]);

        assert_eq!(TlvIter::new(&[]).count(), 0);
        assert_eq!(TlvIter::new(&[0x80]).count(), 0);
    }

    #[test]
    fn value_length_must_match() {
        let mut tlv = Tlv::new(TlvType::PAD, &[1, 2, 3]).unwrap();
        tlv.header.length = 2;
        assert_eq!(tlv.serialize(&mut [0; 16]), Err(WireFormatError::Invalid));

        let tlv = Tlv::new(TlvType::PAD, &[1, 2, 3]).unwrap();
        assert_eq!(tlv.serialize(&mut [0; 6]), Err(WireFormatError::BufferTooShort));
    }
}
