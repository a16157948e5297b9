//! Wire formats of IEEE1588-2019

use core::fmt::Debug;

pub mod common;
pub mod messages;

/// Errors from reading or writing the PTP wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum WireFormatError {
    /// A field held a value outside of its enumeration
    #[cfg_attr(feature = "std", error("enum conversion failed"))]
    EnumConversionError,
    /// The buffer ended before the data did
    #[cfg_attr(feature = "std", error("a buffer is too short"))]
    BufferTooShort,
    /// The data is inconsistent, e.g. a length field that does not fit
    #[cfg_attr(feature = "std", error("the data is invalid"))]
    Invalid,
}

impl<Enum: num_enum::TryFromPrimitive> From<num_enum::TryFromPrimitiveError<Enum>>
    for WireFormatError
{
    fn from(_: num_enum::TryFromPrimitiveError<Enum>) -> Self {
        Self::EnumConversionError
    }
}

pub(crate) trait WireFormat: Debug + Clone + Eq {
    /// The byte size on the wire of this object
    fn wire_size(&self) -> usize;

    /// Serializes the object into the PTP wire format.
    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError>;

    /// Deserializes the object from the PTP wire format.
    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError>;
}

/// Take `N` bytes starting at `offset`
pub(crate) fn read_array<const N: usize>(
    buffer: &[u8],
    offset: usize,
) -> Result<[u8; N], WireFormatError> {
    buffer
        .get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(WireFormatError::BufferTooShort)
}

/// The mutable window of `len` bytes starting at `offset`
pub(crate) fn window_mut(
    buffer: &mut [u8],
    offset: usize,
    len: usize,
) -> Result<&mut [u8], WireFormatError> {
    buffer
        .get_mut(offset..offset + len)
        .ok_or(WireFormatError::BufferTooShort)
}

/// Copy `data` into `buffer` starting at `offset`
pub(crate) fn write_bytes(
    buffer: &mut [u8],
    offset: usize,
    data: &[u8],
) -> Result<(), WireFormatError> {
    window_mut(buffer, offset, data.len())?.copy_from_slice(data);
    Ok(())
}
