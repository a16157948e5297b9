use fixed::types::I48F16;

use crate::datastructures::{read_array, write_bytes, WireFormat, WireFormatError};

/// A signed span of nanoseconds with 16 fractional bits, the format of the
/// correction field.
///
/// The raw bits count the same 2^-16 nanosecond units as
/// [`Time::subns`](`crate::time::Time::subns`), so converting between the two
/// never loses precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "i64", into = "i64")
)]
pub struct TimeInterval(pub I48F16);

impl TimeInterval {
    /// Build an interval from a raw count of subnanoseconds
    pub const fn from_subns(subns: i64) -> Self {
        Self(I48F16::from_bits(subns))
    }

    /// The raw count of subnanoseconds
    pub const fn to_bits(self) -> i64 {
        self.0.to_bits()
    }

    /// Sum of two intervals, clamped to the representable range
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Difference of two intervals, clamped to the representable range
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl From<i64> for TimeInterval {
    fn from(subns: i64) -> Self {
        Self::from_subns(subns)
    }
}

impl From<TimeInterval> for i64 {
    fn from(interval: TimeInterval) -> Self {
        interval.to_bits()
    }
}

impl core::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl WireFormat for TimeInterval {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        write_bytes(buffer, 0, &self.to_bits().to_be_bytes())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        read_array(buffer, 0).map(|bytes| Self::from_subns(i64::from_be_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        let cases: [([u8; 8], f64); 4] = [
            ([0, 0, 0, 0, 0, 0x01, 0x00, 0x00], 1.0),
            ([0, 0, 0, 0, 0, 0x01, 0x80, 0x00], 1.5),
            ([0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00], -1.0),
            ([0, 0, 0, 0, 0x01, 0x2c, 0x00, 0x00], 300.0),
        ];

        for (bytes, nanos) in cases {
            let interval = TimeInterval(I48F16::from_num(nanos));

            let mut buffer = [0; 8];
            interval.serialize(&mut buffer).unwrap();
            assert_eq!(buffer, bytes, "{nanos}");
            assert_eq!(TimeInterval::deserialize(&bytes).unwrap(), interval);
        }

        assert_eq!(
            TimeInterval::deserialize(&[0; 4]),
            Err(WireFormatError::BufferTooShort)
        );
    }

    #[test]
    fn saturating_arithmetic() {
        let a = TimeInterval::from_subns(i64::MAX - 1);
        let b = TimeInterval::from_subns(5);
        assert_eq!(a.saturating_add(b), TimeInterval::from_subns(i64::MAX));
        assert_eq!(
            TimeInterval::from_subns(3).saturating_sub(b),
            TimeInterval::from_subns(-2)
        );
        assert_eq!(i64::from(b), 5);
    }

    #[test]
    fn display() {
        extern crate std;
        use std::string::ToString;

        assert_eq!(TimeInterval(I48F16::from_num(1.5)).to_string(), "1.5ns");
    }
}
