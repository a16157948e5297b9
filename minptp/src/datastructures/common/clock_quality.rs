use crate::datastructures::{read_array, write_bytes, WireFormat, WireFormatError};

/// How good a clock claims to be, as advertised in announce messages.
///
/// All three fields order the same way: a lower value is a better clock. For
/// more details see *IEEE1588-2019 section 5.3.7*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockQuality {
    /// Traceability of the clock, see *IEEE1588-2019 table 4*
    pub clock_class: u8,
    /// Expected accuracy, see *IEEE1588-2019 table 5*
    pub clock_accuracy: u8,
    /// Allan deviation as `round(512 * log2(adev_sec) + 32768)`
    pub offset_scaled_log_variance: u16,
}

impl ClockQuality {
    /// Clock class of a primary reference, e.g. a GNSS receiver
    pub const CLASS_PRIMARY: u8 = 6;
    /// Clock class of an application specific reference
    pub const CLASS_APPLICATION_SPECIFIC: u8 = 13;
    /// Clock class of any clock without traceability
    pub const CLASS_DEFAULT: u8 = 248;
    /// Clock class of a clock that never acts as master
    pub const CLASS_SLAVE_ONLY: u8 = 255;

    /// Accurate within 25 ns
    pub const ACCURACY_25NS: u8 = 0x20;
    /// Accurate within 1 us
    pub const ACCURACY_1US: u8 = 0x23;
    /// Accurate within 1 ms
    pub const ACCURACY_1MS: u8 = 0x29;
    /// Accuracy is unknown
    pub const ACCURACY_UNKNOWN: u8 = 0xfe;

    /// Allan deviation of about 10 ns
    pub const VARIANCE_10NS: u16 = 0x4ad9;
    /// Allan deviation of about 1 us
    pub const VARIANCE_1US: u16 = 0x5823;
    /// Allan deviation of one second
    pub const VARIANCE_1S: u16 = 0x8000;
    /// Worst possible variance
    pub const VARIANCE_MAX: u16 = 0xffff;

    /// A good clock: traceable, 25 ns accuracy and 10 ns deviation
    pub const VERY_GOOD: Self = Self {
        clock_class: Self::CLASS_PRIMARY,
        clock_accuracy: Self::ACCURACY_25NS,
        offset_scaled_log_variance: Self::VARIANCE_10NS,
    };
}

impl Default for ClockQuality {
    fn default() -> Self {
        Self {
            clock_class: Self::CLASS_DEFAULT,
            clock_accuracy: Self::ACCURACY_UNKNOWN,
            offset_scaled_log_variance: Self::VARIANCE_MAX,
        }
    }
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        write_bytes(buffer, 0, &[self.clock_class, self.clock_accuracy])?;
        write_bytes(buffer, 2, &self.offset_scaled_log_variance.to_be_bytes())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let [clock_class, clock_accuracy] = read_array(buffer, 0)?;
        Ok(Self {
            clock_class,
            clock_accuracy,
            offset_scaled_log_variance: u16::from_be_bytes(read_array(buffer, 2)?),
        })
    }
}
