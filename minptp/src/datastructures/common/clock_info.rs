//! Grandmaster description carried by announce messages, and the comparison
//! used to pick the best of two of them

use core::cmp::Ordering;

use super::{ClockIdentity, ClockQuality, TimeSource};
use crate::datastructures::{read_array, write_bytes, WireFormat, WireFormatError};

/// Everything an announce message says about its grandmaster.
///
/// For more details see *IEEE1588-2019 section 13.5.1*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockInfo {
    /// First priority, lower takes precedence
    pub priority_1: u8,
    /// Advertised quality of the grandmaster
    pub clock_quality: ClockQuality,
    /// Second priority, lower takes precedence
    pub priority_2: u8,
    /// Identity of the grandmaster
    pub identity: ClockIdentity,
    /// Number of hops between the sender and the grandmaster
    pub steps_removed: u16,
    /// Source of the grandmaster's time
    pub time_source: TimeSource,
}

impl ClockInfo {
    /// Lowest possible priority
    pub const PRIORITY_MIN: u8 = 255;
    /// Middle priority, the usual default
    pub const PRIORITY_MID: u8 = 128;
    /// Highest possible priority
    pub const PRIORITY_MAX: u8 = 0;

    /// Compare two grandmasters, where [`Ordering::Less`] means `self` is the
    /// better one.
    ///
    /// Fields are compared in order of precedence: priority 1, clock class,
    /// accuracy, variance, priority 2 and finally the identity. For two
    /// descriptions of the same grandmaster, the one with fewer steps wins.
    pub fn compare(&self, other: &Self) -> Ordering {
        if self.identity == other.identity {
            return self.steps_removed.cmp(&other.steps_removed);
        }

        match self.priority_1.cmp(&other.priority_1) {
            Ordering::Equal => {}
            ordering => return ordering,
        }
        match self
            .clock_quality
            .clock_class
            .cmp(&other.clock_quality.clock_class)
        {
            Ordering::Equal => {}
            ordering => return ordering,
        }
        match self
            .clock_quality
            .clock_accuracy
            .cmp(&other.clock_quality.clock_accuracy)
        {
            Ordering::Equal => {}
            ordering => return ordering,
        }
        match self
            .clock_quality
            .offset_scaled_log_variance
            .cmp(&other.clock_quality.offset_scaled_log_variance)
        {
            Ordering::Equal => {}
            ordering => return ordering,
        }
        match self.priority_2.cmp(&other.priority_2) {
            Ordering::Equal => {}
            ordering => return ordering,
        }

        self.identity.cmp(&other.identity)
    }

    /// Whether `self` should be preferred over `other`
    pub fn is_better_than(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Less
    }
}

impl Default for ClockInfo {
    /// A clock with the lowest possible priority on every metric
    fn default() -> Self {
        Self {
            priority_1: Self::PRIORITY_MIN,
            clock_quality: ClockQuality::default(),
            priority_2: Self::PRIORITY_MIN,
            identity: ClockIdentity::default(),
            steps_removed: 0,
            time_source: TimeSource::InternalOscillator,
        }
    }
}

impl WireFormat for ClockInfo {
    fn wire_size(&self) -> usize {
        17
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        write_bytes(buffer, 0, &[self.priority_1])?;
        self.clock_quality
            .serialize(buffer.get_mut(1..).ok_or(WireFormatError::BufferTooShort)?)?;
        write_bytes(buffer, 5, &[self.priority_2])?;
        write_bytes(buffer, 6, &self.identity.0)?;
        write_bytes(buffer, 14, &self.steps_removed.to_be_bytes())?;
        write_bytes(buffer, 16, &[self.time_source.into()])
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let [priority_1] = read_array(buffer, 0)?;
        let [priority_2] = read_array(buffer, 5)?;
        let [time_source] = read_array(buffer, 16)?;

        Ok(Self {
            priority_1,
            clock_quality: ClockQuality::deserialize(
                buffer.get(1..).ok_or(WireFormatError::BufferTooShort)?,
            )?,
            priority_2,
            identity: ClockIdentity(read_array(buffer, 6)?),
            steps_removed: u16::from_be_bytes(read_array(buffer, 14)?),
            time_source: TimeSource::from(time_source),
        })
    }
}
