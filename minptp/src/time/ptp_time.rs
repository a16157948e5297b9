//! Implementation of the [Time] type

use core::{
    fmt::Display,
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign},
};

use az::SaturatingAs;

use crate::datastructures::{
    common::{TimeInterval, WireTimestamp},
    WireFormat, WireFormatError,
};

/// Number of subnanosecond units in one nanosecond
pub const SUBNS_PER_NSEC: u64 = 1 << 16;
/// Number of subnanosecond units in one microsecond
pub const SUBNS_PER_USEC: u64 = SUBNS_PER_NSEC * 1_000;
/// Number of subnanosecond units in one millisecond
pub const SUBNS_PER_MSEC: u64 = SUBNS_PER_NSEC * 1_000_000;
/// Number of subnanosecond units in one second
pub const SUBNS_PER_SEC: u64 = SUBNS_PER_NSEC * 1_000_000_000;

const NSEC_PER_SEC: i64 = 1_000_000_000;
const USEC_PER_SEC: i64 = 1_000_000;
const MSEC_PER_SEC: i64 = 1_000;

// Start of the GPS epoch (1980-01-06, 19 leap seconds behind TAI) in
// milliseconds after the PTP epoch (1970-01-01 TAI).
const GPS_EPOCH_MSEC: i64 = 3652 * 86_400_000 + 19_000;

/// A PTP timestamp or a signed difference between two timestamps.
///
/// The value is kept as a whole number of seconds plus a fraction of a second
/// counted in units of 2^-16 nanoseconds, the unit of the PTP correctionField.
/// The fraction is always in `0..SUBNS_PER_SEC`, so the sign lives in the
/// seconds: one subnanosecond before zero is `secs == -1` with
/// `subns == SUBNS_PER_SEC - 1`.
///
/// Ordering compares the seconds first and the fraction second, which is the
/// numeric order of the represented values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    secs: i64,
    subns: u64,
}

/// The zero time, also used as the "not yet known" marker for timestamps
pub const TIME_ZERO: Time = Time::from_subns(0);
/// One nanosecond
pub const ONE_NANOSECOND: Time = Time::from_subns(SUBNS_PER_NSEC as i64);
/// One microsecond
pub const ONE_MICROSECOND: Time = Time::from_subns(SUBNS_PER_USEC as i64);
/// One millisecond
pub const ONE_MILLISECOND: Time = Time::from_subns(SUBNS_PER_MSEC as i64);
/// One second
pub const ONE_SECOND: Time = Time::from_secs(1);
/// One minute
pub const ONE_MINUTE: Time = Time::from_secs(60);
/// One hour
pub const ONE_HOUR: Time = Time::from_secs(3600);
/// One day
pub const ONE_DAY: Time = Time::from_secs(86_400);

impl Time {
    /// Create a [`Time`] from a raw count of subnanoseconds.
    ///
    /// Negative counts round towards negative infinity, so the fraction stays
    /// positive.
    /// ```
    /// # use minptp::time::{Time, SUBNS_PER_SEC};
    /// let t = Time::from_subns(-1);
    /// assert_eq!(t.secs(), -1);
    /// assert_eq!(t.subns(), SUBNS_PER_SEC - 1);
    /// ```
    pub const fn from_subns(subns: i64) -> Self {
        Self {
            secs: subns.div_euclid(SUBNS_PER_SEC as i64),
            subns: subns.rem_euclid(SUBNS_PER_SEC as i64) as u64,
        }
    }

    /// Create a [`Time`] from the fields of a PTP timestamp.
    ///
    /// `nsec` is allowed to exceed a second, the excess carries into `secs`.
    pub fn new(secs: i64, nsec: u32, subns: u16) -> Self {
        Self::normalized(secs, nsec as u64 * SUBNS_PER_NSEC + subns as u64)
    }

    /// Create a [`Time`] of a whole number of seconds
    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, subns: 0 }
    }

    /// Create a [`Time`] of a number of milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self::from_wide(millis as i128 * SUBNS_PER_MSEC as i128)
    }

    /// Create a [`Time`] of a number of microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self::from_wide(micros as i128 * SUBNS_PER_USEC as i128)
    }

    /// Create a [`Time`] of a number of nanoseconds
    pub fn from_nanos(nanos: i64) -> Self {
        Self::from_wide(nanos as i128 * SUBNS_PER_NSEC as i128)
    }

    fn normalized(secs: i64, subns: u64) -> Self {
        Self {
            secs: secs.saturating_add((subns / SUBNS_PER_SEC) as i64),
            subns: subns % SUBNS_PER_SEC,
        }
    }

    fn from_wide(total: i128) -> Self {
        let per_sec = SUBNS_PER_SEC as i128;
        Self {
            secs: total.div_euclid(per_sec).saturating_as::<i64>(),
            subns: total.rem_euclid(per_sec) as u64,
        }
    }

    fn to_wide(self) -> i128 {
        self.secs as i128 * SUBNS_PER_SEC as i128 + self.subns as i128
    }

    /// Whole seconds, rounded towards negative infinity
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Fraction of the second in subnanoseconds
    pub fn subns(&self) -> u64 {
        self.subns
    }

    /// Whole nanoseconds within the second, rounded down
    pub fn nsec(&self) -> u32 {
        (self.subns / SUBNS_PER_NSEC) as u32
    }

    /// The part below one nanosecond.
    ///
    /// This is what gets lost when writing a timestamp to the wire, and what
    /// a two-step master puts in the correctionField to make up for it.
    pub fn correction(&self) -> TimeInterval {
        TimeInterval::from_subns((self.subns % SUBNS_PER_NSEC) as i64)
    }

    /// The full value as a correctionField, saturating when out of range
    pub fn to_correction(&self) -> TimeInterval {
        TimeInterval::from_subns(self.to_wide().saturating_as::<i64>())
    }

    /// The value in subnanoseconds.
    ///
    /// Saturates to [`i64::MIN`] or [`i64::MAX`] beyond roughly 39 hours.
    pub fn delta_subns(&self) -> i64 {
        self.delta_convert(SUBNS_PER_SEC as i64)
    }

    /// The value in nanoseconds, rounded to nearest.
    ///
    /// Saturates to [`i64::MIN`] or [`i64::MAX`] when out of range.
    pub fn delta_nsec(&self) -> i64 {
        self.delta_convert(NSEC_PER_SEC)
    }

    /// The value in microseconds, rounded to nearest.
    ///
    /// Saturates to [`i64::MIN`] or [`i64::MAX`] when out of range.
    pub fn delta_usec(&self) -> i64 {
        self.delta_convert(USEC_PER_SEC)
    }

    /// The value in milliseconds, rounded to nearest.
    ///
    /// Saturates to [`i64::MIN`] or [`i64::MAX`] when out of range.
    pub fn delta_msec(&self) -> i64 {
        self.delta_convert(MSEC_PER_SEC)
    }

    fn delta_convert(&self, units_per_sec: i64) -> i64 {
        let max_safe = i64::MAX / units_per_sec - 1;
        let subns_per_unit = SUBNS_PER_SEC as i64 / units_per_sec;

        if self.secs < -max_safe {
            i64::MIN
        } else if self.secs > max_safe {
            i64::MAX
        } else {
            // subns is below one second, so adding half a unit cannot overflow
            let rounded = (self.subns as i64 + subns_per_unit / 2) / subns_per_unit;
            units_per_sec * self.secs + rounded
        }
    }

    /// The magnitude of this value
    pub fn abs(self) -> Self {
        if self.secs < 0 {
            -self
        } else {
            self
        }
    }

    /// Read a 10 byte PTP timestamp (48 bit seconds, 32 bit nanoseconds)
    pub fn read_from(buffer: &[u8]) -> Result<Self, WireFormatError> {
        WireTimestamp::deserialize(buffer).map(Self::from)
    }

    /// Write this value as a 10 byte PTP timestamp.
    ///
    /// The sub-nanosecond part is dropped, nanoseconds are rounded down.
    pub fn write_to(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        WireTimestamp::from(*self).serialize(buffer)
    }

    /// Milliseconds since the GPS epoch.
    ///
    /// This treats the value as a TAI timestamp and ignores leap seconds, as
    /// GPS time does.
    pub fn to_datetime(&self) -> i64 {
        let rounded = (self.subns + SUBNS_PER_MSEC / 2) / SUBNS_PER_MSEC;
        let tai_msec = MSEC_PER_SEC * self.secs + rounded as i64;
        tai_msec - GPS_EPOCH_MSEC
    }

    /// Inverse of [`to_datetime`](`Self::to_datetime`)
    pub fn from_datetime(gps_msec: i64) -> Self {
        let tai_msec = gps_msec + GPS_EPOCH_MSEC;
        Self::new(
            tai_msec.div_euclid(MSEC_PER_SEC),
            tai_msec.rem_euclid(MSEC_PER_SEC) as u32 * 1_000_000,
            0,
        )
    }
}

impl From<WireTimestamp> for Time {
    fn from(ts: WireTimestamp) -> Self {
        Self::new(ts.seconds as i64, ts.nanos, 0)
    }
}

impl From<Time> for WireTimestamp {
    fn from(time: Time) -> Self {
        Self {
            seconds: time.secs as u64 & 0xffff_ffff_ffff,
            nanos: time.nsec(),
        }
    }
}

impl From<TimeInterval> for Time {
    fn from(interval: TimeInterval) -> Self {
        Self::from_subns(interval.to_bits())
    }
}

impl From<core::time::Duration> for Time {
    fn from(duration: core::time::Duration) -> Self {
        Self::new(
            duration.as_secs().saturating_as::<i64>(),
            duration.subsec_nanos(),
            0,
        )
    }
}

impl Add for Time {
    type Output = Time;

    fn add(self, rhs: Time) -> Self::Output {
        Time::normalized(self.secs.saturating_add(rhs.secs), self.subns + rhs.subns)
    }
}

impl AddAssign for Time {
    fn add_assign(&mut self, rhs: Time) {
        *self = *self + rhs;
    }
}

impl Sub for Time {
    type Output = Time;

    fn sub(self, rhs: Time) -> Self::Output {
        if self.subns >= rhs.subns {
            Time {
                secs: self.secs.saturating_sub(rhs.secs),
                subns: self.subns - rhs.subns,
            }
        } else {
            Time {
                secs: self.secs.saturating_sub(rhs.secs).saturating_sub(1),
                subns: self.subns + SUBNS_PER_SEC - rhs.subns,
            }
        }
    }
}

impl SubAssign for Time {
    fn sub_assign(&mut self, rhs: Time) {
        *self = *self - rhs;
    }
}

impl Neg for Time {
    type Output = Time;

    fn neg(self) -> Self::Output {
        TIME_ZERO - self
    }
}

/// Scaling for weighted averages. The seconds saturate at the `i64` range.
impl Mul<u32> for Time {
    type Output = Time;

    fn mul(self, rhs: u32) -> Self::Output {
        let fraction = self.subns as u128 * rhs as u128;
        Time {
            secs: self
                .secs
                .saturating_mul(rhs as i64)
                .saturating_add((fraction / SUBNS_PER_SEC as u128) as i64),
            subns: (fraction % SUBNS_PER_SEC as u128) as u64,
        }
    }
}

impl MulAssign<u32> for Time {
    fn mul_assign(&mut self, rhs: u32) {
        *self = *self * rhs;
    }
}

/// Division rounds towards negative infinity.
impl Div<u32> for Time {
    type Output = Time;

    fn div(self, rhs: u32) -> Self::Output {
        Time::from_wide(self.to_wide().div_euclid(rhs as i128))
    }
}

impl DivAssign<u32> for Time {
    fn div_assign(&mut self, rhs: u32) {
        *self = *self / rhs;
    }
}

impl Display for Time {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.secs < 0 {
            let abs = self.abs();
            write!(f, "-{}.{:09}", abs.secs, abs.nsec())
        } else {
            write!(f, "{}.{:09}", self.secs, self.nsec())
        }
    }
}
