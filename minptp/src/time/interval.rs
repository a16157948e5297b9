use core::time::Duration;

/// A message rate as the base 2 logarithm of seconds between messages, the
/// way the `logMessageInterval` header field carries it
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interval(i8);

impl Interval {
    pub const ONE_SECOND: Self = Self(0);
    pub const TWO_SECONDS: Self = Self(1);

    /// ```
    /// # use core::time::Duration;
    /// # use minptp::time::Interval;
    /// assert_eq!(Interval::from_log_2(2).as_core_duration(), Duration::from_secs(4));
    /// assert_eq!(Interval::from_log_2(-2).as_core_duration(), Duration::from_millis(250));
    /// ```
    pub const fn from_log_2(log_2: i8) -> Self {
        Self(log_2)
    }

    pub const fn as_log_2(self) -> i8 {
        self.0
    }

    /// The time between two messages.
    ///
    /// Rates faster than one per nanosecond give zero, slower than one per
    /// 2^62 seconds are clamped to that.
    pub fn as_core_duration(self) -> Duration {
        const NANOS_PER_SEC: u64 = 1_000_000_000;

        match u32::try_from(self.0) {
            Ok(doublings) => Duration::from_secs(1 << doublings.min(62)),
            Err(_) => {
                let halvings = self.0.unsigned_abs() as u32;
                Duration::from_nanos(NANOS_PER_SEC.checked_shr(halvings).unwrap_or(0))
            }
        }
    }
}

impl core::fmt::Display for Interval {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "2^{}s", self.0)
    }
}
