//! Implementation of the clock for the linux platform

use clock_steering::{unix::UnixClock, Clock};
use minptp::time::{Time, TIME_ZERO};

/// A kernel clock read as PTP time.
///
/// The kernel keeps UTC, PTP counts TAI, so every reading is shifted by the
/// configured offset. Kernel packet timestamps come from the realtime clock
/// and get the same shift.
#[derive(Debug, Clone)]
pub struct LinuxClock {
    clock: UnixClock,
    utc_offset: Time,
}

impl LinuxClock {
    /// The realtime clock, reporting UTC + `utc_offset` seconds
    pub fn realtime(utc_offset: i16) -> Self {
        Self {
            clock: UnixClock::CLOCK_REALTIME,
            utc_offset: Time::from_secs(utc_offset as i64),
        }
    }

    /// Current time, or [`TIME_ZERO`] when the kernel refuses to tell
    pub fn now(&self) -> Time {
        match self.clock.now() {
            Ok(now) => self.convert(now.seconds as i64, now.nanos as u32),
            Err(error) => {
                log::error!("could not read the clock: {error:?}");
                TIME_ZERO
            }
        }
    }

    /// PTP time of a kernel packet timestamp
    pub fn packet_time(&self, timestamp: timestamped_socket::socket::Timestamp) -> Time {
        self.convert(timestamp.seconds as i64, timestamp.nanos as u32)
    }

    fn convert(&self, seconds: i64, nanos: u32) -> Time {
        Time::new(seconds, nanos, 0) + self.utc_offset
    }
}
