//! The fixed-point [`Time`] type, and [`Interval`] for describing the pacing of
//! protocol messages.
//!
//! [`Time`] is used for both timestamps and differences between timestamps, as
//! the two share the representation of the PTP wire format.

mod interval;
mod ptp_time;

pub use interval::Interval;
pub use ptp_time::{
    Time, ONE_DAY, ONE_HOUR, ONE_MICROSECOND, ONE_MILLISECOND, ONE_MINUTE, ONE_NANOSECOND,
    ONE_SECOND, SUBNS_PER_MSEC, SUBNS_PER_NSEC, SUBNS_PER_SEC, SUBNS_PER_USEC, TIME_ZERO,
};
