//! Common data structures that are used throughout the protocol

mod clock_identity;
mod clock_info;
mod clock_quality;
mod port_identity;
mod time_interval;
mod time_source;
mod tlv;
mod wire_timestamp;

pub use clock_identity::*;
pub use clock_info::*;
pub use clock_quality::*;
pub use port_identity::*;
pub use time_interval::*;
pub use time_source::*;
pub use tlv::*;
pub use wire_timestamp::*;
