//! Configuration of a [`Client`](`crate::Client`)

mod client;

pub use client::{ClientConfig, DelayMechanism};

pub use crate::datastructures::{
    common::{ClockIdentity, ClockInfo, ClockQuality, PortIdentity, TimeSource},
    messages::SdoId,
};
