//! Minptp is a small implementation of a PTP (IEEE1588-2019) client, meant for
//! devices that have one network interface and little memory to spare.
//!
//! The library consists of three layers:
//! * [`time::Time`], a signed fixed-point timestamp with sub-nanosecond
//!   resolution, used both for absolute times and for time differences.
//! * [`Measurement`] and [`MeasurementCache`], which correlate the four
//!   timestamps of a two-way exchange as the messages of that exchange trickle
//!   in.
//! * [`Client`], the per-interface state machine deciding whether this node
//!   acts as master or slave, sending and answering the protocol messages and
//!   reporting every completed measurement through a [`Callback`].
//!
//! On top of these, [`filters`] smooths measured offsets and steers a local
//! clock with them, and [`tlv`] lets the user read and write the TLV
//! extensions of every message.
//!
//! # Device interfaces
//! `minptp` does not use the standard library, and does not access the network
//! or a clock by itself. The user provides these through the
//! [`Interface`](`network::Interface`) trait. The client is driven by two
//! entry points: [`Client::ptp_rcvd`] for every received PTP message, and
//! [`Client::tick`] for the passage of time.
//!
//! On linux, the `minptp-linux` crate provides a ready to use daemon built on
//! top of this library.

#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod client;
pub mod config;
pub(crate) mod datastructures;
pub mod filters;
mod measurement;
pub mod network;
pub mod observability;
pub mod time;
pub mod tlv;

pub use client::{Client, ClientMode, ClientState};
pub use datastructures::{
    common::{ClockIdentity, PortIdentity},
    messages::Header,
    WireFormatError,
};
pub use measurement::{Callback, Measurement, MeasurementCache, MeasurementKind, CACHE_SIZE};

#[cfg(feature = "fuzz")]
pub mod fuzz {
    pub use crate::datastructures::messages::Message;
}
