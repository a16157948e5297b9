//! Bookkeeping for the timestamps of a single two-way exchange
//!
//! A [`Measurement`] collects the four timestamps of either a
//! sync/delay-request exchange with a master or a peer delay exchange with a
//! link partner. The timestamps trickle in with the messages of the exchange,
//! so a [`MeasurementCache`] keeps the last few exchanges around until the
//! message that completes them arrives.

use core::fmt::Display;

use crate::{
    datastructures::{common::PortIdentity, messages::Header},
    time::{Time, TIME_ZERO},
};

mod cache;

pub use cache::{MeasurementCache, CACHE_SIZE};

/// Which exchange a [`Measurement`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeasurementKind {
    /// Sync (and follow up) from a master, answered by a delay request
    #[default]
    Sync,
    /// Peer delay request and response on the link
    PeerDelay,
}

/// The timestamps of one two-way exchange.
///
/// For a sync exchange `t1` is the master's send time, `t2` our receive
/// time, `t3` the send time of our delay request and `t4` its receive time at
/// the master. For a peer delay exchange `t1` and `t4` are the request send
/// and response receive times on our side, `t2` and `t3` the request receive
/// and response send times on the peer.
///
/// A timestamp that is still [`TIME_ZERO`] has not been filled in yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Measurement {
    /// Header of the message that started the exchange
    pub reference: Header,
    /// First timestamp of the exchange
    pub t1: Time,
    /// Second timestamp
    pub t2: Time,
    /// Third timestamp
    pub t3: Time,
    /// Fourth timestamp
    pub t4: Time,
    /// The kind of exchange
    pub kind: MeasurementKind,
}

impl Measurement {
    /// Start a fresh sync exchange keyed on `header`
    pub fn new(header: &Header) -> Self {
        Self {
            reference: *header,
            ..Default::default()
        }
    }

    /// Whether all four timestamps are known
    pub fn done(&self) -> bool {
        self.t1 != TIME_ZERO && self.t2 != TIME_ZERO && self.t3 != TIME_ZERO && self.t4 != TIME_ZERO
    }

    /// Forget all timestamps and key the measurement on `header`
    pub fn reset(&mut self, header: &Header) {
        *self = Self::new(header);
    }

    /// Whether `header` continues the exchange this measurement tracks.
    ///
    /// `port` is either the source or the requesting port identity of the
    /// incoming message, depending on the message type. See *IEEE1588-2019
    /// sections 10.2.1 and 10.3.1*.
    pub fn matches(&self, header: &Header, port: &PortIdentity) -> bool {
        self.reference.domain_number == header.domain_number
            && self.reference.sdo_id == header.sdo_id
            && self.reference.sequence_id == header.sequence_id
            && self.reference.source_port_identity == *port
    }

    /// One-way delay to the master, see *IEEE1588-2019 section 11.3.1*
    pub fn mean_path_delay(&self) -> Time {
        ((self.t2 - self.t1) + (self.t4 - self.t3)) / 2
    }

    /// One-way delay to the link partner, see *IEEE1588-2019 section 11.4.2*.
    ///
    /// This expects `t2` and `t3` to be equal, with the turnaround time of the
    /// peer already removed from `t1`.
    pub fn mean_link_delay(&self) -> Time {
        (self.t4 - self.t1) / 2
    }

    /// Offset of our clock from the master, see *IEEE1588-2019 section 11.2*
    pub fn offset_from_master(&self) -> Time {
        ((self.t2 - self.t1) + (self.t3 - self.t4)) / 2
    }
}

impl Display for Measurement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "seq {} t1 {} t2 {} t3 {} t4 {}",
            self.reference.sequence_id, self.t1, self.t2, self.t3, self.t4
        )
    }
}

/// Receiver of completed measurements.
///
/// Register one with [`Client::add_callback`](`crate::Client::add_callback`).
pub trait Callback {
    /// Called for every measurement where [`Measurement::done`] holds
    fn ptp_ready(&self, measurement: &Measurement);
}
