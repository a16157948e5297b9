//! Definitions of the abstract network types
//!
//! The client never handles addresses itself. It asks the [`Interface`] to
//! send each message to one of a few logical destinations, see
//! [`DispatchTo`].

use core::fmt::Debug;

use crate::time::Time;

/// Logical destination of an outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchTo {
    /// The sender of the most recently received message
    Reply,
    /// The address kept by the last [`Interface::store_reply_addr`] or
    /// [`Interface::store_addr`] call
    Stored,
    /// Every PTP node on the local Ethernet segment
    BroadcastL2,
    /// Every PTP node in the IP multicast group
    BroadcastL3,
}

/// Abstraction for the network interface and clock of a device
///
/// Receiving is not part of this trait: the user hands every received
/// message to [`Client::ptp_rcvd`](`crate::Client::ptp_rcvd`) together with
/// its receive timestamp.
pub trait Interface {
    /// Error returned by [`send`](`Self::send`)
    type Error: Debug;
    /// An address as understood by this interface
    type Address: Copy + Debug;

    /// Send a complete PTP message.
    ///
    /// The timestamp of the transmission must afterwards be available through
    /// [`tx_timestamp`](`Self::tx_timestamp`).
    fn send(&mut self, to: DispatchTo, data: &[u8]) -> Result<(), Self::Error>;

    /// Announce that the next message will be sent right away.
    ///
    /// Interfaces that can predict the exact transmit time of that message
    /// return it here, which lets the client send one-step messages. The
    /// default implementation leaves this to two-step follow up messages.
    fn tx_start(&mut self) -> Option<Time> {
        None
    }

    /// Transmit timestamp of the last message passed to [`send`](`Self::send`)
    fn tx_timestamp(&mut self) -> Option<Time>;

    /// Current time of the local clock
    fn now(&mut self) -> Time;

    /// Remember the sender of the most recently received message as the
    /// [`DispatchTo::Stored`] destination
    fn store_reply_addr(&mut self);

    /// Use `addr` as the [`DispatchTo::Stored`] destination
    fn store_addr(&mut self, addr: Self::Address);
}
