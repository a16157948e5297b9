//! Extending messages with TLVs
//!
//! Every PTP message may carry type-length-value records after its body.
//! The [`Client`](`crate::Client`) does not interpret any of them itself.
//! Instead it offers each received TLV to the registered [`TlvHandler`]s,
//! lets them append TLVs to every message it sends, and lets them adjust
//! every completed [`Measurement`] before the callbacks see it.

pub use crate::datastructures::{
    common::{Tlv, TlvHeader, TlvIter, TlvType},
    messages::MessageType,
};
use crate::{datastructures::messages::Header, Measurement};

/// Maximum number of [`TlvHandler`]s registered with one client
pub const MAX_TLV_HANDLERS: usize = 4;

/// Reads, writes or post-processes TLVs for a [`Client`](`crate::Client`).
///
/// Register one with
/// [`Client::add_tlv_handler`](`crate::Client::add_tlv_handler`). All methods
/// have empty defaults, so an implementation only overrides what it needs.
/// Handlers are shared with the client, use interior mutability for state.
pub trait TlvHandler {
    /// Offered every TLV of every accepted message.
    ///
    /// Returns whether the TLV was consumed. A consumed TLV is not offered to
    /// the handlers registered after this one.
    fn tlv_rcvd(&self, header: &Header, tlv: &Tlv<'_>) -> bool {
        let _ = (header, tlv);
        false
    }

    /// Append TLVs to an outgoing message.
    ///
    /// `buffer` is the space left after the body and the TLVs of earlier
    /// handlers. Returns the number of bytes written to its start.
    fn tlv_send(&self, header: &Header, message_type: MessageType, buffer: &mut [u8]) -> usize {
        let _ = (header, message_type, buffer);
        0
    }

    /// Inspect or modify a completed measurement before the callbacks run.
    ///
    /// Clearing any timestamp drops the measurement.
    fn tlv_meas(&self, measurement: &mut Measurement) {
        let _ = measurement;
    }
}
