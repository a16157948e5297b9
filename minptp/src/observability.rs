//! Serializable snapshot of a client, to be used for observability

use crate::{
    client::{ClientMode, ClientState},
    config::{ClockInfo, PortIdentity},
};

/// State of a [`Client`](`crate::Client`) at one moment, see
/// [`Client::status`](`crate::Client::status`).
///
/// Times are in nanoseconds, rounded to nearest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientStatus {
    /// Mode set by the user
    pub mode: ClientMode,
    /// Current protocol state
    pub state: ClientState,
    /// Identity of the local port
    pub port_identity: PortIdentity,
    /// Port of the master being followed or tracked
    pub current_source: Option<PortIdentity>,
    /// Grandmaster announced by [`current_source`](`Self::current_source`)
    pub clock_remote: Option<ClockInfo>,
    /// Offset from master of the last completed sync exchange
    pub offset_from_master_ns: Option<i64>,
    /// Path delay of the last completed sync exchange
    pub mean_path_delay_ns: Option<i64>,
    /// Link delay of the last completed peer delay exchange
    pub mean_link_delay_ns: Option<i64>,
    /// Unfinished exchanges pushed out of the measurement cache so far
    pub cache_dropped: u32,
}
