use core::fmt::{Display, Formatter};

use crate::network::DispatchTo;

/// Role requested by the user of a [`Client`](`super::Client`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClientMode {
    /// No protocol activity at all
    #[default]
    Disabled,
    /// Act as master if no better clock shows up, broadcasting over Ethernet
    MasterL2,
    /// Act as master if no better clock shows up, broadcasting over UDP
    MasterL3,
    /// Follow the first master that announces itself, never become master
    SlaveOnly,
    /// Only take part in peer delay measurements
    Passive,
}

impl ClientMode {
    /// Whether this mode allows the client to become master
    pub fn is_master(self) -> bool {
        matches!(self, ClientMode::MasterL2 | ClientMode::MasterL3)
    }

    /// Destination of the messages a master sends to everyone
    pub(crate) fn broadcast_to(self) -> DispatchTo {
        match self {
            ClientMode::MasterL3 => DispatchTo::BroadcastL3,
            _ => DispatchTo::BroadcastL2,
        }
    }
}

impl Display for ClientMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientMode::Disabled => write!(f, "Disabled"),
            ClientMode::MasterL2 => write!(f, "MasterL2"),
            ClientMode::MasterL3 => write!(f, "MasterL3"),
            ClientMode::SlaveOnly => write!(f, "SlaveOnly"),
            ClientMode::Passive => write!(f, "Passive"),
        }
    }
}

/// Current protocol state of a [`Client`](`super::Client`).
///
/// The state follows from the [`ClientMode`] and the messages received, it
/// cannot be set directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClientState {
    /// Mode is disabled, nothing is sent or handled
    #[default]
    Disabled,
    /// Waiting for announces, or for the announce timeout to become master
    Listening,
    /// Announcing and sending syncs
    Master,
    /// Only answering and sending peer delay requests
    Passive,
    /// Following the selected master
    Slave,
}

impl Display for ClientState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientState::Disabled => write!(f, "Disabled"),
            ClientState::Listening => write!(f, "Listening"),
            ClientState::Master => write!(f, "Master"),
            ClientState::Passive => write!(f, "Passive"),
            ClientState::Slave => write!(f, "Slave"),
        }
    }
}

impl ClientState {
    /// The state a client enters when its mode is set to `mode`
    pub(crate) fn initial(mode: ClientMode) -> Self {
        match mode {
            ClientMode::Disabled => ClientState::Disabled,
            ClientMode::MasterL2 | ClientMode::MasterL3 | ClientMode::SlaveOnly => {
                ClientState::Listening
            }
            ClientMode::Passive => ClientState::Passive,
        }
    }
}
