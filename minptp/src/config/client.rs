use core::time::Duration;

use rand::Rng;

use crate::{
    config::{ClockIdentity, ClockInfo, ClockQuality, PortIdentity, SdoId, TimeSource},
    time::Interval,
};

/// Which delay mechanism a client uses while it is a slave.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DelayMechanism {
    /// End to end: every sync is answered with a delay request to the master.
    #[default]
    E2E,
    /// Peer to peer: the path delay is taken from the peer delay exchange on
    /// the link, syncs are not answered.
    P2P,
}

/// Static configuration of a [`Client`](`crate::Client`).
///
/// The defaults give a client with the lowest priorities, announcing every
/// two seconds and syncing every second.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClientConfig {
    /// Identity of the local clock
    pub clock_identity: ClockIdentity,
    /// Port number of the interface on the local clock
    pub port_number: u16,
    /// Domain of the messages sent and accepted
    pub domain_number: u8,
    /// Sdo id of the messages sent and accepted
    pub sdo_id: SdoId,

    /// Advertised first priority, lower takes precedence
    pub priority_1: u8,
    /// Advertised second priority, lower takes precedence
    pub priority_2: u8,
    /// Advertised quality of the local clock
    pub clock_quality: ClockQuality,
    /// Advertised time source of the local clock
    pub time_source: TimeSource,
    /// Offset between TAI and UTC advertised in announce messages, in seconds
    pub current_utc_offset: i16,

    /// Time between two announce messages as master
    pub announce_interval: Interval,
    /// Time between two sync messages as master
    pub sync_interval: Interval,
    /// Time between two peer delay requests
    pub pdelay_interval: Interval,
    /// Number of [`announce_interval`](`Self::announce_interval`)s to listen
    /// for a better master before becoming master ourselves
    pub announce_receipt_timeout: u8,
    /// How the path delay to the master is measured
    pub delay_mechanism: DelayMechanism,
    /// Time without sync or announce from the master after which a slave
    /// starts listening again
    pub slave_timeout: Duration,
    /// Always send follow up messages, even if the interface could send
    /// one-step messages
    pub force_two_step: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            clock_identity: ClockIdentity::default(),
            port_number: 1,
            domain_number: 0,
            sdo_id: SdoId::default(),
            priority_1: ClockInfo::PRIORITY_MIN,
            priority_2: ClockInfo::PRIORITY_MIN,
            clock_quality: ClockQuality::default(),
            time_source: TimeSource::InternalOscillator,
            current_utc_offset: 37,
            announce_interval: Interval::TWO_SECONDS,
            sync_interval: Interval::ONE_SECOND,
            pdelay_interval: Interval::ONE_SECOND,
            announce_receipt_timeout: 3,
            delay_mechanism: DelayMechanism::E2E,
            slave_timeout: Duration::from_secs(5),
            force_two_step: false,
        }
    }
}

impl ClientConfig {
    /// Identity of the port messages are sent from
    pub fn port_identity(&self) -> PortIdentity {
        PortIdentity {
            clock_identity: self.clock_identity,
            port_number: self.port_number,
        }
    }

    /// Description of the local clock as a grandmaster
    pub fn clock_info(&self) -> ClockInfo {
        ClockInfo {
            priority_1: self.priority_1,
            clock_quality: self.clock_quality,
            priority_2: self.priority_2,
            identity: self.clock_identity,
            steps_removed: 0,
            time_source: self.time_source,
        }
    }

    /// Time to wait for announce messages before taking over as master.
    ///
    /// For more information see *IEEE1588-2019 section 9.2.6.12*
    pub fn announce_duration(&self, rng: &mut impl Rng) -> Duration {
        // add some randomness so that not all timers expire at the same time
        let factor = 1.0 + rng.sample::<f64, _>(rand::distributions::Open01);
        let duration = self.announce_interval.as_core_duration();

        duration.mul_f64(factor * self.announce_receipt_timeout as u32 as f64)
    }
}
