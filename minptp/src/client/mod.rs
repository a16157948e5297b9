//! The PTP client state machine
//!
//! See [`Client`] for a detailed description.

use arrayvec::{ArrayVec, CapacityError};
use rand::Rng;

pub use state::{ClientMode, ClientState};

use self::{
    sequence_id::SequenceIdGenerator,
    timer::{Scheduler, Task},
};
use crate::{
    config::{ClientConfig, ClockInfo, DelayMechanism, PortIdentity},
    datastructures::{
        messages::{Header, Message, MessageType, MAX_DATA_LEN, MAX_TLV_LEN},
        WireFormatError,
    },
    measurement::{Callback, Measurement, MeasurementCache, MeasurementKind},
    network::{DispatchTo, Interface},
    observability::ClientStatus,
    time::{Interval, Time},
    tlv::{TlvHandler, MAX_TLV_HANDLERS},
};

mod bmca;
mod master;
mod pdelay;
mod sequence_id;
mod slave;
mod state;
#[cfg(test)]
mod tests;
mod timer;

/// Maximum number of [`Callback`]s registered with one client
pub const MAX_CALLBACKS: usize = 4;

// Cache misses weigh ten times as much as hits, warn once they dominate.
const CACHE_MISS_PENALTY: u32 = 10;
const CACHE_MISS_WARN: u32 = 50;

/// A PTP client on a single network interface
///
/// The client decides whether the interface acts as master or slave, sends
/// and answers all protocol messages, and hands every completed
/// [`Measurement`] to the registered [`Callback`]s. What to do with those
/// measurements, e.g. steering a local clock, is up to the callbacks.
/// Registered [`TlvHandler`]s see the TLVs of every message in either
/// direction.
///
/// # Generics
/// A [`Client`] is generic over:
/// * **`I`**: The [`Interface`] used to send messages and read timestamps
/// * **`R`**: The type of the random number generator ([`Rng`]) used to
///   randomize timeouts
///
/// # Driving the client
/// The client does not run by itself. The user feeds it two kinds of events:
/// * every received PTP message, through [`Client::ptp_rcvd`], together with
///   its receive timestamp;
/// * the passage of time, through [`Client::tick`]. Ticks should come at
///   least as often as the fastest configured message rate.
///
/// Both run to completion and may send messages through the interface before
/// they return.
///
/// ```no_run
/// # struct Udp;
/// # impl minptp::network::Interface for Udp {
/// #     type Error = ();
/// #     type Address = ();
/// #     fn send(&mut self, _: minptp::network::DispatchTo, _: &[u8]) -> Result<(), ()> { Ok(()) }
/// #     fn tx_timestamp(&mut self) -> Option<minptp::time::Time> { None }
/// #     fn now(&mut self) -> minptp::time::Time { unimplemented!() }
/// #     fn store_reply_addr(&mut self) {}
/// #     fn store_addr(&mut self, _: ()) {}
/// # }
/// # fn recv() -> Option<(&'static [u8], minptp::time::Time)> { None }
/// use core::time::Duration;
///
/// use minptp::{config::ClientConfig, Client, ClientMode};
/// use rand::rngs::mock::StepRng;
///
/// let mut client = Client::new(Udp, ClientConfig::default(), ClientMode::SlaveOnly, StepRng::new(0, 1));
///
/// loop {
///     while let Some((data, timestamp)) = recv() {
///         client.ptp_rcvd(data, timestamp);
///     }
///     client.tick(Duration::from_millis(50));
/// }
/// ```
pub struct Client<'a, I: Interface, R: Rng> {
    iface: I,
    config: ClientConfig,
    mode: ClientMode,
    state: ClientState,
    cache: MeasurementCache,
    callbacks: ArrayVec<&'a dyn Callback, MAX_CALLBACKS>,
    tlv_handlers: ArrayVec<&'a dyn TlvHandler, MAX_TLV_HANDLERS>,
    clock_local: ClockInfo,
    clock_remote: ClockInfo,
    current_source: Option<PortIdentity>,
    scheduler: Scheduler,
    sync_interval: Interval,
    pdelay_interval: Interval,
    announce_seq_ids: SequenceIdGenerator,
    sync_seq_ids: SequenceIdGenerator,
    pdelay_seq_ids: SequenceIdGenerator,
    cache_miss_score: u32,
    link_delay: Option<Time>,
    last_sync: Option<Measurement>,
    packet_buffer: [u8; MAX_DATA_LEN + MAX_TLV_LEN],
    rng: R,
}

impl<I: Interface, R: Rng> core::fmt::Debug for Client<'_, I, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("cache", &self.cache)
            .field("callbacks", &self.callbacks.len())
            .field("tlv_handlers", &self.tlv_handlers.len())
            .field("clock_local", &self.clock_local)
            .field("clock_remote", &self.clock_remote)
            .field("current_source", &self.current_source)
            .field("link_delay", &self.link_delay)
            .finish_non_exhaustive()
    }
}

fn same_callback(a: &dyn Callback, b: &dyn Callback) -> bool {
    core::ptr::eq(a as *const _ as *const (), b as *const _ as *const ())
}

fn same_tlv_handler(a: &dyn TlvHandler, b: &dyn TlvHandler) -> bool {
    core::ptr::eq(a as *const _ as *const (), b as *const _ as *const ())
}

impl<'a, I: Interface, R: Rng> Client<'a, I, R> {
    /// Create a client on `iface` and put it in `mode`
    pub fn new(iface: I, config: ClientConfig, mode: ClientMode, rng: R) -> Self {
        let mut client = Client {
            iface,
            config,
            mode: ClientMode::Disabled,
            state: ClientState::Disabled,
            cache: MeasurementCache::new(),
            callbacks: ArrayVec::new(),
            tlv_handlers: ArrayVec::new(),
            clock_local: config.clock_info(),
            clock_remote: ClockInfo::default(),
            current_source: None,
            scheduler: Scheduler::new(),
            sync_interval: config.sync_interval,
            pdelay_interval: config.pdelay_interval,
            announce_seq_ids: SequenceIdGenerator::new(),
            sync_seq_ids: SequenceIdGenerator::new(),
            pdelay_seq_ids: SequenceIdGenerator::new(),
            cache_miss_score: 0,
            link_delay: None,
            last_sync: None,
            packet_buffer: [0; MAX_DATA_LEN + MAX_TLV_LEN],
            rng,
        };
        client.set_mode(mode);
        client
    }

    /// Switch to another mode.
    ///
    /// This forgets the current master and every exchange in flight, and
    /// restarts the state machine from the initial state of `mode`.
    pub fn set_mode(&mut self, mode: ClientMode) {
        log::info!("new client mode: {} -> {}", self.mode, mode);
        self.mode = mode;
        self.current_source = None;
        self.clock_remote = ClockInfo::default();
        self.cache.clear();
        self.cache_miss_score = 0;
        self.link_delay = None;
        self.set_state(ClientState::initial(mode));
    }

    /// The mode set by the user
    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    /// The current protocol state
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Change the description of the local clock sent in announce messages
    pub fn set_clock(&mut self, clock: ClockInfo) {
        self.clock_local = clock;
    }

    /// Description of the local clock sent in announce messages
    pub fn clock_local(&self) -> ClockInfo {
        self.clock_local
    }

    /// Description of the grandmaster of the current master
    pub fn clock_remote(&self) -> ClockInfo {
        self.clock_remote
    }

    /// Port of the master this client follows, if any
    pub fn current_source(&self) -> Option<PortIdentity> {
        self.current_source
    }

    /// Change the time between two sync messages sent as master
    pub fn set_sync_rate(&mut self, interval: Interval) {
        self.sync_interval = interval;
        self.timer_reset();
    }

    /// Change the time between two peer delay requests
    pub fn set_pdelay_rate(&mut self, interval: Interval) {
        self.pdelay_interval = interval;
        self.timer_reset();
    }

    /// Register a callback for completed measurements.
    ///
    /// Fails when [`MAX_CALLBACKS`] are already registered.
    pub fn add_callback(
        &mut self,
        callback: &'a dyn Callback,
    ) -> Result<(), CapacityError<&'a dyn Callback>> {
        self.callbacks.try_push(callback)
    }

    /// Remove a callback registered with [`add_callback`](`Self::add_callback`)
    pub fn remove_callback(&mut self, callback: &dyn Callback) {
        self.callbacks
            .retain(|registered| !same_callback(*registered, callback));
    }

    /// Register a handler for the TLVs of received and sent messages.
    ///
    /// Handlers are consulted in the order they were added. Fails when
    /// [`MAX_TLV_HANDLERS`] are already registered.
    pub fn add_tlv_handler(
        &mut self,
        handler: &'a dyn TlvHandler,
    ) -> Result<(), CapacityError<&'a dyn TlvHandler>> {
        self.tlv_handlers.try_push(handler)
    }

    /// Remove a handler registered with
    /// [`add_tlv_handler`](`Self::add_tlv_handler`)
    pub fn remove_tlv_handler(&mut self, handler: &dyn TlvHandler) {
        self.tlv_handlers
            .retain(|registered| !same_tlv_handler(*registered, handler));
    }

    /// The network interface of this client
    pub fn interface(&self) -> &I {
        &self.iface
    }

    /// The network interface of this client
    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.iface
    }

    /// Number of unfinished exchanges that were pushed out of the cache
    pub fn cache_dropped(&self) -> u32 {
        self.cache.dropped_count()
    }

    /// A snapshot of the state of this client
    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            mode: self.mode,
            state: self.state,
            port_identity: self.config.port_identity(),
            current_source: self.current_source,
            clock_remote: self.current_source.map(|_| self.clock_remote),
            offset_from_master_ns: self.last_sync.map(|m| m.offset_from_master().delta_nsec()),
            mean_path_delay_ns: self.last_sync.map(|m| m.mean_path_delay().delta_nsec()),
            mean_link_delay_ns: self.link_delay.map(|delay| delay.delta_nsec()),
            cache_dropped: self.cache.dropped_count(),
        }
    }

    /// Handle a received PTP message.
    ///
    /// `data` starts at the PTP header, `rx_time` is the time the message was
    /// received. Malformed and unexpected messages are logged and dropped.
    pub fn ptp_rcvd(&mut self, data: &[u8], rx_time: Time) {
        if self.state == ClientState::Disabled {
            return;
        }

        let message = match Message::deserialize(data) {
            Ok(message) => message,
            Err(WireFormatError::EnumConversionError) => {
                log::info!("unexpected message with unknown type");
                return;
            }
            Err(error) => {
                log::warn!("could not parse packet: {:?}", error);
                return;
            }
        };

        let header = *message.header();

        // Only process messages from the same domain
        if header.sdo_id != self.config.sdo_id || header.domain_number != self.config.domain_number
        {
            log::trace!(
                "ignoring message for domain {} sdo {}",
                header.domain_number,
                header.sdo_id
            );
            return;
        }

        // Our own multicast coming back in
        if header.source_port_identity == self.config.port_identity() {
            return;
        }

        log::trace!(
            "received {:?} {} from {}",
            message.content_type(),
            header.sequence_id,
            header.source_port_identity
        );

        for tlv in message.tlvs(data) {
            let consumed = self
                .tlv_handlers
                .iter()
                .any(|handler| handler.tlv_rcvd(&header, &tlv));
            if !consumed {
                log::trace!("no handler for TLV {:?}", tlv.header);
            }
        }

        match message {
            Message::Sync(message) => self.handle_sync(message, rx_time),
            Message::DelayReq(message) => self.handle_delay_req(message, rx_time),
            Message::PDelayReq(message) => self.handle_pdelay_req(message, rx_time),
            Message::PDelayResp(message) => self.handle_pdelay_resp(message, rx_time),
            Message::FollowUp(message) => self.handle_follow_up(message),
            Message::DelayResp(message) => self.handle_delay_resp(message),
            Message::PDelayRespFollowUp(message) => self.handle_pdelay_resp_follow_up(message),
            Message::Announce(message) => self.handle_announce(message),
            Message::Signaling(header) | Message::Management(header) => {
                self.handle_unexpected(&header, message.content_type())
            }
        }
    }

    /// Let `elapsed` pass, sending whatever periodic messages are due
    pub fn tick(&mut self, elapsed: core::time::Duration) {
        for task in self.scheduler.advance(elapsed) {
            self.run_task(task);
        }
    }

    fn run_task(&mut self, task: Task) {
        match (task, self.state) {
            (Task::Announce, ClientState::Master) => self.send_announce(),
            (Task::Sync, ClientState::Master) => {
                self.send_sync(self.mode.broadcast_to());
            }
            (Task::PDelayReq, state) if state != ClientState::Disabled => self.send_pdelay_req(),
            (Task::Watchdog, ClientState::Listening) if self.mode.is_master() => {
                // we didn't hear announce messages from better masters, so
                // become master ourselves
                self.set_state(ClientState::Master);
            }
            (Task::Watchdog, ClientState::Slave) => {
                log::warn!("connection to master timed out");
                self.lose_master();
            }
            (task, state) => log::trace!("ignoring {:?} timer in state {}", task, state),
        }
    }

    fn lose_master(&mut self) {
        self.current_source = None;
        self.clock_remote = ClockInfo::default();
        self.set_state(ClientState::Listening);
    }

    fn set_state(&mut self, state: ClientState) {
        if self.state != state {
            log::info!("new client state: {} -> {}", self.state, state);
        }
        self.state = state;
        self.timer_reset();
    }

    /// Configure the scheduler for the current state
    fn timer_reset(&mut self) {
        use core::time::Duration;

        self.scheduler.stop_all();

        let pdelay_enabled = match self.state {
            ClientState::Passive => true,
            ClientState::Slave => self.config.delay_mechanism == DelayMechanism::P2P,
            _ => false,
        };
        if pdelay_enabled {
            // Section 9.5.13.2, leave some margin below the nominal rate
            let period = self.pdelay_interval.as_core_duration().mul_f64(0.9);
            self.scheduler.every(Task::PDelayReq, period, period);
        }

        match self.state {
            ClientState::Disabled => {}
            ClientState::Listening => {
                if self.mode.is_master() {
                    let timeout = self.config.announce_duration(&mut self.rng);
                    self.scheduler.once(Task::Watchdog, timeout);
                }
            }
            ClientState::Master => {
                // Immediately start sending syncs and announces
                self.scheduler.every(
                    Task::Announce,
                    self.config.announce_interval.as_core_duration(),
                    Duration::ZERO,
                );
                self.scheduler.every(
                    Task::Sync,
                    self.sync_interval.as_core_duration(),
                    Duration::ZERO,
                );
            }
            ClientState::Slave => {
                // a master capable client goes back to listening, and from
                // there to master, once this fires
                self.scheduler.once(Task::Watchdog, self.config.slave_timeout);
            }
            ClientState::Passive => {}
        }
    }

    /// Header for a message sent by this client
    fn make_header(&self, message_type: MessageType, sequence_id: u16) -> Header {
        let log_message_interval = match message_type {
            MessageType::Announce => self.config.announce_interval.as_log_2(),
            MessageType::Sync | MessageType::FollowUp => self.sync_interval.as_log_2(),
            MessageType::DelayResp => 0,
            _ => 0x7f,
        };

        Header {
            sdo_id: self.config.sdo_id,
            domain_number: self.config.domain_number,
            ptp_timescale: message_type == MessageType::Announce,
            unicast_flag: matches!(message_type, MessageType::DelayReq | MessageType::DelayResp),
            source_port_identity: self.config.port_identity(),
            sequence_id,
            log_message_interval,
            ..Default::default()
        }
    }

    /// Send `message`, returning whether the interface accepted it
    fn send_message(&mut self, to: DispatchTo, message: &Message) -> bool {
        let length = match self.serialize_with_tlvs(message) {
            Ok(length) => length,
            Err(error) => {
                log::error!(
                    "minptp bug: could not serialize {:?}: {:?}",
                    message.content_type(),
                    error
                );
                return false;
            }
        };

        log::debug!(
            "sending {:?} {} to {:?}",
            message.content_type(),
            message.header().sequence_id,
            to
        );

        match self.iface.send(to, &self.packet_buffer[..length]) {
            Ok(()) => true,
            Err(error) => {
                log::error!("failed to send {:?}: {:?}", message.content_type(), error);
                false
            }
        }
    }

    /// Serialize `message` into the packet buffer and let the TLV handlers
    /// append to it, returning the total length
    fn serialize_with_tlvs(&mut self, message: &Message) -> Result<usize, WireFormatError> {
        let body = message.serialize(&mut self.packet_buffer)?;
        if self.tlv_handlers.is_empty() {
            return Ok(body);
        }

        let mut length = body;
        for handler in &self.tlv_handlers {
            let written = handler.tlv_send(
                message.header(),
                message.content_type(),
                &mut self.packet_buffer[length..],
            );
            length = (length + written).min(self.packet_buffer.len());
        }

        Message::extend_length(&mut self.packet_buffer, length - body)
    }

    /// Transmit timestamp of the message that was just sent
    fn tx_timestamp(&mut self) -> Option<Time> {
        let timestamp = self.iface.tx_timestamp();
        if timestamp.is_none() {
            log::error!("no transmit timestamp for the last message");
        }
        timestamp
    }

    /// Transmit time of the next message, if the interface can tell in
    /// advance and one-step operation is allowed
    fn tx_start(&mut self) -> Option<Time> {
        if self.config.force_two_step {
            None
        } else {
            self.iface.tx_start()
        }
    }

    fn cache_hit(&mut self) {
        self.cache_miss_score = self.cache_miss_score.saturating_sub(1);
    }

    fn cache_miss(&mut self, header: &Header) {
        log::debug!("no exchange in flight for sequence id {}", header.sequence_id);

        // Rare misses are harmless, frequent ones mean the cache is too
        // small for the round trip time.
        self.cache_miss_score += CACHE_MISS_PENALTY;
        if self.cache_miss_score >= CACHE_MISS_WARN {
            log::warn!("many responses without matching exchange, cache may be too small");
            self.cache_miss_score = 0;
        }
    }

    fn notify_if_complete(&mut self, mut measurement: Measurement) {
        if !measurement.done() {
            return;
        }

        for handler in &self.tlv_handlers {
            handler.tlv_meas(&mut measurement);
            if !measurement.done() {
                log::debug!(
                    "measurement {} dropped by a TLV handler",
                    measurement.reference.sequence_id
                );
                return;
            }
        }

        match measurement.kind {
            MeasurementKind::Sync => {
                log::debug!(
                    "measurement {}: offset {} path delay {}",
                    measurement.reference.sequence_id,
                    measurement.offset_from_master(),
                    measurement.mean_path_delay()
                );
                self.last_sync = Some(measurement);
            }
            MeasurementKind::PeerDelay => {
                let link_delay = measurement.mean_link_delay();
                log::debug!(
                    "peer delay {}: link delay {}",
                    measurement.reference.sequence_id,
                    link_delay
                );
                self.link_delay = Some(link_delay);
            }
        }

        for callback in &self.callbacks {
            callback.ptp_ready(&measurement);
        }
    }

    fn handle_unexpected(&mut self, header: &Header, message_type: MessageType) {
        log::info!(
            "unexpected {:?} message from {}",
            message_type,
            header.source_port_identity
        );
    }
}
