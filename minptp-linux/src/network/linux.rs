//! Implementation of the abstract network types for the linux platform
//!
//! PTP over UDP/IPv4 (IEEE1588-2019 annex C): event messages on port 319,
//! general messages on port 320. The kernel timestamps event messages in
//! software as they pass the network stack, in both directions.

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
};

use minptp::{
    network::{DispatchTo, Interface},
    time::Time,
};
use timestamped_socket::{
    interface::InterfaceName,
    socket::{open_interface_udp4, InterfaceTimestampMode, Open, RecvResult, Socket},
};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::clock::LinuxClock;

/// The time-critical port
const EVENT_PORT: u16 = 319;
/// The non-time-critical port
const GENERAL_PORT: u16 = 320;

pub const IPV4_PRIMARY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 129);
pub const IPV4_PDELAY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 107);

/// Largest datagram we accept, announce messages may carry TLVs
const RECV_BUFFER_LEN: usize = 1500;

#[derive(Debug, Clone, Copy)]
pub struct Ports {
    pub event_port: u16,
    pub general_port: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            event_port: EVENT_PORT,
            general_port: GENERAL_PORT,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("Not allowed to bind to port {0}")]
    NoBindPermission(u16),
    #[error("Socket bind port {0} already in use")]
    AddressInUse(u16),
    #[error("No message received yet to reply to")]
    NoReplyAddress,
    #[error("Layer 2 transport is not supported, only UDP/IPv4")]
    Layer2Unsupported,
    #[error("The network needs a multi-threaded tokio runtime")]
    NoRuntime,
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Event messages need precise timestamps and go to the event port
fn is_event_message(data: &[u8]) -> bool {
    data.first().map_or(false, |byte| byte & 0x0f < 0x8)
}

/// Where the logical destinations of the client currently point
#[derive(Debug, Clone, Copy)]
struct Destinations {
    last_sender: Option<Ipv4Addr>,
    stored: Ipv4Addr,
}

impl Destinations {
    fn new() -> Self {
        Self {
            last_sender: None,
            // peer delay requests go to the link multicast until a master
            // gives us someone to talk to
            stored: IPV4_PDELAY_MULTICAST,
        }
    }

    fn resolve(&self, to: DispatchTo) -> Result<Ipv4Addr, NetworkError> {
        match to {
            DispatchTo::Reply => self.last_sender.ok_or(NetworkError::NoReplyAddress),
            DispatchTo::Stored => Ok(self.stored),
            DispatchTo::BroadcastL3 => Ok(IPV4_PRIMARY_MULTICAST),
            DispatchTo::BroadcastL2 => Err(NetworkError::Layer2Unsupported),
        }
    }
}

/// A PTP network interface bound to a single network device
pub struct LinuxInterface {
    event_socket: Socket<SocketAddrV4, Open>,
    general_socket: Socket<SocketAddrV4, Open>,
    ports: Ports,
    clock: LinuxClock,
    destinations: Destinations,
    last_tx: Option<Time>,
    runtime: Handle,
}

impl LinuxInterface {
    /// Open the PTP ports on `interface` and join the PTP multicast groups.
    ///
    /// Must be called from within a multi-threaded tokio runtime, sending
    /// blocks on it to wait for the transmit timestamp.
    pub fn open(
        interface: InterfaceName,
        ports: Ports,
        clock: LinuxClock,
    ) -> Result<LinuxInterface, NetworkError> {
        log::info!("Opening network port on '{interface}'");

        let event_socket = open_socket(
            interface,
            ports.event_port,
            InterfaceTimestampMode::SoftwareAll,
        )?;
        let general_socket =
            open_socket(interface, ports.general_port, InterfaceTimestampMode::None)?;

        for socket in [&event_socket, &general_socket] {
            socket.join_multicast(SocketAddrV4::new(IPV4_PRIMARY_MULTICAST, 0), interface)?;
            socket.join_multicast(SocketAddrV4::new(IPV4_PDELAY_MULTICAST, 0), interface)?;
        }

        Self::from_sockets(event_socket, general_socket, ports, clock)
    }

    fn from_sockets(
        event_socket: Socket<SocketAddrV4, Open>,
        general_socket: Socket<SocketAddrV4, Open>,
        ports: Ports,
        clock: LinuxClock,
    ) -> Result<LinuxInterface, NetworkError> {
        let runtime = Handle::try_current().map_err(|_| NetworkError::NoRuntime)?;
        if runtime.runtime_flavor() != RuntimeFlavor::MultiThread {
            return Err(NetworkError::NoRuntime);
        }

        Ok(LinuxInterface {
            event_socket,
            general_socket,
            ports,
            clock,
            destinations: Destinations::new(),
            last_tx: None,
            runtime,
        })
    }

    /// Wait for the next PTP message on either port.
    ///
    /// Returns the length of the message in `buffer` and its receive time:
    /// the kernel timestamp for event messages, the clock on arrival for
    /// general ones. The sender becomes the destination of
    /// [`DispatchTo::Reply`].
    pub async fn recv(&mut self, buffer: &mut [u8]) -> io::Result<(usize, Time)> {
        let mut general_buffer = [0; RECV_BUFFER_LEN];

        let (received, from_general) = tokio::select! {
            result = self.event_socket.recv(buffer) => (result?, false),
            result = self.general_socket.recv(&mut general_buffer) => (result?, true),
        };
        let RecvResult {
            bytes_read,
            remote_addr,
            timestamp,
            ..
        } = received;

        let length = bytes_read.min(buffer.len());
        if from_general {
            buffer[..length].copy_from_slice(&general_buffer[..length]);
        }

        let timestamp = match timestamp {
            Some(timestamp) => self.clock.packet_time(timestamp),
            None => {
                if !from_general {
                    log::debug!("event message without kernel timestamp, substituting");
                }
                self.clock.now()
            }
        };

        log::trace!("Recv {length} bytes from {remote_addr}");
        self.destinations.last_sender = Some(*remote_addr.ip());

        Ok((length, timestamp))
    }

    /// Buffer large enough for any message [`recv`](`Self::recv`) returns
    pub fn recv_buffer() -> [u8; RECV_BUFFER_LEN] {
        [0; RECV_BUFFER_LEN]
    }
}

impl Interface for LinuxInterface {
    type Error = NetworkError;
    type Address = Ipv4Addr;

    fn send(&mut self, to: DispatchTo, data: &[u8]) -> Result<(), Self::Error> {
        let ip = self.destinations.resolve(to)?;
        let event = is_event_message(data);

        let (socket, port) = if event {
            (&mut self.event_socket, self.ports.event_port)
        } else {
            (&mut self.general_socket, self.ports.general_port)
        };
        let addr = SocketAddrV4::new(ip, port);

        log::trace!("Send {} bytes to {addr}", data.len());
        // the client wants the transmit time right after sending, so wait
        // here for the kernel to report it
        let runtime = &self.runtime;
        let timestamp =
            tokio::task::block_in_place(|| runtime.block_on(socket.send_to(data, addr)))?;

        self.last_tx = Some(match timestamp {
            Some(timestamp) => self.clock.packet_time(timestamp),
            None => {
                if event {
                    log::debug!("no kernel transmit timestamp, substituting");
                }
                self.clock.now()
            }
        });

        Ok(())
    }

    fn tx_timestamp(&mut self) -> Option<Time> {
        self.last_tx.take()
    }

    fn now(&mut self) -> Time {
        self.clock.now()
    }

    fn store_reply_addr(&mut self) {
        if let Some(sender) = self.destinations.last_sender {
            self.destinations.stored = sender;
        }
    }

    fn store_addr(&mut self, addr: Self::Address) {
        self.destinations.stored = addr;
    }
}

fn open_socket(
    interface: InterfaceName,
    port: u16,
    timestamping: InterfaceTimestampMode,
) -> Result<Socket<SocketAddrV4, Open>, NetworkError> {
    log::info!("Binding socket on port {port} of {interface}");

    open_interface_udp4(interface, port, timestamping, None).map_err(|error| match error.kind() {
        io::ErrorKind::PermissionDenied => NetworkError::NoBindPermission(port),
        io::ErrorKind::AddrInUse => NetworkError::AddressInUse(port),
        _ => NetworkError::IoError(error),
    })
}
