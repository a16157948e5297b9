use core::{
    cell::{Cell, RefCell},
    time::Duration,
};
use std::{rc::Rc, vec::Vec};

use rand::rngs::mock::StepRng;

use super::*;
use crate::{
    config::{ClockIdentity, SdoId},
    datastructures::messages::{
        AnnounceMessage, FollowUpMessage, PDelayRespMessage, SyncMessage,
    },
    time::{ONE_MICROSECOND, ONE_MILLISECOND, TIME_ZERO},
    tlv::{Tlv, TlvType},
};

const LINK_DELAY: Time = Time::from_subns(50_000 * 65536);

/// Network interface on a simulated link.
///
/// All interfaces of a test share one global clock, each adds its own
/// offset. Sent packets are kept with their global send time until the test
/// delivers them.
struct TestInterface {
    clock: Rc<Cell<Time>>,
    offset: Time,
    one_step: bool,
    sent: Vec<(DispatchTo, Vec<u8>, Time)>,
    last_tx: Option<Time>,
    stored: Option<u32>,
    reply_stored: usize,
}

impl TestInterface {
    fn new(clock: &Rc<Cell<Time>>, offset: Time) -> Self {
        Self {
            clock: clock.clone(),
            offset,
            one_step: false,
            sent: Vec::new(),
            last_tx: None,
            stored: None,
            reply_stored: 0,
        }
    }

    fn sent_types(&self) -> Vec<(DispatchTo, MessageType)> {
        self.sent
            .iter()
            .map(|(to, data, _)| (*to, Message::deserialize(data).unwrap().content_type()))
            .collect()
    }
}

impl Interface for TestInterface {
    type Error = ();
    type Address = u32;

    fn send(&mut self, to: DispatchTo, data: &[u8]) -> Result<(), Self::Error> {
        self.sent.push((to, data.to_vec(), self.clock.get()));
        self.last_tx = Some(self.now());
        Ok(())
    }

    fn tx_start(&mut self) -> Option<Time> {
        if self.one_step {
            Some(self.now())
        } else {
            None
        }
    }

    fn tx_timestamp(&mut self) -> Option<Time> {
        self.last_tx.take()
    }

    fn now(&mut self) -> Time {
        self.clock.get() + self.offset
    }

    fn store_reply_addr(&mut self) {
        self.reply_stored += 1;
    }

    fn store_addr(&mut self, addr: Self::Address) {
        self.stored = Some(addr);
    }
}

#[derive(Default)]
struct Recorder {
    measurements: RefCell<Vec<Measurement>>,
}

impl Recorder {
    fn of_kind(&self, kind: MeasurementKind) -> Vec<Measurement> {
        self.measurements
            .borrow()
            .iter()
            .filter(|m| m.kind == kind)
            .copied()
            .collect()
    }
}

impl Callback for Recorder {
    fn ptp_ready(&self, measurement: &Measurement) {
        self.measurements.borrow_mut().push(*measurement);
    }
}

type TestClient<'a> = Client<'a, TestInterface, StepRng>;

fn start_clock() -> Rc<Cell<Time>> {
    // a quarter nanosecond past a whole one, to exercise the correction field
    Rc::new(Cell::new(Time::new(1_000_000, 123, 0x4000)))
}

fn config(id: u8, priority_1: u8) -> ClientConfig {
    ClientConfig {
        clock_identity: ClockIdentity([id; 8]),
        priority_1,
        ..Default::default()
    }
}

fn client<'a>(
    clock: &Rc<Cell<Time>>,
    offset: Time,
    config: ClientConfig,
    mode: ClientMode,
) -> TestClient<'a> {
    Client::new(
        TestInterface::new(clock, offset),
        config,
        mode,
        StepRng::new(0, 1),
    )
}

fn tick_all(clock: &Rc<Cell<Time>>, clients: &mut [&mut TestClient], elapsed: Duration) {
    clock.set(clock.get() + Time::from(elapsed));
    for client in clients {
        client.tick(elapsed);
    }
}

/// Hand everything `from` sent to `to`, each packet arriving one link delay
/// after it was sent
fn deliver(clock: &Rc<Cell<Time>>, from: &mut TestClient, to: &mut TestClient) -> usize {
    let packets = core::mem::take(&mut from.interface_mut().sent);
    for (_, data, sent_at) in &packets {
        let arrival = *sent_at + LINK_DELAY;
        if arrival > clock.get() {
            clock.set(arrival);
        }
        let rx_time = to.interface_mut().now();
        to.ptp_rcvd(data, rx_time);
    }
    packets.len()
}

/// Let the listening timeout of a master mode client run out
fn promote(clock: &Rc<Cell<Time>>, master: &mut TestClient) {
    assert_eq!(master.state(), ClientState::Listening);
    tick_all(clock, &mut [&mut *master], Duration::from_secs(13));
    assert_eq!(master.state(), ClientState::Master);
}

fn run_exchange(one_step: bool) {
    let clock = start_clock();
    let recorder = Recorder::default();

    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    master.interface_mut().one_step = one_step;
    let mut slave = client(&clock, ONE_MILLISECOND, config(2, 128), ClientMode::SlaveOnly);
    slave.add_callback(&recorder).unwrap();

    promote(&clock, &mut master);
    assert_eq!(slave.state(), ClientState::Listening);

    // Announce and sync go out right after promotion
    tick_all(&clock, &mut [&mut master, &mut slave], Duration::ZERO);
    let expected: &[(DispatchTo, MessageType)] = if one_step {
        &[
            (DispatchTo::BroadcastL2, MessageType::Announce),
            (DispatchTo::BroadcastL2, MessageType::Sync),
        ]
    } else {
        &[
            (DispatchTo::BroadcastL2, MessageType::Announce),
            (DispatchTo::BroadcastL2, MessageType::Sync),
            (DispatchTo::BroadcastL2, MessageType::FollowUp),
        ]
    };
    assert_eq!(master.interface().sent_types(), expected);

    deliver(&clock, &mut master, &mut slave);
    assert_eq!(slave.state(), ClientState::Slave);
    assert_eq!(slave.current_source(), Some(master.config.port_identity()));
    assert_eq!(slave.clock_remote().priority_1, 10);
    assert_eq!(slave.interface().reply_stored, 1);
    assert_eq!(
        slave.interface().sent_types(),
        [(DispatchTo::Reply, MessageType::DelayReq)]
    );

    deliver(&clock, &mut slave, &mut master);
    assert_eq!(
        master.interface().sent_types(),
        [(DispatchTo::Reply, MessageType::DelayResp)]
    );
    assert!(recorder.measurements.borrow().is_empty());

    deliver(&clock, &mut master, &mut slave);
    let measurements = recorder.measurements.borrow();
    assert_eq!(measurements.len(), 1);

    let measurement = measurements[0];
    assert!(measurement.done());
    assert_eq!(measurement.kind, MeasurementKind::Sync);
    assert_eq!(measurement.offset_from_master(), ONE_MILLISECOND);
    assert_eq!(measurement.mean_path_delay(), LINK_DELAY);

    let status = slave.status();
    assert_eq!(status.state, ClientState::Slave);
    assert_eq!(status.offset_from_master_ns, Some(1_000_000));
    assert_eq!(status.mean_path_delay_ns, Some(50_000));
    assert_eq!(status.mean_link_delay_ns, None);
}

#[test]
fn two_step_exchange() {
    run_exchange(false);
}

#[test]
fn one_step_exchange() {
    run_exchange(true);
}

#[test]
fn listening_timeout_is_randomized_announce_duration() {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL3);

    // three announce intervals of two seconds, plus some jitter
    tick_all(&clock, &mut [&mut master], Duration::from_secs(5));
    assert_eq!(master.state(), ClientState::Listening);
    assert!(master.interface().sent.is_empty());

    tick_all(&clock, &mut [&mut master], Duration::from_secs(2));
    assert_eq!(master.state(), ClientState::Master);

    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    assert_eq!(
        master.interface().sent_types()[0],
        (DispatchTo::BroadcastL3, MessageType::Announce)
    );
}

#[test]
fn master_rates() {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    master.set_sync_rate(Interval::from_log_2(-2));
    promote(&clock, &mut master);

    for _ in 0..80 {
        tick_all(&clock, &mut [&mut master], Duration::from_millis(50));
    }

    let sent = master.interface().sent_types();
    let count = |message_type| sent.iter().filter(|(_, t)| *t == message_type).count();
    // both start on the first tick after promotion
    assert_eq!(count(MessageType::Announce), 2);
    assert_eq!(count(MessageType::Sync), 16);
    assert_eq!(count(MessageType::FollowUp), 16);

    let sequence_ids: Vec<u16> = master
        .interface()
        .sent
        .iter()
        .map(|(_, data, _)| Message::deserialize(data).unwrap())
        .filter(|message| message.content_type() == MessageType::Sync)
        .map(|message| message.header().sequence_id)
        .collect();
    assert_eq!(sequence_ids, (1..=16).collect::<Vec<u16>>());
}

#[test]
fn slave_times_out_without_sync() {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master, &mut slave], Duration::ZERO);
    deliver(&clock, &mut master, &mut slave);
    assert_eq!(slave.state(), ClientState::Slave);
    slave.interface_mut().sent.clear();

    // syncs from the master keep the slave alive
    for _ in 0..3 {
        tick_all(&clock, &mut [&mut master, &mut slave], Duration::from_secs(4));
        deliver(&clock, &mut master, &mut slave);
        assert_eq!(slave.state(), ClientState::Slave);
    }

    // master goes quiet
    tick_all(&clock, &mut [&mut slave], Duration::from_secs(4));
    assert_eq!(slave.state(), ClientState::Slave);
    tick_all(&clock, &mut [&mut slave], Duration::from_secs(1));
    assert_eq!(slave.state(), ClientState::Listening);
    assert_eq!(slave.current_source(), None);
}

#[test]
fn master_follows_better_master() {
    let clock = start_clock();
    let recorder = Recorder::default();
    let mut best = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut other = client(&clock, ONE_MILLISECOND, config(2, 20), ClientMode::MasterL2);
    other.add_callback(&recorder).unwrap();

    promote(&clock, &mut best);
    promote(&clock, &mut other);

    tick_all(&clock, &mut [&mut best, &mut other], Duration::ZERO);

    // the worse master becomes a slave of the better one and starts
    // measuring right away
    deliver(&clock, &mut best, &mut other);
    assert_eq!(other.state(), ClientState::Slave);
    assert_eq!(other.current_source(), Some(best.config.port_identity()));
    assert_eq!(other.clock_remote().priority_1, 10);
    assert_eq!(
        other.interface().sent_types().last(),
        Some(&(DispatchTo::Reply, MessageType::DelayReq))
    );

    // the better one ignores the other announce and answers the request
    deliver(&clock, &mut other, &mut best);
    assert_eq!(best.state(), ClientState::Master);
    assert_eq!(
        best.interface().sent_types(),
        [(DispatchTo::Reply, MessageType::DelayResp)]
    );

    deliver(&clock, &mut best, &mut other);
    let syncs = recorder.of_kind(MeasurementKind::Sync);
    assert_eq!(syncs.len(), 1);
    assert_eq!(syncs[0].offset_from_master(), ONE_MILLISECOND);
    assert_eq!(syncs[0].mean_path_delay(), LINK_DELAY);

    // as a slave it sends no syncs or announces of its own
    tick_all(&clock, &mut [&mut other], Duration::from_secs(4));
    assert!(other.interface().sent.is_empty());

    // until the better master goes quiet
    tick_all(&clock, &mut [&mut other], Duration::from_secs(1));
    assert_eq!(other.state(), ClientState::Listening);
    assert_eq!(other.current_source(), None);
    promote(&clock, &mut other);
}

#[test]
fn slave_switches_to_better_master() {
    let clock = start_clock();
    let mut first = client(&clock, TIME_ZERO, config(1, 100), ClientMode::MasterL2);
    let mut better = client(&clock, TIME_ZERO, config(3, 10), ClientMode::MasterL2);
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);

    promote(&clock, &mut first);
    tick_all(&clock, &mut [&mut first], Duration::ZERO);
    deliver(&clock, &mut first, &mut slave);
    assert_eq!(slave.current_source(), Some(first.config.port_identity()));

    promote(&clock, &mut better);
    tick_all(&clock, &mut [&mut better], Duration::ZERO);
    deliver(&clock, &mut better, &mut slave);
    assert_eq!(slave.state(), ClientState::Slave);
    assert_eq!(slave.current_source(), Some(better.config.port_identity()));
    assert_eq!(slave.clock_remote().identity, ClockIdentity([3; 8]));
    assert_eq!(slave.interface().reply_stored, 2);
}

#[test]
fn announce_with_too_many_steps_is_ignored() {
    let clock = start_clock();
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);

    let mut header = Header {
        source_port_identity: config(1, 10).port_identity(),
        ..Default::default()
    };
    let mut announce = AnnounceMessage {
        header,
        origin_timestamp: TIME_ZERO,
        current_utc_offset: 37,
        clock_info: ClockInfo {
            steps_removed: 255,
            ..config(1, 10).clock_info()
        },
    };

    let mut buffer = [0; MAX_DATA_LEN];
    let length = Message::Announce(announce).serialize(&mut buffer).unwrap();
    slave.ptp_rcvd(&buffer[..length], clock.get());
    assert_eq!(slave.state(), ClientState::Listening);

    header.sequence_id = 1;
    announce.header = header;
    announce.clock_info.steps_removed = 254;
    let length = Message::Announce(announce).serialize(&mut buffer).unwrap();
    slave.ptp_rcvd(&buffer[..length], clock.get());
    assert_eq!(slave.state(), ClientState::Slave);
}

#[test]
fn filters_domain_and_own_messages() {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut other_domain = client(
        &clock,
        TIME_ZERO,
        ClientConfig {
            domain_number: 1,
            ..config(2, 128)
        },
        ClientMode::SlaveOnly,
    );
    let mut other_sdo = client(
        &clock,
        TIME_ZERO,
        ClientConfig {
            sdo_id: SdoId::new(0x100).unwrap(),
            ..config(3, 128)
        },
        ClientMode::SlaveOnly,
    );

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    let packets = master.interface().sent.clone();

    deliver(&clock, &mut master, &mut other_domain);
    assert_eq!(other_domain.state(), ClientState::Listening);

    master.interface_mut().sent = packets.clone();
    deliver(&clock, &mut master, &mut other_sdo);
    assert_eq!(other_sdo.state(), ClientState::Listening);

    // our own announces and syncs coming back
    for (_, data, _) in &packets {
        master.ptp_rcvd(data, clock.get());
    }
    assert_eq!(master.state(), ClientState::Master);
    assert!(master.interface().sent.is_empty());
}

#[test]
fn malformed_packets_are_dropped() {
    let clock = start_clock();
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);

    // truncated header
    slave.ptp_rcvd(&[0x0b, 0x02, 0x00, 0x40], clock.get());

    // unknown message type
    let mut buffer = [0; 44];
    Header::default()
        .serialize_header(MessageType::Sync, 10, &mut buffer)
        .unwrap();
    buffer[0] = 0x05;
    slave.ptp_rcvd(&buffer, clock.get());

    // signaling is understood, but not acted upon
    Header {
        source_port_identity: config(1, 10).port_identity(),
        ..Default::default()
    }
    .serialize_header(MessageType::Signaling, 10, &mut buffer)
    .unwrap();
    slave.ptp_rcvd(&buffer, clock.get());

    assert_eq!(slave.state(), ClientState::Listening);
    assert!(slave.interface().sent.is_empty());
}

#[test]
fn disabled_client_is_silent() {
    let clock = start_clock();
    let recorder = Recorder::default();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);
    slave.add_callback(&recorder).unwrap();

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    let (_, announce, _) = master.interface().sent[0].clone();
    deliver(&clock, &mut master, &mut slave);
    deliver(&clock, &mut slave, &mut master);

    // the delay response arrives after a mode change and must not complete
    // the old exchange, even once the same master is followed again
    slave.set_mode(ClientMode::Disabled);
    assert_eq!(slave.state(), ClientState::Disabled);
    slave.set_mode(ClientMode::SlaveOnly);
    slave.ptp_rcvd(&announce, clock.get());
    assert_eq!(slave.state(), ClientState::Slave);
    assert_eq!(slave.current_source(), Some(master.config.port_identity()));
    assert_eq!(slave.cache_miss_score, 0);

    deliver(&clock, &mut master, &mut slave);
    assert!(recorder.measurements.borrow().is_empty());
    assert_eq!(slave.cache_miss_score, 10);

    slave.set_mode(ClientMode::Disabled);
    master.set_mode(ClientMode::Disabled);
    assert_eq!(master.state(), ClientState::Disabled);
    slave.interface_mut().sent.clear();
    tick_all(&clock, &mut [&mut master, &mut slave], Duration::from_secs(60));
    assert!(master.interface().sent.is_empty());
    assert!(slave.interface().sent.is_empty());
}

#[test]
fn peer_delay_between_passive_clients() {
    let clock = start_clock();
    let recorder = Recorder::default();
    let mut requester = client(&clock, ONE_MILLISECOND, config(1, 128), ClientMode::Passive);
    let mut responder = client(&clock, TIME_ZERO, config(2, 128), ClientMode::Passive);
    requester.add_callback(&recorder).unwrap();
    requester.interface_mut().store_addr(2);

    // requests go out at 0.9 times the interval
    tick_all(&clock, &mut [&mut requester], Duration::from_millis(800));
    assert!(requester.interface().sent.is_empty());
    tick_all(&clock, &mut [&mut requester], Duration::from_millis(100));
    assert_eq!(
        requester.interface().sent_types(),
        [(DispatchTo::Stored, MessageType::PDelayReq)]
    );

    deliver(&clock, &mut requester, &mut responder);
    assert_eq!(
        responder.interface().sent_types(),
        [
            (DispatchTo::Reply, MessageType::PDelayResp),
            (DispatchTo::Reply, MessageType::PDelayRespFollowUp)
        ]
    );

    deliver(&clock, &mut responder, &mut requester);
    let measurements = recorder.of_kind(MeasurementKind::PeerDelay);
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].mean_link_delay(), LINK_DELAY);
    assert_eq!(requester.status().mean_link_delay_ns, Some(50_000));

    // the follow up moved t1 by the responder turnaround, the synthesized
    // peer timestamps sit halfway between the final t1 and t4
    let m = measurements[0];
    assert_eq!(m.t2, m.t3);
    assert_eq!(m.t2, (m.t1 + m.t4) / 2);
    assert_eq!(m.t4 - m.t1, LINK_DELAY * 2);
}

#[test]
fn peer_delay_turnaround_is_removed() {
    let clock = start_clock();
    let recorder = Recorder::default();
    let mut requester = client(&clock, TIME_ZERO, config(1, 128), ClientMode::Passive);
    requester.add_callback(&recorder).unwrap();

    tick_all(&clock, &mut [&mut requester], Duration::from_millis(900));
    let (_, data, sent_at) = requester.interface_mut().sent.remove(0);
    let request = Message::deserialize(&data).unwrap();

    // a one-step responder that took 300 ns to answer
    let turnaround = Time::from_nanos(300);
    let response = Message::PDelayResp(PDelayRespMessage {
        header: Header {
            correction_field: turnaround.to_correction(),
            sequence_id: request.header().sequence_id,
            source_port_identity: config(2, 128).port_identity(),
            ..Default::default()
        },
        request_receipt_timestamp: TIME_ZERO,
        requesting_port_identity: request.header().source_port_identity,
    });
    let mut buffer = [0; MAX_DATA_LEN];
    let length = response.serialize(&mut buffer).unwrap();

    let rx_time = sent_at + LINK_DELAY * 2 + turnaround;
    requester.ptp_rcvd(&buffer[..length], rx_time);

    let measurements = recorder.of_kind(MeasurementKind::PeerDelay);
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].mean_link_delay(), LINK_DELAY);
    assert_eq!(measurements[0].t2, measurements[0].t3);
}

#[test]
fn p2p_slave_uses_link_delay() {
    let clock = start_clock();
    let recorder = Recorder::default();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut slave = client(
        &clock,
        ONE_MILLISECOND,
        ClientConfig {
            delay_mechanism: DelayMechanism::P2P,
            ..config(2, 128)
        },
        ClientMode::SlaveOnly,
    );
    slave.add_callback(&recorder).unwrap();

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master, &mut slave], Duration::ZERO);
    deliver(&clock, &mut master, &mut slave);
    assert_eq!(slave.state(), ClientState::Slave);
    // no delay requests in peer to peer mode, and no link delay yet
    assert!(slave.interface().sent.is_empty());
    assert!(recorder.measurements.borrow().is_empty());

    for _ in 0..3 {
        tick_all(&clock, &mut [&mut master, &mut slave], Duration::from_secs(1));
        deliver(&clock, &mut master, &mut slave);
        deliver(&clock, &mut slave, &mut master);
        deliver(&clock, &mut master, &mut slave);
    }

    assert_eq!(slave.state(), ClientState::Slave);
    assert!(!recorder.of_kind(MeasurementKind::PeerDelay).is_empty());

    let syncs = recorder.of_kind(MeasurementKind::Sync);
    assert!(!syncs.is_empty());
    for measurement in syncs {
        assert_eq!(measurement.offset_from_master(), ONE_MILLISECOND);
        assert_eq!(measurement.mean_path_delay(), LINK_DELAY);
    }
}

#[test]
fn unmatched_follow_ups_raise_cache_miss_score() {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    deliver(&clock, &mut master, &mut slave);

    let source = master.config.port_identity();
    let follow_up = |sequence_id| {
        let mut buffer = [0; MAX_DATA_LEN];
        let length = Message::FollowUp(FollowUpMessage {
            header: Header {
                source_port_identity: source,
                sequence_id,
                ..Default::default()
            },
            precise_origin_timestamp: clock.get(),
        })
        .serialize(&mut buffer)
        .unwrap();
        (buffer, length)
    };

    for sequence_id in 100..104 {
        let (buffer, length) = follow_up(sequence_id);
        slave.ptp_rcvd(&buffer[..length], clock.get());
    }
    assert_eq!(slave.cache_miss_score, 40);

    // a sync takes one off
    let mut buffer = [0; MAX_DATA_LEN];
    let length = Message::Sync(SyncMessage {
        header: Header {
            source_port_identity: source,
            sequence_id: 200,
            two_step_flag: true,
            ..Default::default()
        },
        origin_timestamp: TIME_ZERO,
    })
    .serialize(&mut buffer)
    .unwrap();
    slave.ptp_rcvd(&buffer[..length], clock.get());
    assert_eq!(slave.cache_miss_score, 39);

    let (buffer, length) = follow_up(300);
    slave.ptp_rcvd(&buffer[..length], clock.get());
    assert_eq!(slave.cache_miss_score, 49);

    // the warning resets the score
    let (buffer, length) = follow_up(301);
    slave.ptp_rcvd(&buffer[..length], clock.get());
    assert_eq!(slave.cache_miss_score, 0);
}

#[test]
fn sync_unicast_only_as_master() {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);

    assert!(!master.send_sync_unicast(7));
    assert!(master.interface().sent.is_empty());

    promote(&clock, &mut master);
    assert!(master.send_sync_unicast(7));
    assert_eq!(master.interface().stored, Some(7));
    assert_eq!(
        master.interface().sent_types(),
        [
            (DispatchTo::Stored, MessageType::Sync),
            (DispatchTo::Stored, MessageType::FollowUp)
        ]
    );
}

#[test]
fn callback_registration() {
    let clock = start_clock();
    let recorders: [Recorder; MAX_CALLBACKS + 1] = Default::default();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut slave = client(&clock, TIME_ZERO, config(2, 128), ClientMode::SlaveOnly);

    for recorder in &recorders[..MAX_CALLBACKS] {
        slave.add_callback(recorder).unwrap();
    }
    assert!(slave.add_callback(&recorders[MAX_CALLBACKS]).is_err());
    slave.remove_callback(&recorders[0]);

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    deliver(&clock, &mut master, &mut slave);
    deliver(&clock, &mut slave, &mut master);
    deliver(&clock, &mut master, &mut slave);

    assert!(recorders[0].measurements.borrow().is_empty());
    for recorder in &recorders[1..MAX_CALLBACKS] {
        assert_eq!(recorder.measurements.borrow().len(), 1);
    }
    assert!(recorders[MAX_CALLBACKS].measurements.borrow().is_empty());
}

/// Appends an organization extension TLV of its own id to every message,
/// and records the ones it receives
#[derive(Default)]
struct TlvTester {
    organization_id: u32,
    send: bool,
    consume: bool,
    received: RefCell<Vec<Vec<u8>>>,
    shift: Cell<Time>,
    drop: Cell<bool>,
}

impl TlvTester {
    fn new(organization_id: u32, send: bool, consume: bool) -> Self {
        Self {
            organization_id,
            send,
            consume,
            ..Default::default()
        }
    }
}

impl TlvHandler for TlvTester {
    fn tlv_rcvd(&self, _header: &Header, tlv: &Tlv<'_>) -> bool {
        if tlv.header.organization_id != self.organization_id {
            return false;
        }
        self.received.borrow_mut().push(tlv.value.to_vec());
        self.consume
    }

    fn tlv_send(&self, header: &Header, message_type: MessageType, buffer: &mut [u8]) -> usize {
        if !self.send {
            return 0;
        }
        let value = [u8::from(message_type), header.sequence_id as u8];
        Tlv::organization(TlvType::ORGANIZATION_EXTENSION, self.organization_id, 1, &value)
            .and_then(|tlv| tlv.serialize(buffer))
            .unwrap_or(0)
    }

    fn tlv_meas(&self, measurement: &mut Measurement) {
        measurement.t2 += self.shift.get();
        if self.drop.get() {
            measurement.t1 = TIME_ZERO;
        }
    }
}

/// A full two-step sync exchange between a master and a slave with TLV
/// handlers
fn exchange_with_tlvs(
    master_handler: &TlvTester,
    slave_handlers: &[&TlvTester],
    recorder: &Recorder,
) {
    let clock = start_clock();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    let mut slave = client(&clock, ONE_MILLISECOND, config(2, 128), ClientMode::SlaveOnly);
    master.add_tlv_handler(master_handler).unwrap();
    for handler in slave_handlers {
        slave.add_tlv_handler(*handler).unwrap();
    }
    slave.add_callback(recorder).unwrap();

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    deliver(&clock, &mut master, &mut slave);
    deliver(&clock, &mut slave, &mut master);
    deliver(&clock, &mut master, &mut slave);
}

#[test]
fn sent_messages_carry_tlvs() {
    let clock = start_clock();
    let handler = TlvTester::new(0x00_1234, true, false);
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);
    master.add_tlv_handler(&handler).unwrap();

    promote(&clock, &mut master);
    tick_all(&clock, &mut [&mut master], Duration::ZERO);
    assert_eq!(master.interface().sent.len(), 3);

    for (_, data, _) in &master.interface().sent {
        let message = Message::deserialize(data).unwrap();
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        assert_eq!(length, data.len());
        assert_eq!(length, message.wire_size() + 12);

        let tlvs: Vec<_> = message.tlvs(data).collect();
        assert_eq!(tlvs.len(), 1);
        assert_eq!(tlvs[0].header.organization_id, 0x00_1234);
        assert_eq!(
            tlvs[0].value,
            [u8::from(message.content_type()), message.header().sequence_id as u8]
        );
    }
}

#[test]
fn received_tlvs_reach_the_first_matching_handler() {
    let recorder = Recorder::default();
    let sender = TlvTester::new(0x00_1234, true, false);
    let other = TlvTester::new(0x00_4321, false, true);
    let first = TlvTester::new(0x00_1234, false, true);
    let second = TlvTester::new(0x00_1234, false, true);
    exchange_with_tlvs(&sender, &[&other, &first, &second], &recorder);

    let types: Vec<u8> = first.received.borrow().iter().map(|value| value[0]).collect();
    assert_eq!(
        types,
        [
            u8::from(MessageType::Announce),
            u8::from(MessageType::Sync),
            u8::from(MessageType::FollowUp),
            u8::from(MessageType::DelayResp),
        ]
    );
    assert!(other.received.borrow().is_empty());
    assert!(second.received.borrow().is_empty());

    // the TLVs do not disturb the exchange itself
    let measurements = recorder.measurements.borrow();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].offset_from_master(), ONE_MILLISECOND);
}

#[test]
fn unconsumed_tlvs_are_offered_to_later_handlers() {
    let recorder = Recorder::default();
    let sender = TlvTester::new(0x00_1234, true, false);
    let first = TlvTester::new(0x00_1234, false, false);
    let second = TlvTester::new(0x00_1234, false, true);
    exchange_with_tlvs(&sender, &[&first, &second], &recorder);

    assert_eq!(first.received.borrow().len(), 4);
    assert_eq!(second.received.borrow().len(), 4);
}

#[test]
fn tlv_handlers_adjust_measurements() {
    let recorder = Recorder::default();
    let sender = TlvTester::default();
    let handler = TlvTester::default();
    handler.shift.set(ONE_MICROSECOND * 2);
    exchange_with_tlvs(&sender, &[&handler], &recorder);

    let measurements = recorder.measurements.borrow();
    assert_eq!(measurements.len(), 1);
    assert_eq!(
        measurements[0].offset_from_master(),
        ONE_MILLISECOND + ONE_MICROSECOND
    );
}

#[test]
fn tlv_handlers_drop_measurements() {
    let recorder = Recorder::default();
    let sender = TlvTester::default();
    let dropper = TlvTester::default();
    let shifter = TlvTester::default();
    dropper.drop.set(true);
    shifter.shift.set(ONE_MICROSECOND);
    exchange_with_tlvs(&sender, &[&dropper, &shifter], &recorder);

    assert!(recorder.measurements.borrow().is_empty());
}

#[test]
fn tlv_handler_registration() {
    let clock = start_clock();
    let handlers: [TlvTester; MAX_TLV_HANDLERS + 1] = Default::default();
    let mut master = client(&clock, TIME_ZERO, config(1, 10), ClientMode::MasterL2);

    for handler in &handlers[..MAX_TLV_HANDLERS] {
        master.add_tlv_handler(handler).unwrap();
    }
    assert!(master.add_tlv_handler(&handlers[MAX_TLV_HANDLERS]).is_err());

    master.remove_tlv_handler(&handlers[0]);
    master.add_tlv_handler(&handlers[MAX_TLV_HANDLERS]).unwrap();
    assert_eq!(master.tlv_handlers.len(), MAX_TLV_HANDLERS);
    assert!(!master
        .tlv_handlers
        .iter()
        .any(|registered| same_tlv_handler(*registered, &handlers[0])));
}
