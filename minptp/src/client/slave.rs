use rand::Rng;

use super::{timer::Task, Client, ClientState};
use crate::{
    config::DelayMechanism,
    datastructures::messages::{
        DelayReqMessage, DelayRespMessage, FollowUpMessage, Header, Message, MessageType,
        SyncMessage,
    },
    measurement::Measurement,
    network::{DispatchTo, Interface},
    time::Time,
};

impl<'a, I: Interface, R: Rng> Client<'a, I, R> {
    /// Whether `header` comes from the master we follow
    fn from_current_source(&self, header: &Header) -> bool {
        self.state == ClientState::Slave
            && self.current_source == Some(header.source_port_identity)
    }

    pub(super) fn handle_sync(&mut self, message: SyncMessage, recv_time: Time) {
        let header = message.header;
        if !self.from_current_source(&header) {
            log::trace!("ignoring sync {} while {}", header.sequence_id, self.state);
            return;
        }

        log::debug!("received sync {}", header.sequence_id);
        self.scheduler.kick(Task::Watchdog);
        self.cache_hit();

        let measurement = self.cache.push(&header);
        // subtracting correction from recv time is equivalent to adding it to
        // send time
        measurement.t2 = recv_time - Time::from(header.correction_field);

        if header.two_step_flag {
            // t1 comes with the follow up
            return;
        }

        measurement.t1 = message.origin_timestamp;
        self.complete_sync(header);
    }

    pub(super) fn handle_follow_up(&mut self, message: FollowUpMessage) {
        let header = message.header;
        if !self.from_current_source(&header) {
            log::trace!("ignoring follow up {} while {}", header.sequence_id, self.state);
            return;
        }

        log::debug!("received follow up {}", header.sequence_id);

        match self.cache.find_mut(&header, &header.source_port_identity) {
            Some(measurement) => {
                measurement.t1 =
                    message.precise_origin_timestamp + Time::from(header.correction_field);
                self.complete_sync(header);
            }
            None => self.cache_miss(&header),
        }
    }

    pub(super) fn handle_delay_resp(&mut self, message: DelayRespMessage) {
        let header = message.header;
        if !self.from_current_source(&header) {
            log::trace!("ignoring delay response while {}", self.state);
            return;
        }

        if message.requesting_port_identity != self.config.port_identity() {
            // answer to another slave of the same master
            return;
        }

        log::debug!("received delay response {}", header.sequence_id);
        self.cache_hit();

        match self.cache.find_mut(&header, &header.source_port_identity) {
            Some(measurement) => {
                measurement.t4 = message.receive_timestamp - Time::from(header.correction_field);
                let measurement = *measurement;
                self.notify_if_complete(measurement);
            }
            None => self.cache_miss(&header),
        }
    }

    /// Finish the sync exchange started by `sync` once t1 and t2 are known
    fn complete_sync(&mut self, sync: Header) {
        let port = sync.source_port_identity;

        match self.config.delay_mechanism {
            DelayMechanism::E2E => {
                let t3 = self.send_delay_req(sync.sequence_id);
                if let (Some(t3), Some(measurement)) = (t3, self.cache.find_mut(&sync, &port)) {
                    measurement.t3 = t3;
                }
            }
            DelayMechanism::P2P => {
                let Some(link_delay) = self.link_delay else {
                    log::debug!("no link delay yet, skipping sync {}", sync.sequence_id);
                    return;
                };

                if let Some(measurement) = self.cache.find_mut(&sync, &port) {
                    // A virtual delay request, sent on arrival of the sync and
                    // taking exactly the link delay in both directions
                    measurement.t3 = measurement.t2;
                    measurement.t4 = measurement.t1 + link_delay * 2;
                    let measurement: Measurement = *measurement;
                    self.notify_if_complete(measurement);
                }
            }
        }
    }

    /// Send a delay request answering sync `sequence_id`, returning its
    /// transmit time
    fn send_delay_req(&mut self, sequence_id: u16) -> Option<Time> {
        log::trace!("sending delay request {}", sequence_id);

        let header = self.make_header(MessageType::DelayReq, sequence_id);
        let message = Message::DelayReq(DelayReqMessage {
            header,
            origin_timestamp: self.iface.now(),
        });

        if self.send_message(DispatchTo::Reply, &message) {
            self.tx_timestamp()
        } else {
            None
        }
    }
}
