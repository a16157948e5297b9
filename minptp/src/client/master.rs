use rand::Rng;

use super::{Client, ClientState};
use crate::{
    datastructures::messages::{
        AnnounceMessage, DelayReqMessage, DelayRespMessage, FollowUpMessage, Message,
        MessageType, SyncMessage,
    },
    network::{DispatchTo, Interface},
    time::{Time, TIME_ZERO},
};

impl<'a, I: Interface, R: Rng> Client<'a, I, R> {
    /// Send a sync message to a single peer.
    ///
    /// Only a master sends syncs, in any other state this returns `false`
    /// without sending anything.
    pub fn send_sync_unicast(&mut self, addr: I::Address) -> bool {
        if self.state != ClientState::Master {
            return false;
        }

        // the stored address is not used otherwise while master
        self.iface.store_addr(addr);
        self.send_sync(DispatchTo::Stored)
    }

    pub(super) fn send_announce(&mut self) {
        log::trace!("sending announce message");

        let sequence_id = self.announce_seq_ids.generate();
        let header = self.make_header(MessageType::Announce, sequence_id);
        let message = Message::Announce(AnnounceMessage {
            header,
            origin_timestamp: TIME_ZERO,
            current_utc_offset: self.config.current_utc_offset,
            clock_info: self.clock_local,
        });

        self.send_message(self.mode.broadcast_to(), &message);
    }

    /// Send a sync, followed by a follow up unless the interface gave us the
    /// transmit time in advance
    pub(super) fn send_sync(&mut self, to: DispatchTo) -> bool {
        log::trace!("sending sync message");

        let sequence_id = self.sync_seq_ids.generate();
        let mut header = self.make_header(MessageType::Sync, sequence_id);

        let one_step = self.tx_start();
        let origin_timestamp = match one_step {
            Some(t1) => {
                // the wire timestamp drops the sub-nanoseconds, the correction
                // field carries them instead
                header.correction_field = t1.correction();
                t1
            }
            None => {
                header.two_step_flag = true;
                TIME_ZERO
            }
        };

        let message = Message::Sync(SyncMessage {
            header,
            origin_timestamp,
        });
        if !self.send_message(to, &message) {
            return false;
        }

        if one_step.is_some() {
            return true;
        }

        let Some(t1) = self.tx_timestamp() else {
            return false;
        };
        self.send_follow_up(to, sequence_id, t1)
    }

    fn send_follow_up(&mut self, to: DispatchTo, sequence_id: u16, t1: Time) -> bool {
        let mut header = self.make_header(MessageType::FollowUp, sequence_id);
        header.correction_field = t1.correction();

        let message = Message::FollowUp(FollowUpMessage {
            header,
            precise_origin_timestamp: t1,
        });
        self.send_message(to, &message)
    }

    pub(super) fn handle_delay_req(&mut self, message: DelayReqMessage, t4: Time) {
        if self.state != ClientState::Master {
            log::trace!("ignoring delay request while {}", self.state);
            return;
        }

        let request = message.header;
        let mut header = self.make_header(MessageType::DelayResp, request.sequence_id);
        // t4 goes out in whole nanoseconds, the remainder is taken off the
        // correction field so the slave can restore it
        header.correction_field = request
            .correction_field
            .saturating_sub(t4.correction());

        let response = Message::DelayResp(DelayRespMessage {
            header,
            receive_timestamp: t4,
            requesting_port_identity: request.source_port_identity,
        });
        self.send_message(DispatchTo::Reply, &response);
    }
}
