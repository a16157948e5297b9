//! Peer delay exchange, see *IEEE1588-2019 section 11.4*
//!
//! The responder does not report its receive and transmit timestamps, it
//! folds its turnaround time into the correction field instead. The
//! requester removes that turnaround from t1, so the measurement ends up
//! with `t4 - t1` being the round trip on the link alone.

use rand::Rng;

use super::Client;
use crate::{
    datastructures::messages::{
        Message, MessageType, PDelayReqMessage, PDelayRespFollowUpMessage, PDelayRespMessage,
    },
    measurement::MeasurementKind,
    network::{DispatchTo, Interface},
    time::{Time, TIME_ZERO},
};

impl<'a, I: Interface, R: Rng> Client<'a, I, R> {
    pub(super) fn send_pdelay_req(&mut self) {
        let sequence_id = self.pdelay_seq_ids.generate();
        log::trace!("sending peer delay request {}", sequence_id);

        let header = self.make_header(MessageType::PDelayReq, sequence_id);
        let message = Message::PDelayReq(PDelayReqMessage {
            header,
            origin_timestamp: self.iface.now(),
        });

        if !self.send_message(DispatchTo::Stored, &message) {
            return;
        }

        if let Some(t1) = self.tx_timestamp() {
            let measurement = self.cache.push(&header);
            measurement.kind = MeasurementKind::PeerDelay;
            measurement.t1 = t1;
        }
    }

    pub(super) fn handle_pdelay_req(&mut self, message: PDelayReqMessage, t2: Time) {
        let request = message.header;
        log::debug!("received peer delay request {}", request.sequence_id);

        let mut header = self.make_header(MessageType::PDelayResp, request.sequence_id);

        let one_step = self.tx_start();
        match one_step {
            Some(t3) => {
                header.correction_field = request
                    .correction_field
                    .saturating_add((t3 - t2).to_correction());
            }
            None => header.two_step_flag = true,
        }

        let response = Message::PDelayResp(PDelayRespMessage {
            header,
            request_receipt_timestamp: TIME_ZERO,
            requesting_port_identity: request.source_port_identity,
        });
        if !self.send_message(DispatchTo::Reply, &response) || one_step.is_some() {
            return;
        }

        let Some(t3) = self.tx_timestamp() else {
            return;
        };

        let mut header = self.make_header(MessageType::PDelayRespFollowUp, request.sequence_id);
        header.correction_field = request
            .correction_field
            .saturating_add((t3 - t2).to_correction());

        let follow_up = Message::PDelayRespFollowUp(PDelayRespFollowUpMessage {
            header,
            response_origin_timestamp: TIME_ZERO,
            requesting_port_identity: request.source_port_identity,
        });
        self.send_message(DispatchTo::Reply, &follow_up);
    }

    pub(super) fn handle_pdelay_resp(&mut self, message: PDelayRespMessage, t4: Time) {
        let header = message.header;
        log::debug!("received peer delay response {}", header.sequence_id);

        let Some(measurement) = self
            .cache
            .find_mut(&header, &message.requesting_port_identity)
        else {
            self.cache_miss(&header);
            return;
        };

        let turnaround = header
            .correction_field
            .saturating_sub(measurement.reference.correction_field);
        measurement.t1 += Time::from(turnaround);
        // without timestamps from the peer, put its turnaround in the middle
        measurement.t2 = match message.request_receipt_timestamp {
            TIME_ZERO => (measurement.t1 + t4) / 2,
            t2 => t2,
        };
        measurement.t3 = measurement.t2;
        measurement.t4 = t4;

        if !header.two_step_flag {
            let measurement = *measurement;
            self.notify_if_complete(measurement);
        }
    }

    pub(super) fn handle_pdelay_resp_follow_up(&mut self, message: PDelayRespFollowUpMessage) {
        let header = message.header;
        log::debug!("received peer delay follow up {}", header.sequence_id);

        let Some(measurement) = self
            .cache
            .find_mut(&header, &message.requesting_port_identity)
        else {
            self.cache_miss(&header);
            return;
        };

        let turnaround = header
            .correction_field
            .saturating_sub(measurement.reference.correction_field);
        measurement.t1 += Time::from(turnaround);
        if message.response_origin_timestamp == TIME_ZERO {
            // t1 moved, so the midpoint has to follow
            measurement.t2 = (measurement.t1 + measurement.t4) / 2;
            measurement.t3 = measurement.t2;
        }

        let measurement = *measurement;
        self.notify_if_complete(measurement);
    }
}
