use rand::Rng;

use super::{timer::Task, Client, ClientMode, ClientState};
use crate::{
    config::ClockInfo,
    datastructures::messages::{AnnounceMessage, Header},
    network::Interface,
};

impl<'a, I: Interface, R: Rng> Client<'a, I, R> {
    pub(super) fn handle_announce(&mut self, message: AnnounceMessage) {
        let header = message.header;
        let remote = message.clock_info;

        // IEEE 1588-2019 9.3.2.5: drop announces that traveled too far
        if remote.steps_removed >= 255 {
            log::debug!("ignoring announce with {} steps removed", remote.steps_removed);
            return;
        }

        let from_current_source = self.current_source == Some(header.source_port_identity);

        match self.state {
            ClientState::Disabled => {}
            ClientState::Listening => {
                // a slave only client takes the first master it hears
                if self.mode == ClientMode::SlaveOnly || remote.is_better_than(&self.clock_local) {
                    self.select_master(&header, remote, ClientState::Slave);
                }
            }
            ClientState::Master => {
                if remote.is_better_than(&self.clock_local) {
                    log::info!("better master {} announced", remote.identity);
                    self.select_master(&header, remote, ClientState::Slave);
                }
            }
            ClientState::Slave | ClientState::Passive => {
                if self.mode == ClientMode::Passive {
                    // a passive client never follows anyone
                } else if from_current_source {
                    self.clock_remote = remote;
                    self.scheduler.kick(Task::Watchdog);
                } else if remote.is_better_than(&self.clock_remote) {
                    log::info!(
                        "switching to better master {} via {}",
                        remote.identity,
                        header.source_port_identity
                    );
                    self.select_master(&header, remote, self.state);
                }
            }
        }
    }

    /// Follow the sender of `header`, announcing `remote`, from now on
    fn select_master(&mut self, header: &Header, remote: ClockInfo, state: ClientState) {
        log::info!(
            "selected master {} with grandmaster {}",
            header.source_port_identity,
            remote.identity
        );

        self.iface.store_reply_addr();
        self.current_source = Some(header.source_port_identity);
        self.clock_remote = remote;
        self.cache_miss_score = 0;
        self.set_state(state);
    }
}
