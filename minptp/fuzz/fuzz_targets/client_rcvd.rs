#![no_main]

use core::time::Duration;

use libfuzzer_sys::fuzz_target;
use minptp::{
    config::ClientConfig,
    network::{DispatchTo, Interface},
    time::Time,
    Client, ClientMode,
};
use rand::rngs::mock::StepRng;

struct NullInterface {
    now: Time,
}

impl Interface for NullInterface {
    type Error = ();
    type Address = ();

    fn send(&mut self, _to: DispatchTo, _data: &[u8]) -> Result<(), ()> {
        Ok(())
    }

    fn tx_timestamp(&mut self) -> Option<Time> {
        Some(self.now)
    }

    fn now(&mut self) -> Time {
        self.now
    }

    fn store_reply_addr(&mut self) {}

    fn store_addr(&mut self, _addr: ()) {}
}

fuzz_target!(|input: (u8, Vec<Vec<u8>>)| {
    let (mode, packets) = input;
    let mode = match mode % 5 {
        0 => ClientMode::Disabled,
        1 => ClientMode::MasterL2,
        2 => ClientMode::MasterL3,
        3 => ClientMode::SlaveOnly,
        _ => ClientMode::Passive,
    };

    let interface = NullInterface {
        now: Time::from_secs(1_000_000),
    };
    let mut client = Client::new(interface, ClientConfig::default(), mode, StepRng::new(0, 1));

    for packet in packets {
        let now = client.interface_mut().now + Time::from_millis(10);
        client.interface_mut().now = now;
        client.ptp_rcvd(&packet, now);
        client.tick(Duration::from_millis(10));
    }
});
