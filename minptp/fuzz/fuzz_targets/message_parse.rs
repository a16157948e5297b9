#![no_main]

use libfuzzer_sys::fuzz_target;

use minptp::fuzz::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(message) = Message::deserialize(data) else {
        return;
    };

    // whatever parses and can be sent must survive a round trip
    let mut buffer = [0; 64];
    if let Ok(length) = message.serialize(&mut buffer) {
        assert_eq!(length, message.wire_size());
        let reparsed = Message::deserialize(&buffer[..length]).unwrap();
        assert_eq!(reparsed.header(), message.header());
    }
});
