#![no_main]

use idp_delegation::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // anything that decodes must survive an encode/decode cycle unchanged
    if let Ok(message) = Message::decode(text) {
        let encoded = message.encode().unwrap();
        assert_eq!(Message::decode(&encoded).unwrap(), message);
    }
});
