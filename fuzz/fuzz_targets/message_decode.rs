#![no_main]
use libfuzzer_sys::fuzz_target;

use lifx_core::BuildOptions;
use lifx_core::LifxString;
use lifx_core::Message;
use lifx_core::RawMessage;

/// What a label looks like after being encoded and decoded once more.
///
/// Invalid UTF-8 decodes to U+FFFD, which is three bytes wide, so a decoded label can be longer
/// than the 32 bytes it is written back into.
fn reencoded(label: &LifxString) -> LifxString {
    LifxString(LifxString::new(label.as_str()).0.trim_end_matches('\0').to_owned())
}

fn assert_message_eq(decoded: &Message, again: &Message) {
    match (decoded, again) {
        (Message::SetLabel { label }, Message::SetLabel { label: label2 })
        | (Message::StateLabel { label }, Message::StateLabel { label: label2 }) => {
            assert_eq!(&reencoded(label), label2);
        }
        (
            Message::LightState {
                color,
                reserved,
                power,
                label,
                reserved2,
            },
            Message::LightState {
                color: color2,
                reserved: reserved_2,
                power: power2,
                label: label2,
                reserved2: reserved2_2,
            },
        ) => {
            assert_eq!(color, color2);
            assert_eq!(reserved, reserved_2);
            assert_eq!(power, power2);
            assert_eq!(&reencoded(label), label2);
            assert_eq!(reserved2, reserved2_2);
        }
        (a, b) => assert_eq!(a, b),
    }
}

fuzz_target!(|data: &[u8]| {
    // anything may fail to decode, but nothing may panic
    let raw = match RawMessage::unpack(data) {
        Ok(raw) => raw,
        Err(_) => return,
    };
    let msg = match Message::from_raw(&raw) {
        Ok(msg) => msg,
        Err(_) => return,
    };

    // whatever decoded must be built back into bytes that decode to the same message
    let opts = BuildOptions {
        target: Some(raw.frame_addr.target),
        source: raw.frame.source,
        sequence: raw.frame_addr.sequence,
        ..Default::default()
    };
    let rebuilt = match RawMessage::build(&opts, msg.clone()) {
        Ok(rebuilt) => rebuilt,
        Err(_) => return,
    };
    let bytes = rebuilt.pack().unwrap();
    let again = Message::from_raw(&RawMessage::unpack(&bytes).unwrap()).unwrap();
    assert_message_eq(&msg, &again);
});
