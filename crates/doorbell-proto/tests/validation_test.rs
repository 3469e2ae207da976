//! Property tests for the validators.
//!
//! Validators sit on the protocol boundary, so arbitrary input must produce a
//! rejection rather than a panic, and every event we emit must validate.

use ciborium::Value;
use doorbell_proto::{
    DEFAULT_MAX_DRIFT_MS, InfoEvent, MAX_INFO_CLOCK, Message, PeerRole, PresenceEvent, RingEvent,
    codec::{decode_value, encode_value},
    validate_info, validate_presence, validate_ring,
};
use proptest::prelude::*;

const NOW: u64 = 1_700_000_000_000;

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|i| Value::Integer(i.into())),
        any::<f64>().prop_map(Value::Float),
        "[a-z]{0,12}".prop_map(Value::Text),
        prop::sample::select(vec!["kind", "ring", "info", "presence", "role", "doorbell", "ringer"])
            .prop_map(|s| Value::Text(s.to_string())),
    ];
    leaf.prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec((inner.clone(), inner), 0..6).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn validators_never_panic(value in arb_value(), now in any::<u64>(), drift in any::<u64>()) {
        let _ = validate_ring(&value, now, drift);
        let _ = validate_info(&value);
        let _ = validate_presence(&value);
    }

    #[test]
    fn decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(value) = decode_value(&bytes) {
            let _ = validate_info(&value);
        }
    }

    #[test]
    fn emitted_events_validate(
        name in ".{0,50}",
        clock in 0..=MAX_INFO_CLOCK,
        offset in 0..=DEFAULT_MAX_DRIFT_MS,
        nonce in "[0-9a-f-]{36}",
        doorbell in any::<bool>(),
    ) {
        let info = InfoEvent { name, clock };
        let value = decode_value(&encode_value(&Message::Info(info.clone()).to_value()).unwrap()).unwrap();
        prop_assert_eq!(validate_info(&value), Ok(info));

        let ring = RingEvent { timestamp: NOW - offset, nonce };
        let value = Message::Ring(ring.clone()).to_value();
        prop_assert_eq!(validate_ring(&value, NOW, DEFAULT_MAX_DRIFT_MS), Ok(ring));

        let role = if doorbell { PeerRole::Doorbell } else { PeerRole::Ringer };
        let value = Message::Presence(PresenceEvent { role }).to_value();
        prop_assert_eq!(validate_presence(&value), Ok(PresenceEvent { role }));
    }
}
