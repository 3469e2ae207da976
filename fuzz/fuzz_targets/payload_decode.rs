//! Arbitrary bytes through the decoder and every validator.

#![no_main]

use doorbell_proto::{
    DEFAULT_MAX_DRIFT_MS, codec::decode_value, validate_info, validate_presence, validate_ring,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = decode_value(data) else {
        return;
    };

    let _ = validate_presence(&value);
    let _ = validate_info(&value);
    for now_ms in [0, 1_700_000_000_000, u64::MAX] {
        if let Ok(ring) = validate_ring(&value, now_ms, DEFAULT_MAX_DRIFT_MS) {
            assert!(ring.timestamp.abs_diff(now_ms) <= DEFAULT_MAX_DRIFT_MS);
        }
    }
});
