//! Structural and freshness checks for inbound payloads.
//!
//! The transport delivers arbitrary values from arbitrary peers. Every
//! validator is pure: it inspects the payload, returns a typed event or a
//! [`Rejection`], and never panics.

use ciborium::Value;

use crate::{
    errors::Rejection,
    message::{ActionKind, InfoEvent, PeerRole, PresenceEvent, RingEvent},
};

/// Largest info clock accepted from the network (2^53 - 1).
///
/// Peers count clocks as IEEE doubles, so anything larger cannot be a real
/// counter. The bound also leaves room for the receiver to keep ticking
/// after it adopts the value.
pub const MAX_INFO_CLOCK: u64 = (1 << 53) - 1;

/// Default ring drift bound: five minutes either side of local time.
pub const DEFAULT_MAX_DRIFT_MS: u64 = 5 * 60 * 1000;

/// Validate a ring payload against the local wall clock.
///
/// A timestamp exactly `max_drift_ms` away from `now_ms` is accepted; only a
/// strictly larger drift is rejected.
pub fn validate_ring(payload: &Value, now_ms: u64, max_drift_ms: u64) -> Result<RingEvent, Rejection> {
    let entries = map_entries(payload)?;
    expect_kind(entries, ActionKind::Ring)?;

    let timestamp = match field(entries, "timestamp") {
        Some(value) => timestamp_ms(value)?,
        None => return Err(Rejection::MissingField("timestamp")),
    };
    let nonce = text_field(entries, "nonce")?;

    let drift_ms = now_ms.abs_diff(timestamp);
    if drift_ms > max_drift_ms {
        return Err(Rejection::TimestampDrift { drift_ms, max_drift_ms });
    }

    Ok(RingEvent { timestamp, nonce })
}

/// Validate an info payload.
pub fn validate_info(payload: &Value) -> Result<InfoEvent, Rejection> {
    let entries = map_entries(payload)?;
    expect_kind(entries, ActionKind::Info)?;

    let name = text_field(entries, "name")?;
    let clock = match field(entries, "clock") {
        Some(value) => clock_value(value)?,
        None => return Err(Rejection::MissingField("clock")),
    };

    Ok(InfoEvent { name, clock })
}

/// Validate a presence payload.
pub fn validate_presence(payload: &Value) -> Result<PresenceEvent, Rejection> {
    let entries = map_entries(payload)?;
    expect_kind(entries, ActionKind::Presence)?;

    let role = match field(entries, "role") {
        Some(Value::Text(role)) => PeerRole::from_wire(role)
            .ok_or(Rejection::InvalidField { field: "role", reason: "unknown role" })?,
        Some(_) => return Err(Rejection::InvalidField { field: "role", reason: "not text" }),
        None => return Err(Rejection::MissingField("role")),
    };

    Ok(PresenceEvent { role })
}

fn map_entries(payload: &Value) -> Result<&[(Value, Value)], Rejection> {
    match payload {
        Value::Map(entries) => Ok(entries),
        _ => Err(Rejection::NotAMap),
    }
}

fn field<'a>(entries: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    entries.iter().find_map(|(key, value)| match key {
        Value::Text(key) if key == name => Some(value),
        _ => None,
    })
}

fn expect_kind(entries: &[(Value, Value)], expected: ActionKind) -> Result<(), Rejection> {
    match field(entries, "kind") {
        Some(Value::Text(kind)) if kind == expected.name() => Ok(()),
        Some(Value::Text(kind)) => Err(Rejection::WrongKind { expected, found: kind.clone() }),
        _ => Err(Rejection::WrongKind { expected, found: String::new() }),
    }
}

fn text_field(entries: &[(Value, Value)], name: &'static str) -> Result<String, Rejection> {
    match field(entries, name) {
        Some(Value::Text(text)) => Ok(text.clone()),
        Some(_) => Err(Rejection::InvalidField { field: name, reason: "not text" }),
        None => Err(Rejection::MissingField(name)),
    }
}

/// Integers are taken as-is; finite floats are truncated toward zero.
fn timestamp_ms(value: &Value) -> Result<u64, Rejection> {
    const FIELD: &str = "timestamp";
    match value {
        Value::Integer(int) => u64::try_from(*int)
            .map_err(|_| Rejection::InvalidField { field: FIELD, reason: "out of range" }),
        Value::Float(float) if float.is_finite() => {
            let truncated = float.trunc();
            if truncated < 0.0 || truncated > u64::MAX as f64 {
                return Err(Rejection::InvalidField { field: FIELD, reason: "out of range" });
            }
            Ok(truncated as u64)
        },
        _ => Err(Rejection::InvalidField { field: FIELD, reason: "not a number" }),
    }
}

/// Clocks must be non-negative, integral and at most [`MAX_INFO_CLOCK`].
fn clock_value(value: &Value) -> Result<u64, Rejection> {
    const FIELD: &str = "clock";
    const OUT_OF_RANGE: Rejection = Rejection::InvalidField { field: FIELD, reason: "out of range" };
    let clock = match value {
        Value::Integer(int) => u64::try_from(*int).map_err(|_| OUT_OF_RANGE)?,
        Value::Float(float) if float.is_finite() => {
            if float.fract() != 0.0 {
                return Err(Rejection::InvalidField { field: FIELD, reason: "not integral" });
            }
            if *float < 0.0 || *float > MAX_INFO_CLOCK as f64 {
                return Err(OUT_OF_RANGE);
            }
            *float as u64
        },
        _ => return Err(Rejection::InvalidField { field: FIELD, reason: "not a number" }),
    };

    if clock > MAX_INFO_CLOCK {
        return Err(OUT_OF_RANGE);
    }
    Ok(clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    const NOW: u64 = 1_700_000_000_000;
    const MINUTE: u64 = 60 * 1000;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(entries.iter().map(|(k, v)| (Value::Text((*k).to_string()), v.clone())).collect())
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn ring_at(timestamp: u64) -> Value {
        Message::Ring(RingEvent { timestamp, nonce: "n-1".into() }).to_value()
    }

    #[test]
    fn ring_within_drift_is_accepted() {
        let event = validate_ring(&ring_at(NOW - 4 * MINUTE), NOW, DEFAULT_MAX_DRIFT_MS).unwrap();
        assert_eq!(event, RingEvent { timestamp: NOW - 4 * MINUTE, nonce: "n-1".into() });
    }

    #[test]
    fn ring_outside_drift_is_rejected() {
        let result = validate_ring(&ring_at(NOW - 6 * MINUTE), NOW, DEFAULT_MAX_DRIFT_MS);
        assert_eq!(
            result,
            Err(Rejection::TimestampDrift { drift_ms: 6 * MINUTE, max_drift_ms: DEFAULT_MAX_DRIFT_MS })
        );

        // Future timestamps are bounded the same way
        let result = validate_ring(&ring_at(NOW + 6 * MINUTE), NOW, DEFAULT_MAX_DRIFT_MS);
        assert!(matches!(result, Err(Rejection::TimestampDrift { .. })));
    }

    #[test]
    fn ring_drift_boundary_is_inclusive() {
        assert!(validate_ring(&ring_at(NOW - 5 * MINUTE), NOW, DEFAULT_MAX_DRIFT_MS).is_ok());
        assert!(validate_ring(&ring_at(NOW - 5 * MINUTE - 1), NOW, DEFAULT_MAX_DRIFT_MS).is_err());
    }

    #[test]
    fn ring_float_timestamp_is_truncated() {
        let payload =
            map(&[("kind", text("ring")), ("timestamp", Value::Float(NOW as f64 + 0.75)), ("nonce", text("x"))]);
        let event = validate_ring(&payload, NOW, DEFAULT_MAX_DRIFT_MS).unwrap();
        assert_eq!(event.timestamp, NOW);
    }

    #[test]
    fn ring_requires_string_nonce() {
        let payload = map(&[
            ("kind", text("ring")),
            ("timestamp", Value::Integer(NOW.into())),
            ("nonce", Value::Integer(7.into())),
        ]);
        assert_eq!(
            validate_ring(&payload, NOW, DEFAULT_MAX_DRIFT_MS),
            Err(Rejection::InvalidField { field: "nonce", reason: "not text" })
        );
    }

    #[test]
    fn ring_rejects_non_numeric_timestamp() {
        let payload = map(&[("kind", text("ring")), ("timestamp", text("now")), ("nonce", text("x"))]);
        assert_eq!(
            validate_ring(&payload, NOW, DEFAULT_MAX_DRIFT_MS),
            Err(Rejection::InvalidField { field: "timestamp", reason: "not a number" })
        );
    }

    #[test]
    fn info_is_accepted() {
        let payload = map(&[("kind", text("info")), ("name", text("Blue Door")), ("clock", Value::Integer(3.into()))]);
        assert_eq!(validate_info(&payload), Ok(InfoEvent { name: "Blue Door".into(), clock: 3 }));
    }

    #[test]
    fn info_accepts_integral_float_clock() {
        let payload = map(&[("kind", text("info")), ("name", text("X")), ("clock", Value::Float(2.0))]);
        assert_eq!(validate_info(&payload).map(|info| info.clock), Ok(2));
    }

    #[test]
    fn info_clock_is_bounded() {
        let at = |clock: Value| map(&[("kind", text("info")), ("name", text("X")), ("clock", clock)]);

        let max = Value::Integer(MAX_INFO_CLOCK.into());
        assert_eq!(validate_info(&at(max)).map(|info| info.clock), Ok(MAX_INFO_CLOCK));
        for clock in [
            Value::Integer((MAX_INFO_CLOCK + 1).into()),
            Value::Integer(u64::MAX.into()),
            Value::Float(2f64.powi(60)),
        ] {
            assert_eq!(
                validate_info(&at(clock)),
                Err(Rejection::InvalidField { field: "clock", reason: "out of range" })
            );
        }
    }

    #[test]
    fn info_rejects_bad_clocks() {
        for clock in [Value::Float(1.5), Value::Integer((-1).into()), text("1"), Value::Float(f64::NAN)] {
            let payload = map(&[("kind", text("info")), ("name", text("X")), ("clock", clock)]);
            assert!(
                matches!(validate_info(&payload), Err(Rejection::InvalidField { field: "clock", .. })),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn info_requires_name() {
        let payload = map(&[("kind", text("info")), ("clock", Value::Integer(1.into()))]);
        assert_eq!(validate_info(&payload), Err(Rejection::MissingField("name")));
    }

    #[test]
    fn presence_roles() {
        let doorbell = map(&[("kind", text("presence")), ("role", text("doorbell"))]);
        assert_eq!(validate_presence(&doorbell), Ok(PresenceEvent { role: PeerRole::Doorbell }));

        let unknown = map(&[("kind", text("presence")), ("role", text("butler"))]);
        assert_eq!(
            validate_presence(&unknown),
            Err(Rejection::InvalidField { field: "role", reason: "unknown role" })
        );
    }

    #[test]
    fn kind_must_match_action() {
        let info = map(&[("kind", text("info")), ("name", text("X")), ("clock", Value::Integer(1.into()))]);
        assert_eq!(
            validate_presence(&info),
            Err(Rejection::WrongKind { expected: ActionKind::Presence, found: "info".into() })
        );

        let missing = map(&[("role", text("ringer"))]);
        assert_eq!(
            validate_presence(&missing),
            Err(Rejection::WrongKind { expected: ActionKind::Presence, found: String::new() })
        );
    }

    #[test]
    fn non_map_payloads_are_rejected() {
        for payload in [Value::Null, text("ring"), Value::Array(vec![]), Value::Integer(0.into())] {
            assert_eq!(validate_presence(&payload), Err(Rejection::NotAMap));
            assert_eq!(validate_info(&payload), Err(Rejection::NotAMap));
            assert_eq!(validate_ring(&payload, NOW, DEFAULT_MAX_DRIFT_MS), Err(Rejection::NotAMap));
        }
    }
}
