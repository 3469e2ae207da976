//! Arbitrary event sequences against one session.
//!
//! Whatever arrives, the session never panics, counts only handshaken peers,
//! and never moves its local clock backwards.

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use doorbell_core::{ChannelEvent, JoinOptions, Session, SessionConfig};
use doorbell_harness::SimEnv;
use doorbell_proto::{
    ActionKind, InfoEvent, Message, PeerId, PeerRole, PresenceEvent, SessionTopic,
    codec::decode_value,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    RawJoin(u8),
    Leave(u8),
    Presence { peer: u8, doorbell: bool },
    Info { peer: u8, clock: u64 },
    Garbage { peer: u8, action: u8, bytes: Vec<u8> },
    SendRing,
    SendInfo(String),
    Advance(u16),
    Rejoin { doorbell: bool },
    LeaveSession,
}

fn peer(id: u8) -> PeerId {
    PeerId::new(format!("p{}", id % 8))
}

fuzz_target!(|ops: Vec<Op>| {
    let env = SimEnv::with_seed(0);
    let mut session = Session::new(env.clone(), SessionConfig::default());
    let _ = session.join(SessionTopic::from("fuzz"), JoinOptions::ringer());
    let mut last_clock = 0;

    for op in ops {
        let _actions = match op {
            Op::RawJoin(p) => session.handle(ChannelEvent::PeerJoined(peer(p))),
            Op::Leave(p) => session.handle(ChannelEvent::PeerLeft(peer(p))),
            Op::Presence { peer: p, doorbell } => {
                let role = if doorbell { PeerRole::Doorbell } else { PeerRole::Ringer };
                let payload = Message::Presence(PresenceEvent { role }).to_value();
                session.handle(ChannelEvent::Received {
                    peer: peer(p),
                    action: ActionKind::Presence,
                    payload,
                })
            },
            Op::Info { peer: p, clock } => {
                let payload = Message::Info(InfoEvent { name: "n".into(), clock }).to_value();
                session.handle(ChannelEvent::Received { peer: peer(p), action: ActionKind::Info, payload })
            },
            Op::Garbage { peer: p, action, bytes } => {
                let Ok(payload) = decode_value(&bytes) else {
                    continue;
                };
                let action = ActionKind::ALL[usize::from(action) % ActionKind::ALL.len()];
                session.handle(ChannelEvent::Received { peer: peer(p), action, payload })
            },
            Op::SendRing => session.send_ring().unwrap_or_default(),
            Op::SendInfo(name) => session.send_info(&name).unwrap_or_default(),
            Op::Advance(ms) => {
                env.advance(Duration::from_millis(u64::from(ms)));
                session.tick()
            },
            Op::Rejoin { doorbell } => {
                let options =
                    if doorbell { JoinOptions::doorbell("fuzz") } else { JoinOptions::ringer() };
                session.join(SessionTopic::from("fuzz"), options)
            },
            Op::LeaveSession => session.leave(),
        };

        let counts = session.counts();
        assert!(counts.doorbells <= counts.peers);
        assert!(counts.peers <= 8);
        assert!(session.clock().observe() >= last_clock);
        last_clock = session.clock().observe();
    }
});
