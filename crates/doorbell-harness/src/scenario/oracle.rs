//! Reusable oracle checks.
//!
//! Each check returns `Err` with a message naming the actor and the
//! mismatch, so oracles compose with `?`.

use doorbell_core::{ConnectionState, PeerCounts};
use doorbell_proto::PeerRole;

use crate::scenario::World;

/// Every actor knows every other actor's declared role.
pub fn all_peers_known(world: &World) -> Result<(), String> {
    for name in world.actor_names() {
        let session = world.session(&name).ok_or_else(|| format!("{name} should exist"))?;
        for other in world.actor_names().into_iter().filter(|o| *o != name) {
            let expected = world.role(&other);
            let actual = session.peer_role(&other.as_str().into());
            if actual != expected {
                return Err(format!("{name} should know {other} as {expected:?}, got {actual:?}"));
            }
        }
    }
    Ok(())
}

/// Every actor counts all others as known peers.
pub fn full_mesh_counts(world: &World) -> Result<(), String> {
    let total = world.actor_names().len();
    for name in world.actor_names() {
        let doorbells = world
            .actor_names()
            .iter()
            .filter(|o| **o != name && world.role(o) == Some(PeerRole::Doorbell))
            .count();
        counts_are(world, &name, PeerCounts { peers: total - 1, doorbells })?;
    }
    Ok(())
}

/// No message is waiting for delivery.
pub fn quiescent(world: &World) -> Result<(), String> {
    match world.in_flight().len() {
        0 => Ok(()),
        n => Err(format!("{n} messages still in flight")),
    }
}

/// `actor` is in `expected` state.
pub fn state_is(world: &World, actor: &str, expected: ConnectionState) -> Result<(), String> {
    let session = world.session(actor).ok_or_else(|| format!("{actor} should exist"))?;
    if session.state() != expected {
        return Err(format!("{actor} should be {expected:?}, got {:?}", session.state()));
    }
    Ok(())
}

/// `actor` reports `expected` peer counts.
pub fn counts_are(world: &World, actor: &str, expected: PeerCounts) -> Result<(), String> {
    let session = world.session(actor).ok_or_else(|| format!("{actor} should exist"))?;
    if session.counts() != expected {
        return Err(format!("{actor} should count {expected:?}, got {:?}", session.counts()));
    }
    Ok(())
}

/// `actor`'s authoritative doorbell name is `expected`.
pub fn current_name_is(world: &World, actor: &str, expected: Option<&str>) -> Result<(), String> {
    let session = world.session(actor).ok_or_else(|| format!("{actor} should exist"))?;
    if session.current_name() != expected {
        return Err(format!(
            "{actor} should show name {expected:?}, got {:?}",
            session.current_name()
        ));
    }
    Ok(())
}
