//! Doorbell and ringer history.
//!
//! The session emits [`HistoryRecord`]s; a [`HistoryStore`] persists them.
//! Both lists are capped, most-recent-first, and hold at most one entry per
//! token. Entries keep the secret token rather than the derived topic, so a
//! remembered doorbell can be reopened or its link shared again.

use doorbell_proto::SessionTopic;
use serde::{Deserialize, Serialize};

use crate::{
    error::HistoryError,
    topic::{derive_topic, ring_path},
};

/// Maximum doorbells remembered by an owner.
pub const MAX_DOORBELL_HISTORY: usize = 20;

/// Maximum doorbells remembered by a ringer.
pub const MAX_RINGER_HISTORY: usize = 50;

/// History update emitted by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRecord {
    /// We used a doorbell as its owner (joined it, or it was rung)
    DoorbellUse {
        /// Doorbell token
        token: String,
        /// Our display name for it
        name: String,
        /// Wall-clock time, epoch ms
        at_ms: u64,
    },

    /// We rang a doorbell
    RingerVisit {
        /// Doorbell token
        token: String,
        /// Doorbell name as last announced (empty if unknown)
        name: String,
        /// Wall-clock time, epoch ms
        at_ms: u64,
    },
}

/// Persistence collaborator for history records.
pub trait HistoryStore: Send {
    /// Remember that we used the doorbell behind `token`.
    fn record_doorbell_use(&mut self, token: &str, name: &str, at_ms: u64);

    /// Remember that we rang the doorbell behind `token`.
    fn record_ringer_visit(&mut self, token: &str, name: &str, at_ms: u64);

    /// Dispatch a session record.
    fn apply(&mut self, record: &HistoryRecord) {
        match record {
            HistoryRecord::DoorbellUse { token, name, at_ms } => {
                self.record_doorbell_use(token, name, *at_ms);
            },
            HistoryRecord::RingerVisit { token, name, at_ms } => {
                self.record_ringer_visit(token, name, *at_ms);
            },
        }
    }
}

/// A doorbell we own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorbellHistoryEntry {
    /// Doorbell token
    pub token: String,
    /// Display name
    pub name: String,
    /// First use, epoch ms
    pub created_at_ms: u64,
    /// Most recent use, epoch ms
    pub last_used_at_ms: u64,
}

impl DoorbellHistoryEntry {
    /// Topic to rejoin this doorbell on.
    pub fn topic(&self) -> SessionTopic {
        derive_topic(&self.token)
    }

    /// Link path to share this doorbell again.
    pub fn ring_path(&self) -> String {
        ring_path(&self.token)
    }
}

/// A doorbell we rang.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingerHistoryEntry {
    /// Doorbell token
    pub token: String,
    /// Doorbell name as last announced
    pub name: String,
    /// Most recent ring, epoch ms
    pub last_rung_at_ms: u64,
}

impl RingerHistoryEntry {
    /// Topic to rejoin this doorbell on.
    pub fn topic(&self) -> SessionTopic {
        derive_topic(&self.token)
    }

    /// Link path to ring this doorbell again.
    pub fn ring_path(&self) -> String {
        ring_path(&self.token)
    }
}

/// In-memory history with CBOR persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryHistory {
    doorbells: Vec<DoorbellHistoryEntry>,
    ringers: Vec<RingerHistoryEntry>,
}

impl MemoryHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Doorbells we own, most recent first.
    pub fn doorbells(&self) -> &[DoorbellHistoryEntry] {
        &self.doorbells
    }

    /// Doorbells we rang, most recent first.
    pub fn ringers(&self) -> &[RingerHistoryEntry] {
        &self.ringers
    }

    /// Forget a doorbell from both lists.
    pub fn remove(&mut self, token: &str) {
        self.doorbells.retain(|e| e.token != token);
        self.ringers.retain(|e| e.token != token);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.doorbells.clear();
        self.ringers.clear();
    }

    /// Serialize to CBOR.
    pub fn to_bytes(&self) -> Result<Vec<u8>, HistoryError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| HistoryError::Encode(e.to_string()))?;
        Ok(buf)
    }

    /// Restore from CBOR, re-applying the caps.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HistoryError> {
        let mut history: Self =
            ciborium::from_reader(bytes).map_err(|e| HistoryError::Decode(e.to_string()))?;
        history.doorbells.truncate(MAX_DOORBELL_HISTORY);
        history.ringers.truncate(MAX_RINGER_HISTORY);
        Ok(history)
    }
}

impl HistoryStore for MemoryHistory {
    fn record_doorbell_use(&mut self, token: &str, name: &str, at_ms: u64) {
        let existing = self.doorbells.iter().position(|e| e.token == token);
        let entry = match existing.map(|i| self.doorbells.remove(i)) {
            Some(mut entry) => {
                if !name.is_empty() {
                    entry.name = name.to_string();
                }
                entry.last_used_at_ms = at_ms;
                entry
            },
            None => DoorbellHistoryEntry {
                token: token.to_string(),
                name: name.to_string(),
                created_at_ms: at_ms,
                last_used_at_ms: at_ms,
            },
        };

        self.doorbells.insert(0, entry);
        self.doorbells.truncate(MAX_DOORBELL_HISTORY);
    }

    fn record_ringer_visit(&mut self, token: &str, name: &str, at_ms: u64) {
        let existing = self.ringers.iter().position(|e| e.token == token);
        let entry = match existing.map(|i| self.ringers.remove(i)) {
            Some(mut entry) => {
                if !name.is_empty() {
                    entry.name = name.to_string();
                }
                entry.last_rung_at_ms = at_ms;
                entry
            },
            None => RingerHistoryEntry {
                token: token.to_string(),
                name: name.to_string(),
                last_rung_at_ms: at_ms,
            },
        };

        self.ringers.insert(0, entry);
        self.ringers.truncate(MAX_RINGER_HISTORY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(n: usize) -> String {
        format!("{n:043}")
    }

    #[test]
    fn doorbell_reuse_moves_to_front_and_keeps_created_at() {
        let mut history = MemoryHistory::new();
        history.record_doorbell_use(&token(1), "Red Door", 100);
        history.record_doorbell_use(&token(2), "Blue Gate", 200);
        history.record_doorbell_use(&token(1), "Red Door", 300);

        let doorbells = history.doorbells();
        assert_eq!(doorbells.len(), 2);
        assert_eq!(doorbells[0].token, token(1));
        assert_eq!(doorbells[0].created_at_ms, 100);
        assert_eq!(doorbells[0].last_used_at_ms, 300);
        assert_eq!(doorbells[1].token, token(2));
    }

    #[test]
    fn ringer_visit_without_name_keeps_known_name() {
        let mut history = MemoryHistory::new();
        history.record_ringer_visit(&token(1), "Cozy Cabin", 10);
        history.record_ringer_visit(&token(1), "", 20);

        assert_eq!(history.ringers().len(), 1);
        assert_eq!(history.ringers()[0].name, "Cozy Cabin");
        assert_eq!(history.ringers()[0].last_rung_at_ms, 20);
    }

    #[test]
    fn lists_are_capped() {
        let mut history = MemoryHistory::new();
        for n in 0..(MAX_RINGER_HISTORY + 5) {
            history.record_doorbell_use(&token(n), "d", n as u64);
            history.record_ringer_visit(&token(n), "r", n as u64);
        }

        assert_eq!(history.doorbells().len(), MAX_DOORBELL_HISTORY);
        assert_eq!(history.ringers().len(), MAX_RINGER_HISTORY);
        // Most recent first
        assert_eq!(history.ringers()[0].token, token(MAX_RINGER_HISTORY + 4));
    }

    #[test]
    fn apply_dispatches_records() {
        let mut history = MemoryHistory::new();
        history.apply(&HistoryRecord::RingerVisit { token: token(7), name: "X".into(), at_ms: 1 });
        history.apply(&HistoryRecord::DoorbellUse { token: token(8), name: "Y".into(), at_ms: 2 });

        assert_eq!(history.ringers()[0].token, token(7));
        assert_eq!(history.doorbells()[0].token, token(8));
    }

    #[test]
    fn entries_rebuild_topic_and_link() {
        let mut history = MemoryHistory::new();
        history.record_doorbell_use(&token(1), "Red Door", 100);
        history.record_ringer_visit(&token(2), "Blue Gate", 200);

        let doorbell = &history.doorbells()[0];
        assert_eq!(doorbell.topic(), derive_topic(&token(1)));
        assert_eq!(doorbell.ring_path(), format!("/ring/{}", token(1)));
        assert_eq!(history.ringers()[0].topic(), derive_topic(&token(2)));
        assert_eq!(history.ringers()[0].ring_path(), format!("/ring/{}", token(2)));
    }

    #[test]
    fn persisted_history_restores() {
        let mut history = MemoryHistory::new();
        history.record_doorbell_use(&token(1), "Red Door", 100);
        history.record_ringer_visit(&token(2), "Blue Gate", 200);

        let restored = MemoryHistory::from_bytes(&history.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, history);
    }

    #[test]
    fn corrupt_history_is_an_error() {
        assert!(matches!(MemoryHistory::from_bytes(&[0xff, 0x00]), Err(HistoryError::Decode(_))));
    }

    #[test]
    fn remove_and_clear() {
        let mut history = MemoryHistory::new();
        history.record_doorbell_use(&token(1), "a", 1);
        history.record_ringer_visit(&token(1), "a", 1);
        history.record_ringer_visit(&token(2), "b", 2);

        history.remove(&token(1));
        assert!(history.doorbells().is_empty());
        assert_eq!(history.ringers().len(), 1);

        history.clear();
        assert!(history.ringers().is_empty());
    }
}
