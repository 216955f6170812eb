// Room directory: the host's canonical participant list.
//
// Entries are kept in join order, which is also snapshot order. Every
// mutation bumps `revision`; the session stamps the revision onto every
// snapshot it broadcasts so guests can discard stale ones (see `mirror.rs`).
// The directory itself never sends anything.

use arcade_protocol::color::color_for;
use arcade_protocol::{ParticipantId, ParticipantInfo, Revision};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub color: String,
    pub ready: bool,
    pub score: u32,
    pub is_host: bool,
    pub latency_ms: Option<u64>,
}

impl Participant {
    pub fn new(id: ParticipantId, name: String, is_host: bool) -> Self {
        let color = color_for(id.as_str()).to_string();
        Self {
            id,
            name,
            color,
            ready: false,
            score: 0,
            is_host,
            latency_ms: None,
        }
    }

    fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color.clone(),
            ready: self.ready,
            score: self.score,
            is_host: self.is_host,
            latency_ms: self.latency_ms,
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomDirectory {
    entries: Vec<Participant>,
    revision: Revision,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    fn bump(&mut self) -> Revision {
        self.revision = Revision(self.revision.0 + 1);
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.entries.iter().find(|p| p.id == *id)
    }

    fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.entries.iter_mut().find(|p| p.id == *id)
    }

    /// Display name, falling back to the raw id for unknown participants.
    pub fn name_of(&self, id: &ParticipantId) -> String {
        self.get(id)
            .map_or_else(|| id.to_string(), |p| p.name.clone())
    }

    /// Insert a new participant at the end, or replace an existing entry in
    /// place (keeping its join position).
    pub fn upsert(&mut self, participant: Participant) -> Revision {
        match self.get_mut(&participant.id) {
            Some(existing) => *existing = participant,
            None => self.entries.push(participant),
        }
        self.bump()
    }

    pub fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        let index = self.entries.iter().position(|p| p.id == *id)?;
        let removed = self.entries.remove(index);
        self.bump();
        Some(removed)
    }

    /// Returns `false` if the participant is unknown.
    pub fn set_ready(&mut self, id: &ParticipantId, ready: bool) -> bool {
        let Some(p) = self.get_mut(id) else {
            return false;
        };
        p.ready = ready;
        self.bump();
        true
    }

    pub fn set_score(&mut self, id: &ParticipantId, score: u32) -> bool {
        let Some(p) = self.get_mut(id) else {
            return false;
        };
        p.score = score;
        self.bump();
        true
    }

    pub fn set_latency(&mut self, id: &ParticipantId, latency_ms: u64) -> bool {
        let Some(p) = self.get_mut(id) else {
            return false;
        };
        p.latency_ms = Some(latency_ms);
        self.bump();
        true
    }

    pub fn rename(&mut self, id: &ParticipantId, name: String) -> bool {
        let Some(p) = self.get_mut(id) else {
            return false;
        };
        p.name = name;
        self.bump();
        true
    }

    /// Everyone unready with a zero score, as after a match.
    pub fn reset_all(&mut self) -> Revision {
        for p in &mut self.entries {
            p.ready = false;
            p.score = 0;
        }
        self.bump()
    }

    /// Non-empty and everyone ready.
    pub fn all_ready(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|p| p.ready)
    }

    /// IDs in join order.
    pub fn ids(&self) -> Vec<ParticipantId> {
        self.entries.iter().map(|p| p.id.clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<ParticipantInfo> {
        self.entries.iter().map(Participant::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn directory_with(ids: &[&str]) -> RoomDirectory {
        let mut dir = RoomDirectory::new();
        for (i, s) in ids.iter().enumerate() {
            dir.upsert(Participant::new(id(s), s.to_uppercase(), i == 0));
        }
        dir
    }

    #[test]
    fn snapshot_keeps_join_order() {
        let dir = directory_with(&["p3", "p1", "p2"]);
        let ids: Vec<_> = dir.snapshot().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![id("p3"), id("p1"), id("p2")]);
        assert!(dir.snapshot()[0].is_host);
        assert!(!dir.snapshot()[1].is_host);
    }

    #[test]
    fn every_mutation_bumps_revision() {
        let mut dir = directory_with(&["p1", "p2"]);
        let mut last = dir.revision();
        assert_eq!(last, Revision(2));
        let mut check = |rev: Revision| {
            assert!(rev > last);
            last = rev;
        };
        dir.set_ready(&id("p1"), true);
        check(dir.revision());
        dir.set_score(&id("p2"), 3);
        check(dir.revision());
        dir.set_latency(&id("p2"), 40);
        check(dir.revision());
        dir.reset_all();
        check(dir.revision());
        dir.remove(&id("p1"));
        check(dir.revision());
    }

    #[test]
    fn unknown_ids_do_not_bump() {
        let mut dir = directory_with(&["p1"]);
        let rev = dir.revision();
        assert!(!dir.set_ready(&id("zz"), true));
        assert!(dir.remove(&id("zz")).is_none());
        assert_eq!(dir.revision(), rev);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut dir = directory_with(&["p1", "p2", "p3"]);
        dir.upsert(Participant::new(id("p2"), "Renamed".into(), false));
        let snap = dir.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[1].name, "Renamed");
    }

    #[test]
    fn all_ready_requires_everyone() {
        let mut dir = directory_with(&["p1", "p2"]);
        assert!(!dir.all_ready());
        dir.set_ready(&id("p1"), true);
        assert!(!dir.all_ready());
        dir.set_ready(&id("p2"), true);
        assert!(dir.all_ready());
        dir.reset_all();
        assert!(!dir.all_ready());
        assert!(!RoomDirectory::new().all_ready());
    }

    #[test]
    fn color_is_derived_from_id() {
        let dir = directory_with(&["p1"]);
        assert_eq!(dir.snapshot()[0].color, color_for("p1"));
    }
}
