// Guest-side read-only mirror of host state.
//
// Guests never mutate room state from local input; they only replace their
// view from what the host broadcasts. `RoomMirror::apply` folds one
// `ServerMessage` into the view. Snapshot-carrying messages (`players`,
// `reset`, `round_winner`) are applied only when their revision is strictly
// newer than the last one applied, and the whole participant list is
// replaced. A `round_winner` is dropped only when strictly older, since the
// host sends it just before the `players` snapshot of the same revision.
// Pong snapshots follow the strictly-newer rule with their own sequence.

use std::collections::BTreeMap;

use arcade_protocol::{ParticipantId, ParticipantInfo, Phase, Revision, RoundNumber, ServerMessage};
use arcade_sim::maze::MazeLayout;
use arcade_sim::pong::PongState;

/// What `apply` did with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// A snapshot no newer than what the mirror already holds.
    Stale,
    /// Not something the mirror tracks.
    Ignored,
}

#[derive(Clone, Debug)]
pub struct RoomMirror {
    you: ParticipantId,
    revision: Option<Revision>,
    players: Vec<ParticipantInfo>,
    phase: Phase,
    round: RoundNumber,
    countdown_ends_ms: Option<u64>,
    layout: Option<MazeLayout>,
    pong_seq: Option<u64>,
    pong: Option<PongState>,
    last_scores: BTreeMap<ParticipantId, u32>,
    closed: bool,
}

impl RoomMirror {
    pub fn new(you: ParticipantId) -> Self {
        Self {
            you,
            revision: None,
            players: Vec::new(),
            phase: Phase::Lobby,
            round: RoundNumber(0),
            countdown_ends_ms: None,
            layout: None,
            pong_seq: None,
            pong: None,
            last_scores: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn you(&self) -> &ParticipantId {
        &self.you
    }

    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    pub fn players(&self) -> &[ParticipantInfo] {
        &self.players
    }

    pub fn me(&self) -> Option<&ParticipantInfo> {
        self.players.iter().find(|p| p.id == self.you)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> RoundNumber {
        self.round
    }

    pub fn layout(&self) -> Option<&MazeLayout> {
        self.layout.as_ref()
    }

    pub fn pong(&self) -> Option<&PongState> {
        self.pong.as_ref()
    }

    /// Scores from the most recent round result.
    pub fn last_scores(&self) -> &BTreeMap<ParticipantId, u32> {
        &self.last_scores
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whole seconds left on the countdown, rounded up, never negative.
    pub fn seconds_remaining(&self, now_ms: u64) -> Option<u64> {
        let ends = self.countdown_ends_ms?;
        Some(ends.saturating_sub(now_ms).div_ceil(1000))
    }

    fn newer(&self, revision: Revision) -> bool {
        match self.revision {
            None => true,
            Some(current) => revision > current,
        }
    }

    pub fn apply(&mut self, msg: &ServerMessage) -> Applied {
        match msg {
            ServerMessage::Players {
                revision,
                phase,
                players,
            } => {
                if !self.newer(*revision) {
                    return Applied::Stale;
                }
                self.revision = Some(*revision);
                self.phase = *phase;
                self.players = players.clone();
                Applied::Updated
            }
            ServerMessage::Reset { revision, players } => {
                if !self.newer(*revision) {
                    return Applied::Stale;
                }
                self.revision = Some(*revision);
                self.players = players.clone();
                self.phase = Phase::Lobby;
                self.countdown_ends_ms = None;
                self.layout = None;
                self.pong = None;
                self.pong_seq = None;
                self.last_scores.clear();
                Applied::Updated
            }
            // Carries the revision of the `players` snapshot that follows it,
            // so it is only stale when strictly older, and doesn't claim the
            // revision itself.
            ServerMessage::RoundWinner {
                revision, scores, ..
            } => {
                if self.revision.is_some_and(|current| *revision < current) {
                    return Applied::Stale;
                }
                self.last_scores = scores.clone();
                Applied::Updated
            }
            ServerMessage::Phase { phase, round } => {
                self.phase = *phase;
                self.round = *round;
                if *phase != Phase::Countdown {
                    self.countdown_ends_ms = None;
                }
                Applied::Updated
            }
            ServerMessage::Countdown {
                round, ends_at_ms, ..
            } => {
                self.round = *round;
                self.countdown_ends_ms = Some(*ends_at_ms);
                Applied::Updated
            }
            ServerMessage::StartRound { round, layout } => {
                self.round = *round;
                self.layout = Some(layout.clone());
                Applied::Updated
            }
            ServerMessage::PongStart { .. } => {
                self.pong = None;
                self.pong_seq = None;
                Applied::Updated
            }
            ServerMessage::PongSnapshot { seq, state } => {
                if self.pong_seq.is_some_and(|last| *seq <= last) {
                    return Applied::Stale;
                }
                self.pong_seq = Some(*seq);
                self.pong = Some(state.clone());
                Applied::Updated
            }
            ServerMessage::RoomClosed => {
                self.closed = true;
                Applied::Updated
            }
            _ => Applied::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    fn info(s: &str, score: u32) -> ParticipantInfo {
        ParticipantInfo {
            id: id(s),
            name: s.to_uppercase(),
            color: "#fff".into(),
            ready: false,
            score,
            is_host: s == "p1",
            latency_ms: None,
        }
    }

    fn players(revision: u64, list: Vec<ParticipantInfo>) -> ServerMessage {
        ServerMessage::Players {
            revision: Revision(revision),
            phase: Phase::Lobby,
            players: list,
        }
    }

    #[test]
    fn newer_snapshot_replaces_wholesale() {
        let mut m = RoomMirror::new(id("p2"));
        assert_eq!(
            m.apply(&players(1, vec![info("p1", 0), info("p2", 0)])),
            Applied::Updated
        );
        assert_eq!(m.apply(&players(2, vec![info("p1", 3)])), Applied::Updated);
        assert_eq!(m.players().len(), 1);
        assert_eq!(m.players()[0].score, 3);
        assert!(m.me().is_none());
    }

    #[test]
    fn stale_and_equal_revisions_are_dropped() {
        let mut m = RoomMirror::new(id("p2"));
        m.apply(&players(5, vec![info("p1", 1), info("p2", 0)]));
        assert_eq!(m.apply(&players(4, vec![])), Applied::Stale);
        assert_eq!(m.apply(&players(5, vec![])), Applied::Stale);
        assert_eq!(m.players().len(), 2);
        assert_eq!(m.me().map(|p| p.score), Some(0));
    }

    #[test]
    fn round_winner_then_players_of_same_revision_both_apply() {
        let mut m = RoomMirror::new(id("p2"));
        m.apply(&players(3, vec![info("p1", 0), info("p2", 0)]));
        let winner = ServerMessage::RoundWinner {
            round: RoundNumber(1),
            winner: id("p2"),
            name: "P2".into(),
            reason: arcade_sim::outcome::WinReason::Goal,
            scores: BTreeMap::from([(id("p2"), 1)]),
            revision: Revision(4),
        };
        assert_eq!(m.apply(&winner), Applied::Updated);
        assert_eq!(m.apply(&players(4, vec![info("p1", 0), info("p2", 1)])), Applied::Updated);
        assert_eq!(m.me().map(|p| p.score), Some(1));
        assert_eq!(m.last_scores().get(&id("p2")), Some(&1));

        let old = ServerMessage::RoundWinner {
            round: RoundNumber(0),
            winner: id("p1"),
            name: "P1".into(),
            reason: arcade_sim::outcome::WinReason::Goal,
            scores: BTreeMap::new(),
            revision: Revision(2),
        };
        assert_eq!(m.apply(&old), Applied::Stale);
    }

    #[test]
    fn reset_returns_to_lobby() {
        let mut m = RoomMirror::new(id("p1"));
        m.apply(&ServerMessage::Phase {
            phase: Phase::Active,
            round: RoundNumber(3),
        });
        m.apply(&ServerMessage::Reset {
            revision: Revision(9),
            players: vec![info("p1", 0)],
        });
        assert_eq!(m.phase(), Phase::Lobby);
        assert_eq!(m.revision(), Some(Revision(9)));
    }

    #[test]
    fn countdown_seconds_round_up_and_clamp() {
        let mut m = RoomMirror::new(id("p1"));
        assert_eq!(m.seconds_remaining(0), None);
        m.apply(&ServerMessage::Countdown {
            round: RoundNumber(1),
            seconds: 5,
            ends_at_ms: 10_000,
        });
        assert_eq!(m.seconds_remaining(5_000), Some(5));
        assert_eq!(m.seconds_remaining(5_001), Some(5));
        assert_eq!(m.seconds_remaining(9_000), Some(1));
        assert_eq!(m.seconds_remaining(9_999), Some(1));
        assert_eq!(m.seconds_remaining(10_000), Some(0));
        assert_eq!(m.seconds_remaining(12_000), Some(0));
        m.apply(&ServerMessage::Phase {
            phase: Phase::Active,
            round: RoundNumber(1),
        });
        assert_eq!(m.seconds_remaining(9_000), None);
    }

    #[test]
    fn pong_snapshots_keep_newest_seq() {
        use arcade_sim::pong::{PongParams, PongSim};

        let sim = PongSim::new(PongParams::default(), 1);
        let mut m = RoomMirror::new(id("p1"));
        let snap = |seq| ServerMessage::PongSnapshot {
            seq,
            state: sim.state().clone(),
        };
        assert_eq!(m.apply(&snap(2)), Applied::Updated);
        assert_eq!(m.apply(&snap(1)), Applied::Stale);
        assert_eq!(m.apply(&snap(2)), Applied::Stale);
        assert_eq!(m.apply(&snap(3)), Applied::Updated);
        assert!(m.pong().is_some());
    }

    #[test]
    fn chat_is_not_tracked() {
        let mut m = RoomMirror::new(id("p1"));
        let chat = ServerMessage::ChatAck { id: "c1".into() };
        assert_eq!(m.apply(&chat), Applied::Ignored);
    }
}
