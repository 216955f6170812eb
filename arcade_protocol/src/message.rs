// Protocol messages between guests and the host.
//
// Two enums define the full vocabulary:
// - `ClientMessage`: sent by a guest to the host.
// - `ServerMessage`: sent by the host to one guest or to the whole room.
//
// Both are internally tagged by a `"t"` field (`{"t":"ready","value":true}`),
// the same shape the browser builds use, so a frame can be inspected by eye
// in a packet capture. A frame with an unknown `"t"` fails to decode and is
// dropped by whichever side received it.
//
// Claims (`goal`, `action_hit`, `action_false`) name the round they are for.
// The host rejects claims for any round other than the current one before
// they reach the outcome resolver.
//
// Snapshot-carrying messages (`players`, `reset`, `round_winner`) carry the
// directory `Revision`; pong snapshots carry their own `seq`. Guests keep
// only the newest (see `arcade_relay::mirror`).

use std::collections::BTreeMap;

use arcade_sim::bracket::BracketEntry;
use arcade_sim::maze::MazeLayout;
use arcade_sim::outcome::WinReason;
use arcade_sim::pong::{PongParams, PongState};
use serde::{Deserialize, Serialize};

use crate::types::{GameMode, ParticipantId, Phase, Revision, RoundNumber};

/// Messages sent by a guest to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room (handshake). Must be the first frame.
    Hello { name: String, protocol_version: u32 },
    /// Toggle readiness in the lobby.
    Ready { value: bool },
    /// Maze race: "my avatar reached the goal".
    Goal { round: RoundNumber },
    /// Quick-draw: "I hit after the signal". `reaction_ms` is informational.
    ActionHit {
        round: RoundNumber,
        reaction_ms: Option<u64>,
    },
    /// Quick-draw: "I fired before the signal".
    ActionFalse { round: RoundNumber },
    /// Pong paddle intent, -1 (up), 0, or +1 (down).
    PaddleInput { direction: i8 },
    Chat { id: String, text: String },
    Ping { sent_ms: u64 },
    Pong { sent_ms: u64 },
    /// Host participant only: abandon the match and return to the lobby.
    BackToLobby,
    /// Leaving gracefully.
    Goodbye,
}

/// Messages sent by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    Welcome {
        you: ParticipantId,
        host: ParticipantId,
        room: String,
        mode: GameMode,
    },
    /// Join refused because the room is not in the lobby. The connection is
    /// closed right after.
    Locked,
    /// Join refused for any other reason (full, bad handshake, ...).
    Rejected { reason: String },
    /// Full directory snapshot.
    Players {
        revision: Revision,
        phase: Phase,
        players: Vec<ParticipantInfo>,
    },
    Phase { phase: Phase, round: RoundNumber },
    /// Countdown started. Guests derive the seconds shown from `ends_at_ms`
    /// (UNIX milliseconds); `seconds` is the initial value.
    Countdown {
        round: RoundNumber,
        seconds: u32,
        ends_at_ms: u64,
    },
    /// Maze content for the upcoming round.
    StartRound {
        round: RoundNumber,
        layout: MazeLayout,
    },
    BracketUpdate {
        bracket_round: u32,
        entries: Vec<BracketEntry<ParticipantId>>,
    },
    /// The next duel's contestants.
    PrepareMatch {
        left: ParticipantId,
        right: ParticipantId,
        left_name: String,
        right_name: String,
        points_to_win: u32,
    },
    /// Quick-draw: fire now.
    Signal { round: RoundNumber },
    PongStart {
        left: ParticipantId,
        right: ParticipantId,
        params: PongParams,
    },
    PongSnapshot { seq: u64, state: PongState },
    RoundWinner {
        round: RoundNumber,
        winner: ParticipantId,
        name: String,
        reason: WinReason<ParticipantId>,
        scores: BTreeMap<ParticipantId, u32>,
        revision: Revision,
    },
    /// Maze race or pong match over.
    MatchWinner {
        winner: ParticipantId,
        name: String,
        scores: BTreeMap<ParticipantId, u32>,
    },
    /// Quick-draw duel over.
    MatchResult {
        winner: ParticipantId,
        loser: ParticipantId,
        name: String,
        winner_score: u32,
        loser_score: u32,
    },
    /// Quick-draw tournament over.
    Champion { winner: ParticipantId, name: String },
    /// Back to the lobby with everyone unready and scores zeroed.
    Reset {
        revision: Revision,
        players: Vec<ParticipantInfo>,
    },
    #[serde(rename = "chat")]
    ChatBroadcast {
        from: ParticipantId,
        name: String,
        id: String,
        text: String,
    },
    ChatAck { id: String },
    Ping { sent_ms: u64 },
    Pong { sent_ms: u64 },
    /// The host is shutting the room down.
    RoomClosed,
}

/// Public view of one directory entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub name: String,
    pub color: String,
    pub ready: bool,
    pub score: u32,
    pub is_host: bool,
    pub latency_ms: Option<u64>,
}

impl ClientMessage {
    /// The `"t"` discriminant, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            ClientMessage::Hello { .. } => "hello",
            ClientMessage::Ready { .. } => "ready",
            ClientMessage::Goal { .. } => "goal",
            ClientMessage::ActionHit { .. } => "action_hit",
            ClientMessage::ActionFalse { .. } => "action_false",
            ClientMessage::PaddleInput { .. } => "paddle_input",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::Ping { .. } => "ping",
            ClientMessage::Pong { .. } => "pong",
            ClientMessage::BackToLobby => "back_to_lobby",
            ClientMessage::Goodbye => "goodbye",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_t_tag() {
        let json = serde_json::to_value(ClientMessage::Ready { value: true }).unwrap();
        assert_eq!(json, serde_json::json!({"t": "ready", "value": true}));

        let json = serde_json::to_value(ClientMessage::ActionHit {
            round: RoundNumber(3),
            reaction_ms: Some(212),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"t": "action_hit", "round": 3, "reaction_ms": 212})
        );
    }

    #[test]
    fn chat_broadcast_is_tagged_chat() {
        let msg = ServerMessage::ChatBroadcast {
            from: "p1".into(),
            name: "Ada".into(),
            id: "m1".into(),
            text: "hi".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["t"], "chat");
        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unknown_tag_fails_to_decode() {
        let err = serde_json::from_str::<ClientMessage>(r#"{"t":"teleport","x":1}"#);
        assert!(err.is_err());
        let err = serde_json::from_str::<ClientMessage>(r#"{"value":true}"#);
        assert!(err.is_err());
    }

    #[test]
    fn browser_shaped_frames_decode() {
        let msg: ClientMessage = serde_json::from_str(r#"{"t":"goal","round":4}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Goal {
                round: RoundNumber(4)
            }
        );
        let msg: ClientMessage = serde_json::from_str(r#"{"t":"back_to_lobby"}"#).unwrap();
        assert_eq!(msg.tag(), "back_to_lobby");
    }

    #[test]
    fn round_winner_scores_are_keyed_by_id() {
        let mut scores = BTreeMap::new();
        scores.insert(ParticipantId::from("p1"), 2);
        scores.insert(ParticipantId::from("p2"), 1);
        let msg = ServerMessage::RoundWinner {
            round: RoundNumber(3),
            winner: "p1".into(),
            name: "Ada".into(),
            reason: WinReason::FalseStart { by: "p2".into() },
            scores,
            revision: Revision(9),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["scores"]["p1"], 2);
        assert_eq!(json["reason"]["kind"], "false_start");
        assert_eq!(json["reason"]["by"], "p2");
        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
