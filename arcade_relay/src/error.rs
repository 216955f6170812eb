// Error types for the host session and the guest client.
//
// `JoinError` and `SessionError` are returned by `Session`; the server loop
// logs them (rejections at debug) and never tears the room down because of
// one. `ClientError` is what `NetClient` callers see.

use arcade_protocol::{ParticipantId, Phase, RoundNumber};
use arcade_sim::bracket::BracketError;
use thiserror::Error;

use crate::phase::MessageKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("room is closed")]
    Closed,
    #[error("room is not in the lobby")]
    Locked,
    #[error("room is full ({max} players)")]
    Full { max: usize },
    #[error("participant {0} is already in the room")]
    Duplicate(ParticipantId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{kind} is not accepted during {phase}")]
    NotAccepted { kind: MessageKind, phase: Phase },
    #[error("unknown participant {0}")]
    UnknownParticipant(ParticipantId),
    #[error("{0} is not the host")]
    NotHost(ParticipantId),
    #[error("claim for round {got:?} but round {current:?} is current")]
    StaleRound {
        current: RoundNumber,
        got: RoundNumber,
    },
    #[error("{0} is not playing this match")]
    NotContestant(ParticipantId),
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },
    #[error("room is closed")]
    Closed,
    #[error(transparent)]
    Bracket(#[from] BracketError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("room is locked (a game is in progress)")]
    Locked,
    #[error("rejected by host: {0}")]
    Rejected(String),
    #[error("unexpected handshake reply: {0}")]
    Handshake(String),
}
