// Core ID and state types for the arcade protocol.
//
// Shared by `message.rs` and by the host session and guest mirror in
// `arcade_relay`. Participant IDs are opaque strings assigned by the host
// when a connection completes its handshake; they key the room directory and
// the score table and seed the display color.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier, unique within one room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Round counter within a room; bumps every time a round opens.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RoundNumber(pub u32);

impl RoundNumber {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Room directory revision. Strictly increases with every mutation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Revision(pub u64);

/// Coarse session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Bracket,
    Countdown,
    Active,
    Resolved,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::Bracket => "bracket",
            Phase::Countdown => "countdown",
            Phase::Active => "active",
            Phase::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which game a room plays. Fixed when the host opens the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    MazeRace,
    QuickDraw,
    Pong,
    Chat,
}

impl GameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GameMode::MazeRace => "maze_race",
            GameMode::QuickDraw => "quick_draw",
            GameMode::Pong => "pong",
            GameMode::Chat => "chat",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
