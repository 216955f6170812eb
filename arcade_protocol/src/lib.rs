// arcade_protocol — wire protocol between an arcade host and its guests.
//
// Defines the message vocabulary, framing, and the small pieces of
// user-facing addressing (room codes, names, colors, invite URLs) shared by
// the host session (`arcade_relay`) and guest clients.
//
// Module overview:
// - `types.rs`:   IDs and state enums: `ParticipantId`, `RoundNumber`,
//                 `Revision`, `Phase`, `GameMode`.
// - `message.rs`: `ClientMessage` / `ServerMessage`, tagged by `"t"`, plus
//                 `ParticipantInfo`.
// - `framing.rs`: 4-byte big-endian length prefix + JSON payload over any
//                 `Read`/`Write`.
// - `room.rs`:    Room-code and display-name sanitizing.
// - `color.rs`:   Identifier -> palette color hash.
// - `invite.rs`:  Invite URL formatting and parsing.
// - `error.rs`:   `ProtocolError`.
//
// Maze layouts, pong state, bracket entries and win reasons travel inside
// messages as the `arcade_sim` types themselves, so this crate depends on
// the sim crate (which has no I/O of its own).

pub mod color;
pub mod error;
pub mod framing;
pub mod invite;
pub mod message;
pub mod room;
pub mod types;

pub use error::ProtocolError;
pub use framing::{MAX_MESSAGE_SIZE, read_message, recv, send, write_message};
pub use message::{ClientMessage, ParticipantInfo, ServerMessage};
pub use types::{GameMode, ParticipantId, Phase, Revision, RoundNumber};

/// Bumped on any incompatible change to `message.rs`.
pub const PROTOCOL_VERSION: u32 = 1;
