// arcade_relay — host authority, TCP relay, and guest client for the peer
// arcade.
//
// One participant's process hosts the room: it owns the authoritative
// `Session` and listens for guests. Guests connect over TCP, send `hello`,
// and from then on only send intents and claims; everything they display
// comes from host broadcasts.
//
// Module overview:
// - `session.rs`:   The `Session` object that holds host authority: round
//                   flow for maze race, quick-draw and pong, outcome
//                   resolution, scoring, timers, liveness, chat.
// - `phase.rs`:     Phase state machine and the message acceptance table.
// - `directory.rs`: Revisioned participant directory (join order).
// - `relay.rs`:     Per-participant write links and best-effort fan-out.
// - `server.rs`:    TCP listener, handshake and reader threads, and the
//                   main event loop driving the `Session`.
// - `client.rs`:    `NetClient`, the guest side of the connection.
// - `mirror.rs`:    `RoomMirror`, the guest's read-only view of host state.
// - `error.rs`:     `JoinError`, `SessionError`, `ClientError`.
//
// The host can run as the `arcade` binary (`main.rs`) or be embedded via
// `start_host`.

pub mod client;
pub mod directory;
pub mod error;
pub mod mirror;
pub mod phase;
pub mod relay;
pub mod server;
pub mod session;

pub use client::{NetClient, WelcomeInfo};
pub use error::{ClientError, JoinError, SessionError};
pub use mirror::RoomMirror;
pub use server::{HostConfig, HostHandle, start_host};
pub use session::{Session, SessionSettings};
