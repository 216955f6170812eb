// arcade_sim — pure game logic for the peer arcade.
//
// Everything in this crate is networking-free and clock-free: callers pass in
// seeds, elapsed time and "now" in milliseconds. The host session
// (`arcade_relay::session`) drives these types; guests only ever use `maze`
// and `avatar` to move their own marker through content the host shipped.
//
// Module overview:
// - `maze.rs`:    Seeded spanning-tree maze carving, BFS distances, start/goal
//                 placement. Bit-compatible with the browser builds.
// - `avatar.rs`:  Circle-vs-wall movement of one avatar inside a maze.
// - `pong.rs`:    Fixed-timestep pong physics run by the host only.
// - `outcome.rs`: Round resolver (first accepted claim wins, lock thereafter)
//                 and the per-match score table.
// - `bracket.rs`: Single-elimination bracket with byes.
// - `timer.rs`:   Epoch-tagged timer queue; invalidating an epoch turns every
//                 timer scheduled under it into a no-op.
// - `config.rs`:  `ArcadeConfig`: every tunable number, loaded from JSON.
//
// **Critical constraint: determinism.** Maze content is a pure function of
// `(width, height, seed)`. All randomness comes from `arcade_prng`. Ordered
// collections are `BTreeMap` so iteration order never depends on hashing.

pub mod avatar;
pub mod bracket;
pub mod config;
pub mod maze;
pub mod outcome;
pub mod pong;
pub use arcade_prng as prng;
pub mod timer;
