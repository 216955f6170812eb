// Room codes and display-name sanitizing.
//
// A room code is what a host publishes and a guest types in (or receives in
// an invite URL). Codes are restricted to `[A-Za-z0-9_-]` and at most
// `MAX_ROOM_CODE_LEN` characters; anything else is stripped rather than
// rejected, so pasting " my room! " yields `myroom`. Generated codes use an
// upper-case alphabet without look-alike characters (no 0/O, 1/I).
//
// Display names are trimmed, whitespace runs are collapsed to a single
// space, and the result is capped at `MAX_NAME_LEN` characters.

use std::fmt;

use arcade_sim::prng::Mulberry32;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

pub const MAX_ROOM_CODE_LEN: usize = 24;
pub const MAX_NAME_LEN: usize = 16;
pub const RANDOM_CODE_LEN: usize = 6;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomCode(String);

impl RoomCode {
    /// Sanitize user input into a room code. Empty after sanitizing is an
    /// error.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
            .take(MAX_ROOM_CODE_LEN)
            .collect();
        if code.is_empty() {
            return Err(ProtocolError::EmptyRoomCode);
        }
        Ok(Self(code))
    }

    pub fn random(rng: &mut Mulberry32) -> Self {
        let code = (0..RANDOM_CODE_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.pick_index(CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Clean up a user-supplied display name. Falls back to `fallback` when
/// nothing printable is left.
pub fn sanitize_name(raw: &str, fallback: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_NAME_LEN).collect();
    let capped = capped.trim_end();
    if capped.is_empty() {
        fallback.to_string()
    } else {
        capped.to_string()
    }
}
