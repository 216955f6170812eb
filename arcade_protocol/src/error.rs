use thiserror::Error;

/// Errors from parsing user-facing addressing input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("room code is empty after removing disallowed characters")]
    EmptyRoomCode,
    #[error("invite URL has no room parameter")]
    MissingRoom,
    #[error("invite URL has an invalid public flag: {0:?}")]
    InvalidPublicFlag(String),
}
