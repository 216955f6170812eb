// Invite URLs.
//
// An invite is `<base>?room=<code>&public=<0|1>`. Parsing tolerates the two
// parameters in either order and ignores any others (trackers, fragments),
// but a missing or invalid `room` is an error. `public` defaults to private
// when absent.

use crate::error::ProtocolError;
use crate::room::RoomCode;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invite {
    pub base: String,
    pub room: RoomCode,
    pub public: bool,
}

impl Invite {
    pub fn new(base: &str, room: RoomCode, public: bool) -> Self {
        Self {
            base: base.trim_end_matches(['?', '&']).to_string(),
            room,
            public,
        }
    }

    pub fn to_url(&self) -> String {
        format!(
            "{}?room={}&public={}",
            self.base,
            self.room,
            u8::from(self.public)
        )
    }

    pub fn parse(url: &str) -> Result<Self, ProtocolError> {
        let url = url.trim();
        let url = url.split_once('#').map_or(url, |(before, _)| before);
        let (base, query) = url.split_once('?').ok_or(ProtocolError::MissingRoom)?;
        let mut room = None;
        let mut public = false;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "room" => room = Some(RoomCode::parse(value)?),
                "public" => {
                    public = match value {
                        "1" | "true" => true,
                        "0" | "false" | "" => false,
                        other => return Err(ProtocolError::InvalidPublicFlag(other.to_string())),
                    }
                }
                _ => {}
            }
        }
        let room = room.ok_or(ProtocolError::MissingRoom)?;
        Ok(Self {
            base: base.to_string(),
            room,
            public,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RoomCode {
        RoomCode::parse(s).unwrap()
    }

    #[test]
    fn formats_url() {
        let invite = Invite::new("https://arcade.example/maze", code("ABC123"), true);
        assert_eq!(
            invite.to_url(),
            "https://arcade.example/maze?room=ABC123&public=1"
        );
    }

    #[test]
    fn parses_either_order_and_extra_params() {
        let a = Invite::parse("http://h/x?room=abc&public=1").unwrap();
        let b = Invite::parse("http://h/x?utm=z&public=1&room=abc#frag").unwrap();
        assert_eq!(a, b);
        assert!(a.public);
        assert_eq!(a.base, "http://h/x");
    }

    #[test]
    fn public_defaults_to_private() {
        let invite = Invite::parse("http://h/?room=abc").unwrap();
        assert!(!invite.public);
    }

    #[test]
    fn url_roundtrip() {
        let invite = Invite::new("http://h/pong", code("Q-7"), false);
        assert_eq!(Invite::parse(&invite.to_url()).unwrap(), invite);
    }

    #[test]
    fn rejects_missing_or_invalid_room() {
        assert_eq!(
            Invite::parse("http://h/x?public=1"),
            Err(ProtocolError::MissingRoom)
        );
        assert_eq!(Invite::parse("http://h/x"), Err(ProtocolError::MissingRoom));
        assert_eq!(
            Invite::parse("http://h/x?room=%%%"),
            Err(ProtocolError::EmptyRoomCode)
        );
        assert_eq!(
            Invite::parse("http://h/x?room=a&public=maybe"),
            Err(ProtocolError::InvalidPublicFlag("maybe".into()))
        );
    }
}
