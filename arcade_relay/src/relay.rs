// Message relay: per-participant links and best-effort fan-out.
//
// `PeerLink` abstracts the write half of one guest connection. The server
// uses `TcpLink` (a buffered clone of the accepted `TcpStream`); session
// tests use an in-memory link. `MessageRelay` maps participant IDs to links,
// encodes each `ServerMessage` once, and writes it to one or all links.
//
// Delivery is best effort: a write error on one link is logged at debug and
// otherwise ignored. The reader thread for that connection will see the
// broken socket and report the disconnect, which is where cleanup happens.

use std::collections::BTreeMap;
use std::io::{self, BufWriter};
use std::net::{Shutdown, TcpStream};

use arcade_protocol::framing::write_message;
use arcade_protocol::{ParticipantId, ServerMessage};
use tracing::debug;

/// Write half of one guest connection.
pub trait PeerLink: Send {
    /// Write one already-encoded frame.
    fn deliver(&mut self, frame: &[u8]) -> io::Result<()>;
    /// Close the connection. Idempotent.
    fn close(&mut self);
}

pub struct TcpLink {
    writer: BufWriter<TcpStream>,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            writer: BufWriter::new(stream),
        }
    }
}

impl PeerLink for TcpLink {
    fn deliver(&mut self, frame: &[u8]) -> io::Result<()> {
        write_message(&mut self.writer, frame)
    }

    fn close(&mut self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

/// Encode a message once for any number of links.
fn encode(msg: &ServerMessage) -> Option<Vec<u8>> {
    match serde_json::to_vec(msg) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!(error = %e, "failed to encode server message");
            None
        }
    }
}

/// Send one message on a link that is not (or not yet) attached, e.g. a
/// `locked` reply to a refused join.
pub fn deliver_once(link: &mut dyn PeerLink, msg: &ServerMessage) {
    let Some(frame) = encode(msg) else {
        return;
    };
    if let Err(e) = link.deliver(&frame) {
        debug!(error = %e, "write to unattached link failed");
    }
}

#[derive(Default)]
pub struct MessageRelay {
    links: BTreeMap<ParticipantId, Box<dyn PeerLink>>,
}

impl MessageRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, id: ParticipantId, link: Box<dyn PeerLink>) {
        if let Some(mut old) = self.links.insert(id, link) {
            old.close();
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Deliver to exactly one participant.
    pub fn send(&mut self, to: &ParticipantId, msg: &ServerMessage) {
        let Some(link) = self.links.get_mut(to) else {
            return;
        };
        let Some(frame) = encode(msg) else {
            return;
        };
        if let Err(e) = link.deliver(&frame) {
            debug!(participant = %to, error = %e, "send failed");
        }
    }

    /// Deliver to every attached participant.
    pub fn broadcast(&mut self, msg: &ServerMessage) {
        let Some(frame) = encode(msg) else {
            return;
        };
        for (id, link) in &mut self.links {
            if let Err(e) = link.deliver(&frame) {
                debug!(participant = %id, error = %e, "broadcast write failed");
            }
        }
    }

    /// Detach and close one participant's link.
    pub fn close(&mut self, id: &ParticipantId) {
        if let Some(mut link) = self.links.remove(id) {
            link.close();
        }
    }

    pub fn close_all(&mut self) {
        for (_, mut link) in std::mem::take(&mut self.links) {
            link.close();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::memory::Inbox;
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn send_reaches_only_the_target() {
        let (a, b) = (Inbox::default(), Inbox::default());
        let mut relay = MessageRelay::new();
        relay.attach(id("a"), a.link());
        relay.attach(id("b"), b.link());
        relay.send(&id("b"), &ServerMessage::ChatAck { id: "1".into() });
        assert!(a.take().is_empty());
        assert_eq!(b.take(), vec![ServerMessage::ChatAck { id: "1".into() }]);
    }

    #[test]
    fn broadcast_survives_a_failing_peer() {
        let (a, b, c) = (Inbox::default(), Inbox::default(), Inbox::default());
        let mut relay = MessageRelay::new();
        relay.attach(id("a"), a.link());
        relay.attach(id("b"), b.link());
        relay.attach(id("c"), c.link());
        b.fail_writes();
        relay.broadcast(&ServerMessage::RoomClosed);
        assert_eq!(a.take(), vec![ServerMessage::RoomClosed]);
        assert!(b.take().is_empty());
        assert_eq!(c.take(), vec![ServerMessage::RoomClosed]);
    }

    #[test]
    fn send_to_unknown_is_a_no_op() {
        let mut relay = MessageRelay::new();
        relay.send(&id("ghost"), &ServerMessage::Locked);
        assert!(relay.is_empty());
    }

    #[test]
    fn close_all_closes_every_link() {
        let (a, b) = (Inbox::default(), Inbox::default());
        let mut relay = MessageRelay::new();
        relay.attach(id("a"), a.link());
        relay.attach(id("b"), b.link());
        relay.close_all();
        assert!(a.is_closed() && b.is_closed());
        assert!(relay.is_empty());
    }

    #[test]
    fn reattach_closes_previous_link() {
        let (old, new) = (Inbox::default(), Inbox::default());
        let mut relay = MessageRelay::new();
        relay.attach(id("a"), old.link());
        relay.attach(id("a"), new.link());
        assert!(old.is_closed());
        assert_eq!(relay.len(), 1);
    }

    #[test]
    fn deliver_once_writes_one_frame() {
        let inbox = Inbox::default();
        let mut link = inbox.link();
        deliver_once(link.as_mut(), &ServerMessage::Locked);
        assert_eq!(inbox.take(), vec![ServerMessage::Locked]);
    }
}
