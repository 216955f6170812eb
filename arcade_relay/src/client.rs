// TCP guest client for joining a hosted room.
//
// Architecture:
// - `connect()` performs TCP connect + `hello` handshake on the calling
//   thread and waits for `welcome` (or `locked` / `rejected`), then spawns a
//   background reader thread.
// - The reader thread calls `read_message()` in a loop, decodes
//   `ServerMessage`, answers the host's `ping` with `pong` directly (so
//   latency probes don't wait on the caller's poll rate), and pushes every
//   message into an `mpsc` inbox. Frames that don't decode are skipped.
// - `poll()` drains the inbox without blocking.
//
// The write half is shared between the caller and the reader thread behind
// a mutex; frames are small and written synchronously.
//
// Paddle input goes through `InputThrottle`: a changed direction is sent at
// once, an unchanged one is resent no more often than the throttle interval.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arcade_protocol::framing::{read_message, send};
use arcade_protocol::{
    ClientMessage, GameMode, PROTOCOL_VERSION, ParticipantId, RoundNumber, ServerMessage,
};
use tracing::debug;

use crate::error::ClientError;
use crate::server::unix_ms;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default resend interval for unchanged paddle input.
pub const DEFAULT_INPUT_INTERVAL_MS: u64 = 80;

/// Information returned by a successful `connect()` handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WelcomeInfo {
    pub you: ParticipantId,
    pub host: ParticipantId,
    pub room: String,
    pub mode: GameMode,
}

/// Decides when a paddle direction is worth sending.
#[derive(Debug)]
pub struct InputThrottle {
    interval_ms: u64,
    last: Option<(i8, u64)>,
}

impl InputThrottle {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last: None,
        }
    }

    /// Returns `true` (and records the send) if `direction` should go out
    /// now: it changed, or the interval has elapsed since the last send.
    pub fn should_send(&mut self, direction: i8, now_ms: u64) -> bool {
        let due = match self.last {
            None => true,
            Some((prev, at)) => prev != direction || now_ms.saturating_sub(at) >= self.interval_ms,
        };
        if due {
            self.last = Some((direction, now_ms));
        }
        due
    }
}

type SharedWriter = Arc<Mutex<BufWriter<TcpStream>>>;

fn write_shared(writer: &SharedWriter, msg: &ClientMessage) -> Result<(), ClientError> {
    let mut guard = match writer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    send(&mut *guard, msg)?;
    Ok(())
}

/// TCP client for one guest.
pub struct NetClient {
    writer: SharedWriter,
    inbox: Receiver<ServerMessage>,
    closed: Arc<AtomicBool>,
    _reader_thread: Option<JoinHandle<()>>,
    you: ParticipantId,
    throttle: InputThrottle,
    next_chat: u64,
}

impl NetClient {
    /// Connect to a host, perform the handshake, and spawn a reader thread.
    pub fn connect<A: ToSocketAddrs>(
        addr: A,
        name: &str,
    ) -> Result<(Self, WelcomeInfo), ClientError> {
        let stream = TcpStream::connect(addr).map_err(ClientError::Connect)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok();
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        send(
            &mut writer,
            &ClientMessage::Hello {
                name: name.to_string(),
                protocol_version: PROTOCOL_VERSION,
            },
        )?;

        let reply: ServerMessage = {
            let bytes = read_message(&mut reader)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| ClientError::Handshake(format!("undecodable reply: {e}")))?
        };
        let welcome = match reply {
            ServerMessage::Welcome {
                you,
                host,
                room,
                mode,
            } => WelcomeInfo {
                you,
                host,
                room,
                mode,
            },
            ServerMessage::Locked => return Err(ClientError::Locked),
            ServerMessage::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            other => return Err(ClientError::Handshake(format!("{other:?}"))),
        };
        reader.get_ref().set_read_timeout(None).ok();

        let writer: SharedWriter = Arc::new(Mutex::new(writer));
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let reader_thread = {
            let writer = writer.clone();
            let closed = closed.clone();
            thread::spawn(move || reader_loop(reader, tx, writer, closed))
        };

        Ok((
            Self {
                writer,
                inbox: rx,
                closed,
                _reader_thread: Some(reader_thread),
                you: welcome.you.clone(),
                throttle: InputThrottle::new(DEFAULT_INPUT_INTERVAL_MS),
                next_chat: 0,
            },
            welcome,
        ))
    }

    pub fn you(&self) -> &ParticipantId {
        &self.you
    }

    /// Use a different paddle-input resend interval (the room config's).
    pub fn set_input_interval(&mut self, interval_ms: u64) {
        self.throttle = InputThrottle::new(interval_ms);
    }

    pub fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        write_shared(&self.writer, msg)
    }

    pub fn set_ready(&mut self, value: bool) -> Result<(), ClientError> {
        self.send(&ClientMessage::Ready { value })
    }

    /// Maze race: report reaching the goal in `round`.
    pub fn goal(&mut self, round: RoundNumber) -> Result<(), ClientError> {
        self.send(&ClientMessage::Goal { round })
    }

    /// Quick-draw: report a hit, with the locally measured reaction time.
    pub fn hit(&mut self, round: RoundNumber, reaction_ms: Option<u64>) -> Result<(), ClientError> {
        self.send(&ClientMessage::ActionHit { round, reaction_ms })
    }

    pub fn false_start(&mut self, round: RoundNumber) -> Result<(), ClientError> {
        self.send(&ClientMessage::ActionFalse { round })
    }

    /// Pong: send paddle intent, throttled. Returns whether a frame was sent.
    pub fn paddle(&mut self, direction: i8) -> Result<bool, ClientError> {
        let direction = direction.clamp(-1, 1);
        if !self.throttle.should_send(direction, unix_ms()) {
            return Ok(false);
        }
        self.send(&ClientMessage::PaddleInput { direction })?;
        Ok(true)
    }

    /// Send a chat line. Returns the id the host will acknowledge.
    pub fn chat(&mut self, text: &str) -> Result<String, ClientError> {
        self.next_chat += 1;
        let id = format!("c{}", self.next_chat);
        self.send(&ClientMessage::Chat {
            id: id.clone(),
            text: text.to_string(),
        })?;
        Ok(id)
    }

    /// Probe latency; the host echoes `sent_ms` back in a `pong`.
    pub fn ping(&mut self) -> Result<u64, ClientError> {
        let sent_ms = unix_ms();
        self.send(&ClientMessage::Ping { sent_ms })?;
        Ok(sent_ms)
    }

    pub fn back_to_lobby(&mut self) -> Result<(), ClientError> {
        self.send(&ClientMessage::BackToLobby)
    }

    /// Send `goodbye` and close the connection.
    pub fn disconnect(&mut self) {
        let _ = self.send(&ClientMessage::Goodbye);
        let guard = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = guard.get_ref().shutdown(Shutdown::Both);
    }

    /// Drain all queued host messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// `true` once the host connection has ended.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Reader thread: read frames, answer pings, push everything to the inbox.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    tx: Sender<ServerMessage>,
    writer: SharedWriter,
    closed: Arc<AtomicBool>,
) {
    while let Ok(bytes) = read_message(&mut reader) {
        let msg = match serde_json::from_slice::<ServerMessage>(&bytes) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "undecodable frame from host dropped");
                continue;
            }
        };
        if let ServerMessage::Ping { sent_ms } = &msg {
            let pong = ClientMessage::Pong { sent_ms: *sent_ms };
            if let Err(e) = write_shared(&writer, &pong) {
                debug!(error = %e, "pong failed");
            }
        }
        if tx.send(msg).is_err() {
            break;
        }
    }
    closed.store(true, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_input_is_always_sent() {
        let mut t = InputThrottle::new(80);
        assert!(t.should_send(0, 1000));
    }

    #[test]
    fn unchanged_input_waits_for_interval() {
        let mut t = InputThrottle::new(80);
        assert!(t.should_send(1, 1000));
        assert!(!t.should_send(1, 1040));
        assert!(!t.should_send(1, 1079));
        assert!(t.should_send(1, 1080));
        assert!(!t.should_send(1, 1100));
    }

    #[test]
    fn changed_input_goes_out_immediately() {
        let mut t = InputThrottle::new(80);
        assert!(t.should_send(1, 1000));
        assert!(t.should_send(-1, 1001));
        assert!(t.should_send(0, 1002));
        assert!(!t.should_send(0, 1003));
    }
}
