// TCP host server and main event loop.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (non-blocking `accept()` poll): accepts connections
//   and hands each one to a short-lived handshake thread.
// - **Handshake threads**: read the first frame with a 5 s timeout. A valid
//   `hello` becomes `InternalEvent::Hello`; anything else drops the socket.
//   Doing this off the main thread means a silent peer can't stall the room.
// - **Reader threads** (one per admitted guest): `read_message()` in a loop,
//   decode `ClientMessage`, send `InternalEvent::MessageFrom`. A frame that
//   doesn't decode (unknown `"t"`, bad fields) is dropped; a framing or I/O
//   error, EOF, or `goodbye` ends the loop with `InternalEvent::Disconnected`.
// - **Main thread**: owns the `Session`, assigns participant ids (`p1`,
//   `p2`, ...), dispatches events, and runs `Session::tick`. It sleeps in
//   `recv_timeout` until the session's next deadline (timers, pong step,
//   pings), which doubles as the timer without a separate timer thread.
//
// The main thread is the only writer to guest streams (through the
// session's `MessageRelay`). Reader threads only read.
//
// Shutdown: `HostHandle::stop` clears `keep_running`; the main loop then
// closes the room (`room_closed` to everyone) and exits. The loop also exits
// on its own once the session closes because the host participant left.

use std::io::{self, BufReader};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use arcade_protocol::framing::read_message;
use arcade_protocol::room::RoomCode;
use arcade_protocol::{ClientMessage, GameMode, PROTOCOL_VERSION, ParticipantId, ServerMessage};
use arcade_sim::config::ArcadeConfig;
use tracing::{debug, info, warn};

use crate::relay::{PeerLink, TcpLink, deliver_once};
use crate::session::{Session, SessionSettings};

/// How long a new connection has to send its `hello`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on one main-loop sleep, so `keep_running` is noticed.
const MAX_IDLE: Duration = Duration::from_millis(100);

/// Current UNIX time in milliseconds.
pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    Hello {
        stream: TcpStream,
        reader: BufReader<TcpStream>,
        name: String,
        protocol_version: u32,
    },
    MessageFrom {
        id: ParticipantId,
        message: ClientMessage,
    },
    Disconnected {
        id: ParticipantId,
    },
}

/// Handle returned by `start_host` to control the running server.
pub struct HostHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HostHandle {
    /// Close the room and wait for the server to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Wait until the room closes on its own (the host participant left).
    pub fn wait(mut self) {
        self.join();
    }

    /// `false` once the main loop has exited.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a host.
#[derive(Clone, Debug)]
pub struct HostConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub room: RoomCode,
    pub mode: GameMode,
    /// Seeds the session generator (maze seeds, brackets, reveal delays).
    pub seed: u32,
    pub config: ArcadeConfig,
}

impl HostConfig {
    pub fn new(room: RoomCode, mode: GameMode) -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 7878,
            room,
            mode,
            seed: 0,
            config: ArcadeConfig::default(),
        }
    }
}

/// Start the host on a background thread. Returns a handle for stopping it
/// and the actual bound address (useful when port 0 lets the OS pick).
pub fn start_host(config: HostConfig) -> io::Result<(HostHandle, SocketAddr)> {
    config
        .config
        .validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let listener = TcpListener::bind(SocketAddr::new(config.bind, config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    info!(room = %config.room, mode = %config.mode, %addr, "host listening");
    let thread = thread::spawn(move || {
        run_host(listener, config, keep_running_clone);
    });

    Ok((
        HostHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main host loop. Runs until the room closes.
fn run_host(listener: TcpListener, config: HostConfig, keep_running: Arc<AtomicBool>) {
    let mut session = Session::new(SessionSettings {
        room: config.room,
        mode: config.mode,
        seed: config.seed,
        config: config.config,
    });
    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    if let Err(e) = listener.set_nonblocking(true) {
        warn!(error = %e, "failed to make listener non-blocking");
    }
    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        accept_loop(listener, tx_listener, keep_running_listener);
    });

    let mut next_id: u32 = 1;
    while !session.is_closed() {
        if !keep_running.load(Ordering::SeqCst) {
            session.close_room();
            break;
        }
        let now = unix_ms();
        let wait = session
            .next_deadline()
            .map_or(MAX_IDLE, |due| {
                Duration::from_millis(due.saturating_sub(now).max(1))
            })
            .min(MAX_IDLE);
        match rx.recv_timeout(wait) {
            Ok(event) => {
                handle_event(&mut session, event, &mut next_id, &tx, &keep_running);
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut session, event, &mut next_id, &tx, &keep_running);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        session.tick(unix_ms());
    }
    keep_running.store(false, Ordering::SeqCst);
    info!(room = %session.room(), "host stopped");
}

fn accept_loop(listener: TcpListener, tx: Sender<InternalEvent>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "connection accepted");
                stream.set_nonblocking(false).ok();
                let tx = tx.clone();
                thread::spawn(move || handshake(stream, tx));
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                warn!(error = %e, "accept failed; listener stopped");
                break;
            }
        }
    }
}

/// Read the `hello` frame and pass the connection to the main thread.
fn handshake(stream: TcpStream, tx: Sender<InternalEvent>) {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok();
    let mut reader = match stream.try_clone() {
        Ok(s) => BufReader::new(s),
        Err(_) => return,
    };
    let first = read_message(&mut reader)
        .and_then(|bytes| serde_json::from_slice(&bytes).map_err(io::Error::other));
    match first {
        Ok(ClientMessage::Hello {
            name,
            protocol_version,
        }) => {
            let _ = tx.send(InternalEvent::Hello {
                stream,
                reader,
                name,
                protocol_version,
            });
        }
        Ok(other) => debug!(kind = other.tag(), "first frame was not hello; dropping"),
        Err(e) => debug!(error = %e, "handshake failed"),
    }
}

fn handle_event(
    session: &mut Session,
    event: InternalEvent,
    next_id: &mut u32,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::Hello {
            stream,
            reader,
            name,
            protocol_version,
        } => admit(session, stream, reader, &name, protocol_version, next_id, tx, keep_running),
        InternalEvent::MessageFrom { id, message } => {
            let kind = message.tag();
            if let Err(e) = session.handle_message(&id, message, unix_ms()) {
                debug!(room = %session.room(), participant = %id, kind, error = %e, "message rejected");
            }
        }
        InternalEvent::Disconnected { id } => session.disconnect(&id, unix_ms()),
    }
}

#[allow(clippy::too_many_arguments)]
fn admit(
    session: &mut Session,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    name: &str,
    protocol_version: u32,
    next_id: &mut u32,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    let write_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            debug!(error = %e, "failed to clone guest stream");
            return;
        }
    };
    let mut link: Box<dyn PeerLink> = Box::new(TcpLink::new(write_stream));
    if protocol_version != PROTOCOL_VERSION {
        deliver_once(
            link.as_mut(),
            &ServerMessage::Rejected {
                reason: format!(
                    "protocol version {protocol_version} is not supported (host speaks {PROTOCOL_VERSION})"
                ),
            },
        );
        link.close();
        return;
    }

    let id = ParticipantId(format!("p{next_id}"));
    *next_id += 1;
    if session.join(id.clone(), name, link, unix_ms()).is_err() {
        return;
    }
    stream.set_read_timeout(None).ok();
    let tx = tx.clone();
    let keep_running = keep_running.clone();
    thread::spawn(move || reader_loop(reader, id, tx, keep_running));
}

/// Reader loop for one guest. Runs in its own thread.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    id: ParticipantId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        let bytes = match read_message(&mut reader) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(participant = %id, error = %e, "read ended");
                break;
            }
        };
        match serde_json::from_slice::<ClientMessage>(&bytes) {
            Ok(ClientMessage::Goodbye) => break,
            Ok(message) => {
                if tx
                    .send(InternalEvent::MessageFrom {
                        id: id.clone(),
                        message,
                    })
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => debug!(participant = %id, error = %e, "undecodable frame dropped"),
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { id });
}
