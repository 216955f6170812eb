// CLI entry point for the peer arcade.
//
// `arcade host` starts a room server, prints the invite URL, and joins it as
// the host participant (the first joiner holds host authority inside the
// session). `arcade join` connects to someone else's room. Both then run the
// same line-oriented guest loop: stdin lines are chat unless they start with
// `/`, and every event from the host is logged. `arcade invite` just prints
// an invite URL.
//
// Logging goes through `tracing`; set `RUST_LOG` to change the filter
// (default `info`).

use std::io::BufRead;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arcade_protocol::invite::Invite;
use arcade_protocol::room::RoomCode;
use arcade_protocol::{GameMode, ServerMessage};
use arcade_relay::mirror::RoomMirror;
use arcade_relay::server::{HostConfig, start_host, unix_ms};
use arcade_relay::{NetClient, WelcomeInfo};
use arcade_sim::config::ArcadeConfig;
use arcade_sim::prng::Mulberry32;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "arcade")]
#[command(about = "Host or join a small peer-hosted arcade room")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a room and join it as the host participant
    Host {
        #[arg(short, long, value_enum, default_value = "maze")]
        mode: ModeArg,
        /// Room code (random if omitted)
        #[arg(short, long)]
        room: Option<String>,
        #[arg(short, long, default_value_t = 7878)]
        port: u16,
        #[arg(long, default_value = "127.0.0.1")]
        bind: IpAddr,
        /// Session seed (random if omitted)
        #[arg(long)]
        seed: Option<u32>,
        /// JSON config file; defaults apply to anything it leaves out
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Mark the invite as public
        #[arg(long)]
        public: bool,
        /// Base URL for the printed invite
        #[arg(long, default_value = "http://localhost:7878/")]
        base: String,
        #[arg(short, long, default_value = "Host")]
        name: String,
    },
    /// Join a room
    Join {
        /// Host address, e.g. 127.0.0.1:7878
        addr: String,
        #[arg(short, long, default_value = "Player")]
        name: String,
    },
    /// Print an invite URL
    Invite {
        base: String,
        room: String,
        #[arg(long)]
        public: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Maze,
    QuickDraw,
    Pong,
    Chat,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Maze => GameMode::MazeRace,
            ModeArg::QuickDraw => GameMode::QuickDraw,
            ModeArg::Pong => GameMode::Pong,
            ModeArg::Chat => GameMode::Chat,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Host {
            mode,
            room,
            port,
            bind,
            seed,
            config,
            public,
            base,
            name,
        } => {
            let config = match config {
                Some(path) => ArcadeConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ArcadeConfig::default(),
            };
            let seed = seed.unwrap_or_else(rand::random);
            let room = match room {
                Some(raw) => RoomCode::parse(&raw).context("invalid room code")?,
                None => RoomCode::random(&mut Mulberry32::new(rand::random())),
            };
            let input_interval = config.pong.input_interval_ms;
            let mut host_config = HostConfig::new(room.clone(), mode.into());
            host_config.bind = bind;
            host_config.port = port;
            host_config.seed = seed;
            host_config.config = config;

            let (handle, addr) = start_host(host_config).context("failed to start host")?;
            println!("Room {room} listening on {addr}");
            println!("Invite: {}", Invite::new(&base, room, public).to_url());

            let local = SocketAddr::new(loopback_for(addr.ip()), addr.port());
            let (mut client, welcome) =
                NetClient::connect(local, &name).context("failed to join own room")?;
            client.set_input_interval(input_interval);
            run_guest(client, welcome)?;
            handle.wait();
        }
        Command::Join { addr, name } => {
            let (client, welcome) = NetClient::connect(addr.as_str(), &name)
                .with_context(|| format!("failed to join {addr}"))?;
            run_guest(client, welcome)?;
        }
        Command::Invite { base, room, public } => {
            let room = RoomCode::parse(&room).context("invalid room code")?;
            println!("{}", Invite::new(&base, room, public).to_url());
        }
    }
    Ok(())
}

/// Connect to a wildcard bind through loopback.
fn loopback_for(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
        other => other,
    }
}

fn spawn_stdin() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Line-oriented guest loop. Returns when the user quits or the room closes.
fn run_guest(mut client: NetClient, welcome: WelcomeInfo) -> Result<()> {
    info!(you = %welcome.you, host = %welcome.host, room = %welcome.room, mode = %welcome.mode, "joined");
    println!(
        "Joined room {} ({}). Commands: /ready /unready /goal /hit /false /up /down /stop /ping /lobby /who /quit",
        welcome.room, welcome.mode
    );
    let mut mirror = RoomMirror::new(welcome.you.clone());
    let lines = spawn_stdin();
    let mut signal_at: Option<Instant> = None;

    loop {
        for msg in client.poll() {
            mirror.apply(&msg);
            match &msg {
                ServerMessage::Signal { .. } => signal_at = Some(Instant::now()),
                ServerMessage::ChatBroadcast { name, text, .. } => println!("<{name}> {text}"),
                _ => {}
            }
            log_event(&msg);
        }
        if mirror.is_closed() || client.is_closed() {
            println!("Room closed.");
            return Ok(());
        }

        match lines.try_recv() {
            Ok(line) => {
                if !handle_line(&mut client, &mirror, line.trim(), &mut signal_at)? {
                    client.disconnect();
                    return Ok(());
                }
            }
            Err(TryRecvError::Disconnected) => {
                client.disconnect();
                return Ok(());
            }
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(20)),
        }
    }
}

fn log_event(msg: &ServerMessage) {
    match msg {
        ServerMessage::PongSnapshot { seq, .. } => debug!(seq, "pong snapshot"),
        ServerMessage::Ping { sent_ms } => debug!(sent_ms, "ping"),
        ServerMessage::Pong { sent_ms } => {
            info!(rtt_ms = unix_ms().saturating_sub(*sent_ms), "pong")
        }
        ServerMessage::StartRound { round, layout } => info!(
            round = round.0,
            seed = layout.seed,
            path = ?layout.path_length(),
            "maze received"
        ),
        ServerMessage::RoomClosed => warn!("room closed by host"),
        other => info!(event = ?other, "host"),
    }
}

/// Returns `false` when the user wants to quit.
fn handle_line(
    client: &mut NetClient,
    mirror: &RoomMirror,
    line: &str,
    signal_at: &mut Option<Instant>,
) -> Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }
    let Some(command) = line.strip_prefix('/') else {
        client.chat(line)?;
        return Ok(true);
    };
    let round = mirror.round();
    match command {
        "ready" => client.set_ready(true)?,
        "unready" => client.set_ready(false)?,
        "goal" => client.goal(round)?,
        "hit" => {
            let reaction = signal_at
                .take()
                .map(|at| u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX));
            client.hit(round, reaction)?;
        }
        "false" => client.false_start(round)?,
        "up" => {
            client.paddle(-1)?;
        }
        "down" => {
            client.paddle(1)?;
        }
        "stop" => {
            client.paddle(0)?;
        }
        "ping" => {
            client.ping()?;
        }
        "lobby" => client.back_to_lobby()?,
        "who" => {
            for p in mirror.players() {
                let host = if p.is_host { " (host)" } else { "" };
                let ready = if p.ready { "ready" } else { "-" };
                let latency = p
                    .latency_ms
                    .map_or_else(String::new, |ms| format!(" {ms}ms"));
                println!("{} {}{host} {ready} score={}{latency}", p.id, p.name, p.score);
            }
        }
        "quit" => return Ok(false),
        other => println!("unknown command /{other}"),
    }
    Ok(true)
}
