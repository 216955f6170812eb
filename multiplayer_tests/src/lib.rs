// Test-only guest for multiplayer integration tests.
//
// Wraps the real `NetClient` and `RoomMirror` (from `arcade_relay`) and, for
// maze rounds, the real avatar simulation (from `arcade_sim::avatar`) to give
// a synchronous, test-friendly API: connect, ready up, wait for a message,
// walk the shipped maze to the goal and claim it.
//
// The only test-specific code here is the blocking polling wrappers around
// `NetClient::poll()` and the path-following input generator in
// `walk_to_goal`. Networking, mirroring and movement use the same code paths
// as the `arcade` binary.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use arcade_protocol::{RoundNumber, ServerMessage};
use arcade_relay::mirror::RoomMirror;
use arcade_relay::{ClientError, NetClient, WelcomeInfo};
use arcade_sim::avatar::{Avatar, AvatarParams, MoveInput};
use arcade_sim::maze::{Cell, MazeLayout};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A test guest wrapping a real `NetClient` and `RoomMirror`.
pub struct TestGuest {
    client: NetClient,
    pub welcome: WelcomeInfo,
    pub mirror: RoomMirror,
    /// Every message received so far, in order.
    pub log: Vec<ServerMessage>,
    /// Index into `log` of the first message `wait_for` hasn't consumed.
    cursor: usize,
}

impl TestGuest {
    /// Connect and complete the handshake, panicking on refusal.
    pub fn connect(addr: SocketAddr, name: &str) -> Self {
        Self::try_connect(addr, name).expect("TestGuest::connect failed")
    }

    pub fn try_connect(addr: SocketAddr, name: &str) -> Result<Self, ClientError> {
        let (client, welcome) = NetClient::connect(addr, name)?;
        Ok(Self {
            mirror: RoomMirror::new(welcome.you.clone()),
            client,
            welcome,
            log: Vec::new(),
            cursor: 0,
        })
    }

    pub fn client(&mut self) -> &mut NetClient {
        &mut self.client
    }

    /// Drain pending messages into the mirror and the log. Returns the new
    /// ones.
    pub fn pump(&mut self) -> Vec<ServerMessage> {
        let fresh = self.client.poll();
        for msg in &fresh {
            self.mirror.apply(msg);
        }
        self.log.extend(fresh.iter().cloned());
        fresh
    }

    /// Blocking poll until a message matching `pred` arrives; returns it.
    /// Messages are consumed in order, so a later call never sees anything
    /// at or before the one returned here.
    pub fn wait_for(
        &mut self,
        what: &str,
        pred: impl Fn(&ServerMessage) -> bool,
    ) -> ServerMessage {
        let start = Instant::now();
        loop {
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            self.pump();
            if let Some(offset) = self.log[self.cursor..].iter().position(&pred) {
                let index = self.cursor + offset;
                self.cursor = index + 1;
                return self.log[index].clone();
            }
            self.cursor = self.log.len();
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Blocking poll until the mirror satisfies `pred`.
    pub fn wait_until(&mut self, what: &str, pred: impl Fn(&RoomMirror) -> bool) {
        let start = Instant::now();
        while !pred(&self.mirror) {
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            self.pump();
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Poll until the room has `n` participants.
    pub fn wait_for_players(&mut self, n: usize) {
        self.wait_until(&format!("{n} players"), |m| m.players().len() == n);
    }

    pub fn ready(&mut self) {
        self.client.set_ready(true).expect("ready failed");
    }

    /// Wait for this round's maze, walk it locally, and claim the goal.
    /// Returns the round that was claimed.
    pub fn race(&mut self, params: &AvatarParams) -> RoundNumber {
        let (round, layout) = match self.wait_for("start_round", |m| {
            matches!(m, ServerMessage::StartRound { .. })
        }) {
            ServerMessage::StartRound { round, layout } => (round, layout),
            _ => unreachable!(),
        };
        assert!(walk_to_goal(&layout, params).is_some(), "avatar never reached the goal");
        self.wait_until("active phase", |m| {
            m.phase() == arcade_protocol::Phase::Active
        });
        self.client.goal(round).expect("goal failed");
        round
    }

    /// Send `goodbye` and close the connection.
    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}

/// Shortest path from start to goal, as cells, following open walls.
pub fn shortest_path(layout: &MazeLayout) -> Vec<Cell> {
    let dist = layout.maze.distances_from(layout.goal);
    let at = |c: Cell| dist[c.y as usize][c.x as usize];
    let mut path = vec![layout.start];
    let mut here = layout.start;
    while here != layout.goal {
        let Some(d) = at(here) else { break };
        let Some(walls) = layout.maze.walls(here) else { break };
        let mut next = None;
        let candidates = [
            (!walls.n && here.y > 0).then(|| Cell::new(here.x, here.y - 1)),
            (!walls.s).then(|| Cell::new(here.x, here.y + 1)),
            (!walls.w && here.x > 0).then(|| Cell::new(here.x - 1, here.y)),
            (!walls.e).then(|| Cell::new(here.x + 1, here.y)),
        ];
        for c in candidates.into_iter().flatten() {
            if c.x < layout.maze.width && c.y < layout.maze.height && at(c) == Some(d - 1) {
                next = Some(c);
                break;
            }
        }
        let Some(next) = next else { break };
        path.push(next);
        here = next;
    }
    path
}

/// Drive an avatar along the shortest path with the real movement code.
/// Returns the number of frames until arrival, or `None` if it got stuck.
pub fn walk_to_goal(layout: &MazeLayout, params: &AvatarParams) -> Option<usize> {
    const DT: f64 = 0.01;
    const EPS: f64 = 0.02;
    let mut avatar = Avatar::at_start(layout);
    let mut frames = 0;
    for cell in shortest_path(layout).into_iter().skip(1) {
        let (tx, ty) = (f64::from(cell.x) + 0.5, f64::from(cell.y) + 0.5);
        let mut legs = 0;
        while (avatar.x - tx).abs() > EPS || (avatar.y - ty).abs() > EPS {
            let input = MoveInput {
                left: avatar.x - tx > EPS,
                right: tx - avatar.x > EPS,
                up: avatar.y - ty > EPS,
                down: ty - avatar.y > EPS,
            };
            frames += 1;
            if avatar.step(layout, params, input, DT) {
                return Some(frames);
            }
            legs += 1;
            if legs > 1000 {
                return None;
            }
        }
    }
    avatar.has_arrived().then_some(frames)
}
