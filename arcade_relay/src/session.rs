// Host-authoritative session for one room.
//
// `Session` is the central object that `server.rs` drives. It owns the room
// directory, the message relay, the phase machine, the outcome resolver, the
// score tables, the timer queue and the game-specific round state. Holding a
// `Session` *is* holding host authority: guests only ever see what it
// broadcasts. All mutation happens through methods called from the server's
// single-threaded loop, with the current UNIX time in milliseconds passed in,
// so tests can drive it with a fake clock and in-memory links.
//
// Key responsibilities:
// - Joins: first joiner becomes the host participant; joins outside the
//   lobby get `locked` and the link is closed before anything is recorded.
// - Gating: every client message is checked against `phase::accepts`
//   before dispatch; rejections come back as `SessionError::NotAccepted`.
// - Rounds: maze race (free-for-all, first goal wins, first to N points),
//   quick-draw (single-elimination bracket of best-of duels, randomized
//   signal reveal, false starts award the opponent), pong (host-stepped
//   physics, periodic snapshots, first to N points).
// - Timers: every delayed step goes through `TimerQueue`, which is
//   invalidated on every round resolution and on reset, so a stale timer
//   never fires into a later round.
// - Liveness: periodic `ping` to everyone, round-trip recorded on `pong`.
//   Chat is rebroadcast and acknowledged to the sender.
// - Departure: a duel contestant leaving forfeits the duel; the host
//   participant leaving closes the room (`room_closed`, then every link is
//   closed).
//
// Every directory mutation is followed by a full `players` snapshot.

use std::collections::BTreeMap;

use arcade_protocol::room::{RoomCode, sanitize_name};
use arcade_protocol::{ClientMessage, GameMode, ParticipantId, Phase, RoundNumber, ServerMessage};
use arcade_sim::bracket::{Bracket, BracketEntry, Progress};
use arcade_sim::config::ArcadeConfig;
use arcade_sim::maze::MazeLayout;
use arcade_sim::outcome::{Award, Claim, Ignored, RoundResolver, ScoreTable, Verdict, WinReason};
use arcade_sim::pong::{PaddleSide, PongEvent, PongSim};
use arcade_sim::prng::Mulberry32;
use arcade_sim::timer::TimerQueue;
use tracing::{debug, info, warn};

use crate::directory::{Participant, RoomDirectory};
use crate::error::{JoinError, SessionError};
use crate::phase::{self, MessageKind, PhaseMachine};
use crate::relay::{MessageRelay, PeerLink, deliver_once};

/// Longest chat message relayed, in characters.
pub const MAX_CHAT_LEN: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKind {
    /// Maze race: ship the round's layout shortly before the countdown ends.
    ShipMaze,
    /// Countdown over: open the round.
    BeginRound,
    /// Quick-draw: reveal the signal.
    Signal,
    /// Another round of the same match or duel.
    NextRound,
    /// Quick-draw: play the next bracket entry (or advance the bracket).
    NextDuel,
    ResetToLobby,
}

/// Everything needed to open a room.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub room: RoomCode,
    pub mode: GameMode,
    pub seed: u32,
    pub config: ArcadeConfig,
}

struct Duel {
    entry: usize,
    left: ParticipantId,
    right: ParticipantId,
    scores: ScoreTable<ParticipantId>,
}

impl Duel {
    fn opponent_of(&self, id: &ParticipantId) -> Option<ParticipantId> {
        if *id == self.left {
            Some(self.right.clone())
        } else if *id == self.right {
            Some(self.left.clone())
        } else {
            None
        }
    }
}

struct PongMatch {
    left: ParticipantId,
    right: ParticipantId,
    /// `None` until the countdown ends.
    sim: Option<PongSim>,
    seq: u64,
    last_step_ms: u64,
    next_snapshot_ms: u64,
}

impl PongMatch {
    fn side_of(&self, id: &ParticipantId) -> Option<PaddleSide> {
        if *id == self.left {
            Some(PaddleSide::Left)
        } else if *id == self.right {
            Some(PaddleSide::Right)
        } else {
            None
        }
    }

    fn opponent_of(&self, id: &ParticipantId) -> Option<ParticipantId> {
        match self.side_of(id)? {
            PaddleSide::Left => Some(self.right.clone()),
            PaddleSide::Right => Some(self.left.clone()),
        }
    }

    fn scores(&self) -> BTreeMap<ParticipantId, u32> {
        let [l, r] = self.sim.as_ref().map_or([0, 0], |s| s.state().scores);
        BTreeMap::from([(self.left.clone(), l), (self.right.clone(), r)])
    }
}

pub struct Session {
    room: RoomCode,
    mode: GameMode,
    config: ArcadeConfig,
    machine: PhaseMachine,
    round: RoundNumber,
    directory: RoomDirectory,
    relay: MessageRelay,
    host: Option<ParticipantId>,
    resolver: RoundResolver<ParticipantId>,
    scores: ScoreTable<ParticipantId>,
    timers: TimerQueue<TimerKind>,
    rng: Mulberry32,
    layout: Option<MazeLayout>,
    bracket: Option<Bracket<ParticipantId>>,
    duel: Option<Duel>,
    pong: Option<PongMatch>,
    next_ping_ms: Option<u64>,
    closed: bool,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        let target = match settings.mode {
            GameMode::MazeRace => settings.config.maze.points_to_win,
            GameMode::Pong => settings.config.pong.points_to_win,
            // Quick-draw keeps cumulative round wins here; duels have their
            // own tables.
            GameMode::QuickDraw | GameMode::Chat => u32::MAX,
        };
        Self {
            room: settings.room,
            mode: settings.mode,
            machine: PhaseMachine::default(),
            round: RoundNumber(0),
            directory: RoomDirectory::new(),
            relay: MessageRelay::new(),
            host: None,
            resolver: RoundResolver::closed(),
            scores: ScoreTable::new(target),
            timers: TimerQueue::new(),
            rng: Mulberry32::new(settings.seed),
            layout: None,
            bracket: None,
            duel: None,
            pong: None,
            next_ping_ms: None,
            closed: false,
            config: settings.config,
        }
    }

    pub fn room(&self) -> &RoomCode {
        &self.room
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn round(&self) -> RoundNumber {
        self.round
    }

    pub fn host(&self) -> Option<&ParticipantId> {
        self.host.as_ref()
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.directory
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Current maze content, if a maze round has been generated.
    pub fn layout(&self) -> Option<&MazeLayout> {
        self.layout.as_ref()
    }

    /// Number of stale timers dropped so far.
    pub fn stale_timers_dropped(&self) -> u64 {
        self.timers.stale_dropped()
    }

    // -----------------------------------------------------------------------
    // Joining and leaving
    // -----------------------------------------------------------------------

    /// Admit a participant whose handshake completed. On refusal the link
    /// gets `locked` or `rejected` and is closed; nothing is recorded.
    pub fn join(
        &mut self,
        id: ParticipantId,
        name: &str,
        mut link: Box<dyn PeerLink>,
        now_ms: u64,
    ) -> Result<(), JoinError> {
        let refusal = if self.closed {
            Some(JoinError::Closed)
        } else if self.phase() != Phase::Lobby {
            Some(JoinError::Locked)
        } else if self.directory.len() >= self.config.room.max_players {
            Some(JoinError::Full {
                max: self.config.room.max_players,
            })
        } else if self.directory.contains(&id) {
            Some(JoinError::Duplicate(id.clone()))
        } else {
            None
        };
        if let Some(err) = refusal {
            let reply = match err {
                JoinError::Locked => ServerMessage::Locked,
                ref other => ServerMessage::Rejected {
                    reason: other.to_string(),
                },
            };
            deliver_once(link.as_mut(), &reply);
            link.close();
            debug!(room = %self.room, participant = %id, phase = %self.phase(), error = %err, "join refused");
            return Err(err);
        }

        let is_host = self.host.is_none();
        if is_host {
            self.host = Some(id.clone());
        }
        let name = sanitize_name(name, id.as_str());
        self.directory
            .upsert(Participant::new(id.clone(), name.clone(), is_host));
        self.scores.insert(id.clone());
        self.relay.attach(id.clone(), link);
        if self.next_ping_ms.is_none() {
            self.next_ping_ms = Some(now_ms + self.config.liveness.ping_interval_ms);
        }

        let host = self.host.clone().unwrap_or_else(|| id.clone());
        self.relay.send(
            &id,
            &ServerMessage::Welcome {
                you: id.clone(),
                host,
                room: self.room.to_string(),
                mode: self.mode,
            },
        );
        info!(room = %self.room, participant = %id, name = %name, host = is_host, "participant joined");
        self.broadcast_players();
        Ok(())
    }

    /// A participant's connection ended (goodbye, EOF, or I/O error).
    pub fn disconnect(&mut self, id: &ParticipantId, now_ms: u64) {
        if self.directory.remove(id).is_none() {
            return;
        }
        self.relay.close(id);
        self.scores.remove(id);

        if self.host.as_ref() == Some(id) {
            warn!(room = %self.room, participant = %id, "host left; closing room");
            self.close_room();
            return;
        }
        info!(room = %self.room, participant = %id, "participant left");
        self.broadcast_players();

        let result = match self.phase() {
            Phase::Lobby => self.maybe_start(now_ms),
            _ => self.forfeit(id, now_ms),
        };
        if let Err(e) = result {
            warn!(room = %self.room, error = %e, "failed to handle departure");
        }
    }

    /// Tell everyone the room is gone and close every link.
    pub fn close_room(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.timers.invalidate();
        self.resolver.lock();
        self.relay.broadcast(&ServerMessage::RoomClosed);
        self.relay.close_all();
        info!(room = %self.room, "room closed");
    }

    // -----------------------------------------------------------------------
    // Message dispatch
    // -----------------------------------------------------------------------

    pub fn handle_message(
        &mut self,
        from: &ParticipantId,
        msg: ClientMessage,
        now_ms: u64,
    ) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        if !self.directory.contains(from) {
            return Err(SessionError::UnknownParticipant(from.clone()));
        }
        let kind = MessageKind::of(&msg);
        let phase = self.phase();
        if !phase::accepts(self.mode, phase, kind) {
            return Err(SessionError::NotAccepted { kind, phase });
        }

        match msg {
            ClientMessage::Hello { name, .. } => {
                let name = sanitize_name(&name, from.as_str());
                self.directory.rename(from, name);
                self.broadcast_players();
                Ok(())
            }
            ClientMessage::Ready { value } => {
                self.directory.set_ready(from, value);
                self.broadcast_players();
                self.maybe_start(now_ms)
            }
            ClientMessage::Goal { round } => {
                self.check_round(round)?;
                self.claim(from, Claim::ReachedGoal, now_ms)
            }
            ClientMessage::ActionHit { round, reaction_ms } => {
                self.check_round(round)?;
                debug!(room = %self.room, participant = %from, reaction_ms, "hit claimed");
                self.claim(
                    from,
                    Claim::Hit {
                        reported_ms: reaction_ms,
                    },
                    now_ms,
                )
            }
            ClientMessage::ActionFalse { round } => {
                self.check_round(round)?;
                self.claim(from, Claim::FalseStart, now_ms)
            }
            ClientMessage::PaddleInput { direction } => self.paddle_input(from, direction),
            ClientMessage::Chat { id, text } => {
                self.chat(from, id, &text);
                Ok(())
            }
            ClientMessage::Ping { sent_ms } => {
                self.relay.send(from, &ServerMessage::Pong { sent_ms });
                Ok(())
            }
            ClientMessage::Pong { sent_ms } => {
                self.directory.set_latency(from, now_ms.saturating_sub(sent_ms));
                self.broadcast_players();
                Ok(())
            }
            ClientMessage::BackToLobby => {
                if self.host.as_ref() != Some(from) {
                    return Err(SessionError::NotHost(from.clone()));
                }
                info!(room = %self.room, participant = %from, "host requested lobby");
                self.reset_to_lobby()
            }
            ClientMessage::Goodbye => {
                self.disconnect(from, now_ms);
                Ok(())
            }
        }
    }

    fn check_round(&self, round: RoundNumber) -> Result<(), SessionError> {
        if round != self.round {
            return Err(SessionError::StaleRound {
                current: self.round,
                got: round,
            });
        }
        Ok(())
    }

    fn chat(&mut self, from: &ParticipantId, id: String, text: &str) {
        let text: String = text.trim().chars().take(MAX_CHAT_LEN).collect();
        if text.is_empty() {
            return;
        }
        let name = self.directory.name_of(from);
        self.relay.broadcast(&ServerMessage::ChatBroadcast {
            from: from.clone(),
            name,
            id: id.clone(),
            text,
        });
        self.relay.send(from, &ServerMessage::ChatAck { id });
    }

    fn paddle_input(&mut self, from: &ParticipantId, direction: i8) -> Result<(), SessionError> {
        let side = self.pong.as_ref().and_then(|m| m.side_of(from));
        let Some(side) = side else {
            return Err(SessionError::NotContestant(from.clone()));
        };
        if let Some(sim) = self.pong.as_mut().and_then(|m| m.sim.as_mut()) {
            sim.set_input(side, direction);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Run due timers, step pong, and send liveness pings.
    pub fn tick(&mut self, now_ms: u64) {
        if self.closed {
            return;
        }
        while let Some(kind) = self.timers.pop_due(now_ms) {
            if let Err(e) = self.fire(kind, now_ms) {
                warn!(room = %self.room, timer = ?kind, error = %e, "timer failed");
            }
        }
        if let Err(e) = self.step_pong(now_ms) {
            warn!(room = %self.room, error = %e, "pong step failed");
        }
        match self.next_ping_ms {
            Some(due) if now_ms >= due => {
                self.relay.broadcast(&ServerMessage::Ping { sent_ms: now_ms });
                self.next_ping_ms = Some(now_ms + self.config.liveness.ping_interval_ms);
            }
            _ => {}
        }
    }

    /// The earliest time `tick` has something to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let mut deadline = self.timers.next_deadline();
        let mut consider = |t: Option<u64>| {
            if let Some(t) = t {
                deadline = Some(deadline.map_or(t, |d| d.min(t)));
            }
        };
        consider(self.next_ping_ms);
        if self.phase() == Phase::Active {
            let stepping = self
                .pong
                .as_ref()
                .and_then(|m| m.sim.as_ref().map(|sim| (m.last_step_ms, sim.step_seconds())));
            if let Some((last_step_ms, step_seconds)) = stepping {
                let step_ms = ((step_seconds * 1000.0).ceil() as u64).max(1);
                consider(Some(last_step_ms + step_ms));
            }
        }
        deadline
    }

    fn fire(&mut self, kind: TimerKind, now_ms: u64) -> Result<(), SessionError> {
        match kind {
            TimerKind::ShipMaze => {
                self.ship_maze();
                Ok(())
            }
            TimerKind::BeginRound => self.begin_round(now_ms),
            TimerKind::Signal => {
                self.resolver.mark_signal(now_ms);
                info!(room = %self.room, round = self.round.0, "signal");
                self.relay
                    .broadcast(&ServerMessage::Signal { round: self.round });
                Ok(())
            }
            TimerKind::NextRound => self.start_countdown(now_ms),
            TimerKind::NextDuel => self.next_duel(now_ms),
            TimerKind::ResetToLobby => self.reset_to_lobby(),
        }
    }

    // -----------------------------------------------------------------------
    // Phase flow
    // -----------------------------------------------------------------------

    fn enter(&mut self, to: Phase) -> Result<(), SessionError> {
        self.machine.enter(to)?;
        info!(room = %self.room, phase = %to, round = self.round.0, "phase");
        self.relay.broadcast(&ServerMessage::Phase {
            phase: to,
            round: self.round,
        });
        Ok(())
    }

    fn broadcast_players(&mut self) {
        self.relay.broadcast(&ServerMessage::Players {
            revision: self.directory.revision(),
            phase: self.phase(),
            players: self.directory.snapshot(),
        });
    }

    /// Start the mode's match if everyone in the lobby is ready.
    fn maybe_start(&mut self, now_ms: u64) -> Result<(), SessionError> {
        if self.phase() != Phase::Lobby || !self.directory.all_ready() {
            return Ok(());
        }
        let min_players = match self.mode {
            GameMode::MazeRace => 1,
            GameMode::QuickDraw | GameMode::Pong => 2,
            GameMode::Chat => return Ok(()),
        };
        if self.directory.len() < min_players {
            return Ok(());
        }
        info!(room = %self.room, mode = %self.mode, players = self.directory.len(), "match starting");
        match self.mode {
            GameMode::MazeRace => self.start_countdown(now_ms),
            GameMode::QuickDraw => self.start_tournament(now_ms),
            GameMode::Pong => self.start_pong(now_ms),
            GameMode::Chat => Ok(()),
        }
    }

    fn countdown_ms(&self) -> u64 {
        match self.mode {
            GameMode::MazeRace => self.config.maze.countdown_ms,
            GameMode::QuickDraw => self.config.quick_draw.countdown_ms,
            GameMode::Pong => self.config.pong.countdown_ms,
            GameMode::Chat => 0,
        }
    }

    fn start_countdown(&mut self, now_ms: u64) -> Result<(), SessionError> {
        let countdown_ms = self.countdown_ms();
        self.round = self.round.next();
        self.resolver = RoundResolver::closed();
        self.layout = None;
        self.enter(Phase::Countdown)?;
        let ends_at_ms = now_ms + countdown_ms;
        self.relay.broadcast(&ServerMessage::Countdown {
            round: self.round,
            seconds: u32::try_from(countdown_ms.div_ceil(1000)).unwrap_or(u32::MAX),
            ends_at_ms,
        });
        if self.mode == GameMode::MazeRace {
            let lead = self.config.maze.content_lead_ms.min(countdown_ms);
            self.timers.schedule(ends_at_ms - lead, TimerKind::ShipMaze);
        }
        self.timers.schedule(ends_at_ms, TimerKind::BeginRound);
        Ok(())
    }

    fn ship_maze(&mut self) {
        let maze = &self.config.maze;
        let seed = self.rng.next_u32();
        let layout = MazeLayout::generate(maze.width, maze.height, maze.cell_size, seed);
        debug!(room = %self.room, round = self.round.0, seed, "maze generated");
        self.relay.broadcast(&ServerMessage::StartRound {
            round: self.round,
            layout: layout.clone(),
        });
        self.layout = Some(layout);
    }

    fn begin_round(&mut self, now_ms: u64) -> Result<(), SessionError> {
        match self.mode {
            GameMode::MazeRace => {
                if self.layout.is_none() {
                    self.ship_maze();
                }
                self.resolver = RoundResolver::open_free_for_all();
                self.enter(Phase::Active)
            }
            GameMode::QuickDraw => {
                let Some(duel) = &self.duel else {
                    return self.reset_to_lobby();
                };
                self.resolver = RoundResolver::open_duel(duel.left.clone(), duel.right.clone());
                self.enter(Phase::Active)?;
                let qd = &self.config.quick_draw;
                let (lo, hi) = (qd.reveal_min_ms, qd.reveal_max_ms);
                let delay = self.rng.range_u64_inclusive(lo.min(hi), lo.max(hi));
                self.timers.schedule(now_ms + delay, TimerKind::Signal);
                Ok(())
            }
            GameMode::Pong => {
                let params = self.config.pong.physics.clone();
                let seed = self.rng.next_u32();
                let Some(m) = self.pong.as_mut() else {
                    return self.reset_to_lobby();
                };
                m.sim = Some(PongSim::new(params, seed));
                m.last_step_ms = now_ms;
                m.next_snapshot_ms = now_ms;
                self.resolver = RoundResolver::open_duel(m.left.clone(), m.right.clone());
                self.enter(Phase::Active)
            }
            GameMode::Chat => Ok(()),
        }
    }

    fn claim(
        &mut self,
        from: &ParticipantId,
        claim: Claim,
        now_ms: u64,
    ) -> Result<(), SessionError> {
        match self.resolver.resolve(from, claim, now_ms) {
            Verdict::Winner { winner, reason } => self.round_won(winner, reason, now_ms),
            Verdict::Ignored(Ignored::NotContestant) => {
                Err(SessionError::NotContestant(from.clone()))
            }
            Verdict::Ignored(why) => {
                debug!(room = %self.room, participant = %from, ?why, "claim ignored");
                Ok(())
            }
        }
    }

    fn round_won(
        &mut self,
        winner: ParticipantId,
        reason: WinReason<ParticipantId>,
        now_ms: u64,
    ) -> Result<(), SessionError> {
        self.timers.invalidate();
        self.resolver.lock();
        self.enter(Phase::Resolved)?;
        let name = self.directory.name_of(&winner);
        info!(room = %self.room, round = self.round.0, winner = %winner, reason = ?reason, "round won");

        let award = self.scores.award(&winner);
        let (Award::Continue(total) | Award::MatchPoint(total)) = award;
        self.directory.set_score(&winner, total);

        match self.mode {
            GameMode::MazeRace => {
                self.announce_round(&winner, &name, reason, self.scores.to_map());
                match award {
                    Award::MatchPoint(_) => {
                        info!(room = %self.room, winner = %winner, "match won");
                        self.relay.broadcast(&ServerMessage::MatchWinner {
                            winner,
                            name,
                            scores: self.scores.to_map(),
                        });
                        self.timers
                            .schedule(now_ms + self.config.maze.reset_delay_ms, TimerKind::ResetToLobby);
                    }
                    Award::Continue(_) => {
                        self.timers.schedule(
                            now_ms + self.config.maze.next_round_delay_ms,
                            TimerKind::NextRound,
                        );
                    }
                }
                Ok(())
            }
            GameMode::QuickDraw => {
                let Some(duel) = self.duel.as_mut() else {
                    return Ok(());
                };
                let award = duel.scores.award(&winner);
                let duel_scores = duel.scores.to_map();
                self.announce_round(&winner, &name, reason, duel_scores);
                match award {
                    Award::MatchPoint(_) => self.finish_duel(winner, now_ms),
                    Award::Continue(_) => {
                        self.timers.schedule(
                            now_ms + self.config.quick_draw.result_delay_ms,
                            TimerKind::NextRound,
                        );
                        Ok(())
                    }
                }
            }
            // Pong points come from the simulation, not from claims.
            GameMode::Pong | GameMode::Chat => Ok(()),
        }
    }

    fn announce_round(
        &mut self,
        winner: &ParticipantId,
        name: &str,
        reason: WinReason<ParticipantId>,
        scores: BTreeMap<ParticipantId, u32>,
    ) {
        self.relay.broadcast(&ServerMessage::RoundWinner {
            round: self.round,
            winner: winner.clone(),
            name: name.to_string(),
            reason,
            scores,
            revision: self.directory.revision(),
        });
        self.broadcast_players();
    }

    /// A duel contestant or pong player left mid-match: the opponent wins.
    fn forfeit(&mut self, leaver: &ParticipantId, now_ms: u64) -> Result<(), SessionError> {
        let opponent = match self.mode {
            GameMode::QuickDraw => self.duel.as_ref().and_then(|d| d.opponent_of(leaver)),
            // A resolved pong match is already decided.
            GameMode::Pong if self.phase() == Phase::Resolved => None,
            GameMode::Pong => self.pong.as_ref().and_then(|m| m.opponent_of(leaver)),
            GameMode::MazeRace | GameMode::Chat => None,
        };
        let Some(opponent) = opponent else {
            // Not playing right now; make sure a future bracket entry
            // doesn't wait for them.
            if let Some(bracket) = self.bracket.as_mut() {
                bracket.withdraw(leaver);
            }
            return Ok(());
        };
        warn!(room = %self.room, participant = %leaver, winner = %opponent, "contestant left; match forfeited");
        self.timers.invalidate();
        self.resolver.lock();
        if self.phase() != Phase::Resolved {
            self.enter(Phase::Resolved)?;
        }
        let name = self.directory.name_of(&opponent);
        let reason = WinReason::Forfeit { by: leaver.clone() };
        match self.mode {
            GameMode::QuickDraw => {
                let scores = self.duel.as_ref().map(|d| d.scores.to_map()).unwrap_or_default();
                self.announce_round(&opponent, &name, reason, scores);
                if let Some(bracket) = self.bracket.as_mut() {
                    bracket.withdraw(leaver);
                }
                if let Some(duel) = self.duel.take() {
                    self.relay.broadcast(&ServerMessage::MatchResult {
                        winner: opponent.clone(),
                        loser: leaver.clone(),
                        name,
                        winner_score: duel.scores.get(&opponent),
                        loser_score: duel.scores.get(leaver),
                    });
                }
                self.timers.schedule(
                    now_ms + self.config.quick_draw.result_delay_ms,
                    TimerKind::NextDuel,
                );
            }
            GameMode::Pong => {
                let scores = self.pong.as_ref().map(PongMatch::scores).unwrap_or_default();
                self.announce_round(&opponent, &name, reason, scores);
                self.finish_pong(opponent, now_ms);
            }
            GameMode::MazeRace | GameMode::Chat => {}
        }
        Ok(())
    }

    /// Everyone back to the lobby, unready, scores zeroed.
    fn reset_to_lobby(&mut self) -> Result<(), SessionError> {
        self.timers.invalidate();
        self.resolver = RoundResolver::closed();
        self.layout = None;
        self.bracket = None;
        self.duel = None;
        self.pong = None;
        self.scores.reset();
        self.enter(Phase::Lobby)?;
        let revision = self.directory.reset_all();
        self.relay.broadcast(&ServerMessage::Reset {
            revision,
            players: self.directory.snapshot(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Quick-draw tournament
    // -----------------------------------------------------------------------

    fn start_tournament(&mut self, now_ms: u64) -> Result<(), SessionError> {
        let Some(bracket) = Bracket::seeded(self.directory.ids(), &mut self.rng) else {
            return Ok(());
        };
        self.enter(Phase::Bracket)?;
        self.broadcast_bracket(&bracket);
        self.bracket = Some(bracket);
        self.timers.schedule(
            now_ms + self.config.quick_draw.bracket_reveal_ms,
            TimerKind::NextDuel,
        );
        Ok(())
    }

    fn broadcast_bracket(&mut self, bracket: &Bracket<ParticipantId>) {
        self.relay.broadcast(&ServerMessage::BracketUpdate {
            bracket_round: bracket.round,
            entries: bracket.entries.clone(),
        });
    }

    fn next_duel(&mut self, now_ms: u64) -> Result<(), SessionError> {
        let Some(mut bracket) = self.bracket.take() else {
            return self.reset_to_lobby();
        };
        let departed: Vec<ParticipantId> = bracket
            .entries
            .iter()
            .flat_map(|e: &BracketEntry<ParticipantId>| [Some(&e.left), e.right.as_ref()])
            .flatten()
            .filter(|id| !self.directory.contains(id))
            .cloned()
            .collect();
        for id in &departed {
            bracket.withdraw(id);
        }
        if self.phase() != Phase::Bracket {
            self.enter(Phase::Bracket)?;
        }

        if let Some(entry) = bracket.next_pending() {
            let e = &bracket.entries[entry];
            let left = e.left.clone();
            let right = e.right.clone();
            self.bracket = Some(bracket);
            return match right {
                Some(right) => self.start_duel(entry, left, right, now_ms),
                // Byes are decided on creation and never pending.
                None => Ok(()),
            };
        }

        match bracket.advance() {
            Some(Progress::Next(next)) => {
                self.broadcast_bracket(&next);
                self.bracket = Some(next);
                self.timers.schedule(
                    now_ms + self.config.quick_draw.bracket_reveal_ms,
                    TimerKind::NextDuel,
                );
            }
            Some(Progress::Champion(winner)) => {
                let name = self.directory.name_of(&winner);
                info!(room = %self.room, winner = %winner, "champion");
                self.relay
                    .broadcast(&ServerMessage::Champion { winner, name });
                self.bracket = Some(bracket);
                self.timers.schedule(
                    now_ms + self.config.quick_draw.reset_delay_ms,
                    TimerKind::ResetToLobby,
                );
            }
            None => self.bracket = Some(bracket),
        }
        Ok(())
    }

    fn start_duel(
        &mut self,
        entry: usize,
        left: ParticipantId,
        right: ParticipantId,
        now_ms: u64,
    ) -> Result<(), SessionError> {
        let points_to_win = self.config.quick_draw.points_to_win;
        let mut scores = ScoreTable::new(points_to_win);
        scores.insert(left.clone());
        scores.insert(right.clone());
        self.relay.broadcast(&ServerMessage::PrepareMatch {
            left: left.clone(),
            right: right.clone(),
            left_name: self.directory.name_of(&left),
            right_name: self.directory.name_of(&right),
            points_to_win,
        });
        info!(room = %self.room, left = %left, right = %right, "duel");
        self.duel = Some(Duel {
            entry,
            left,
            right,
            scores,
        });
        self.start_countdown(now_ms)
    }

    fn finish_duel(&mut self, winner: ParticipantId, now_ms: u64) -> Result<(), SessionError> {
        let Some(duel) = self.duel.take() else {
            return Ok(());
        };
        let loser = duel.opponent_of(&winner).unwrap_or_else(|| duel.right.clone());
        info!(room = %self.room, winner = %winner, loser = %loser, "duel won");
        self.relay.broadcast(&ServerMessage::MatchResult {
            winner: winner.clone(),
            loser: loser.clone(),
            name: self.directory.name_of(&winner),
            winner_score: duel.scores.get(&winner),
            loser_score: duel.scores.get(&loser),
        });
        if let Some(bracket) = self.bracket.as_mut() {
            bracket.record_winner(duel.entry, winner)?;
        }
        self.timers.schedule(
            now_ms + self.config.quick_draw.result_delay_ms,
            TimerKind::NextDuel,
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pong
    // -----------------------------------------------------------------------

    fn start_pong(&mut self, now_ms: u64) -> Result<(), SessionError> {
        let ids = self.directory.ids();
        let (Some(left), Some(right)) = (ids.first(), ids.get(1)) else {
            return Ok(());
        };
        self.relay.broadcast(&ServerMessage::PongStart {
            left: left.clone(),
            right: right.clone(),
            params: self.config.pong.physics.clone(),
        });
        self.pong = Some(PongMatch {
            left: left.clone(),
            right: right.clone(),
            sim: None,
            seq: 0,
            last_step_ms: now_ms,
            next_snapshot_ms: now_ms,
        });
        self.start_countdown(now_ms)
    }

    fn step_pong(&mut self, now_ms: u64) -> Result<(), SessionError> {
        if self.mode != GameMode::Pong || self.phase() != Phase::Active {
            return Ok(());
        }
        let interval = self.config.pong.snapshot_interval_ms;
        let target = self.config.pong.points_to_win;
        let Some(m) = self.pong.as_mut() else {
            return Ok(());
        };
        let Some(sim) = m.sim.as_mut() else {
            return Ok(());
        };
        let dt_ms = now_ms.saturating_sub(m.last_step_ms);
        m.last_step_ms = now_ms;
        let scored = sim
            .advance(dt_ms as f64 / 1000.0)
            .into_iter()
            .any(|e| matches!(e, PongEvent::Point { .. }));
        let [left_score, right_score] = sim.state().scores;
        let snapshot = if scored || now_ms >= m.next_snapshot_ms {
            m.seq += 1;
            m.next_snapshot_ms = now_ms + interval;
            Some(ServerMessage::PongSnapshot {
                seq: m.seq,
                state: sim.state().clone(),
            })
        } else {
            None
        };
        let (left, right) = (m.left.clone(), m.right.clone());

        if let Some(snapshot) = snapshot {
            self.relay.broadcast(&snapshot);
        }
        if !scored {
            return Ok(());
        }
        self.directory.set_score(&left, left_score);
        self.directory.set_score(&right, right_score);
        self.broadcast_players();
        let winner = if left_score >= target {
            left
        } else if right_score >= target {
            right
        } else {
            return Ok(());
        };
        self.timers.invalidate();
        self.resolver.lock();
        self.enter(Phase::Resolved)?;
        self.finish_pong(winner, now_ms);
        Ok(())
    }

    fn finish_pong(&mut self, winner: ParticipantId, now_ms: u64) {
        let scores = self.pong.as_ref().map(PongMatch::scores).unwrap_or_default();
        let name = self.directory.name_of(&winner);
        info!(room = %self.room, winner = %winner, "match won");
        self.relay.broadcast(&ServerMessage::MatchWinner {
            winner,
            name,
            scores,
        });
        self.timers.schedule(
            now_ms + self.config.pong.reset_delay_ms,
            TimerKind::ResetToLobby,
        );
    }
}
