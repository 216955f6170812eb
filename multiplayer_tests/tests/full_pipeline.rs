// End-to-end integration tests for the arcade pipeline.
//
// Each test starts a real host server, connects real `NetClient` instances
// (via `TestGuest`), and verifies the full path:
// host -> ready -> countdown -> content -> local play -> claim -> result.
//
// Timings are shortened through `ArcadeConfig` so a round takes a fraction
// of a second; everything else is the production configuration.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use arcade_protocol::room::RoomCode;
use arcade_protocol::{GameMode, Phase, ServerMessage};
use arcade_relay::ClientError;
use arcade_relay::server::{HostConfig, HostHandle, start_host};
use arcade_sim::config::ArcadeConfig;
use arcade_sim::outcome::WinReason;
use multiplayer_tests::{TestGuest, walk_to_goal};

fn fast_config() -> ArcadeConfig {
    let mut config = ArcadeConfig::default();
    config.maze.width = 11;
    config.maze.height = 9;
    config.maze.countdown_ms = 300;
    config.maze.content_lead_ms = 150;
    config.maze.next_round_delay_ms = 200;
    config.maze.reset_delay_ms = 200;
    config.quick_draw.countdown_ms = 200;
    config.quick_draw.reveal_min_ms = 2000;
    config.quick_draw.reveal_max_ms = 2000;
    config.quick_draw.result_delay_ms = 200;
    config.quick_draw.bracket_reveal_ms = 100;
    config.pong.countdown_ms = 200;
    config
}

/// Start a host on a random port and connect the host participant plus one
/// guest, both past the initial snapshots.
fn start_room(mode: GameMode, config: ArcadeConfig) -> (HostHandle, SocketAddr, TestGuest, TestGuest) {
    let mut host_config = HostConfig::new(RoomCode::parse("PIPE").unwrap(), mode);
    host_config.port = 0;
    host_config.seed = 2024;
    host_config.config = config;
    let (handle, addr) = start_host(host_config).unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut host = TestGuest::connect(addr, "Host");
    let mut guest = TestGuest::connect(addr, "Guest");
    host.wait_for_players(2);
    guest.wait_for_players(2);
    (handle, addr, host, guest)
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

#[test]
fn first_joiner_holds_host_authority() {
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::Chat, fast_config());
    assert_eq!(host.welcome.host, host.welcome.you);
    assert_eq!(guest.welcome.host, host.welcome.you);
    assert_ne!(guest.welcome.you, host.welcome.you);
    assert_eq!(guest.welcome.mode, GameMode::Chat);

    // Only the host participant may send everyone back to the lobby; the
    // host logs and drops the guest's request without disconnecting it.
    guest.client().back_to_lobby().unwrap();

    let id = guest.client().chat("  hello there ").unwrap();
    let relayed = host.wait_for("chat", |m| matches!(m, ServerMessage::ChatBroadcast { .. }));
    match relayed {
        ServerMessage::ChatBroadcast { from, name, text, .. } => {
            assert_eq!(from, guest.welcome.you);
            assert_eq!(name, "Guest");
            assert_eq!(text, "hello there");
        }
        _ => unreachable!(),
    }
    guest.wait_for("chat ack", |m| *m == ServerMessage::ChatAck { id: id.clone() });
    assert_eq!(host.mirror.phase(), Phase::Lobby);

    host.disconnect();
    handle.wait();
}

#[test]
fn maze_round_goes_to_the_first_goal() {
    let config = fast_config();
    let params = config.maze.avatar.clone();
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::MazeRace, config);

    host.ready();
    guest.ready();
    let round = guest.race(&params);
    assert!(guest.mirror.layout().is_some());

    let result = host.wait_for("round winner", |m| matches!(m, ServerMessage::RoundWinner { .. }));
    match result {
        ServerMessage::RoundWinner {
            round: r,
            winner,
            reason,
            scores,
            ..
        } => {
            assert_eq!(r, round);
            assert_eq!(winner, guest.welcome.you);
            assert_eq!(reason, WinReason::Goal);
            assert_eq!(scores.get(&guest.welcome.you), Some(&1));
        }
        _ => unreachable!(),
    }

    // A late claim for the same round changes nothing.
    host.client().goal(round).unwrap();
    let you = guest.welcome.you.clone();
    host.wait_until("guest score 1", |m| {
        m.players().iter().any(|p| p.id == you && p.score == 1)
    });
    thread::sleep(Duration::from_millis(50));
    host.pump();
    assert!(host.mirror.players().iter().all(|p| p.score <= 1));

    host.disconnect();
    handle.wait();
}

#[test]
fn late_join_is_locked_until_reset() {
    let (handle, addr, mut host, mut guest) = start_room(GameMode::MazeRace, fast_config());
    host.ready();
    guest.ready();
    host.wait_for("countdown", |m| matches!(m, ServerMessage::Countdown { .. }));

    match TestGuest::try_connect(addr, "Late") {
        Err(ClientError::Locked) => {}
        Err(other) => panic!("expected locked, got {other}"),
        Ok(_) => panic!("late join was admitted"),
    }

    host.client().back_to_lobby().unwrap();
    guest.wait_for("reset", |m| matches!(m, ServerMessage::Reset { .. }));
    assert_eq!(guest.mirror.phase(), Phase::Lobby);
    assert!(guest.mirror.players().iter().all(|p| !p.ready));

    let mut late = TestGuest::connect(addr, "Late");
    late.wait_for_players(3);

    host.disconnect();
    handle.wait();
}

#[test]
fn maze_match_ends_at_target_and_resets() {
    let mut config = fast_config();
    config.maze.points_to_win = 2;
    let params = config.maze.avatar.clone();
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::MazeRace, config);

    host.ready();
    guest.ready();
    for _ in 0..2 {
        host.race(&params);
        guest.wait_for("round winner", |m| matches!(m, ServerMessage::RoundWinner { .. }));
    }
    let champion = guest.wait_for("match winner", |m| {
        matches!(m, ServerMessage::MatchWinner { .. })
    });
    match champion {
        ServerMessage::MatchWinner { winner, scores, .. } => {
            assert_eq!(winner, host.welcome.you);
            assert_eq!(scores.get(&host.welcome.you), Some(&2));
        }
        _ => unreachable!(),
    }
    guest.wait_for("reset", |m| matches!(m, ServerMessage::Reset { .. }));
    assert!(guest.mirror.players().iter().all(|p| p.score == 0 && !p.ready));

    host.disconnect();
    handle.wait();
}

#[test]
fn quick_draw_false_start_awards_the_opponent() {
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::QuickDraw, fast_config());
    host.ready();
    guest.ready();

    guest.wait_for("bracket", |m| matches!(m, ServerMessage::BracketUpdate { .. }));
    guest.wait_for("prepare match", |m| matches!(m, ServerMessage::PrepareMatch { .. }));
    guest.wait_until("active", |m| m.phase() == Phase::Active);

    // The signal is 2 s away; jumping the gun loses the round.
    let round = guest.mirror.round();
    guest.client().false_start(round).unwrap();
    let result = host.wait_for("round winner", |m| matches!(m, ServerMessage::RoundWinner { .. }));
    match result {
        ServerMessage::RoundWinner { winner, reason, .. } => {
            assert_eq!(winner, host.welcome.you);
            assert_eq!(
                reason,
                WinReason::FalseStart {
                    by: guest.welcome.you.clone()
                }
            );
        }
        _ => unreachable!(),
    }
    assert!(!host.log.iter().any(|m| matches!(m, ServerMessage::Signal { .. })));

    host.disconnect();
    handle.wait();
}

#[test]
fn quick_draw_contestant_leaving_forfeits() {
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::QuickDraw, fast_config());
    host.ready();
    guest.ready();
    host.wait_until("active", |m| m.phase() == Phase::Active);

    guest.disconnect();
    let result = host.wait_for("forfeit", |m| matches!(m, ServerMessage::MatchResult { .. }));
    match result {
        ServerMessage::MatchResult { winner, loser, .. } => {
            assert_eq!(winner, host.welcome.you);
            assert_eq!(loser, guest.welcome.you);
        }
        _ => unreachable!(),
    }
    // With one entrant left the bracket crowns them.
    host.wait_for("champion", |m| matches!(m, ServerMessage::Champion { .. }));

    host.disconnect();
    handle.wait();
}

#[test]
fn pong_streams_host_snapshots() {
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::Pong, fast_config());
    host.ready();
    guest.ready();
    guest.wait_for("pong start", |m| matches!(m, ServerMessage::PongStart { .. }));
    guest.wait_until("active", |m| m.phase() == Phase::Active);

    assert!(guest.client().paddle(1).unwrap());
    // Unchanged input inside the throttle window is not resent.
    assert!(!guest.client().paddle(1).unwrap());

    let mut last_seq = 0;
    for _ in 0..5 {
        match guest.wait_for("snapshot", |m| matches!(m, ServerMessage::PongSnapshot { .. })) {
            ServerMessage::PongSnapshot { seq, .. } => {
                assert!(seq > last_seq);
                last_seq = seq;
            }
            _ => unreachable!(),
        }
    }
    assert!(guest.mirror.pong().is_some());

    host.client().back_to_lobby().unwrap();
    guest.wait_for("reset", |m| matches!(m, ServerMessage::Reset { .. }));
    assert!(guest.mirror.pong().is_none());

    host.disconnect();
    handle.wait();
}

#[test]
fn host_leaving_closes_the_room() {
    let (handle, _addr, mut host, mut guest) = start_room(GameMode::Chat, fast_config());
    host.disconnect();
    guest.wait_for("room closed", |m| *m == ServerMessage::RoomClosed);
    guest.wait_until("connection closed", |m| m.is_closed());
    handle.wait();
    thread::sleep(Duration::from_millis(50));
    assert!(guest.is_closed());
}

#[test]
fn generated_mazes_are_walkable() {
    let config = fast_config();
    for seed in [1, 2, 3, 99, 2024] {
        let layout = arcade_sim::maze::MazeLayout::generate(
            config.maze.width,
            config.maze.height,
            config.maze.cell_size,
            seed,
        );
        assert!(
            walk_to_goal(&layout, &config.maze.avatar).is_some(),
            "seed {seed} not walkable"
        );
    }
}
