// Session phase controller.
//
// The single place that decides (a) which client messages the host accepts
// in which phase for which game mode, and (b) which phase transitions are
// legal. `Session` consults `accepts` before dispatching any message and
// routes every phase change through `PhaseMachine::enter`; nothing else in
// the crate compares phases to decide acceptance.
//
// Transitions:
//
//   lobby -> countdown | bracket
//   bracket -> countdown
//   countdown -> active | resolved (a duel contestant left)
//   active -> resolved
//   resolved -> countdown | bracket
//   any -> lobby

use std::fmt;

use arcade_protocol::{ClientMessage, GameMode, Phase};

use crate::error::SessionError;

/// A client message's discriminant, without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Hello,
    Ready,
    Goal,
    ActionHit,
    ActionFalse,
    PaddleInput,
    Chat,
    Ping,
    Pong,
    BackToLobby,
    Goodbye,
}

impl MessageKind {
    pub fn of(msg: &ClientMessage) -> Self {
        match msg {
            ClientMessage::Hello { .. } => MessageKind::Hello,
            ClientMessage::Ready { .. } => MessageKind::Ready,
            ClientMessage::Goal { .. } => MessageKind::Goal,
            ClientMessage::ActionHit { .. } => MessageKind::ActionHit,
            ClientMessage::ActionFalse { .. } => MessageKind::ActionFalse,
            ClientMessage::PaddleInput { .. } => MessageKind::PaddleInput,
            ClientMessage::Chat { .. } => MessageKind::Chat,
            ClientMessage::Ping { .. } => MessageKind::Ping,
            ClientMessage::Pong { .. } => MessageKind::Pong,
            ClientMessage::BackToLobby => MessageKind::BackToLobby,
            ClientMessage::Goodbye => MessageKind::Goodbye,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Hello => "hello",
            MessageKind::Ready => "ready",
            MessageKind::Goal => "goal",
            MessageKind::ActionHit => "action_hit",
            MessageKind::ActionFalse => "action_false",
            MessageKind::PaddleInput => "paddle_input",
            MessageKind::Chat => "chat",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::BackToLobby => "back_to_lobby",
            MessageKind::Goodbye => "goodbye",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The acceptance table: may a message of `kind` be processed in `phase`
/// of a `mode` room?
pub fn accepts(mode: GameMode, phase: Phase, kind: MessageKind) -> bool {
    use MessageKind as K;
    match kind {
        K::Hello | K::Ready => phase == Phase::Lobby,
        K::Goal => mode == GameMode::MazeRace && phase == Phase::Active,
        K::ActionHit | K::ActionFalse => mode == GameMode::QuickDraw && phase == Phase::Active,
        K::PaddleInput => mode == GameMode::Pong && phase == Phase::Active,
        K::Chat | K::Ping | K::Pong | K::Goodbye => true,
        K::BackToLobby => phase != Phase::Lobby,
    }
}

pub fn can_transition(from: Phase, to: Phase) -> bool {
    use Phase as P;
    matches!(
        (from, to),
        (_, P::Lobby)
            | (P::Lobby, P::Countdown)
            | (P::Lobby, P::Bracket)
            | (P::Bracket, P::Countdown)
            | (P::Countdown, P::Active)
            | (P::Countdown, P::Resolved)
            | (P::Active, P::Resolved)
            | (P::Resolved, P::Countdown)
            | (P::Resolved, P::Bracket)
    )
}

#[derive(Debug)]
pub struct PhaseMachine {
    phase: Phase,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self { phase: Phase::Lobby }
    }
}

impl PhaseMachine {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn enter(&mut self, to: Phase) -> Result<(), SessionError> {
        if !can_transition(self.phase, to) {
            return Err(SessionError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHASES: [Phase; 5] = [
        Phase::Lobby,
        Phase::Bracket,
        Phase::Countdown,
        Phase::Active,
        Phase::Resolved,
    ];

    #[test]
    fn ready_only_in_lobby() {
        for phase in PHASES {
            assert_eq!(
                accepts(GameMode::MazeRace, phase, MessageKind::Ready),
                phase == Phase::Lobby
            );
        }
    }

    #[test]
    fn claims_only_in_their_mode_while_active() {
        assert!(accepts(GameMode::MazeRace, Phase::Active, MessageKind::Goal));
        assert!(!accepts(GameMode::MazeRace, Phase::Countdown, MessageKind::Goal));
        assert!(!accepts(GameMode::QuickDraw, Phase::Active, MessageKind::Goal));
        assert!(accepts(GameMode::QuickDraw, Phase::Active, MessageKind::ActionFalse));
        assert!(!accepts(GameMode::Pong, Phase::Active, MessageKind::ActionHit));
        assert!(accepts(GameMode::Pong, Phase::Active, MessageKind::PaddleInput));
        assert!(!accepts(GameMode::Pong, Phase::Resolved, MessageKind::PaddleInput));
    }

    #[test]
    fn chat_and_liveness_always_accepted() {
        for phase in PHASES {
            for kind in [
                MessageKind::Chat,
                MessageKind::Ping,
                MessageKind::Pong,
                MessageKind::Goodbye,
            ] {
                assert!(accepts(GameMode::Chat, phase, kind));
            }
        }
    }

    #[test]
    fn back_to_lobby_outside_lobby_only() {
        assert!(!accepts(GameMode::Pong, Phase::Lobby, MessageKind::BackToLobby));
        assert!(accepts(GameMode::Pong, Phase::Active, MessageKind::BackToLobby));
    }

    #[test]
    fn legal_round_cycle() {
        let mut m = PhaseMachine::default();
        for to in [
            Phase::Countdown,
            Phase::Active,
            Phase::Resolved,
            Phase::Countdown,
            Phase::Active,
            Phase::Resolved,
            Phase::Lobby,
        ] {
            m.enter(to).unwrap();
        }
        assert_eq!(m.phase(), Phase::Lobby);
    }

    #[test]
    fn illegal_transitions_are_errors() {
        let mut m = PhaseMachine::default();
        assert_eq!(
            m.enter(Phase::Active),
            Err(SessionError::IllegalTransition {
                from: Phase::Lobby,
                to: Phase::Active
            })
        );
        assert_eq!(m.phase(), Phase::Lobby);
        assert!(!can_transition(Phase::Active, Phase::Countdown));
        assert!(!can_transition(Phase::Countdown, Phase::Bracket));
        assert!(!can_transition(Phase::Lobby, Phase::Resolved));
        for from in PHASES {
            assert!(can_transition(from, Phase::Lobby));
        }
    }
}
