// Data-driven arcade configuration.
//
// Every tunable number the host session and the local simulations read lives
// in `ArcadeConfig`: room capacity, per-mode round timings, match targets,
// avatar and pong physics, and the liveness ping interval. The session never
// hard-codes a delay; it reads it from here.
//
// Every section and every field has a default, so a config file only needs
// the values it changes (`{"pong": {"points_to_win": 3}}` is a complete
// config). `load` reads JSON from disk; `validate` rejects values the session
// cannot run with.
//
// See also: `avatar.rs` for `AvatarParams`, `pong.rs` for `PongParams`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::avatar::AvatarParams;
use crate::maze::MAX_CELLS;
use crate::pong::PongParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeConfig {
    pub room: RoomConfig,
    pub maze: MazeConfig,
    pub quick_draw: QuickDrawConfig,
    pub pong: PongConfig,
    pub liveness: LivenessConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Participants including the host.
    pub max_players: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { max_players: 8 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    pub width: u32,
    pub height: u32,
    /// Pixel size of one cell; shipped to guests for rendering.
    pub cell_size: u32,
    pub points_to_win: u32,
    pub countdown_ms: u64,
    /// How long before the countdown ends the host ships the maze content,
    /// so guests have it in hand when the round opens.
    pub content_lead_ms: u64,
    pub next_round_delay_ms: u64,
    pub reset_delay_ms: u64,
    pub avatar: AvatarParams,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            width: 31,
            height: 21,
            cell_size: 26,
            points_to_win: 8,
            countdown_ms: 5000,
            content_lead_ms: 200,
            next_round_delay_ms: 2600,
            reset_delay_ms: 3500,
            avatar: AvatarParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickDrawConfig {
    /// Round wins needed to take one duel.
    pub points_to_win: u32,
    pub countdown_ms: u64,
    pub reveal_min_ms: u64,
    pub reveal_max_ms: u64,
    /// Pause after a round result before the next round of the same duel.
    pub result_delay_ms: u64,
    /// Pause on the bracket view before the next duel starts.
    pub bracket_reveal_ms: u64,
    pub reset_delay_ms: u64,
}

impl Default for QuickDrawConfig {
    fn default() -> Self {
        Self {
            points_to_win: 3,
            countdown_ms: 3000,
            reveal_min_ms: 1500,
            reveal_max_ms: 4000,
            result_delay_ms: 2500,
            bracket_reveal_ms: 2000,
            reset_delay_ms: 5000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PongConfig {
    pub points_to_win: u32,
    pub countdown_ms: u64,
    pub snapshot_interval_ms: u64,
    /// Guests resend unchanged paddle input no more often than this.
    pub input_interval_ms: u64,
    pub reset_delay_ms: u64,
    pub physics: PongParams,
}

impl Default for PongConfig {
    fn default() -> Self {
        Self {
            points_to_win: 7,
            countdown_ms: 3000,
            snapshot_interval_ms: 33,
            input_interval_ms: 80,
            reset_delay_ms: 3500,
            physics: PongParams::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub ping_interval_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 1000,
        }
    }
}

impl ArcadeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.room.max_players < 2 {
            return invalid("room.max_players must be at least 2");
        }
        if self.maze.width < 2 || self.maze.height < 2 {
            return invalid("maze grid must be at least 2x2");
        }
        if u64::from(self.maze.width) * u64::from(self.maze.height) > u64::from(MAX_CELLS) {
            return Err(ConfigError::Invalid(format!(
                "maze grid {}x{} exceeds {MAX_CELLS} cells",
                self.maze.width, self.maze.height
            )));
        }
        if self.maze.content_lead_ms > self.maze.countdown_ms {
            return invalid("maze.content_lead_ms exceeds maze.countdown_ms");
        }
        if self.quick_draw.reveal_min_ms > self.quick_draw.reveal_max_ms {
            return invalid("quick_draw.reveal_min_ms exceeds reveal_max_ms");
        }
        if self.pong.physics.step_hz == 0 {
            return invalid("pong.physics.step_hz must be non-zero");
        }
        if self.pong.snapshot_interval_ms == 0 {
            return invalid("pong.snapshot_interval_ms must be non-zero");
        }
        if self.liveness.ping_interval_ms == 0 {
            return invalid("liveness.ping_interval_ms must be non-zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ArcadeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.maze.points_to_win, 8);
        assert_eq!(config.maze.countdown_ms, 5000);
        assert_eq!(config.quick_draw.points_to_win, 3);
        assert_eq!(config.pong.points_to_win, 7);
    }

    #[test]
    fn default_config_serializes() {
        let config = ArcadeConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = ArcadeConfig::from_json_str(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config =
            ArcadeConfig::from_json_str(r#"{"pong": {"points_to_win": 3}, "maze": {"width": 9}}"#)
                .unwrap();
        assert_eq!(config.pong.points_to_win, 3);
        assert_eq!(config.pong.snapshot_interval_ms, 33);
        assert_eq!(config.maze.width, 9);
        assert_eq!(config.maze.height, 21);
        assert_eq!(config.room.max_players, 8);
    }

    #[test]
    fn rejects_inverted_reveal_window() {
        let err = ArcadeConfig::from_json_str(
            r#"{"quick_draw": {"reveal_min_ms": 5000, "reveal_max_ms": 100}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_grid_too_large_to_ship() {
        let err = ArcadeConfig::from_json_str(r#"{"maze": {"width": 50, "height": 40}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        // Huge dimensions must not overflow the product.
        let mut config = ArcadeConfig::default();
        config.maze.width = u32::MAX;
        config.maze.height = u32::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_grid_at_cell_limit() {
        let config =
            ArcadeConfig::from_json_str(r#"{"maze": {"width": 40, "height": 30}}"#).unwrap();
        assert_eq!(config.maze.width * config.maze.height, MAX_CELLS);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ArcadeConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ArcadeConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
