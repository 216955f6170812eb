// Avatar movement inside a maze.
//
// Each peer moves only its own avatar, against the wall grid the host
// shipped, and decides locally when it has reached the goal. Positions are in
// cell units (cell (x, y) spans [x, x+1) x [y, y+1)); the avatar is a circle
// of `radius` that may not overlap a present wall of the cell its centre is
// in, nor leave the grid.
//
// Movement is attempted per axis (x first, then y) so sliding along a wall
// works without any contact solver.

use serde::{Deserialize, Serialize};

use crate::maze::{Cell, MazeLayout};

/// Movement tuning, part of `MazeConfig`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarParams {
    /// Collision radius in cell units.
    pub radius: f64,
    /// Speed in cells per second.
    pub speed: f64,
    /// Distance from the goal centre that counts as arrival.
    pub goal_radius: f64,
    /// Largest frame delta integrated in one step, in seconds.
    pub max_dt: f64,
}

impl Default for AvatarParams {
    fn default() -> Self {
        Self {
            radius: 0.28,
            speed: 3.1,
            goal_radius: 0.35,
            max_dt: 0.033,
        }
    }
}

/// Directional input for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Avatar {
    pub x: f64,
    pub y: f64,
    arrived: bool,
}

impl Avatar {
    /// Place an avatar at the centre of the layout's start cell.
    pub fn at_start(layout: &MazeLayout) -> Self {
        Self::at_cell(layout.start)
    }

    pub fn at_cell(cell: Cell) -> Self {
        Self {
            x: f64::from(cell.x) + 0.5,
            y: f64::from(cell.y) + 0.5,
            arrived: false,
        }
    }

    pub fn has_arrived(&self) -> bool {
        self.arrived
    }

    /// Whether a circle of `params.radius` centred at `(px, py)` fits.
    pub fn can_occupy(layout: &MazeLayout, params: &AvatarParams, px: f64, py: f64) -> bool {
        let r = params.radius;
        let w = f64::from(layout.maze.width);
        let h = f64::from(layout.maze.height);
        if px < r || py < r || px > w - r || py > h - r {
            return false;
        }
        let cx = px.floor();
        let cy = py.floor();
        let Some(walls) = layout.maze.walls(Cell::new(cx as u32, cy as u32)) else {
            return false;
        };
        let lx = px - cx;
        let ly = py - cy;
        !((walls.n && ly - r < 0.0)
            || (walls.s && ly + r > 1.0)
            || (walls.w && lx - r < 0.0)
            || (walls.e && lx + r > 1.0))
    }

    /// Integrate one frame. Returns `true` exactly once: on the frame the
    /// avatar first comes within `goal_radius` of the goal centre.
    pub fn step(
        &mut self,
        layout: &MazeLayout,
        params: &AvatarParams,
        input: MoveInput,
        dt: f64,
    ) -> bool {
        let dt = dt.clamp(0.0, params.max_dt);
        let mut vx = 0.0;
        let mut vy = 0.0;
        if input.up {
            vy -= 1.0;
        }
        if input.down {
            vy += 1.0;
        }
        if input.left {
            vx -= 1.0;
        }
        if input.right {
            vx += 1.0;
        }
        let len = f64::hypot(vx, vy);
        if len > 0.0 {
            vx /= len;
            vy /= len;
        }

        let nx = self.x + vx * params.speed * dt;
        if Self::can_occupy(layout, params, nx, self.y) {
            self.x = nx;
        }
        let ny = self.y + vy * params.speed * dt;
        if Self::can_occupy(layout, params, self.x, ny) {
            self.y = ny;
        }

        if self.arrived {
            return false;
        }
        let gx = f64::from(layout.goal.x) + 0.5;
        let gy = f64::from(layout.goal.y) + 0.5;
        if f64::hypot(self.x - gx, self.y - gy) < params.goal_radius {
            self.arrived = true;
            return true;
        }
        false
    }
}
