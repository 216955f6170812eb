// Seeded maze generation and start/goal placement.
//
// A maze is a `width x height` grid of cells, each with four removable walls.
// Generation is a randomized depth-first spanning-tree carve driven by
// `Mulberry32`, so every cell is reachable from every other cell by
// construction. Start/goal placement then picks a random edge cell as start,
// runs a BFS to get graph distances, and picks the goal uniformly among the
// cells at least `max(8, floor(0.75 * eccentricity))` steps away.
//
// The carving order, neighbor enumeration order, BFS neighbor order and the
// order in which random numbers are consumed all match the browser builds, so
// `MazeLayout::generate(31, 21, 26, seed)` produces exactly the maze a browser
// host would have produced from `seed`. The host still ships the full wall
// grid to guests rather than the seed alone; guests never regenerate.
//
// See also: `avatar.rs` for movement inside a generated maze,
// `arcade_protocol::message::ServerMessage::StartRound` for the wire form.

use std::collections::VecDeque;

use arcade_prng::Mulberry32;
use serde::{Deserialize, Serialize};

/// Minimum BFS distance between start and goal when the maze allows it.
pub const MIN_GOAL_DISTANCE: u32 = 8;

/// Largest grid (in cells) a room may be configured with. A cell costs at
/// most 42 bytes of JSON, so a full layout stays under the 64 KiB wire frame.
pub const MAX_CELLS: u32 = 1200;

/// Salt applied to the round seed for the start/goal generator, so placement
/// draws from a stream independent of the carve.
const PLACEMENT_SEED_MUL: u32 = 99_991;
const PLACEMENT_SEED_ADD: u32 = 7;

/// One of the four walls of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    North,
    East,
    South,
    West,
}

/// Wall flags for one cell. `true` means the wall is present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellWalls {
    pub n: bool,
    pub e: bool,
    pub s: bool,
    pub w: bool,
}

impl CellWalls {
    pub const CLOSED: Self = Self {
        n: true,
        e: true,
        s: true,
        w: true,
    };

    pub fn has(self, side: Side) -> bool {
        match side {
            Side::North => self.n,
            Side::East => self.e,
            Side::South => self.s,
            Side::West => self.w,
        }
    }

    fn open(&mut self, side: Side) {
        match side {
            Side::North => self.n = false,
            Side::East => self.e = false,
            Side::South => self.s = false,
            Side::West => self.w = false,
        }
    }

    /// Compact bit form (n=1, e=2, s=4, w=8), handy for golden tests.
    pub fn bits(self) -> u8 {
        u8::from(self.n) | u8::from(self.e) << 1 | u8::from(self.s) << 2 | u8::from(self.w) << 3
    }
}

/// Grid coordinate of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
}

impl Cell {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Carving directions in the order the generator enumerates them:
/// (dx, dy, wall removed on the current cell, wall removed on the neighbor).
const CARVE_DIRS: [(i64, i64, Side, Side); 4] = [
    (0, -1, Side::North, Side::South),
    (1, 0, Side::East, Side::West),
    (0, 1, Side::South, Side::North),
    (-1, 0, Side::West, Side::East),
];

/// A carved wall grid, `cells[y][x]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<Vec<CellWalls>>,
}

impl Maze {
    /// Carve a spanning-tree maze from `seed`.
    ///
    /// Panics if either dimension is zero.
    pub fn carve(width: u32, height: u32, seed: u32) -> Self {
        assert!(width > 0 && height > 0, "maze dimensions must be non-zero");
        let (w, h) = (width as usize, height as usize);
        let mut rng = Mulberry32::new(seed);
        let mut cells = vec![vec![CellWalls::CLOSED; w]; h];
        let mut visited = vec![vec![false; w]; h];

        let sx = rng.pick_index(w);
        let sy = rng.pick_index(h);
        let mut stack = vec![(sx, sy)];
        visited[sy][sx] = true;

        let mut candidates: Vec<(usize, usize, Side, Side)> = Vec::with_capacity(4);
        while let Some(&(cx, cy)) = stack.last() {
            candidates.clear();
            for &(dx, dy, here, there) in &CARVE_DIRS {
                let nx = cx as i64 + dx;
                let ny = cy as i64 + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if !visited[ny][nx] {
                    candidates.push((nx, ny, here, there));
                }
            }
            if candidates.is_empty() {
                stack.pop();
                continue;
            }
            let (nx, ny, here, there) = candidates[rng.pick_index(candidates.len())];
            cells[cy][cx].open(here);
            cells[ny][nx].open(there);
            visited[ny][nx] = true;
            stack.push((nx, ny));
        }

        Self {
            width,
            height,
            cells,
        }
    }

    pub fn walls(&self, cell: Cell) -> Option<CellWalls> {
        self.cells
            .get(cell.y as usize)
            .and_then(|row| row.get(cell.x as usize))
            .copied()
    }

    /// BFS step distance from `from` to every cell; `None` for unreachable
    /// cells (never the case for a carved maze). Neighbors are visited in
    /// N, S, W, E order.
    pub fn distances_from(&self, from: Cell) -> Vec<Vec<Option<u32>>> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut dist = vec![vec![None; w]; h];
        let (fx, fy) = (from.x as usize, from.y as usize);
        if fx >= w || fy >= h {
            return dist;
        }
        dist[fy][fx] = Some(0);
        let mut queue = VecDeque::from([(fx, fy)]);
        while let Some((x, y)) = queue.pop_front() {
            let d = dist[y][x].unwrap_or(0);
            let c = self.cells[y][x];
            let mut visit = |nx: usize, ny: usize, dist: &mut Vec<Vec<Option<u32>>>| {
                if dist[ny][nx].is_none() {
                    dist[ny][nx] = Some(d + 1);
                    queue.push_back((nx, ny));
                }
            };
            if !c.n && y > 0 {
                visit(x, y - 1, &mut dist);
            }
            if !c.s && y + 1 < h {
                visit(x, y + 1, &mut dist);
            }
            if !c.w && x > 0 {
                visit(x - 1, y, &mut dist);
            }
            if !c.e && x + 1 < w {
                visit(x + 1, y, &mut dist);
            }
        }
        dist
    }

    /// Pick start (a random edge cell) and goal (a random far-enough cell)
    /// for this maze. `seed` is the same seed the maze was carved from.
    pub fn place_start_goal(&self, seed: u32) -> (Cell, Cell) {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut rng = Mulberry32::new(
            seed.wrapping_mul(PLACEMENT_SEED_MUL)
                .wrapping_add(PLACEMENT_SEED_ADD),
        );

        let (sx, sy) = match rng.pick_index(4) {
            0 => (rng.pick_index(w), 0),
            1 => (w - 1, rng.pick_index(h)),
            2 => (rng.pick_index(w), h - 1),
            _ => (0, rng.pick_index(h)),
        };
        let start = Cell::new(sx as u32, sy as u32);
        let dist = self.distances_from(start);

        let mut farthest = (start, 0u32);
        for (y, row) in dist.iter().enumerate() {
            for (x, d) in row.iter().enumerate() {
                match *d {
                    Some(d) if d > farthest.1 => farthest = (Cell::new(x as u32, y as u32), d),
                    _ => {}
                }
            }
        }

        let threshold = goal_threshold(farthest.1);
        let candidates: Vec<Cell> = dist
            .iter()
            .enumerate()
            .flat_map(|(y, row)| {
                row.iter().enumerate().filter_map(move |(x, d)| match d {
                    Some(d) if *d >= threshold => Some(Cell::new(x as u32, y as u32)),
                    _ => None,
                })
            })
            .collect();

        let goal = if candidates.is_empty() {
            farthest.0
        } else {
            candidates[rng.pick_index(candidates.len())]
        };
        (start, goal)
    }
}

/// Minimum start→goal distance for a maze whose farthest cell from the start
/// is `eccentricity` steps away.
pub fn goal_threshold(eccentricity: u32) -> u32 {
    MIN_GOAL_DISTANCE.max(eccentricity * 3 / 4)
}

/// Complete content for one maze round, exactly as shipped to guests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeLayout {
    pub seed: u32,
    pub cell_size: u32,
    pub maze: Maze,
    pub start: Cell,
    pub goal: Cell,
}

impl MazeLayout {
    pub fn generate(width: u32, height: u32, cell_size: u32, seed: u32) -> Self {
        let maze = Maze::carve(width, height, seed);
        let (start, goal) = maze.place_start_goal(seed);
        Self {
            seed,
            cell_size,
            maze,
            start,
            goal,
        }
    }

    /// BFS distance from start to goal.
    pub fn path_length(&self) -> Option<u32> {
        let dist = self.maze.distances_from(self.start);
        dist[self.goal.y as usize][self.goal.x as usize]
    }

    /// Largest BFS distance from the start cell to any cell.
    pub fn eccentricity(&self) -> u32 {
        self.maze
            .distances_from(self.start)
            .iter()
            .flatten()
            .filter_map(|d| *d)
            .max()
            .unwrap_or(0)
    }
}
