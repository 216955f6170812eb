// Host-authoritative pong physics.
//
// Only the host runs `PongSim`. It integrates at a fixed timestep through an
// accumulator (`advance` may be called with any frame delta) and exposes the
// whole `PongState`, which the host broadcasts as a snapshot every ~33 ms.
// Guests never step physics; they render the newest snapshot and send paddle
// intent (-1 / 0 / +1).
//
// Field coordinates: x in [0, field_width] left to right, y in
// [0, field_height] top to bottom. Paddles are identified by `PaddleSide`;
// each paddle's position is its centre y.
//
// Serve direction is toward the player who conceded the last point. The
// vertical component of every serve comes from the seeded generator, so a
// match replays identically given the same seed and inputs.

use arcade_prng::Mulberry32;
use serde::{Deserialize, Serialize};

/// Safety cap on physics steps per `advance` call, so a long stall (debugger,
/// suspended laptop) doesn't turn into a burst of thousands of steps.
const MAX_STEPS_PER_ADVANCE: u32 = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddleSide {
    Left,
    Right,
}

impl PaddleSide {
    pub fn index(self) -> usize {
        match self {
            PaddleSide::Left => 0,
            PaddleSide::Right => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            PaddleSide::Left => PaddleSide::Right,
            PaddleSide::Right => PaddleSide::Left,
        }
    }
}

/// Physics tuning, part of `PongConfig`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PongParams {
    pub field_width: f32,
    pub field_height: f32,
    pub paddle_height: f32,
    pub paddle_thickness: f32,
    /// Gap between the field edge and the back of each paddle.
    pub paddle_inset: f32,
    /// Paddle speed in field units per second.
    pub paddle_speed: f32,
    pub ball_radius: f32,
    pub serve_speed: f32,
    /// Multiplier applied to ball speed on every paddle hit.
    pub speedup: f32,
    pub max_ball_speed: f32,
    /// Largest deflection from horizontal, reached at the paddle tips.
    pub max_bounce_degrees: f32,
    /// Largest serve deflection from horizontal.
    pub max_serve_degrees: f32,
    pub step_hz: u32,
}

impl Default for PongParams {
    fn default() -> Self {
        Self {
            field_width: 100.0,
            field_height: 60.0,
            paddle_height: 12.0,
            paddle_thickness: 1.5,
            paddle_inset: 3.0,
            paddle_speed: 70.0,
            ball_radius: 1.0,
            serve_speed: 45.0,
            speedup: 1.05,
            max_ball_speed: 110.0,
            max_bounce_degrees: 60.0,
            max_serve_degrees: 30.0,
            step_hz: 120,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

/// Everything a guest needs to render one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PongState {
    pub ball: Ball,
    /// Paddle centre y, indexed by `PaddleSide::index`.
    pub paddles: [f32; 2],
    /// Current paddle intent, -1 (up), 0, or +1 (down).
    pub inputs: [i8; 2],
    pub scores: [u32; 2],
    /// Paddle hits in the current rally.
    pub rally: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PongEvent {
    PaddleHit(PaddleSide),
    WallBounce,
    Point { scorer: PaddleSide },
}

pub struct PongSim {
    params: PongParams,
    state: PongState,
    accumulator: f64,
    rng: Mulberry32,
}

impl PongSim {
    /// Create a match and serve the first ball toward a random side.
    pub fn new(params: PongParams, seed: u32) -> Self {
        let mut rng = Mulberry32::new(seed);
        let first = if rng.chance(0.5) {
            PaddleSide::Left
        } else {
            PaddleSide::Right
        };
        let mid = params.field_height / 2.0;
        let mut sim = Self {
            state: PongState {
                ball: Ball {
                    x: params.field_width / 2.0,
                    y: mid,
                    vx: 0.0,
                    vy: 0.0,
                },
                paddles: [mid, mid],
                inputs: [0, 0],
                scores: [0, 0],
                rally: 0,
            },
            params,
            accumulator: 0.0,
            rng,
        };
        sim.serve(first);
        sim
    }

    pub fn state(&self) -> &PongState {
        &self.state
    }

    pub fn params(&self) -> &PongParams {
        &self.params
    }

    pub fn step_seconds(&self) -> f64 {
        1.0 / f64::from(self.params.step_hz.max(1))
    }

    pub fn set_input(&mut self, side: PaddleSide, direction: i8) {
        self.state.inputs[side.index()] = direction.clamp(-1, 1);
    }

    /// Feed elapsed wall time; runs as many fixed steps as fit.
    pub fn advance(&mut self, dt_seconds: f64) -> Vec<PongEvent> {
        let step = self.step_seconds();
        self.accumulator += dt_seconds.max(0.0);
        let mut events = Vec::new();
        let mut steps = 0;
        while self.accumulator >= step && steps < MAX_STEPS_PER_ADVANCE {
            self.accumulator -= step;
            steps += 1;
            events.extend(self.step());
        }
        if steps == MAX_STEPS_PER_ADVANCE {
            self.accumulator = 0.0;
        }
        events
    }

    /// One fixed physics step.
    pub fn step(&mut self) -> Vec<PongEvent> {
        let dt = self.step_seconds() as f32;
        let p = &self.params;
        let half_paddle = p.paddle_height / 2.0;
        let mut events = Vec::new();

        for side in [PaddleSide::Left, PaddleSide::Right] {
            let i = side.index();
            let y = self.state.paddles[i] + f32::from(self.state.inputs[i]) * p.paddle_speed * dt;
            self.state.paddles[i] = y.clamp(half_paddle, p.field_height - half_paddle);
        }

        let r = p.ball_radius;
        let ball = &mut self.state.ball;
        ball.x += ball.vx * dt;
        ball.y += ball.vy * dt;

        if ball.y - r < 0.0 {
            ball.y = r;
            ball.vy = ball.vy.abs();
            events.push(PongEvent::WallBounce);
        } else if ball.y + r > p.field_height {
            ball.y = p.field_height - r;
            ball.vy = -ball.vy.abs();
            events.push(PongEvent::WallBounce);
        }

        let left_face = p.paddle_inset + p.paddle_thickness;
        let right_face = p.field_width - p.paddle_inset - p.paddle_thickness;
        let hit = if ball.vx < 0.0 && ball.x - r <= left_face && ball.x + r >= p.paddle_inset {
            Some(PaddleSide::Left)
        } else if ball.vx > 0.0
            && ball.x + r >= right_face
            && ball.x - r <= p.field_width - p.paddle_inset
        {
            Some(PaddleSide::Right)
        } else {
            None
        };
        if let Some(side) = hit {
            let paddle_y = self.state.paddles[side.index()];
            if (ball.y - paddle_y).abs() <= half_paddle + r {
                let offset = ((ball.y - paddle_y) / half_paddle).clamp(-1.0, 1.0);
                let angle = (offset * p.max_bounce_degrees).to_radians();
                let speed = (f32::hypot(ball.vx, ball.vy) * p.speedup).min(p.max_ball_speed);
                let dir = match side {
                    PaddleSide::Left => 1.0,
                    PaddleSide::Right => -1.0,
                };
                ball.vx = dir * speed * angle.cos();
                ball.vy = speed * angle.sin();
                ball.x = match side {
                    PaddleSide::Left => left_face + r,
                    PaddleSide::Right => right_face - r,
                };
                self.state.rally += 1;
                events.push(PongEvent::PaddleHit(side));
            }
        }

        let scorer = if self.state.ball.x + r < 0.0 {
            Some(PaddleSide::Right)
        } else if self.state.ball.x - r > self.params.field_width {
            Some(PaddleSide::Left)
        } else {
            None
        };
        if let Some(scorer) = scorer {
            self.state.scores[scorer.index()] += 1;
            events.push(PongEvent::Point { scorer });
            self.serve(scorer.opposite());
        }
        events
    }

    /// Reset the ball to the centre and launch it toward `toward`.
    fn serve(&mut self, toward: PaddleSide) {
        let p = &self.params;
        let deflection = (self.rng.next_f64() as f32 * 2.0 - 1.0) * p.max_serve_degrees;
        let angle = deflection.to_radians();
        let dir = match toward {
            PaddleSide::Left => -1.0,
            PaddleSide::Right => 1.0,
        };
        self.state.ball = Ball {
            x: p.field_width / 2.0,
            y: p.field_height / 2.0,
            vx: dir * p.serve_speed * angle.cos(),
            vy: p.serve_speed * angle.sin(),
        };
        self.state.rally = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_until_point(sim: &mut PongSim, max_steps: usize) -> Option<PaddleSide> {
        for _ in 0..max_steps {
            for event in sim.step() {
                if let PongEvent::Point { scorer } = event {
                    return Some(scorer);
                }
            }
        }
        None
    }

    #[test]
    fn same_seed_same_match() {
        let mut a = PongSim::new(PongParams::default(), 9);
        let mut b = PongSim::new(PongParams::default(), 9);
        for _ in 0..2000 {
            a.step();
            b.step();
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn accumulator_runs_fixed_steps() {
        let mut a = PongSim::new(PongParams::default(), 3);
        let mut b = PongSim::new(PongParams::default(), 3);
        // 10 steps worth of time delivered in uneven chunks.
        let step = a.step_seconds();
        for dt in [step * 2.5, step * 0.25, step * 3.0, step * 4.25] {
            a.advance(dt);
        }
        for _ in 0..10 {
            b.step();
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn long_stall_is_capped() {
        let mut sim = PongSim::new(PongParams::default(), 3);
        let before = sim.state().ball.x;
        sim.advance(60.0);
        let moved = (sim.state().ball.x - before).abs();
        let max_move = sim.params().max_ball_speed * sim.step_seconds() as f32 * 12.0;
        assert!(moved <= max_move + 1e-3);
    }

    #[test]
    fn idle_paddles_concede_and_score_is_counted() {
        let mut sim = PongSim::new(PongParams::default(), 11);
        // Move both paddles to the very top so the ball gets past them.
        sim.set_input(PaddleSide::Left, -1);
        sim.set_input(PaddleSide::Right, -1);
        let scorer = run_until_point(&mut sim, 20_000);
        let scorer = scorer.expect("someone should score");
        assert_eq!(sim.state().scores[scorer.index()], 1);
        assert_eq!(sim.state().scores[scorer.opposite().index()], 0);
    }

    #[test]
    fn serve_goes_toward_conceding_player() {
        let mut sim = PongSim::new(PongParams::default(), 11);
        sim.set_input(PaddleSide::Left, -1);
        sim.set_input(PaddleSide::Right, -1);
        let scorer = run_until_point(&mut sim, 20_000).unwrap();
        let vx = sim.state().ball.vx;
        match scorer {
            PaddleSide::Left => assert!(vx > 0.0, "right conceded, serve should go right"),
            PaddleSide::Right => assert!(vx < 0.0, "left conceded, serve should go left"),
        }
        assert_eq!(sim.state().rally, 0);
    }

    #[test]
    fn paddle_returns_ball_and_speeds_it_up() {
        let params = PongParams::default();
        let mut sim = PongSim::new(params.clone(), 1);
        // Aim a flat ball straight at the centred left paddle.
        sim.state.ball = Ball {
            x: 20.0,
            y: params.field_height / 2.0,
            vx: -params.serve_speed,
            vy: 0.0,
        };
        let mut hit = false;
        for _ in 0..200 {
            if sim
                .step()
                .contains(&PongEvent::PaddleHit(PaddleSide::Left))
            {
                hit = true;
                break;
            }
        }
        assert!(hit);
        let ball = &sim.state().ball;
        assert!(ball.vx > 0.0);
        let speed = f32::hypot(ball.vx, ball.vy);
        assert!((speed - params.serve_speed * params.speedup).abs() < 1e-3);
        assert_eq!(sim.state().rally, 1);
    }

    #[test]
    fn ball_stays_inside_vertical_bounds() {
        let params = PongParams::default();
        let mut sim = PongSim::new(params.clone(), 21);
        for _ in 0..5000 {
            sim.step();
            let y = sim.state().ball.y;
            assert!(y >= params.ball_radius - 1e-4);
            assert!(y <= params.field_height - params.ball_radius + 1e-4);
        }
    }

    #[test]
    fn paddles_clamped_to_field() {
        let params = PongParams::default();
        let mut sim = PongSim::new(params.clone(), 2);
        sim.set_input(PaddleSide::Left, -5);
        sim.set_input(PaddleSide::Right, 1);
        assert_eq!(sim.state().inputs, [-1, 1]);
        for _ in 0..1000 {
            sim.step();
        }
        assert_eq!(sim.state().paddles[0], params.paddle_height / 2.0);
        assert_eq!(
            sim.state().paddles[1],
            params.field_height - params.paddle_height / 2.0
        );
    }
}
