//! Pointer trajectory generation
//!
//! Two models produce lazy sequences of integer pixels between a start and
//! an end point: a cubic Bézier curve with eased parameterisation and the
//! physics-based WindMouse model. The planners never sleep themselves; each
//! [`PathStep`] carries the pause the caller should observe.

use std::collections::VecDeque;
use std::f64::consts::SQRT_2;
use std::str::FromStr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::InputError;
use crate::geometry::{Point, Rect};

/// Named movement speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    #[default]
    Medium,
    Fast,
    Fastest,
}

impl Speed {
    /// Pixels per Bézier step
    pub fn bezier_scale(&self) -> f64 {
        match self {
            Speed::Slow => 0.5,
            Speed::Medium => 1.5,
            Speed::Fast => 2.0,
            Speed::Fastest => 2.5,
        }
    }

    fn wind_profile(&self) -> WindProfile {
        match self {
            Speed::Slow => WindProfile {
                speed: 20.0,
                gravity: 5.0,
                wind: 1.0,
            },
            Speed::Medium => WindProfile {
                speed: 30.0,
                gravity: 4.5,
                wind: 1.5,
            },
            Speed::Fast | Speed::Fastest => WindProfile {
                speed: 50.0,
                gravity: 6.0,
                wind: 2.0,
            },
        }
    }
}

impl FromStr for Speed {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow" => Ok(Speed::Slow),
            "medium" | "default" => Ok(Speed::Medium),
            "fast" => Ok(Speed::Fast),
            "fastest" => Ok(Speed::Fastest),
            other => Err(InputError::InvalidArgument(format!(
                "unknown speed profile '{}'",
                other
            ))),
        }
    }
}

/// Trajectory model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionModel {
    #[default]
    Bezier,
    Wind,
}

/// One pixel of a trajectory and the wait that follows it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub point: Point,
    pub pause: Duration,
}

/// Builds trajectories clamped to a screen area
#[derive(Debug, Clone, Copy)]
pub struct MotionPlanner {
    bounds: Rect,
}

impl MotionPlanner {
    pub fn new(bounds: Rect) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Trajectory from `from` to `to` with the chosen model
    pub fn plan(&self, model: MotionModel, from: Point, to: Point, speed: Speed) -> MotionPath {
        match model {
            MotionModel::Bezier => MotionPath::Bezier(self.bezier(from, to, speed)),
            MotionModel::Wind => MotionPath::Wind(WindPath::new(from, to, speed)),
        }
    }

    pub fn bezier(&self, from: Point, to: Point, speed: Speed) -> BezierPath {
        BezierPath::new(from, to, speed, self.bounds)
    }

    /// Point at parameter `t` of the segment, pushed sideways by `offset` pixels
    ///
    /// `t` may exceed 1 to land beyond `to`. The result is clamped to the
    /// planner bounds.
    pub fn point_along(&self, from: Point, to: Point, t: f64, offset: f64) -> Point {
        let dx = (to.x - from.x) as f64;
        let dy = (to.y - from.y) as f64;
        let (nx, ny) = perpendicular(dx, dy);
        let x = from.x as f64 + t * dx + offset * nx;
        let y = from.y as f64 + t * dy + offset * ny;
        clamp_to(self.bounds, Point::new(x as i32, y as i32))
    }
}

fn perpendicular(dx: f64, dy: f64) -> (f64, f64) {
    let len = dx.hypot(dy);
    if len == 0.0 {
        (0.0, 0.0)
    } else {
        (-dy / len, dx / len)
    }
}

fn clamp_to(bounds: Rect, p: Point) -> Point {
    if bounds.is_empty() {
        return p;
    }
    Point::new(
        p.x.clamp(bounds.x, bounds.right() - 1),
        p.y.clamp(bounds.y, bounds.bottom() - 1),
    )
}

/// Either planner's output
pub enum MotionPath {
    Bezier(BezierPath),
    Wind(WindPath),
}

impl Iterator for MotionPath {
    type Item = PathStep;

    fn next(&mut self) -> Option<PathStep> {
        match self {
            MotionPath::Bezier(path) => path.next(),
            MotionPath::Wind(path) => path.next(),
        }
    }
}

/// Perpendicular control-point offset range for a travel distance
fn offset_range(distance: i32) -> (i32, i32) {
    match distance {
        d if d >= 600 => (160, 220),
        d if d >= 300 => (50, 80),
        d if d >= 200 => (10, 30),
        _ => (0, 10),
    }
}

/// Ease-out exponent for a travel distance
fn easing_exponent(distance: i32) -> i32 {
    match distance {
        d if d >= 1200 => 16,
        d if d >= 1000 => 12,
        d if d >= 800 => 10,
        d if d >= 600 => 8,
        d if d >= 400 => 6,
        d if d >= 200 => 5,
        _ => 4,
    }
}

/// Step count for a distance; never below one
pub fn bezier_steps(distance: i32, speed: Speed) -> u32 {
    ((distance as f64 / speed.bezier_scale()).round() as u32).max(1)
}

/// Cubic Bézier trajectory with eased timing
pub struct BezierPath {
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
    samples: u32,
    exponent: i32,
    index: u32,
    last: Option<Point>,
}

impl BezierPath {
    fn new(p0: Point, p3: Point, speed: Speed, bounds: Rect) -> Self {
        let mut rng = rand::thread_rng();
        let distance = p0.distance(p3).round() as i32;
        let (low, high) = offset_range(distance);
        let extra = if distance >= 600 { 50 } else { 0 };
        let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        let first_offset = rng.gen_range(low..high + extra) as f64 * direction;
        let second_offset = rng.gen_range(low..high) as f64 * direction;

        let planner = MotionPlanner::new(bounds);
        let p1 = planner.point_along(p0, p3, rng.gen_range(0.2..=0.3), first_offset);
        let p2 = planner.point_along(p0, p3, rng.gen_range(0.6..=0.7), second_offset);

        Self {
            p0,
            p1,
            p2,
            p3,
            // A single step still has to visit both endpoints
            samples: bezier_steps(distance, speed).max(2),
            exponent: easing_exponent(distance),
            index: 0,
            last: None,
        }
    }

    /// Control points `(p1, p2)`
    pub fn control_points(&self) -> (Point, Point) {
        (self.p1, self.p2)
    }

    fn sample(&self, i: u32) -> Point {
        let raw = i as f64 / (self.samples - 1) as f64;
        let t = 1.0 - (1.0 - raw).powi(self.exponent);
        let u = 1.0 - t;
        let blend = |a: i32, b: i32, c: i32, d: i32| {
            u.powi(3) * a as f64
                + 3.0 * u.powi(2) * t * b as f64
                + 3.0 * u * t.powi(2) * c as f64
                + t.powi(3) * d as f64
        };
        Point::new(
            blend(self.p0.x, self.p1.x, self.p2.x, self.p3.x).round() as i32,
            blend(self.p0.y, self.p1.y, self.p2.y, self.p3.y).round() as i32,
        )
    }
}

impl Iterator for BezierPath {
    type Item = PathStep;

    fn next(&mut self) -> Option<PathStep> {
        while self.index < self.samples {
            let point = self.sample(self.index);
            self.index += 1;
            if self.last == Some(point) {
                continue;
            }
            self.last = Some(point);
            return Some(PathStep {
                point,
                pause: Duration::from_millis(1),
            });
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct WindProfile {
    speed: f64,
    gravity: f64,
    wind: f64,
}

/// Hard wall-clock limit for one stage of a wind move
const WIND_STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// WindMouse trajectory
pub struct WindPath {
    rng: StdRng,
    profile: WindProfile,
    stages: VecDeque<Point>,
    stage_pause: Option<Duration>,
    x: f64,
    y: f64,
    velocity: (f64, f64),
    wind: (f64, f64),
    wind_strength: f64,
    total_distance: f64,
    target_area: f64,
    stage_started: Option<Instant>,
    pending_pause: Duration,
    done: bool,
}

impl WindPath {
    pub fn new(from: Point, to: Point, speed: Speed) -> Self {
        let mut rng = StdRng::from_entropy();
        let mut stages = VecDeque::new();
        let mut stage_pause = None;

        if from.distance(to) > 250.0 && rng.gen_bool(0.5) {
            let between = |a: i32, b: i32, rng: &mut StdRng| {
                if a == b {
                    a
                } else {
                    (a as f64 + rng.gen::<f64>() * (b - a) as f64) as i32
                }
            };
            let waypoint = Point::new(between(to.x, from.x, &mut rng), between(to.y, from.y, &mut rng));
            stages.push_back(waypoint);
            stage_pause = Some(Duration::from_millis(rng.gen_range(1..150)));
        }
        stages.push_back(to);

        let mut path = Self {
            rng,
            profile: speed.wind_profile(),
            stages,
            stage_pause,
            x: from.x as f64,
            y: from.y as f64,
            velocity: (0.0, 0.0),
            wind: (0.0, 0.0),
            wind_strength: 0.0,
            total_distance: 0.0,
            target_area: 0.0,
            stage_started: None,
            pending_pause: Duration::ZERO,
            done: false,
        };
        path.begin_stage();
        path
    }

    fn current_target(&self) -> Option<Point> {
        self.stages.front().copied()
    }

    fn begin_stage(&mut self) {
        let Some(target) = self.current_target() else {
            return;
        };
        self.velocity = (0.0, 0.0);
        self.wind = (0.0, 0.0);
        self.wind_strength = self.profile.wind;
        self.total_distance = Point::new(self.x as i32, self.y as i32).distance(target).trunc();
        self.target_area = self.rng.gen_range(10..25) as f64;
        self.stage_started = None;
    }

    fn rounded(&self) -> Point {
        Point::new(self.x.round() as i32, self.y.round() as i32)
    }

    /// Wait after one physics tick
    fn tick_pause(&mut self) -> Duration {
        let range = ((100.0 / self.profile.speed).round() as i64).max(1);
        let wait = (self.rng.gen_range(0..range) * 12).max(10);
        Duration::from_millis((wait as f64 * 0.9).round() as u64)
    }

    /// Advance the physics until the rounded position changes
    fn step(&mut self, target: Point) -> Option<Point> {
        let started = *self.stage_started.get_or_insert_with(Instant::now);
        let (tx, ty) = (target.x as f64, target.y as f64);
        let sqrt3 = 3f64.sqrt();
        let sqrt5 = 5f64.sqrt();

        loop {
            let dist = (self.x - tx).hypot(self.y - ty);
            if dist < 3.0 || started.elapsed() > WIND_STAGE_TIMEOUT {
                return None;
            }

            self.wind_strength = self.wind_strength.min(dist);

            let mut cap = (((self.total_distance.round() * 0.3).round() as i64) / 7).clamp(5, 20);
            if self.rng.gen_range(0..6) == 0 {
                cap = 2;
            }
            let mut max_step = (cap as f64).min(dist.round()) * 1.5;

            if dist >= self.target_area {
                let range = (self.wind_strength.round() as i64) * 2 + 1;
                let gust_x = self.rng.gen_range(0..range) as f64 - self.wind_strength;
                let gust_y = self.rng.gen_range(0..range) as f64 - self.wind_strength;
                self.wind.0 = self.wind.0 / sqrt3 + gust_x / sqrt5;
                self.wind.1 = self.wind.1 / sqrt3 + gust_y / sqrt5;
            } else {
                self.wind.0 /= SQRT_2;
                self.wind.1 /= SQRT_2;
                self.velocity.0 *= 0.64;
                self.velocity.1 *= 0.64;
            }

            self.velocity.0 += self.wind.0 + self.profile.gravity * (tx - self.x) / dist;
            self.velocity.1 += self.wind.1 + self.profile.gravity * (ty - self.y) / dist;

            let magnitude = self.velocity.0.hypot(self.velocity.1);
            if magnitude > max_step {
                if max_step / 2.0 < 1.0 {
                    max_step = 2.0;
                }
                let half = ((max_step.round() as i64) / 2).max(1);
                let length = max_step / 2.0 + self.rng.gen_range(0..half) as f64;
                self.velocity.0 = self.velocity.0 / magnitude * length;
                self.velocity.1 = self.velocity.1 / magnitude * length;
            }

            let before = self.rounded();
            self.x += self.velocity.0;
            self.y += self.velocity.1;
            let pause = self.tick_pause();
            self.pending_pause += pause;

            let after = self.rounded();
            if after != before {
                return Some(after);
            }
        }
    }
}

impl Iterator for WindPath {
    type Item = PathStep;

    fn next(&mut self) -> Option<PathStep> {
        while !self.done {
            let Some(target) = self.current_target() else {
                self.done = true;
                break;
            };

            if let Some(point) = self.step(target) {
                let pause = std::mem::take(&mut self.pending_pause);
                return Some(PathStep { point, pause });
            }

            // Stage finished: snap the last few pixels
            let previous = self.rounded();
            self.x = target.x as f64;
            self.y = target.y as f64;
            self.stages.pop_front();
            let last_stage = self.stages.is_empty();
            let pause = if last_stage {
                self.done = true;
                std::mem::take(&mut self.pending_pause)
            } else {
                std::mem::take(&mut self.pending_pause) + self.stage_pause.take().unwrap_or_default()
            };
            if !last_stage {
                self.begin_stage();
            }
            if previous != target || !pause.is_zero() {
                return Some(PathStep {
                    point: target,
                    pause,
                });
            }
        }
        None
    }
}
