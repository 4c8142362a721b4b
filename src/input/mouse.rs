//! Virtual pointer
//!
//! The pointer position only exists on our side: the target receives move
//! events through the injector while the real OS cursor stays put.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::humanize::Humanizer;
use super::injector::{Injector, KeyAction};
use super::motion::{MotionModel, MotionPlanner, Speed};
use super::InputError;
use crate::geometry::Point;
use crate::runtime::interrupt::InterruptToken;
use crate::runtime::statistics::Statistics;

/// Receives pointer positions for on-screen display
///
/// Implementations must not block; a dropped repaint is harmless.
pub trait PointerOverlay: Send + Sync {
    fn show(&self, point: Point);
    fn clear(&self);
}

/// Overlay that draws nothing
#[derive(Debug, Default)]
pub struct NoOverlay;

impl PointerOverlay for NoOverlay {
    fn show(&self, _point: Point) {}
    fn clear(&self) {}
}

#[derive(Debug, Clone, Copy)]
struct PointerState {
    position: Point,
    updated: Instant,
}

/// Pointer that moves along planned trajectories
pub struct VirtualMouse {
    injector: Arc<Injector>,
    planner: MotionPlanner,
    canvas_origin: Point,
    state: Mutex<PointerState>,
    model: Mutex<MotionModel>,
    overlay: Arc<dyn PointerOverlay>,
    interrupt: InterruptToken,
    stats: Arc<Statistics>,
}

impl VirtualMouse {
    /// Pointer starting at the centre of the planner bounds
    ///
    /// `canvas_origin` is the screen position of the target's drawing
    /// surface; events are sent relative to it.
    pub fn new(
        injector: Arc<Injector>,
        planner: MotionPlanner,
        canvas_origin: Point,
        interrupt: InterruptToken,
        stats: Arc<Statistics>,
    ) -> Self {
        Self {
            injector,
            canvas_origin,
            state: Mutex::new(PointerState {
                position: planner.bounds().center(),
                updated: Instant::now(),
            }),
            planner,
            model: Mutex::new(MotionModel::default()),
            overlay: Arc::new(NoOverlay),
            interrupt,
            stats,
        }
    }

    pub fn with_overlay(mut self, overlay: Arc<dyn PointerOverlay>) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn with_position(self, position: Point) -> Self {
        self.store(position);
        self
    }

    fn state(&self) -> MutexGuard<'_, PointerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self, position: Point) {
        let mut state = self.state();
        state.position = position;
        state.updated = Instant::now();
    }

    /// Current pointer position in screen coordinates
    pub fn position(&self) -> Point {
        self.state().position
    }

    /// When the position last changed
    pub fn last_updated(&self) -> Instant {
        self.state().updated
    }

    pub fn model(&self) -> MotionModel {
        *self.model.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_model(&self, model: MotionModel) {
        *self.model.lock().unwrap_or_else(|e| e.into_inner()) = model;
    }

    fn to_client(&self, p: Point) -> Point {
        Point::new(p.x - self.canvas_origin.x, p.y - self.canvas_origin.y)
    }

    /// Update state, tell the target and the overlay
    fn place(&self, point: Point) -> Result<(), InputError> {
        self.store(point);
        let client = self.to_client(point);
        self.injector.move_to(client.x, client.y)?;
        self.overlay.show(point);
        Ok(())
    }

    /// Travel to `target`; no events at all if already there
    pub fn move_to(&self, target: Point, speed: Speed) -> Result<(), InputError> {
        self.interrupt.check()?;
        let start = self.position();
        if start == target {
            return Ok(());
        }

        let model = self.model();
        for step in self.planner.plan(model, start, target, speed) {
            self.interrupt.check()?;
            if step.point != self.position() {
                self.place(step.point)?;
            }
            let pause = step.pause.max(Duration::from_millis(1));
            match model {
                MotionModel::Wind => self.interrupt.sleep_precise(pause)?,
                MotionModel::Bezier => self.interrupt.sleep(pause)?,
            }
        }

        if self.position() != target {
            self.place(target)?;
        }
        Ok(())
    }

    /// Stop short of the target with a sideways offset, then finish at medium speed
    pub fn move_to_pause(&self, target: Point, speed: Speed) -> Result<(), InputError> {
        let mut humanizer = Humanizer::new();
        let t = humanizer.between_f64(0.85, 0.95);
        let offset = humanizer.between_i32(50, 70) * humanizer.sign();
        let waypoint = self
            .planner
            .point_along(self.position(), target, t, offset as f64);

        self.move_to(waypoint, speed)?;
        self.interrupt
            .sleep(Duration::from_millis(humanizer.between(10, 20)))?;
        self.move_to(target, Speed::Medium)
    }

    /// Travel slightly past the target, then correct at medium speed
    pub fn move_to_overshoot(&self, target: Point, speed: Speed) -> Result<(), InputError> {
        let t = Humanizer::new().between_f64(1.04, 1.10);
        let beyond = self.planner.point_along(self.position(), target, t, 0.0);
        self.move_to(beyond, speed)?;
        self.move_to(target, Speed::Medium)
    }

    pub fn left_click(&self) -> Result<(), InputError> {
        self.click(true)
    }

    pub fn right_click(&self) -> Result<(), InputError> {
        self.click(false)
    }

    fn click(&self, left: bool) -> Result<(), InputError> {
        self.interrupt.check()?;
        let client = self.to_client(self.position());
        if left {
            self.injector.click_left(client.x, client.y)?;
        } else {
            self.injector.click_right(client.x, client.y)?;
        }
        self.stats.increment_inputs();
        self.injector.move_to(client.x, client.y)?;
        self.micro_jitter()
    }

    /// Nudge the pointer by up to two pixels half of the time
    pub fn micro_jitter(&self) -> Result<(), InputError> {
        let Some((dx, dy)) = Humanizer::new().micro_jitter() else {
            return Ok(());
        };
        self.interrupt.check()?;
        let nudged = self.position().translate(dx, dy);
        let bounds = self.planner.bounds();
        let nudged = if bounds.contains(nudged) {
            nudged
        } else {
            self.position()
        };
        self.place(nudged)
    }

    /// Middle button press or release at the current position
    pub fn middle(&self, action: KeyAction) -> Result<(), InputError> {
        self.interrupt.check()?;
        let client = self.to_client(self.position());
        self.injector.middle(client.x, client.y, action)?;
        self.stats.increment_inputs();
        Ok(())
    }

    /// Wheel notches at the current position
    pub fn scroll(&self, rotation: i32) -> Result<(), InputError> {
        self.interrupt.check()?;
        let client = self.to_client(self.position());
        self.injector.wheel(client.x, client.y, rotation)?;
        self.stats.increment_inputs();
        Ok(())
    }

    /// Remove the pointer from the overlay
    pub fn clear_overlay(&self) {
        self.overlay.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::input::injector::{
        BUTTON_LEFT, BUTTON_MIDDLE, MOUSE_MOVED, MOUSE_PRESSED, MOUSE_RELEASED,
    };
    use crate::input::recording::{recording_channel, Recording};
    use std::thread;

    struct Fixture {
        mouse: VirtualMouse,
        recording: Recording,
        token: InterruptToken,
        stats: Arc<Statistics>,
    }

    fn fixture(origin: Point, start: Point) -> Fixture {
        let (channel, recording) = recording_channel();
        let token = InterruptToken::new();
        let injector = Arc::new(Injector::create(Box::new(channel), 5, token.clone()).unwrap());
        let stats = Arc::new(Statistics::new());
        let planner = MotionPlanner::new(Rect::new(origin.x, origin.y, 800, 600));
        let mouse = VirtualMouse::new(injector, planner, origin, token.clone(), stats.clone())
            .with_position(start);
        recording.drain();
        Fixture {
            mouse,
            recording,
            token,
            stats,
        }
    }

    #[test]
    fn test_move_to_current_position_is_silent() {
        let f = fixture(Point::new(0, 0), Point::new(100, 100));
        f.mouse.move_to(Point::new(100, 100), Speed::Medium).unwrap();
        assert!(f.recording.drain().is_empty());
        assert_eq!(f.mouse.position(), Point::new(100, 100));
    }

    #[test]
    fn test_move_lands_exactly() {
        let f = fixture(Point::new(0, 0), Point::new(10, 10));
        for target in [Point::new(60, 40), Point::new(5, 90), Point::new(61, 41)] {
            f.mouse.move_to(target, Speed::Fastest).unwrap();
            assert_eq!(f.mouse.position(), target);
        }
        let moves = f.recording.mouse_events();
        let last = moves.last().unwrap();
        assert_eq!((last.id, last.x, last.y), (MOUSE_MOVED, 61, 41));
    }

    #[test]
    fn test_wind_model_lands_exactly() {
        let f = fixture(Point::new(0, 0), Point::new(20, 20));
        f.mouse.set_model(MotionModel::Wind);
        f.mouse.move_to(Point::new(70, 55), Speed::Fast).unwrap();
        assert_eq!(f.mouse.position(), Point::new(70, 55));
    }

    #[test]
    fn test_events_are_canvas_relative() {
        let f = fixture(Point::new(100, 50), Point::new(150, 80));
        f.mouse.move_to(Point::new(160, 90), Speed::Fastest).unwrap();
        let moves = f.recording.mouse_events();
        let last = moves.last().unwrap();
        assert_eq!((last.x, last.y), (60, 40));
    }

    #[test]
    fn test_overshoot_and_pause_finish_on_target() {
        let f = fixture(Point::new(0, 0), Point::new(100, 300));
        let target = Point::new(400, 300);
        f.mouse.move_to_overshoot(target, Speed::Fastest).unwrap();
        assert_eq!(f.mouse.position(), target);
        f.mouse.move_to_pause(Point::new(150, 300), Speed::Fastest).unwrap();
        assert_eq!(f.mouse.position(), Point::new(150, 300));
    }

    #[test]
    fn test_left_click_sequence() {
        let f = fixture(Point::new(0, 0), Point::new(30, 30));
        f.mouse.left_click().unwrap();
        let events = f.recording.mouse_events();
        assert_eq!(events[0].id, MOUSE_PRESSED);
        assert_eq!(events[0].button, BUTTON_LEFT);
        assert_eq!(events[1].id, MOUSE_RELEASED);
        assert_eq!((events[3].id, events[3].x, events[3].y), (MOUSE_MOVED, 30, 30));
        assert_eq!(f.stats.inputs(), 1);

        let p = f.mouse.position();
        assert!((p.x - 30).abs() <= 2 && (p.y - 30).abs() <= 2);
    }

    #[test]
    fn test_middle_is_single_event() {
        let f = fixture(Point::new(0, 0), Point::new(30, 30));
        f.mouse.middle(KeyAction::Press).unwrap();
        let events = f.recording.mouse_events();
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].id, events[0].button), (MOUSE_PRESSED, BUTTON_MIDDLE));
    }

    #[test]
    fn test_interrupt_stops_long_move() {
        let f = fixture(Point::new(0, 0), Point::new(0, 0));
        let token = f.token.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            token.interrupt();
        });

        let result = f.mouse.move_to(Point::new(799, 599), Speed::Slow);
        stopper.join().unwrap();
        assert!(matches!(result, Err(InputError::Interrupted(_))));
        assert_ne!(f.mouse.position(), Point::new(799, 599));
    }
}
