use std::time::{Duration, Instant};

use crate::models::SwipeDirection;

pub const COMMIT_THRESHOLD: f64 = 120.0;
pub const CAPTURE_DEADZONE: f64 = 10.0;
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);
pub const MAX_ROTATION_DEGREES: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Horizontal travel past which a release commits
    pub commit_threshold: f64,
    /// Horizontal travel before the drag is captured as a swipe
    pub capture_deadzone: f64,
    /// Maximum gap between two taps for a double tap
    pub double_tap_window: Duration,
    /// Width of the swipe surface; the card rotates fully at this offset
    pub screen_width: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            commit_threshold: COMMIT_THRESHOLD,
            capture_deadzone: CAPTURE_DEADZONE,
            double_tap_window: DOUBLE_TAP_WINDOW,
            screen_width: 400.0,
        }
    }
}

/// Card offset and tilt for the rendering layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTransform {
    pub dx: f64,
    pub dy: f64,
    pub rotation_degrees: f64,
}

impl CardTransform {
    pub const ORIGIN: CardTransform = CardTransform {
        dx: 0.0,
        dy: 0.0,
        rotation_degrees: 0.0,
    };
}

/// Terminal outcome of one pointer interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    /// Released past the threshold
    Commit(SwipeDirection),
    /// Released inside the threshold; the card springs back to the origin
    Cancel,
    /// Second tap inside the double-tap window
    OpenDetail,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// Pointer down, still inside the deadzone
    Pending,
    /// Drag captured as a swipe
    Captured,
}

/// Turns pointer samples into swipe commits, spring-backs and double taps.
///
/// Displacements are cumulative from the pointer-down position. The
/// interpreter knows nothing about cities; callers attach the current city
/// to a [`GestureEvent::Commit`] themselves.
#[derive(Debug, Clone)]
pub struct SwipeGestureInterpreter {
    config: GestureConfig,
    phase: Phase,
    transform: CardTransform,
    last_tap: Option<Instant>,
}

impl Default for SwipeGestureInterpreter {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl SwipeGestureInterpreter {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            transform: CardTransform::ORIGIN,
            last_tap: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn is_captured(&self) -> bool {
        self.phase == Phase::Captured
    }

    /// Current card transform, `ORIGIN` when nothing is being dragged
    pub fn transform(&self) -> CardTransform {
        self.transform
    }

    pub fn pointer_down(&mut self) {
        self.phase = Phase::Pending;
        self.transform = CardTransform::ORIGIN;
    }

    /// Feeds a displacement sample. Returns the card transform once the
    /// drag is captured; samples inside the deadzone return `None`.
    pub fn pointer_move(&mut self, dx: f64, dy: f64) -> Option<CardTransform> {
        match self.phase {
            Phase::Idle => None,
            Phase::Pending => {
                if dx.abs() > self.config.capture_deadzone {
                    self.phase = Phase::Captured;
                    self.last_tap = None;
                    Some(self.track(dx, dy))
                } else {
                    None
                }
            }
            Phase::Captured => Some(self.track(dx, dy)),
        }
    }

    /// Ends the interaction with the final displacement
    pub fn pointer_up(&mut self, dx: f64, dy: f64, at: Instant) -> Option<GestureEvent> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);

        match phase {
            Phase::Idle => None,
            Phase::Captured => Some(self.release(dx)),
            Phase::Pending => {
                if dx.abs() > self.config.capture_deadzone {
                    // Crossed the deadzone between the last move and release
                    return Some(self.release(dx));
                }
                if dy.abs() > self.config.capture_deadzone {
                    return None;
                }
                self.tap(at)
            }
        }
    }

    /// Target offset for the fly-out animation after a commit
    pub fn fly_out_target(&self, direction: SwipeDirection) -> CardTransform {
        let dx = match direction {
            SwipeDirection::Right => self.config.screen_width,
            SwipeDirection::Left => -self.config.screen_width,
        };
        CardTransform {
            dx,
            dy: 0.0,
            rotation_degrees: self.rotation_for(dx),
        }
    }

    /// Puts the card back at the origin once the fly-out has finished.
    /// A tap on the previous card never pairs with one on the next.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.transform = CardTransform::ORIGIN;
        self.last_tap = None;
    }

    fn track(&mut self, dx: f64, dy: f64) -> CardTransform {
        self.transform = CardTransform {
            dx,
            dy,
            rotation_degrees: self.rotation_for(dx),
        };
        self.transform
    }

    fn release(&mut self, dx: f64) -> GestureEvent {
        self.last_tap = None;
        let threshold = self.config.commit_threshold;
        if dx > threshold {
            GestureEvent::Commit(SwipeDirection::Right)
        } else if dx < -threshold {
            GestureEvent::Commit(SwipeDirection::Left)
        } else {
            self.transform = CardTransform::ORIGIN;
            GestureEvent::Cancel
        }
    }

    fn tap(&mut self, at: Instant) -> Option<GestureEvent> {
        match self.last_tap {
            Some(previous) if at.saturating_duration_since(previous) < self.config.double_tap_window => {
                self.last_tap = None;
                Some(GestureEvent::OpenDetail)
            }
            _ => {
                self.last_tap = Some(at);
                None
            }
        }
    }

    fn rotation_for(&self, dx: f64) -> f64 {
        if self.config.screen_width <= 0.0 {
            return 0.0;
        }
        let ratio = (dx / self.config.screen_width).clamp(-1.0, 1.0);
        ratio * MAX_ROTATION_DEGREES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swipe(interpreter: &mut SwipeGestureInterpreter, dx: f64) -> Option<GestureEvent> {
        interpreter.pointer_down();
        interpreter.pointer_move(dx / 2.0, 0.0);
        interpreter.pointer_move(dx, 0.0);
        interpreter.pointer_up(dx, 0.0, Instant::now())
    }

    fn tap(interpreter: &mut SwipeGestureInterpreter, at: Instant) -> Option<GestureEvent> {
        interpreter.pointer_down();
        interpreter.pointer_up(0.0, 0.0, at)
    }

    #[test]
    fn test_commit_threshold_boundary() {
        let mut interpreter = SwipeGestureInterpreter::default();
        assert_eq!(swipe(&mut interpreter, 119.0), Some(GestureEvent::Cancel));
        assert_eq!(swipe(&mut interpreter, 120.0), Some(GestureEvent::Cancel));
        assert_eq!(
            swipe(&mut interpreter, 121.0),
            Some(GestureEvent::Commit(SwipeDirection::Right))
        );
    }

    #[test]
    fn test_left_commit() {
        let mut interpreter = SwipeGestureInterpreter::default();
        assert_eq!(swipe(&mut interpreter, -119.0), Some(GestureEvent::Cancel));
        assert_eq!(
            swipe(&mut interpreter, -121.0),
            Some(GestureEvent::Commit(SwipeDirection::Left))
        );
    }

    #[test]
    fn test_cancel_springs_back_to_origin() {
        let mut interpreter = SwipeGestureInterpreter::default();
        interpreter.pointer_down();
        interpreter.pointer_move(80.0, 30.0);
        assert_eq!(interpreter.transform().dx, 80.0);

        let event = interpreter.pointer_up(80.0, 30.0, Instant::now());
        assert_eq!(event, Some(GestureEvent::Cancel));
        assert_eq!(interpreter.transform(), CardTransform::ORIGIN);
    }

    #[test]
    fn test_moves_inside_deadzone_are_not_captured() {
        let mut interpreter = SwipeGestureInterpreter::default();
        interpreter.pointer_down();
        assert_eq!(interpreter.pointer_move(10.0, 40.0), None);
        assert!(!interpreter.is_captured());

        let transform = interpreter.pointer_move(11.0, 40.0).unwrap();
        assert!(interpreter.is_captured());
        assert_eq!(transform.dx, 11.0);
        assert_eq!(transform.dy, 40.0);
    }

    #[test]
    fn test_vertical_drag_is_neither_tap_nor_swipe() {
        let mut interpreter = SwipeGestureInterpreter::default();
        interpreter.pointer_down();
        interpreter.pointer_move(2.0, 60.0);
        assert_eq!(interpreter.pointer_up(2.0, 60.0, Instant::now()), None);
    }

    #[test]
    fn test_rotation_is_proportional_and_clamped() {
        let mut interpreter = SwipeGestureInterpreter::default();
        interpreter.pointer_down();
        let half = interpreter.pointer_move(200.0, 0.0).unwrap();
        assert!((half.rotation_degrees - 7.5).abs() < f64::EPSILON);

        let beyond = interpreter.pointer_move(-900.0, 0.0).unwrap();
        assert_eq!(beyond.rotation_degrees, -MAX_ROTATION_DEGREES);
    }

    #[test]
    fn test_fly_out_target_matches_screen_width() {
        let interpreter = SwipeGestureInterpreter::default();
        let target = interpreter.fly_out_target(SwipeDirection::Left);
        assert_eq!(target.dx, -400.0);
        assert_eq!(target.rotation_degrees, -MAX_ROTATION_DEGREES);
    }

    #[test]
    fn test_double_tap_opens_detail_once() {
        let mut interpreter = SwipeGestureInterpreter::default();
        let start = Instant::now();

        let events: Vec<GestureEvent> = [
            tap(&mut interpreter, start),
            tap(&mut interpreter, start + Duration::from_millis(200)),
        ]
        .into_iter()
        .flatten()
        .collect();

        assert_eq!(events, vec![GestureEvent::OpenDetail]);
    }

    #[test]
    fn test_slow_taps_do_not_open_detail() {
        let mut interpreter = SwipeGestureInterpreter::default();
        let start = Instant::now();
        assert_eq!(tap(&mut interpreter, start), None);
        assert_eq!(
            tap(&mut interpreter, start + Duration::from_millis(300)),
            None
        );
        // The late tap starts a new pair
        assert_eq!(
            tap(&mut interpreter, start + Duration::from_millis(450)),
            Some(GestureEvent::OpenDetail)
        );
    }

    #[test]
    fn test_third_tap_starts_a_new_pair() {
        let mut interpreter = SwipeGestureInterpreter::default();
        let start = Instant::now();
        tap(&mut interpreter, start);
        tap(&mut interpreter, start + Duration::from_millis(100));
        assert_eq!(
            tap(&mut interpreter, start + Duration::from_millis(200)),
            None
        );
    }

    #[test]
    fn test_tap_does_not_pair_across_a_swipe() {
        let mut interpreter = SwipeGestureInterpreter::default();
        let start = Instant::now();
        assert_eq!(tap(&mut interpreter, start), None);

        interpreter.pointer_down();
        interpreter.pointer_move(200.0, 0.0);
        assert_eq!(
            interpreter.pointer_up(200.0, 0.0, start + Duration::from_millis(50)),
            Some(GestureEvent::Commit(SwipeDirection::Right))
        );

        assert_eq!(tap(&mut interpreter, start + Duration::from_millis(100)), None);
    }

    #[test]
    fn test_reset_forgets_pending_tap() {
        let mut interpreter = SwipeGestureInterpreter::default();
        let start = Instant::now();
        tap(&mut interpreter, start);
        interpreter.reset();
        assert_eq!(tap(&mut interpreter, start + Duration::from_millis(100)), None);
    }

    #[test]
    fn test_release_without_pointer_down_is_ignored() {
        let mut interpreter = SwipeGestureInterpreter::default();
        assert_eq!(interpreter.pointer_up(300.0, 0.0, Instant::now()), None);
        assert_eq!(interpreter.pointer_move(300.0, 0.0), None);
    }
}
