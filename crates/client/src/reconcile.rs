use aster::{Angle, Point};

pub const DEFAULT_CORRECTION_TIME_SECONDS: f64 = 0.15;
pub const DEFAULT_ERROR_THRESHOLD: f64 = 1.0;
pub const DEFAULT_SNAP_THRESHOLD: f64 = 500.0;

const VELOCITY_THRESHOLD: f64 = 0.1;
const FACING_THRESHOLD_DEGREES: f64 = 1.0;
const ERROR_EMA_ALPHA: f64 = 0.1;
const FRAMES_PER_SECOND: f64 = 60.0;
// Progress accumulates step-by-step, so N steps of 1/N can land a hair
// under 1.0; treat that as arrived or the correction overshoots a frame.
const PROGRESS_EPSILON: f64 = 1e-9;

/// Smooth correction of prediction errors, one channel each for
/// position, velocity and facing.
///
/// Small errors are ignored, huge ones snap (the caller hard-sets the
/// authoritative value), everything in between is blended in over the
/// correction time so the player never sees a teleport.
#[derive(Debug)]
pub struct ClientReconciliation {
    position_error: Point,
    position_progress: f64,

    velocity_error: Point,
    velocity_progress: f64,

    facing_error_degrees: f64,
    facing_progress: f64,

    correction_time_seconds: f64,
    error_threshold: f64,
    snap_threshold: f64,

    total_reconciliations: u64,
    total_snaps: u64,
    average_error: f64,
}

impl Default for ClientReconciliation {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientReconciliation {
    pub fn new() -> Self {
        Self {
            position_error: Point::ZERO,
            position_progress: 1.0,
            velocity_error: Point::ZERO,
            velocity_progress: 1.0,
            facing_error_degrees: 0.0,
            facing_progress: 1.0,
            correction_time_seconds: DEFAULT_CORRECTION_TIME_SECONDS,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            total_reconciliations: 0,
            total_snaps: 0,
            average_error: 0.0,
        }
    }

    pub fn set_correction_time(&mut self, seconds: f64) {
        self.correction_time_seconds = seconds;
    }

    pub fn set_error_threshold(&mut self, threshold: f64) {
        self.error_threshold = threshold;
    }

    pub fn set_snap_threshold(&mut self, threshold: f64) {
        self.snap_threshold = threshold;
    }

    fn step_per_frame(&self) -> f64 {
        let frames = (self.correction_time_seconds * FRAMES_PER_SECOND).max(1.0);
        1.0 / frames
    }

    pub fn reconcile_position(&mut self, predicted: Point, authoritative: Point) {
        self.position_error = authoritative - predicted;
        let magnitude = self.position_error.length();

        self.average_error =
            ERROR_EMA_ALPHA * magnitude + (1.0 - ERROR_EMA_ALPHA) * self.average_error;

        if magnitude < self.error_threshold {
            self.position_error = Point::ZERO;
            self.position_progress = 1.0;
            return;
        }
        if magnitude > self.snap_threshold {
            // Too far gone for smoothing; the caller teleports to the
            // authoritative position.
            self.position_error = Point::ZERO;
            self.position_progress = 1.0;
            self.total_snaps += 1;
            return;
        }

        self.position_progress = 0.0;
        self.total_reconciliations += 1;
    }

    pub fn reconcile_velocity(&mut self, predicted: Point, authoritative: Point) {
        self.velocity_error = authoritative - predicted;
        if self.velocity_error.length() < VELOCITY_THRESHOLD {
            self.velocity_error = Point::ZERO;
            self.velocity_progress = 1.0;
            return;
        }
        self.velocity_progress = 0.0;
    }

    pub fn reconcile_facing(&mut self, predicted: Angle, authoritative: Angle) {
        self.facing_error_degrees = predicted.shortest_arc_to(authoritative);
        if self.facing_error_degrees.abs() < FACING_THRESHOLD_DEGREES {
            self.facing_error_degrees = 0.0;
            self.facing_progress = 1.0;
            return;
        }
        self.facing_progress = 0.0;
    }

    /// Advance all three channels by one frame of correction.
    pub fn update(&mut self) {
        let step = self.step_per_frame();

        if self.position_progress < 1.0 {
            self.position_progress += step;
            if self.position_progress >= 1.0 - PROGRESS_EPSILON {
                self.position_progress = 1.0;
                self.position_error = Point::ZERO;
            }
        }
        if self.velocity_progress < 1.0 {
            self.velocity_progress += step;
            if self.velocity_progress >= 1.0 - PROGRESS_EPSILON {
                self.velocity_progress = 1.0;
                self.velocity_error = Point::ZERO;
            }
        }
        if self.facing_progress < 1.0 {
            self.facing_progress += step;
            if self.facing_progress >= 1.0 - PROGRESS_EPSILON {
                self.facing_progress = 1.0;
                self.facing_error_degrees = 0.0;
            }
        }
    }

    pub fn corrected_position(&self, current: Point) -> Point {
        if self.position_progress >= 1.0 {
            return current;
        }
        current + self.position_error * self.step_per_frame()
    }

    pub fn corrected_velocity(&self, current: Point) -> Point {
        if self.velocity_progress >= 1.0 {
            return current;
        }
        current + self.velocity_error * self.step_per_frame()
    }

    pub fn corrected_facing(&self, current: Angle) -> Angle {
        if self.facing_progress >= 1.0 {
            return current;
        }
        current.rotate(self.facing_error_degrees * self.step_per_frame())
    }

    pub fn is_reconciling_position(&self) -> bool {
        self.position_progress < 1.0
    }

    pub fn is_reconciling_velocity(&self) -> bool {
        self.velocity_progress < 1.0
    }

    pub fn is_reconciling_facing(&self) -> bool {
        self.facing_progress < 1.0
    }

    pub fn total_reconciliations(&self) -> u64 {
        self.total_reconciliations
    }

    pub fn total_snaps(&self) -> u64 {
        self.total_snaps
    }

    pub fn average_error(&self) -> f64 {
        self.average_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn tiny_errors_are_ignored() {
        let mut reconciliation = ClientReconciliation::new();
        reconciliation.reconcile_position(Point::new(100.0, 100.0), Point::new(100.5, 100.0));

        assert!(!reconciliation.is_reconciling_position());
        assert_eq!(reconciliation.total_reconciliations(), 0);
        assert_eq!(
            reconciliation.corrected_position(Point::new(100.0, 100.0)),
            Point::new(100.0, 100.0)
        );
    }

    #[test]
    fn huge_errors_snap() {
        let mut reconciliation = ClientReconciliation::new();
        reconciliation.reconcile_position(Point::new(100.0, 100.0), Point::new(700.0, 100.0));

        assert!(!reconciliation.is_reconciling_position());
        assert_eq!(reconciliation.total_snaps(), 1);
        assert_eq!(reconciliation.total_reconciliations(), 0);
    }

    #[test]
    fn snap_boundary_is_exclusive() {
        let mut reconciliation = ClientReconciliation::new();
        let predicted = Point::ZERO;
        let just_over = Point::new(DEFAULT_SNAP_THRESHOLD + 0.001, 0.0);
        reconciliation.reconcile_position(predicted, just_over);
        assert!(!reconciliation.is_reconciling_position());
        assert_eq!(reconciliation.total_snaps(), 1);
    }

    #[test]
    fn moderate_errors_correct_gradually() {
        let mut reconciliation = ClientReconciliation::new();
        let predicted = Point::new(100.0, 100.0);
        let server = Point::new(150.0, 100.0);
        reconciliation.reconcile_position(predicted, server);

        assert!(reconciliation.is_reconciling_position());
        assert_eq!(reconciliation.total_reconciliations(), 1);

        // Drive the caller's loop for a full correction period.
        let mut position = predicted;
        for _ in 0..60 {
            position = reconciliation.corrected_position(position);
            reconciliation.update();
        }

        assert_approx_eq!(position.x, 150.0, 1e-6);
        assert!(!reconciliation.is_reconciling_position());
    }

    #[test]
    fn facing_corrects_along_shortest_arc() {
        let mut reconciliation = ClientReconciliation::new();
        reconciliation.reconcile_facing(Angle::new(350.0), Angle::new(10.0));
        assert!(reconciliation.is_reconciling_facing());

        let mut facing = Angle::new(350.0);
        for _ in 0..60 {
            facing = reconciliation.corrected_facing(facing);
            reconciliation.update();
        }
        assert_approx_eq!(facing.normalized().degrees(), 10.0, 1e-6);
    }

    #[test]
    fn velocity_uses_tighter_threshold() {
        let mut reconciliation = ClientReconciliation::new();
        reconciliation.reconcile_velocity(Point::ZERO, Point::new(0.05, 0.0));
        assert!(!reconciliation.is_reconciling_velocity());

        reconciliation.reconcile_velocity(Point::ZERO, Point::new(0.5, 0.0));
        assert!(reconciliation.is_reconciling_velocity());
    }

    #[test]
    fn average_error_tracks_magnitude() {
        let mut reconciliation = ClientReconciliation::new();
        reconciliation.reconcile_position(Point::ZERO, Point::new(100.0, 0.0));
        assert_approx_eq!(reconciliation.average_error(), 10.0, 1e-9);
    }
}
