use crate::angle::{Angle, Point};

/// An authoritative motion sample for one entity at one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReckonedState {
    pub position: Point,
    pub velocity: Point,
    pub facing: Angle,
    pub tick: u64,
}

impl ReckonedState {
    pub fn new(position: Point, velocity: Point, facing: Angle, tick: u64) -> Self {
        Self {
            position,
            velocity,
            facing,
            tick,
        }
    }
}

/// Linear extrapolation from the last authoritative state. Facing is
/// never extrapolated; a past target returns the authoritative state
/// verbatim.
#[derive(Debug, Clone, Default)]
pub struct DeadReckoning {
    authoritative: ReckonedState,
    current_tick: u64,
}

impl DeadReckoning {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_authoritative(&mut self, state: ReckonedState) {
        self.authoritative = state;
    }

    pub fn authoritative(&self) -> &ReckonedState {
        &self.authoritative
    }

    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn predict_at(&self, target_tick: u64) -> ReckonedState {
        let base = &self.authoritative;
        if target_tick < base.tick {
            return *base;
        }
        let elapsed = (target_tick - base.tick) as f64;
        ReckonedState {
            position: base.position + base.velocity * elapsed,
            velocity: base.velocity,
            facing: base.facing,
            tick: target_tick,
        }
    }

    pub fn predict_ahead(&self, ticks: u64) -> ReckonedState {
        self.predict_at(self.current_tick + ticks)
    }

    pub fn position_error(predicted: &ReckonedState, actual: &ReckonedState) -> f64 {
        predicted.position.distance(actual.position)
    }

    pub fn is_error_excessive(
        predicted: &ReckonedState,
        actual: &ReckonedState,
        threshold: f64,
    ) -> bool {
        Self::position_error(predicted, actual) > threshold
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
