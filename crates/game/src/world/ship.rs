use uuid::Uuid;

use crate::angle::{Angle, Point};
use crate::command::controls;

/// Status word bits carried in FULL-scope ship updates.
pub mod status {
    pub const THRUSTING: u16 = 1 << 0;
    pub const TURNING_LEFT: u16 = 1 << 1;
    pub const TURNING_RIGHT: u16 = 1 << 2;
    pub const FIRING: u16 = 1 << 3;
    pub const DISABLED: u16 = 1 << 4;
}

const TURN_RATE: f64 = 3.0; // degrees per tick
const THRUST_ACCEL: f64 = 0.15; // units per tick^2
const REVERSE_ACCEL: f64 = 0.08;
const THRUST_ENERGY: f64 = 0.001;
const ENERGY_REGEN: f64 = 0.0005;

/// One ship as the sync layer sees it. Everything else about a ship
/// (outfits, cargo, AI) is opaque to the networking core.
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    pub uuid: Uuid,
    pub name: String,
    pub owner: Option<Uuid>,
    pub position: Point,
    pub velocity: Point,
    pub facing: Angle,
    shields: f64,
    hull: f64,
    energy: f64,
    fuel: f64,
    pub radius: f64,
    pub flags: u16,
    controls: u32,
    target_point: Option<Point>,
}

impl Ship {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            name: String::new(),
            owner: None,
            position: Point::ZERO,
            velocity: Point::ZERO,
            facing: Angle::default(),
            shields: 1.0,
            hull: 1.0,
            energy: 1.0,
            fuel: 1.0,
            radius: 24.0,
            flags: 0,
            controls: 0,
            target_point: None,
        }
    }

    pub fn shields(&self) -> f64 {
        self.shields
    }

    pub fn hull(&self) -> f64 {
        self.hull
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn set_shields(&mut self, value: f64) {
        self.shields = value.clamp(0.0, 1.0);
    }

    pub fn set_hull(&mut self, value: f64) {
        self.hull = value.clamp(0.0, 1.0);
        if self.hull == 0.0 {
            self.flags |= status::DISABLED;
        }
    }

    pub fn set_energy(&mut self, value: f64) {
        self.energy = value.clamp(0.0, 1.0);
    }

    pub fn set_fuel(&mut self, value: f64) {
        self.fuel = value.clamp(0.0, 1.0);
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn set_velocity(&mut self, velocity: Point) {
        self.velocity = velocity;
    }

    pub fn set_facing(&mut self, facing: Angle) {
        self.facing = facing;
    }

    pub fn controls(&self) -> u32 {
        self.controls
    }

    pub fn set_controls(&mut self, word: u32) {
        self.controls = word;
    }

    pub fn target_point(&self) -> Option<Point> {
        self.target_point
    }

    pub fn set_target_point(&mut self, point: Option<Point>) {
        self.target_point = point;
    }

    pub fn has_control(&self, flag: u32) -> bool {
        self.controls & flag != 0
    }

    pub fn is_disabled(&self) -> bool {
        self.flags & status::DISABLED != 0
    }

    pub fn apply_damage(&mut self, amount: f64) {
        let through = (amount - self.shields).max(0.0);
        self.set_shields(self.shields - amount);
        if through > 0.0 {
            self.set_hull(self.hull - through);
        }
    }

    /// One fixed tick of ship physics. Position integrates from the
    /// velocity latched at the start of the tick; controls then adjust
    /// facing and velocity for the next tick.
    pub fn step(&mut self) {
        self.position += self.velocity;

        self.flags &= status::DISABLED;
        if self.is_disabled() {
            self.controls = 0;
            return;
        }

        if self.has_control(controls::TURN_LEFT) {
            self.facing = self.facing.rotate(-TURN_RATE);
            self.flags |= status::TURNING_LEFT;
        }
        if self.has_control(controls::TURN_RIGHT) {
            self.facing = self.facing.rotate(TURN_RATE);
            self.flags |= status::TURNING_RIGHT;
        }
        if self.has_control(controls::THRUST) && self.energy >= THRUST_ENERGY {
            self.velocity += self.facing.unit() * THRUST_ACCEL;
            self.energy -= THRUST_ENERGY;
            self.flags |= status::THRUSTING;
        } else if self.has_control(controls::REVERSE) {
            let speed = self.velocity.length();
            if speed > REVERSE_ACCEL {
                self.velocity -= self.velocity / speed * REVERSE_ACCEL;
            } else {
                self.velocity = Point::ZERO;
            }
        }
        if self.has_control(controls::PRIMARY_FIRE) || self.has_control(controls::SECONDARY_FIRE) {
            self.flags |= status::FIRING;
        }

        self.energy = (self.energy + ENERGY_REGEN).min(1.0);

        // Controls are per-tick; they do not persist without a fresh command.
        self.controls = 0;
    }
}
