use uuid::Uuid;

use crate::angle::{Angle, Point};

pub const DEFAULT_PROJECTILE_RADIUS: f64 = 5.0;

/// A projectile in flight. Stored by value in the world that owns it.
/// The server is authoritative for spawning and collisions; clients only
/// ever simulate movement between authoritative events.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub uuid: Uuid,
    pub weapon: String,
    /// Ship that fired this projectile.
    pub fired_by: Uuid,
    /// Player that owns the firing ship, for friendly-fire exclusion.
    pub owner: Option<Uuid>,
    pub target: Option<Uuid>,
    pub position: Point,
    pub velocity: Point,
    pub facing: Angle,
    pub radius: f64,
    pub damage: f64,
    /// Remaining ticks of flight. Expiry is resolved by the collision
    /// authority, which emits the death event.
    pub lifetime: u32,
    pub dead: bool,
    pub spawn_tick: u64,
}

impl Projectile {
    pub fn new(weapon: impl Into<String>, fired_by: Uuid, position: Point, velocity: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            weapon: weapon.into(),
            fired_by,
            owner: None,
            target: None,
            position,
            velocity,
            facing: Angle::default(),
            radius: DEFAULT_PROJECTILE_RADIUS,
            damage: 0.1,
            lifetime: 120,
            dead: false,
            spawn_tick: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.lifetime == 0
    }

    pub fn step(&mut self) {
        if self.dead {
            return;
        }
        self.position += self.velocity;
        self.lifetime = self.lifetime.saturating_sub(1);
    }
}
