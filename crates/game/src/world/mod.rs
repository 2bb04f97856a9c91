mod objects;
mod projectile;
mod ship;

pub use objects::{Asteroid, AsteroidField, Flotsam, Visual};
pub use projectile::Projectile;
pub use ship::{status, Ship};

use uuid::Uuid;

use crate::command::PlayerCommand;

/// The complete simulation state for one region of space.
///
/// This is a pure value type: `Clone` produces a deep copy whose mutations
/// never touch the original, which is what makes prediction and rollback
/// cheap. The server owns the authoritative instance; clients own predicted
/// copies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldSnapshot {
    region: Option<String>,
    tick: u64,
    pub ships: Vec<Ship>,
    pub projectiles: Vec<Projectile>,
    pub flotsam: Vec<Flotsam>,
    pub visuals: Vec<Visual>,
    pub asteroids: Option<AsteroidField>,
}

impl WorldSnapshot {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            ..Default::default()
        }
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn set_region(&mut self, region: impl Into<String>) {
        self.region = Some(region.into());
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// A snapshot is only usable for simulation once it has a region.
    pub fn is_valid(&self) -> bool {
        self.region.is_some()
    }

    pub fn ship(&self, uuid: &Uuid) -> Option<&Ship> {
        self.ships.iter().find(|s| s.uuid == *uuid)
    }

    pub fn ship_mut(&mut self, uuid: &Uuid) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| s.uuid == *uuid)
    }

    /// The ship owned by the given player, if any.
    pub fn player_ship(&self, player: &Uuid) -> Option<&Ship> {
        self.ships.iter().find(|s| s.owner == Some(*player))
    }

    pub fn player_ship_mut(&mut self, player: &Uuid) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| s.owner == Some(*player))
    }

    pub fn add_ship(&mut self, ship: Ship) {
        self.ships.push(ship);
    }

    pub fn remove_ship(&mut self, uuid: &Uuid) -> Option<Ship> {
        let index = self.ships.iter().position(|s| s.uuid == *uuid)?;
        Some(self.ships.remove(index))
    }

    pub fn add_projectile(&mut self, projectile: Projectile) {
        self.projectiles.push(projectile);
    }

    pub fn projectile(&self, uuid: &Uuid) -> Option<&Projectile> {
        self.projectiles.iter().find(|p| p.uuid == *uuid)
    }

    pub fn projectile_mut(&mut self, uuid: &Uuid) -> Option<&mut Projectile> {
        self.projectiles.iter_mut().find(|p| p.uuid == *uuid)
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    /// Latch a command onto the owning player's ship. Returns false when the
    /// player has no ship in this world.
    pub fn apply_command(&mut self, command: &PlayerCommand) -> bool {
        match self.player_ship_mut(&command.player) {
            Some(ship) => {
                ship.set_controls(command.controls);
                ship.set_target_point(command.target_point);
                true
            }
            None => false,
        }
    }

    /// Advance the simulation by one tick. Position integrates from the
    /// previous velocity before controls touch it, so a ship moving at v
    /// covers exactly v in one step regardless of commanded thrust.
    pub fn step(&mut self) {
        for ship in &mut self.ships {
            ship.step();
        }
        for projectile in &mut self.projectiles {
            projectile.step();
        }
        for flotsam in &mut self.flotsam {
            flotsam.step();
        }
        for visual in &mut self.visuals {
            visual.step();
        }
        self.visuals.retain(|v| v.lifetime > 0);
        if let Some(field) = &mut self.asteroids {
            field.step();
        }
        self.tick += 1;
    }

    /// Drop everything but the region, for region transitions.
    pub fn clear(&mut self) {
        self.ships.clear();
        self.projectiles.clear();
        self.flotsam.clear();
        self.visuals.clear();
        self.asteroids = None;
    }
}
