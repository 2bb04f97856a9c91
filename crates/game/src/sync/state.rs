use std::collections::HashMap;

use uuid::Uuid;

use crate::angle::{Angle, Point};
use crate::interest::{InterestLevel, InterestManager};
use crate::reckon::{DeadReckoning, ReckonedState};
use crate::world::Ship;

/// Priority of a ship update, an identity mapping of interest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePriority {
    Critical,
    High,
    Medium,
    Low,
    None,
}

impl From<InterestLevel> for UpdatePriority {
    fn from(level: InterestLevel) -> Self {
        match level {
            InterestLevel::Critical => UpdatePriority::Critical,
            InterestLevel::High => UpdatePriority::High,
            InterestLevel::Medium => UpdatePriority::Medium,
            InterestLevel::Low => UpdatePriority::Low,
            InterestLevel::None => UpdatePriority::None,
        }
    }
}

/// Which fields of a `ShipUpdate` are valid on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateScope {
    Full = 0,
    Position = 1,
    Vital = 2,
    Minimal = 3,
}

impl UpdateScope {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(UpdateScope::Full),
            1 => Some(UpdateScope::Position),
            2 => Some(UpdateScope::Vital),
            3 => Some(UpdateScope::Minimal),
            _ => None,
        }
    }

    pub fn includes_vitals(&self) -> bool {
        matches!(self, UpdateScope::Full | UpdateScope::Vital)
    }

    pub fn includes_flags(&self) -> bool {
        matches!(self, UpdateScope::Full)
    }
}

/// One ship state record as sent to an observer.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipUpdate {
    pub uuid: Uuid,
    pub position: Point,
    pub velocity: Point,
    pub facing: Angle,
    pub shields: f32,
    pub hull: f32,
    pub energy: f32,
    pub fuel: f32,
    pub flags: u16,
    pub scope: UpdateScope,
    pub tick: u64,
}

/// Builds the per-observer update list each broadcast tick and applies
/// received updates on the client, keeping per-ship dead reckoners fresh.
#[derive(Debug, Default)]
pub struct StateSync {
    current_tick: u64,
    reckoners: HashMap<Uuid, DeadReckoning>,
}

impl StateSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
        for reckoner in self.reckoners.values_mut() {
            reckoner.set_current_tick(tick);
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    pub fn scope_for(priority: UpdatePriority) -> UpdateScope {
        match priority {
            UpdatePriority::Critical | UpdatePriority::High => UpdateScope::Full,
            UpdatePriority::Medium => UpdateScope::Position,
            UpdatePriority::Low | UpdatePriority::None => UpdateScope::Minimal,
        }
    }

    pub fn capture(&self, ship: &Ship, scope: UpdateScope) -> ShipUpdate {
        let mut update = ShipUpdate {
            uuid: ship.uuid,
            position: ship.position,
            velocity: ship.velocity,
            facing: ship.facing,
            shields: 1.0,
            hull: 1.0,
            energy: 1.0,
            fuel: 1.0,
            flags: 0,
            scope,
            tick: self.current_tick,
        };
        if scope.includes_vitals() {
            update.shields = ship.shields() as f32;
            update.hull = ship.hull() as f32;
            update.energy = ship.energy() as f32;
            update.fuel = ship.fuel() as f32;
        }
        if scope.includes_flags() {
            update.flags = ship.flags;
        }
        update
    }

    /// The ordered list of ship updates one observer must receive this tick.
    pub fn updates_for_player(
        &self,
        interest: &InterestManager,
        player: &Uuid,
        ships: &[Ship],
    ) -> Vec<ShipUpdate> {
        let mut updates = Vec::new();
        for ship in ships {
            let level = interest.ship_interest(player, ship);
            if level == InterestLevel::None {
                continue;
            }
            if !interest.should_update_this_tick(level, self.current_tick) {
                continue;
            }
            let scope = Self::scope_for(level.into());
            updates.push(self.capture(ship, scope));
        }
        updates
    }

    /// Write the fields an update's scope declares valid, then refresh the
    /// dead reckoner so subsequent prediction starts from this state.
    pub fn apply_update(&mut self, ship: &mut Ship, update: &ShipUpdate) {
        ship.set_position(update.position);
        ship.set_velocity(update.velocity);
        ship.set_facing(update.facing);

        if update.scope.includes_vitals() {
            ship.set_shields(update.shields as f64);
            ship.set_hull(update.hull as f64);
            ship.set_energy(update.energy as f64);
            ship.set_fuel(update.fuel as f64);
        }
        if update.scope.includes_flags() {
            ship.flags = update.flags;
        }

        let basis = ReckonedState::new(update.position, update.velocity, update.facing, update.tick);
        let reckoner = self.reckoners.entry(update.uuid).or_default();
        reckoner.set_authoritative(basis);
        reckoner.set_current_tick(self.current_tick);
    }

    pub fn predict_ship(&self, uuid: &Uuid, target_tick: u64) -> Option<ReckonedState> {
        self.reckoners.get(uuid).map(|r| r.predict_at(target_tick))
    }

    pub fn tracked_ship_count(&self) -> usize {
        self.reckoners.len()
    }

    pub fn clear_reckoning(&mut self) {
        self.reckoners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ship_at(x: f64, owner: Option<Uuid>) -> Ship {
        let mut ship = Ship::new(Uuid::new_v4());
        ship.position = Point::new(x, 0.0);
        ship.owner = owner;
        ship
    }

    #[test]
    fn scope_tiers() {
        assert_eq!(StateSync::scope_for(UpdatePriority::Critical), UpdateScope::Full);
        assert_eq!(StateSync::scope_for(UpdatePriority::High), UpdateScope::Full);
        assert_eq!(StateSync::scope_for(UpdatePriority::Medium), UpdateScope::Position);
        assert_eq!(StateSync::scope_for(UpdatePriority::Low), UpdateScope::Minimal);
    }

    #[test]
    fn capture_position_scope_skips_vitals() {
        let mut ship = ship_at(0.0, None);
        ship.set_shields(0.25);
        let sync = StateSync::new();
        let update = sync.capture(&ship, UpdateScope::Position);
        // Vitals stay at their defaults when the scope excludes them.
        assert_eq!(update.shields, 1.0);
        assert_eq!(update.scope, UpdateScope::Position);
    }

    #[test]
    fn filtering_by_interest_and_cadence() {
        let observer = Uuid::new_v4();
        let mut interest = InterestManager::default();
        interest.set_center(observer, Point::ZERO);

        let ships = vec![
            ship_at(500.0, None),    // critical
            ship_at(2000.0, None),   // high
            ship_at(5000.0, None),   // medium: every 2nd tick
            ship_at(15_000.0, None), // out of range
        ];

        let mut sync = StateSync::new();
        sync.set_current_tick(3);
        let odd_tick = sync.updates_for_player(&interest, &observer, &ships);
        assert_eq!(odd_tick.len(), 2);

        sync.set_current_tick(4);
        let even_tick = sync.updates_for_player(&interest, &observer, &ships);
        assert_eq!(even_tick.len(), 3);
        assert!(even_tick.iter().any(|u| u.scope == UpdateScope::Position));
    }

    #[test]
    fn apply_refreshes_dead_reckoning() {
        let mut ship = ship_at(0.0, None);
        let mut sync = StateSync::new();
        sync.set_current_tick(100);

        let update = ShipUpdate {
            uuid: ship.uuid,
            position: Point::new(10.0, 0.0),
            velocity: Point::new(1.0, 0.0),
            facing: Angle::new(90.0),
            shields: 0.5,
            hull: 0.75,
            energy: 0.6,
            fuel: 0.9,
            flags: 0,
            scope: UpdateScope::Full,
            tick: 100,
        };
        sync.apply_update(&mut ship, &update);

        assert_eq!(ship.position, Point::new(10.0, 0.0));
        assert!((ship.shields() - 0.5).abs() < 1e-6);

        let predicted = sync.predict_ship(&ship.uuid, 105).unwrap();
        assert_eq!(predicted.position, Point::new(15.0, 0.0));
    }

    #[test]
    fn minimal_scope_apply_keeps_vitals() {
        let mut ship = ship_at(0.0, None);
        ship.set_hull(0.4);
        let mut sync = StateSync::new();

        let update = ShipUpdate {
            uuid: ship.uuid,
            position: Point::new(3.0, 4.0),
            velocity: Point::ZERO,
            facing: Angle::default(),
            shields: 1.0,
            hull: 1.0,
            energy: 1.0,
            fuel: 1.0,
            flags: 0,
            scope: UpdateScope::Minimal,
            tick: 0,
        };
        sync.apply_update(&mut ship, &update);

        assert_eq!(ship.position, Point::new(3.0, 4.0));
        assert!((ship.hull() - 0.4).abs() < 1e-9);
    }
}
