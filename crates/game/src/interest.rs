use std::collections::HashMap;

use uuid::Uuid;

use crate::angle::Point;
use crate::world::{Projectile, Ship, Visual};

/// Relevance of an entity to one observer, by distance band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterestLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Distance bands and per-band update cadence, in ticks.
#[derive(Debug, Clone)]
pub struct InterestConfig {
    pub critical_range: f64,
    pub high_range: f64,
    pub medium_range: f64,
    pub low_range: f64,
    pub critical_period: u64,
    pub high_period: u64,
    pub medium_period: u64,
    pub low_period: u64,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            critical_range: 1000.0,
            high_range: 3000.0,
            medium_range: 6000.0,
            low_range: 10_000.0,
            critical_period: 1,
            high_period: 1,
            medium_period: 2,
            low_period: 5,
        }
    }
}

/// Tracks a center of interest per observer and classifies entities into
/// distance bands so the broadcaster can skip or slow down far updates.
#[derive(Debug, Default)]
pub struct InterestManager {
    config: InterestConfig,
    centers: HashMap<Uuid, Point>,
}

impl InterestManager {
    pub fn new(config: InterestConfig) -> Self {
        Self {
            config,
            centers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &InterestConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: InterestConfig) {
        self.config = config;
    }

    /// Update an observer's center of interest, typically their ship position.
    pub fn set_center(&mut self, player: Uuid, position: Point) {
        self.centers.insert(player, position);
    }

    pub fn remove_player(&mut self, player: &Uuid) {
        self.centers.remove(player);
    }

    pub fn player_count(&self) -> usize {
        self.centers.len()
    }

    pub fn clear(&mut self) {
        self.centers.clear();
    }

    fn distance_to(&self, player: &Uuid, position: Point) -> f64 {
        match self.centers.get(player) {
            Some(center) => position.distance(*center),
            None => f64::MAX,
        }
    }

    pub fn level_for_distance(&self, distance: f64) -> InterestLevel {
        let c = &self.config;
        if distance < c.critical_range {
            InterestLevel::Critical
        } else if distance < c.high_range {
            InterestLevel::High
        } else if distance < c.medium_range {
            InterestLevel::Medium
        } else if distance < c.low_range {
            InterestLevel::Low
        } else {
            InterestLevel::None
        }
    }

    /// A ship the observer owns is always critical, regardless of distance.
    pub fn ship_interest(&self, player: &Uuid, ship: &Ship) -> InterestLevel {
        if ship.owner == Some(*player) {
            return InterestLevel::Critical;
        }
        self.level_for_distance(self.distance_to(player, ship.position))
    }

    /// Projectiles threaten the observer when close, so the inner bands
    /// are tightened.
    pub fn projectile_interest(&self, player: &Uuid, projectile: &Projectile) -> InterestLevel {
        let distance = self.distance_to(player, projectile.position);
        let c = &self.config;
        if distance < c.critical_range * 0.5 {
            InterestLevel::Critical
        } else if distance < c.high_range * 0.75 {
            InterestLevel::High
        } else if distance < c.medium_range {
            InterestLevel::Medium
        } else if distance < c.low_range {
            InterestLevel::Low
        } else {
            InterestLevel::None
        }
    }

    pub fn visual_interest(&self, player: &Uuid, visual: &Visual) -> InterestLevel {
        self.level_for_distance(self.distance_to(player, visual.position))
    }

    /// Whether an entity at this interest level is due for an update on
    /// this tick.
    pub fn should_update_this_tick(&self, level: InterestLevel, tick: u64) -> bool {
        let period = match level {
            InterestLevel::Critical => self.config.critical_period,
            InterestLevel::High => self.config.high_period,
            InterestLevel::Medium => self.config.medium_period,
            InterestLevel::Low => self.config.low_period,
            InterestLevel::None => return false,
        };
        tick % period == 0
    }

    pub fn interested_ships<'a>(&self, player: &Uuid, ships: &'a [Ship]) -> Vec<&'a Ship> {
        ships
            .iter()
            .filter(|ship| self.ship_interest(player, ship) != InterestLevel::None)
            .collect()
    }

    pub fn interested_projectiles<'a>(
        &self,
        player: &Uuid,
        projectiles: &'a [Projectile],
    ) -> Vec<&'a Projectile> {
        projectiles
            .iter()
            .filter(|p| self.projectile_interest(player, p) != InterestLevel::None)
            .collect()
    }
}
