use uuid::Uuid;

use crate::angle::Point;
use crate::sync::projectile::ProjectileSync;
use crate::world::{Visual, WorldSnapshot};

/// What a projectile resolved against this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionKind {
    Ship,
    Asteroid,
    Expired,
}

#[derive(Debug, Clone)]
pub struct CollisionResult {
    pub projectile_id: u32,
    pub kind: CollisionKind,
    pub target: Uuid,
    pub position: Point,
    pub intersection: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionStats {
    pub total_collisions: u64,
    pub ship_hits: u64,
    pub asteroid_hits: u64,
    pub expiries: u64,
}

/// Server-only collision resolution for projectiles.
///
/// Clients never run this; they receive the resulting impact and death
/// events. Per projectile per tick the first hit wins: ships owned by
/// someone other than the firer are tested first, then asteroids.
#[derive(Debug, Default)]
pub struct CollisionAuthority {
    stats: CollisionStats,
}

impl CollisionAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    pub fn reset_statistics(&mut self) {
        self.stats = CollisionStats::default();
    }

    /// Resolve every live projectile against eligible targets, emitting
    /// impacts and deaths into the projectile sync and applying damage.
    /// Hit or expired projectiles are marked dead; the caller prunes them.
    pub fn resolve(&mut self, world: &mut WorldSnapshot, sync: &mut ProjectileSync) -> Vec<CollisionResult> {
        let mut results = Vec::new();

        for index in 0..world.projectiles.len() {
            let projectile = world.projectiles[index].clone();
            if projectile.dead {
                continue;
            }
            let Some(id) = sync.network_id(&projectile.uuid) else {
                continue;
            };

            if projectile.is_expired() {
                sync.register_death(id, projectile.position);
                world.projectiles[index].dead = true;
                self.stats.expiries += 1;
                results.push(CollisionResult {
                    projectile_id: id,
                    kind: CollisionKind::Expired,
                    target: Uuid::nil(),
                    position: projectile.position,
                    intersection: 0.0,
                });
                continue;
            }

            if let Some(mut result) = Self::first_hit(&projectile, world) {
                result.projectile_id = id;
                match result.kind {
                    CollisionKind::Ship => {
                        self.stats.ship_hits += 1;
                        if let Some(ship) = world.ship_mut(&result.target) {
                            ship.apply_damage(projectile.damage);
                        }
                    }
                    CollisionKind::Asteroid => self.stats.asteroid_hits += 1,
                    CollisionKind::Expired => unreachable!(),
                }
                self.stats.total_collisions += 1;
                sync.register_impact(id, result.target, result.position, result.intersection);
                world
                    .visuals
                    .push(Visual::new("impact", result.position, 30));
                world.projectiles[index].dead = true;
                results.push(result);
            }
        }

        results
    }

    fn first_hit(
        projectile: &crate::world::Projectile,
        world: &WorldSnapshot,
    ) -> Option<CollisionResult> {
        for ship in &world.ships {
            // No friendly fire against the firing player's own ships.
            if projectile.owner.is_some() && ship.owner == projectile.owner {
                continue;
            }
            if ship.uuid == projectile.fired_by {
                continue;
            }
            if let Some((_, intersection)) = Self::circles_collide(
                projectile.position,
                projectile.radius,
                ship.position,
                ship.radius,
            ) {
                return Some(CollisionResult {
                    projectile_id: 0,
                    kind: CollisionKind::Ship,
                    target: ship.uuid,
                    position: projectile.position,
                    intersection,
                });
            }
        }

        if let Some(field) = &world.asteroids {
            for asteroid in &field.asteroids {
                if let Some((_, intersection)) = Self::circles_collide(
                    projectile.position,
                    projectile.radius,
                    asteroid.position,
                    asteroid.radius,
                ) {
                    return Some(CollisionResult {
                        projectile_id: 0,
                        kind: CollisionKind::Asteroid,
                        target: asteroid.uuid,
                        position: projectile.position,
                        intersection,
                    });
                }
            }
        }

        None
    }

    /// Circle-vs-circle test with summed radii. On hit, returns the
    /// distance and the penetration depth into the target.
    fn circles_collide(
        pos1: Point,
        radius1: f64,
        pos2: Point,
        radius2: f64,
    ) -> Option<(f64, f64)> {
        let distance = pos1.distance(pos2);
        if distance < radius1 + radius2 {
            Some((distance, (radius2 - distance).max(0.0)))
        } else {
            None
        }
    }
}
