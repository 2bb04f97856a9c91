use std::collections::HashMap;

use uuid::Uuid;

use crate::angle::{Angle, Point};
use crate::world::{Projectile, Visual, WorldSnapshot};

/// Server-to-client announcement of a newly fired projectile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpawn {
    pub projectile_id: u32,
    pub weapon: String,
    pub firing_ship: Uuid,
    /// Nil when the shot has no guided target.
    pub target_ship: Uuid,
    pub position: Point,
    pub velocity: Point,
    pub facing: Angle,
    pub spawn_tick: u64,
}

/// Server-to-client impact resolution for one projectile.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileImpact {
    pub projectile_id: u32,
    pub target: Uuid,
    pub position: Point,
    pub intersection: f64,
    pub impact_tick: u64,
}

/// Server-to-client notice that a projectile expired without hitting.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileDeath {
    pub projectile_id: u32,
    pub position: Point,
    pub death_tick: u64,
}

/// Tracks network ids for projectiles and queues spawn/impact/death
/// events until the broadcaster drains them.
///
/// Ids are handed out from 1 and bound to the projectile's uuid, never to
/// a position in the world's collection, so bindings stay valid across
/// compaction. A binding dies with its projectile: impact, death, or a
/// server-wide clear.
#[derive(Debug)]
pub struct ProjectileSync {
    current_tick: u64,
    next_id: u32,
    pending_spawns: Vec<ProjectileSpawn>,
    pending_impacts: Vec<ProjectileImpact>,
    pending_deaths: Vec<ProjectileDeath>,
    id_to_uuid: HashMap<u32, Uuid>,
    uuid_to_id: HashMap<Uuid, u32>,
}

impl Default for ProjectileSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectileSync {
    pub fn new() -> Self {
        Self {
            current_tick: 0,
            next_id: 1,
            pending_spawns: Vec::new(),
            pending_impacts: Vec::new(),
            pending_deaths: Vec::new(),
            id_to_uuid: HashMap::new(),
            uuid_to_id: HashMap::new(),
        }
    }

    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Server side: assign a network id to a freshly spawned projectile
    /// and queue the spawn event.
    pub fn register_spawn(&mut self, projectile: &Projectile) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        self.id_to_uuid.insert(id, projectile.uuid);
        self.uuid_to_id.insert(projectile.uuid, id);

        self.pending_spawns.push(ProjectileSpawn {
            projectile_id: id,
            weapon: projectile.weapon.clone(),
            firing_ship: projectile.fired_by,
            target_ship: projectile.target.unwrap_or(Uuid::nil()),
            position: projectile.position,
            velocity: projectile.velocity,
            facing: projectile.facing,
            spawn_tick: self.current_tick,
        });
        id
    }

    pub fn register_impact(&mut self, projectile_id: u32, target: Uuid, position: Point, intersection: f64) {
        self.pending_impacts.push(ProjectileImpact {
            projectile_id,
            target,
            position,
            intersection,
            impact_tick: self.current_tick,
        });
        self.unbind(projectile_id);
    }

    pub fn register_death(&mut self, projectile_id: u32, position: Point) {
        self.pending_deaths.push(ProjectileDeath {
            projectile_id,
            position,
            death_tick: self.current_tick,
        });
        self.unbind(projectile_id);
    }

    fn unbind(&mut self, projectile_id: u32) {
        if let Some(uuid) = self.id_to_uuid.remove(&projectile_id) {
            self.uuid_to_id.remove(&uuid);
        }
    }

    /// Drain queued spawns for the outgoing broadcast.
    pub fn take_pending_spawns(&mut self) -> Vec<ProjectileSpawn> {
        std::mem::take(&mut self.pending_spawns)
    }

    pub fn take_pending_impacts(&mut self) -> Vec<ProjectileImpact> {
        std::mem::take(&mut self.pending_impacts)
    }

    pub fn take_pending_deaths(&mut self) -> Vec<ProjectileDeath> {
        std::mem::take(&mut self.pending_deaths)
    }

    pub fn network_id(&self, projectile: &Uuid) -> Option<u32> {
        self.uuid_to_id.get(projectile).copied()
    }

    pub fn is_tracked(&self, projectile: &Uuid) -> bool {
        self.uuid_to_id.contains_key(projectile)
    }

    pub fn find_by_network_id<'a>(
        &self,
        id: u32,
        world: &'a WorldSnapshot,
    ) -> Option<&'a Projectile> {
        let uuid = self.id_to_uuid.get(&id)?;
        world.projectile(uuid)
    }

    /// Client side: materialize a projectile announced by the server.
    pub fn apply_spawn(&mut self, spawn: &ProjectileSpawn, world: &mut WorldSnapshot) {
        let mut projectile = Projectile::new(
            spawn.weapon.clone(),
            spawn.firing_ship,
            spawn.position,
            spawn.velocity,
        );
        projectile.facing = spawn.facing;
        projectile.target = if spawn.target_ship.is_nil() {
            None
        } else {
            Some(spawn.target_ship)
        };
        projectile.spawn_tick = spawn.spawn_tick;
        projectile.owner = world.ship(&spawn.firing_ship).and_then(|ship| ship.owner);

        self.id_to_uuid.insert(spawn.projectile_id, projectile.uuid);
        self.uuid_to_id.insert(projectile.uuid, spawn.projectile_id);
        world.add_projectile(projectile);
    }

    /// Client side: resolve an authoritative impact, spawning the hit
    /// visual and removing the projectile.
    pub fn apply_impact(&mut self, impact: &ProjectileImpact, world: &mut WorldSnapshot) {
        if let Some(uuid) = self.id_to_uuid.get(&impact.projectile_id).copied() {
            world.projectiles.retain(|p| p.uuid != uuid);
        }
        world
            .visuals
            .push(Visual::new("impact", impact.position, 30));
        self.unbind(impact.projectile_id);
    }

    pub fn apply_death(&mut self, death: &ProjectileDeath, world: &mut WorldSnapshot) {
        if let Some(uuid) = self.id_to_uuid.get(&death.projectile_id).copied() {
            world.projectiles.retain(|p| p.uuid != uuid);
        }
        self.unbind(death.projectile_id);
    }

    pub fn tracked_count(&self) -> usize {
        self.uuid_to_id.len()
    }

    pub fn next_projectile_id(&self) -> u32 {
        self.next_id
    }

    pub fn clear(&mut self) {
        self.pending_spawns.clear();
        self.pending_impacts.clear();
        self.pending_deaths.clear();
        self.id_to_uuid.clear();
        self.uuid_to_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projectile() -> Projectile {
        Projectile::new("blaster", Uuid::new_v4(), Point::ZERO, Point::new(8.0, 0.0))
    }

    #[test]
    fn ids_are_monotone_from_one() {
        let mut sync = ProjectileSync::new();
        assert_eq!(sync.register_spawn(&projectile()), 1);
        assert_eq!(sync.register_spawn(&projectile()), 2);
        assert_eq!(sync.next_projectile_id(), 3);
    }

    #[test]
    fn pending_events_drain_once() {
        let mut sync = ProjectileSync::new();
        sync.register_spawn(&projectile());
        assert_eq!(sync.take_pending_spawns().len(), 1);
        assert!(sync.take_pending_spawns().is_empty());
    }

    #[test]
    fn impact_drops_binding() {
        let mut sync = ProjectileSync::new();
        let p = projectile();
        let id = sync.register_spawn(&p);
        assert!(sync.is_tracked(&p.uuid));

        sync.register_impact(id, Uuid::new_v4(), Point::ZERO, 1.0);
        assert!(!sync.is_tracked(&p.uuid));
        assert_eq!(sync.take_pending_impacts().len(), 1);
    }

    #[test]
    fn spawn_roundtrip_through_world() {
        let mut server_sync = ProjectileSync::new();
        server_sync.set_current_tick(42);
        let p = projectile();
        server_sync.register_spawn(&p);
        let spawns = server_sync.take_pending_spawns();

        let mut client_sync = ProjectileSync::new();
        let mut client_world = WorldSnapshot::new("Sol");
        client_sync.apply_spawn(&spawns[0], &mut client_world);

        assert_eq!(client_world.projectile_count(), 1);
        let found = client_sync.find_by_network_id(spawns[0].projectile_id, &client_world);
        assert!(found.is_some());
        assert_eq!(found.unwrap().spawn_tick, 42);
    }

    #[test]
    fn apply_impact_removes_projectile_and_adds_visual() {
        let mut server_sync = ProjectileSync::new();
        let p = projectile();
        let id = server_sync.register_spawn(&p);
        let spawn = server_sync.take_pending_spawns().remove(0);

        let mut sync = ProjectileSync::new();
        let mut world = WorldSnapshot::new("Sol");
        sync.apply_spawn(&spawn, &mut world);

        let impact = ProjectileImpact {
            projectile_id: id,
            target: Uuid::new_v4(),
            position: Point::new(4.0, 0.0),
            intersection: 2.0,
            impact_tick: 50,
        };
        sync.apply_impact(&impact, &mut world);

        assert_eq!(world.projectile_count(), 0);
        assert_eq!(world.visuals.len(), 1);
        assert_eq!(sync.tracked_count(), 0);
    }
}
