use thiserror::Error;
use uuid::Uuid;

use crate::angle::{Angle, Point};
use crate::command::PlayerCommand;
use crate::player::{NetworkPlayer, PlayerStatus};
use crate::sync::projectile::{ProjectileDeath, ProjectileImpact, ProjectileSpawn};
use crate::sync::state::{ShipUpdate, UpdateScope};
use crate::world::{Asteroid, AsteroidField, Flotsam, Projectile, Ship, Visual, WorldSnapshot};

/// One-byte message tags. Values are stable per deployment.
pub mod tag {
    pub const SERVER_WELCOME: u8 = 1;
    pub const STATE_UPDATE: u8 = 2;
    pub const PLAYER_JOINED: u8 = 3;
    pub const PLAYER_LEFT: u8 = 4;
    pub const COMMAND: u8 = 5;
    pub const PING: u8 = 6;
    pub const PONG: u8 = 7;
    pub const SERVER_MESSAGE: u8 = 8;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unexpected end of packet")]
    UnexpectedEnd,
    #[error("invalid utf-8 in string field")]
    BadUtf8,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("unknown update scope {0}")]
    BadScope(u8),
    #[error("unknown player status {0}")]
    BadStatus(u8),
}

/// Little-endian byte sink for outgoing records. All multi-byte integers
/// on the wire are little-endian; strings are u16-length-prefixed UTF-8.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(value as u8);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_uuid(&mut self, value: &Uuid) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn put_point(&mut self, value: Point) {
        self.put_f64(value.x);
        self.put_f64(value.y);
    }

    pub fn put_angle(&mut self, value: Angle) {
        self.put_f64(value.degrees());
    }

    pub fn put_str(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.put_u16(len as u16);
        self.buf.extend_from_slice(&bytes[..len]);
    }
}

/// Cursor over an incoming packet. Every read is bounds-checked; short
/// packets surface as `UnexpectedEnd` instead of a panic.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < count {
            return Err(WireError::UnexpectedEnd);
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn get_u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_f32(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn get_f64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn get_uuid(&mut self) -> Result<Uuid, WireError> {
        let bytes: [u8; 16] = self.take(16)?.try_into().unwrap();
        Ok(Uuid::from_bytes(bytes))
    }

    pub fn get_point(&mut self) -> Result<Point, WireError> {
        let x = self.get_f64()?;
        let y = self.get_f64()?;
        Ok(Point::new(x, y))
    }

    pub fn get_angle(&mut self) -> Result<Angle, WireError> {
        Ok(Angle::new(self.get_f64()?))
    }

    pub fn get_str(&mut self) -> Result<String, WireError> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::BadUtf8)
    }
}

// Record codecs. Field order is fixed so client and server agree
// bit-for-bit; see the payload tables in the protocol notes.

pub fn write_ship_update(w: &mut WireWriter, update: &ShipUpdate) {
    w.put_uuid(&update.uuid);
    w.put_u64(update.tick);
    w.put_u8(update.scope as u8);
    w.put_point(update.position);
    w.put_point(update.velocity);
    w.put_angle(update.facing);
    if update.scope.includes_vitals() {
        w.put_f32(update.shields);
        w.put_f32(update.hull);
        w.put_f32(update.energy);
        w.put_f32(update.fuel);
    }
    if update.scope.includes_flags() {
        w.put_u16(update.flags);
    }
}

pub fn read_ship_update(r: &mut WireReader) -> Result<ShipUpdate, WireError> {
    let uuid = r.get_uuid()?;
    let tick = r.get_u64()?;
    let scope_byte = r.get_u8()?;
    let scope = UpdateScope::from_u8(scope_byte).ok_or(WireError::BadScope(scope_byte))?;

    let mut update = ShipUpdate {
        uuid,
        position: r.get_point()?,
        velocity: r.get_point()?,
        facing: r.get_angle()?,
        shields: 1.0,
        hull: 1.0,
        energy: 1.0,
        fuel: 1.0,
        flags: 0,
        scope,
        tick,
    };
    if scope.includes_vitals() {
        update.shields = r.get_f32()?;
        update.hull = r.get_f32()?;
        update.energy = r.get_f32()?;
        update.fuel = r.get_f32()?;
    }
    if scope.includes_flags() {
        update.flags = r.get_u16()?;
    }
    Ok(update)
}

pub fn write_spawn(w: &mut WireWriter, spawn: &ProjectileSpawn) {
    w.put_u32(spawn.projectile_id);
    w.put_str(&spawn.weapon);
    w.put_uuid(&spawn.firing_ship);
    w.put_uuid(&spawn.target_ship);
    w.put_point(spawn.position);
    w.put_point(spawn.velocity);
    w.put_angle(spawn.facing);
    w.put_u64(spawn.spawn_tick);
}

pub fn read_spawn(r: &mut WireReader) -> Result<ProjectileSpawn, WireError> {
    Ok(ProjectileSpawn {
        projectile_id: r.get_u32()?,
        weapon: r.get_str()?,
        firing_ship: r.get_uuid()?,
        target_ship: r.get_uuid()?,
        position: r.get_point()?,
        velocity: r.get_point()?,
        facing: r.get_angle()?,
        spawn_tick: r.get_u64()?,
    })
}

pub fn write_impact(w: &mut WireWriter, impact: &ProjectileImpact) {
    w.put_u32(impact.projectile_id);
    w.put_uuid(&impact.target);
    w.put_point(impact.position);
    w.put_f64(impact.intersection);
    w.put_u64(impact.impact_tick);
}

pub fn read_impact(r: &mut WireReader) -> Result<ProjectileImpact, WireError> {
    Ok(ProjectileImpact {
        projectile_id: r.get_u32()?,
        target: r.get_uuid()?,
        position: r.get_point()?,
        intersection: r.get_f64()?,
        impact_tick: r.get_u64()?,
    })
}

pub fn write_death(w: &mut WireWriter, death: &ProjectileDeath) {
    w.put_u32(death.projectile_id);
    w.put_point(death.position);
    w.put_u64(death.death_tick);
}

pub fn read_death(r: &mut WireReader) -> Result<ProjectileDeath, WireError> {
    Ok(ProjectileDeath {
        projectile_id: r.get_u32()?,
        position: r.get_point()?,
        death_tick: r.get_u64()?,
    })
}

pub fn write_command(w: &mut WireWriter, command: &PlayerCommand) {
    w.put_uuid(&command.player);
    w.put_u64(command.tick);
    w.put_u32(command.sequence);
    w.put_u32(command.controls);
    match command.target_point {
        Some(point) => {
            w.put_bool(true);
            w.put_point(point);
        }
        None => w.put_bool(false),
    }
}

pub fn read_command(r: &mut WireReader) -> Result<PlayerCommand, WireError> {
    let player = r.get_uuid()?;
    let tick = r.get_u64()?;
    let sequence = r.get_u32()?;
    let controls = r.get_u32()?;
    let target_point = if r.get_bool()? {
        Some(r.get_point()?)
    } else {
        None
    };
    Ok(PlayerCommand {
        player,
        tick,
        controls,
        target_point,
        sequence,
    })
}

pub fn write_network_player(w: &mut WireWriter, player: &NetworkPlayer) {
    w.put_uuid(&player.uuid);
    w.put_str(&player.name);
    w.put_u8(player.status as u8);
}

pub fn read_network_player(r: &mut WireReader) -> Result<NetworkPlayer, WireError> {
    let uuid = r.get_uuid()?;
    let name = r.get_str()?;
    let status_byte = r.get_u8()?;
    let status = PlayerStatus::from_u8(status_byte).ok_or(WireError::BadStatus(status_byte))?;
    Ok(NetworkPlayer { uuid, name, status })
}

fn write_ship(w: &mut WireWriter, ship: &Ship) {
    w.put_uuid(&ship.uuid);
    match ship.owner {
        Some(owner) => {
            w.put_bool(true);
            w.put_uuid(&owner);
        }
        None => w.put_bool(false),
    }
    w.put_str(&ship.name);
    w.put_point(ship.position);
    w.put_point(ship.velocity);
    w.put_angle(ship.facing);
    w.put_f64(ship.radius);
    w.put_f32(ship.shields() as f32);
    w.put_f32(ship.hull() as f32);
    w.put_f32(ship.energy() as f32);
    w.put_f32(ship.fuel() as f32);
    w.put_u16(ship.flags);
}

fn read_ship(r: &mut WireReader) -> Result<Ship, WireError> {
    let uuid = r.get_uuid()?;
    let mut ship = Ship::new(uuid);
    if r.get_bool()? {
        ship.owner = Some(r.get_uuid()?);
    }
    ship.name = r.get_str()?;
    ship.position = r.get_point()?;
    ship.velocity = r.get_point()?;
    ship.facing = r.get_angle()?;
    ship.radius = r.get_f64()?;
    ship.set_shields(r.get_f32()? as f64);
    ship.set_hull(r.get_f32()? as f64);
    ship.set_energy(r.get_f32()? as f64);
    ship.set_fuel(r.get_f32()? as f64);
    ship.flags = r.get_u16()?;
    Ok(ship)
}

fn write_projectile(w: &mut WireWriter, projectile: &Projectile) {
    w.put_uuid(&projectile.uuid);
    w.put_str(&projectile.weapon);
    w.put_uuid(&projectile.fired_by);
    w.put_uuid(&projectile.owner.unwrap_or(Uuid::nil()));
    w.put_uuid(&projectile.target.unwrap_or(Uuid::nil()));
    w.put_point(projectile.position);
    w.put_point(projectile.velocity);
    w.put_angle(projectile.facing);
    w.put_f64(projectile.radius);
    w.put_f64(projectile.damage);
    w.put_u32(projectile.lifetime);
    w.put_u64(projectile.spawn_tick);
}

fn read_projectile(r: &mut WireReader) -> Result<Projectile, WireError> {
    let uuid = r.get_uuid()?;
    let weapon = r.get_str()?;
    let fired_by = r.get_uuid()?;
    let owner = r.get_uuid()?;
    let target = r.get_uuid()?;
    let mut projectile = Projectile::new(weapon, fired_by, r.get_point()?, r.get_point()?);
    projectile.uuid = uuid;
    projectile.owner = (!owner.is_nil()).then_some(owner);
    projectile.target = (!target.is_nil()).then_some(target);
    projectile.facing = r.get_angle()?;
    projectile.radius = r.get_f64()?;
    projectile.damage = r.get_f64()?;
    projectile.lifetime = r.get_u32()?;
    projectile.spawn_tick = r.get_u64()?;
    Ok(projectile)
}

/// Full world encoding, used by SERVER_WELCOME.
pub fn write_world(w: &mut WireWriter, world: &WorldSnapshot) {
    w.put_str(world.region().unwrap_or(""));
    w.put_u64(world.tick());

    w.put_u16(world.ships.len() as u16);
    for ship in &world.ships {
        write_ship(w, ship);
    }

    w.put_u16(world.projectiles.len() as u16);
    for projectile in &world.projectiles {
        write_projectile(w, projectile);
    }

    w.put_u16(world.flotsam.len() as u16);
    for flotsam in &world.flotsam {
        w.put_uuid(&flotsam.uuid);
        w.put_point(flotsam.position);
        w.put_point(flotsam.velocity);
        w.put_str(&flotsam.commodity);
        w.put_u32(flotsam.count);
    }

    w.put_u16(world.visuals.len() as u16);
    for visual in &world.visuals {
        w.put_str(&visual.effect);
        w.put_point(visual.position);
        w.put_point(visual.velocity);
        w.put_u32(visual.lifetime);
    }

    match &world.asteroids {
        Some(field) => {
            w.put_bool(true);
            w.put_u16(field.asteroids.len() as u16);
            for asteroid in &field.asteroids {
                w.put_uuid(&asteroid.uuid);
                w.put_point(asteroid.position);
                w.put_point(asteroid.velocity);
                w.put_f64(asteroid.radius);
            }
        }
        None => w.put_bool(false),
    }
}

pub fn read_world(r: &mut WireReader) -> Result<WorldSnapshot, WireError> {
    let region = r.get_str()?;
    let mut world = WorldSnapshot::new(region);
    world.set_tick(r.get_u64()?);

    let ship_count = r.get_u16()?;
    for _ in 0..ship_count {
        world.add_ship(read_ship(r)?);
    }

    let projectile_count = r.get_u16()?;
    for _ in 0..projectile_count {
        world.add_projectile(read_projectile(r)?);
    }

    let flotsam_count = r.get_u16()?;
    for _ in 0..flotsam_count {
        let uuid = r.get_uuid()?;
        let position = r.get_point()?;
        let velocity = r.get_point()?;
        let commodity = r.get_str()?;
        let count = r.get_u32()?;
        let mut flotsam = Flotsam::new(position, commodity, count);
        flotsam.uuid = uuid;
        flotsam.velocity = velocity;
        world.flotsam.push(flotsam);
    }

    let visual_count = r.get_u16()?;
    for _ in 0..visual_count {
        let effect = r.get_str()?;
        let position = r.get_point()?;
        let velocity = r.get_point()?;
        let lifetime = r.get_u32()?;
        let mut visual = Visual::new(effect, position, lifetime);
        visual.velocity = velocity;
        world.visuals.push(visual);
    }

    if r.get_bool()? {
        let mut field = AsteroidField::default();
        let count = r.get_u16()?;
        for _ in 0..count {
            field.asteroids.push(Asteroid {
                uuid: r.get_uuid()?,
                position: r.get_point()?,
                velocity: r.get_point()?,
                radius: r.get_f64()?,
            });
        }
        world.asteroids = Some(field);
    }

    Ok(world)
}

/// A complete tagged message, the unit the transport carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ServerWelcome {
        player: Uuid,
        world: WorldSnapshot,
    },
    StateUpdate {
        tick: u64,
        ships: Vec<ShipUpdate>,
        spawns: Vec<ProjectileSpawn>,
        impacts: Vec<ProjectileImpact>,
        deaths: Vec<ProjectileDeath>,
    },
    PlayerJoined(NetworkPlayer),
    PlayerLeft(Uuid),
    Command(PlayerCommand),
    Ping { timestamp: u64 },
    Pong { timestamp: u64 },
    /// Operator broadcast shown in the client's chat log.
    ServerMessage(String),
}

impl Message {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::new();
        match self {
            Message::ServerWelcome { player, world } => {
                w.put_u8(tag::SERVER_WELCOME);
                w.put_uuid(player);
                write_world(&mut w, world);
            }
            Message::StateUpdate {
                tick,
                ships,
                spawns,
                impacts,
                deaths,
            } => {
                w.put_u8(tag::STATE_UPDATE);
                w.put_u64(*tick);
                w.put_u16(ships.len() as u16);
                for update in ships {
                    write_ship_update(&mut w, update);
                }
                w.put_u16(spawns.len() as u16);
                for spawn in spawns {
                    write_spawn(&mut w, spawn);
                }
                w.put_u16(impacts.len() as u16);
                for impact in impacts {
                    write_impact(&mut w, impact);
                }
                w.put_u16(deaths.len() as u16);
                for death in deaths {
                    write_death(&mut w, death);
                }
            }
            Message::PlayerJoined(player) => {
                w.put_u8(tag::PLAYER_JOINED);
                write_network_player(&mut w, player);
            }
            Message::PlayerLeft(player) => {
                w.put_u8(tag::PLAYER_LEFT);
                w.put_uuid(player);
            }
            Message::Command(command) => {
                w.put_u8(tag::COMMAND);
                write_command(&mut w, command);
            }
            Message::Ping { timestamp } => {
                w.put_u8(tag::PING);
                w.put_u64(*timestamp);
            }
            Message::Pong { timestamp } => {
                w.put_u8(tag::PONG);
                w.put_u64(*timestamp);
            }
            Message::ServerMessage(text) => {
                w.put_u8(tag::SERVER_MESSAGE);
                w.put_str(text);
            }
        }
        w.finish()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut r = WireReader::new(data);
        let tag_byte = r.get_u8()?;
        match tag_byte {
            tag::SERVER_WELCOME => Ok(Message::ServerWelcome {
                player: r.get_uuid()?,
                world: read_world(&mut r)?,
            }),
            tag::STATE_UPDATE => {
                let tick = r.get_u64()?;
                let ship_count = r.get_u16()?;
                let mut ships = Vec::with_capacity(ship_count as usize);
                for _ in 0..ship_count {
                    ships.push(read_ship_update(&mut r)?);
                }
                let spawn_count = r.get_u16()?;
                let mut spawns = Vec::with_capacity(spawn_count as usize);
                for _ in 0..spawn_count {
                    spawns.push(read_spawn(&mut r)?);
                }
                let impact_count = r.get_u16()?;
                let mut impacts = Vec::with_capacity(impact_count as usize);
                for _ in 0..impact_count {
                    impacts.push(read_impact(&mut r)?);
                }
                let death_count = r.get_u16()?;
                let mut deaths = Vec::with_capacity(death_count as usize);
                for _ in 0..death_count {
                    deaths.push(read_death(&mut r)?);
                }
                Ok(Message::StateUpdate {
                    tick,
                    ships,
                    spawns,
                    impacts,
                    deaths,
                })
            }
            tag::PLAYER_JOINED => Ok(Message::PlayerJoined(read_network_player(&mut r)?)),
            tag::PLAYER_LEFT => Ok(Message::PlayerLeft(r.get_uuid()?)),
            tag::COMMAND => Ok(Message::Command(read_command(&mut r)?)),
            tag::PING => Ok(Message::Ping {
                timestamp: r.get_u64()?,
            }),
            tag::PONG => Ok(Message::Pong {
                timestamp: r.get_u64()?,
            }),
            tag::SERVER_MESSAGE => Ok(Message::ServerMessage(r.get_str()?)),
            other => Err(WireError::UnknownTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_roundtrip() {
        let mut w = WireWriter::new();
        w.put_u8(7);
        w.put_u16(300);
        w.put_u32(70_000);
        w.put_u64(u64::MAX - 1);
        w.put_f64(-1.5);
        w.put_str("blaster");
        let bytes = w.finish();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.get_u8().unwrap(), 7);
        assert_eq!(r.get_u16().unwrap(), 300);
        assert_eq!(r.get_u32().unwrap(), 70_000);
        assert_eq!(r.get_u64().unwrap(), u64::MAX - 1);
        assert_eq!(r.get_f64().unwrap(), -1.5);
        assert_eq!(r.get_str().unwrap(), "blaster");
        assert!(r.is_empty());
    }

    #[test]
    fn integers_are_little_endian() {
        let mut w = WireWriter::new();
        w.put_u32(0x0102_0304);
        assert_eq!(w.finish(), vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn short_packet_is_an_error_not_a_panic() {
        let mut r = WireReader::new(&[1, 2]);
        assert_eq!(r.get_u32(), Err(WireError::UnexpectedEnd));
    }

    #[test]
    fn ship_update_full_roundtrip() {
        let update = ShipUpdate {
            uuid: Uuid::new_v4(),
            position: Point::new(1.0, -2.0),
            velocity: Point::new(0.5, 0.25),
            facing: Angle::new(123.0),
            shields: 0.5,
            hull: 0.75,
            energy: 0.1,
            fuel: 0.9,
            flags: 0b1010,
            scope: UpdateScope::Full,
            tick: 42,
        };
        let mut w = WireWriter::new();
        write_ship_update(&mut w, &update);
        let bytes = w.finish();

        let mut r = WireReader::new(&bytes);
        assert_eq!(read_ship_update(&mut r).unwrap(), update);
        assert!(r.is_empty());
    }

    #[test]
    fn ship_update_minimal_omits_vitals() {
        let full_len = {
            let mut w = WireWriter::new();
            write_ship_update(
                &mut w,
                &ShipUpdate {
                    uuid: Uuid::nil(),
                    position: Point::ZERO,
                    velocity: Point::ZERO,
                    facing: Angle::default(),
                    shields: 1.0,
                    hull: 1.0,
                    energy: 1.0,
                    fuel: 1.0,
                    flags: 0,
                    scope: UpdateScope::Full,
                    tick: 0,
                },
            );
            w.len()
        };
        let minimal_len = {
            let mut w = WireWriter::new();
            write_ship_update(
                &mut w,
                &ShipUpdate {
                    uuid: Uuid::nil(),
                    position: Point::ZERO,
                    velocity: Point::ZERO,
                    facing: Angle::default(),
                    shields: 1.0,
                    hull: 1.0,
                    energy: 1.0,
                    fuel: 1.0,
                    flags: 0,
                    scope: UpdateScope::Minimal,
                    tick: 0,
                },
            );
            w.len()
        };
        assert_eq!(full_len - minimal_len, 4 * 4 + 2);
    }

    #[test]
    fn projectile_events_roundtrip() {
        let spawn = ProjectileSpawn {
            projectile_id: 9,
            weapon: "torpedo".into(),
            firing_ship: Uuid::new_v4(),
            target_ship: Uuid::nil(),
            position: Point::new(5.0, 6.0),
            velocity: Point::new(-1.0, 0.0),
            facing: Angle::new(270.0),
            spawn_tick: 1000,
        };
        let impact = ProjectileImpact {
            projectile_id: 9,
            target: Uuid::new_v4(),
            position: Point::new(7.0, 6.0),
            intersection: 3.5,
            impact_tick: 1010,
        };
        let death = ProjectileDeath {
            projectile_id: 10,
            position: Point::new(0.0, 0.0),
            death_tick: 1020,
        };

        let mut w = WireWriter::new();
        write_spawn(&mut w, &spawn);
        write_impact(&mut w, &impact);
        write_death(&mut w, &death);
        let bytes = w.finish();

        let mut r = WireReader::new(&bytes);
        assert_eq!(read_spawn(&mut r).unwrap(), spawn);
        assert_eq!(read_impact(&mut r).unwrap(), impact);
        assert_eq!(read_death(&mut r).unwrap(), death);
    }

    #[test]
    fn command_roundtrip_with_and_without_target() {
        let plain = PlayerCommand::new(Uuid::new_v4(), 77, 0b110, 3);
        let targeted = PlayerCommand::new(Uuid::new_v4(), 78, 0b1, 4)
            .with_target(Point::new(100.0, -50.0));

        for command in [&plain, &targeted] {
            let mut w = WireWriter::new();
            write_command(&mut w, command);
            let bytes = w.finish();
            let mut r = WireReader::new(&bytes);
            let decoded = read_command(&mut r).unwrap();
            assert_eq!(&decoded, command);
            assert_eq!(decoded.controls, command.controls);
            assert_eq!(decoded.target_point, command.target_point);
        }
    }

    #[test]
    fn message_tags_are_stable() {
        let ping = Message::Ping { timestamp: 1 };
        assert_eq!(ping.encode()[0], tag::PING);
        let left = Message::PlayerLeft(Uuid::nil());
        assert_eq!(left.encode()[0], tag::PLAYER_LEFT);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(Message::decode(&[200]), Err(WireError::UnknownTag(200)));
    }

    #[test]
    fn welcome_roundtrips_world() {
        let mut world = WorldSnapshot::new("Alpha Centauri");
        world.set_tick(512);
        let mut ship = Ship::new(Uuid::new_v4());
        ship.owner = Some(Uuid::new_v4());
        ship.name = "Falcon".into();
        ship.position = Point::new(10.0, 20.0);
        ship.set_shields(0.5);
        world.add_ship(ship);
        world.add_projectile(Projectile::new(
            "blaster",
            Uuid::new_v4(),
            Point::ZERO,
            Point::new(8.0, 0.0),
        ));
        world.flotsam.push(Flotsam::new(Point::new(1.0, 1.0), "Food", 3));
        world.visuals.push(Visual::new("explosion", Point::ZERO, 12));

        let message = Message::ServerWelcome {
            player: Uuid::new_v4(),
            world,
        };
        let decoded = Message::decode(&message.encode()).unwrap();
        let Message::ServerWelcome { world: got, .. } = decoded else {
            panic!("wrong message variant");
        };
        assert_eq!(got.region(), Some("Alpha Centauri"));
        assert_eq!(got.tick(), 512);
        assert_eq!(got.ship_count(), 1);
        assert_eq!(got.ships[0].name, "Falcon");
        assert!((got.ships[0].shields() - 0.5).abs() < 1e-6);
        assert_eq!(got.projectile_count(), 1);
        assert_eq!(got.flotsam.len(), 1);
        assert_eq!(got.visuals.len(), 1);
    }

    #[test]
    fn state_update_roundtrip() {
        let message = Message::StateUpdate {
            tick: 99,
            ships: vec![],
            spawns: vec![ProjectileSpawn {
                projectile_id: 1,
                weapon: "blaster".into(),
                firing_ship: Uuid::new_v4(),
                target_ship: Uuid::nil(),
                position: Point::ZERO,
                velocity: Point::new(1.0, 2.0),
                facing: Angle::new(12.0),
                spawn_tick: 99,
            }],
            impacts: vec![],
            deaths: vec![ProjectileDeath {
                projectile_id: 2,
                position: Point::new(4.0, 4.0),
                death_tick: 98,
            }],
        };
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }
}
