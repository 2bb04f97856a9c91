pub mod angle;
pub mod collision;
pub mod command;
pub mod interest;
pub mod player;
pub mod reckon;
pub mod snapshot;
pub mod sync;
pub mod transport;
pub mod wire;
pub mod world;

pub use angle::{Angle, Point};
pub use collision::{CollisionAuthority, CollisionStats};
pub use command::{
    controls, CommandBuffer, CommandBufferError, CommandValidator, PlayerCommand, Verdict,
};
pub use interest::{InterestConfig, InterestLevel, InterestManager};
pub use player::{NetworkPlayer, PlayerStatus};
pub use reckon::{DeadReckoning, ReckonedState};
pub use snapshot::{SnapshotEntry, SnapshotManager, SnapshotStats};
pub use sync::projectile::{ProjectileDeath, ProjectileImpact, ProjectileSpawn, ProjectileSync};
pub use sync::state::{ShipUpdate, StateSync, UpdatePriority, UpdateScope};
pub use transport::{
    MemoryTransport, PeerId, Transport, TransportError, TransportEvent, TransportStats,
    UdpTransport,
};
pub use wire::{Message, WireError, WireReader, WireWriter};
pub use world::{AsteroidField, Flotsam, Projectile, Ship, Visual, WorldSnapshot};

pub const DEFAULT_PORT: u16 = 31337;
pub const DEFAULT_SIMULATION_HZ: u32 = 60;
pub const DEFAULT_BROADCAST_HZ: u32 = 20;
