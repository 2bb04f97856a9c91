use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::world::WorldSnapshot;

pub const DEFAULT_HISTORY_SIZE: usize = 120;
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 30;

/// One retained world snapshot plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub tick: u64,
    pub captured_at_ms: u64,
    pub world: WorldSnapshot,
    /// Estimated bytes after delta compression, for bandwidth planning.
    pub estimated_size: usize,
    pub keyframe: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_keyframes: u64,
    pub total_uncompressed_bytes: u64,
    pub total_compressed_bytes: u64,
}

impl SnapshotStats {
    pub fn total_delta_snapshots(&self) -> u64 {
        self.total_snapshots - self.total_keyframes
    }

    pub fn average_compression_ratio(&self) -> f64 {
        if self.total_uncompressed_bytes == 0 {
            return 1.0;
        }
        self.total_compressed_bytes as f64 / self.total_uncompressed_bytes as f64
    }
}

/// Bounded FIFO of recent world snapshots with a keyframe cadence.
///
/// Every Kth snapshot is a keyframe (full state, no delta). The size
/// figures are a conservative statistical model, not a wire encoding;
/// the broadcaster decides what actually goes on the wire.
#[derive(Debug)]
pub struct SnapshotManager {
    snapshots: VecDeque<SnapshotEntry>,
    history_size: usize,
    keyframe_interval: u32,
    since_last_keyframe: u32,
    stats: SnapshotStats,
}

impl Default for SnapshotManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl SnapshotManager {
    pub fn new(history_size: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            history_size,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            since_last_keyframe: 0,
            stats: SnapshotStats::default(),
        }
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn set_history_size(&mut self, size: usize) {
        self.history_size = size;
    }

    pub fn keyframe_interval(&self) -> u32 {
        self.keyframe_interval
    }

    pub fn set_keyframe_interval(&mut self, interval: u32) {
        self.keyframe_interval = interval;
    }

    pub fn create_snapshot(&mut self, world: &WorldSnapshot, tick: u64, force_keyframe: bool) {
        let keyframe = force_keyframe
            || self.snapshots.is_empty()
            || self.since_last_keyframe + 1 >= self.keyframe_interval;

        let uncompressed = Self::estimate_full_size(world);
        let compressed = if keyframe {
            uncompressed
        } else {
            Self::estimate_delta_size(world)
        };

        self.stats.total_snapshots += 1;
        if keyframe {
            self.stats.total_keyframes += 1;
            self.since_last_keyframe = 0;
        } else {
            self.since_last_keyframe += 1;
        }
        self.stats.total_uncompressed_bytes += uncompressed as u64;
        self.stats.total_compressed_bytes += compressed as u64;

        self.snapshots.push_back(SnapshotEntry {
            tick,
            captured_at_ms: now_ms(),
            world: world.clone(),
            estimated_size: compressed,
            keyframe,
        });

        while self.snapshots.len() > self.history_size {
            self.snapshots.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&SnapshotEntry> {
        self.snapshots.back()
    }

    /// Exact-tick lookup. Entries are tick-sorted, so this is a binary
    /// search.
    pub fn at_tick(&self, tick: u64) -> Option<&SnapshotEntry> {
        let index = self
            .snapshots
            .binary_search_by(|entry| entry.tick.cmp(&tick))
            .ok()?;
        self.snapshots.get(index)
    }

    /// All snapshots strictly newer than the given tick, oldest first.
    pub fn since_tick(&self, tick: u64) -> Vec<&SnapshotEntry> {
        let start = self.snapshots.partition_point(|entry| entry.tick <= tick);
        self.snapshots.range(start..).collect()
    }

    pub fn prune_older_than(&mut self, tick: u64) {
        while self
            .snapshots
            .front()
            .is_some_and(|entry| entry.tick < tick)
        {
            self.snapshots.pop_front();
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn stats(&self) -> SnapshotStats {
        self.stats
    }

    /// Rough retained-memory figure for the operator status view.
    pub fn memory_usage(&self) -> usize {
        self.snapshots
            .iter()
            .map(|entry| {
                std::mem::size_of::<SnapshotEntry>() + Self::estimate_full_size(&entry.world)
            })
            .sum()
    }

    /// Uncompressed size model: header plus per-entity records.
    pub fn estimate_full_size(world: &WorldSnapshot) -> usize {
        32 + world.ship_count() * 128
            + world.projectile_count() * 32
            + world.visuals.len() * 24
            + world.flotsam.len() * 64
            + 64
    }

    /// Delta size model: fixed header, ~30% of ships as motion records,
    /// all projectiles and visuals, times a 0.3 compression factor.
    pub fn estimate_delta_size(world: &WorldSnapshot) -> usize {
        let raw = 32
            + (world.ship_count() * 30 / 100) * 48
            + world.projectile_count() * 32
            + world.visuals.len() * 24;
        raw * 3 / 10
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_at(tick: u64) -> WorldSnapshot {
        let mut world = WorldSnapshot::new("Sol");
        world.set_tick(tick);
        world
    }

    #[test]
    fn ring_keeps_most_recent_entries() {
        let mut manager = SnapshotManager::new(4);
        for tick in 0..10 {
            manager.create_snapshot(&world_at(tick), tick, false);
        }
        assert_eq!(manager.len(), 4);
        let ticks: Vec<u64> = manager.entries().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![6, 7, 8, 9]);
    }

    #[test]
    fn keyframes_at_configured_stride() {
        let mut manager = SnapshotManager::new(200);
        manager.set_keyframe_interval(3);
        for tick in 0..8 {
            manager.create_snapshot(&world_at(tick), tick, false);
        }
        let flags: Vec<bool> = manager.entries().map(|s| s.keyframe).collect();
        // Keyframes land at stride keyframe_interval, starting from the
        // first snapshot.
        assert_eq!(flags, vec![true, false, false, true, false, false, true, false]);
    }

    #[test]
    fn forced_keyframe_resets_cadence() {
        let mut manager = SnapshotManager::new(200);
        manager.set_keyframe_interval(5);
        manager.create_snapshot(&world_at(0), 0, false);
        manager.create_snapshot(&world_at(1), 1, false);
        manager.create_snapshot(&world_at(2), 2, true);
        let flags: Vec<bool> = manager.entries().map(|s| s.keyframe).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(manager.stats().total_keyframes, 2);
    }

    #[test]
    fn exact_tick_lookup() {
        let mut manager = SnapshotManager::new(16);
        for tick in [5, 6, 7, 9] {
            manager.create_snapshot(&world_at(tick), tick, false);
        }
        assert_eq!(manager.at_tick(7).unwrap().tick, 7);
        assert!(manager.at_tick(8).is_none());
        assert!(manager.at_tick(100).is_none());
    }

    #[test]
    fn since_tick_is_strictly_newer() {
        let mut manager = SnapshotManager::new(16);
        for tick in 0..5 {
            manager.create_snapshot(&world_at(tick), tick, false);
        }
        let ticks: Vec<u64> = manager.since_tick(2).iter().map(|s| s.tick).collect();
        assert_eq!(ticks, vec![3, 4]);
    }

    #[test]
    fn delta_estimate_is_smaller_than_full() {
        let mut world = world_at(0);
        for _ in 0..10 {
            world.add_ship(crate::world::Ship::new(uuid::Uuid::new_v4()));
        }
        assert!(SnapshotManager::estimate_delta_size(&world) < SnapshotManager::estimate_full_size(&world));
    }

    #[test]
    fn prune_drops_old_ticks() {
        let mut manager = SnapshotManager::new(16);
        for tick in 0..6 {
            manager.create_snapshot(&world_at(tick), tick, false);
        }
        manager.prune_older_than(4);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.latest().unwrap().tick, 5);
    }
}
