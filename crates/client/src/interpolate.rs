use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use aster::{Angle, Point};

pub const DEFAULT_INTERPOLATION_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_SNAPSHOT_HISTORY: usize = 5;

const PRUNE_HORIZON_MS: u64 = 1000;

/// One authoritative sample on an entity's timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub tick: u64,
    pub position: Point,
    pub velocity: Point,
    pub facing: Angle,
    /// Wall clock when the sample was recorded, ms since the epoch.
    pub timestamp_ms: u64,
}

impl EntityState {
    pub fn new(tick: u64, position: Point, velocity: Point, facing: Angle) -> Self {
        Self {
            tick,
            position,
            velocity,
            facing,
            timestamp_ms: now_ms(),
        }
    }

    pub fn at_time(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

#[derive(Debug, Default)]
struct Timeline {
    snapshots: VecDeque<EntityState>,
    cached: Option<EntityState>,
}

/// Smooths remote entities by rendering them slightly in the past.
///
/// Server updates arrive at broadcast rate; rendering runs faster. Each
/// entity keeps a short timeline of authoritative samples, and queries
/// blend the pair bracketing `now - delay`. The cost is that remote
/// entities lag by about the interpolation delay; the gain is that a
/// 20 Hz feed looks continuous at any frame rate.
#[derive(Debug)]
pub struct EntityInterpolator {
    timelines: HashMap<Uuid, Timeline>,
    delay_ms: u64,
    max_history: usize,
}

impl Default for EntityInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityInterpolator {
    pub fn new() -> Self {
        Self {
            timelines: HashMap::new(),
            delay_ms: DEFAULT_INTERPOLATION_DELAY_MS,
            max_history: DEFAULT_MAX_SNAPSHOT_HISTORY,
        }
    }

    pub fn interpolation_delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn set_interpolation_delay_ms(&mut self, delay: u64) {
        self.delay_ms = delay;
    }

    pub fn max_snapshot_history(&self) -> usize {
        self.max_history
    }

    pub fn set_max_snapshot_history(&mut self, count: usize) {
        self.max_history = count;
    }

    pub fn add_snapshot(&mut self, entity: Uuid, state: EntityState) {
        let timeline = self.timelines.entry(entity).or_default();
        timeline.snapshots.push_back(state);
        while timeline.snapshots.len() > self.max_history {
            timeline.snapshots.pop_front();
        }
    }

    /// Interpolated state at the current wall clock. The result is cached
    /// on the timeline, so repeated queries within one frame are stable
    /// and cheap.
    pub fn interpolated_state(&mut self, entity: &Uuid) -> Option<&EntityState> {
        self.interpolated_state_at(entity, now_ms())
    }

    pub fn interpolated_state_at(&mut self, entity: &Uuid, now_ms: u64) -> Option<&EntityState> {
        let delay = self.delay_ms;
        let timeline = self.timelines.get_mut(entity)?;
        if timeline.snapshots.is_empty() {
            return None;
        }
        if timeline.snapshots.len() < 2 {
            timeline.cached = timeline.snapshots.back().copied();
            return timeline.cached.as_ref();
        }

        let render_time = now_ms.saturating_sub(delay);

        let mut bracket = None;
        for i in 0..timeline.snapshots.len() - 1 {
            let before = &timeline.snapshots[i];
            let after = &timeline.snapshots[i + 1];
            if before.timestamp_ms <= render_time && render_time <= after.timestamp_ms {
                bracket = Some((*before, *after));
                break;
            }
        }

        let Some((before, after)) = bracket else {
            // No bracketing pair; fall back to the newest sample.
            timeline.cached = timeline.snapshots.back().copied();
            return timeline.cached.as_ref();
        };

        let span = after.timestamp_ms - before.timestamp_ms;
        let result = if span == 0 {
            after
        } else {
            let alpha =
                ((render_time - before.timestamp_ms) as f64 / span as f64).clamp(0.0, 1.0);
            interpolate(&before, &after, alpha)
        };

        timeline.cached = Some(result);
        timeline.cached.as_ref()
    }

    /// Prune stale samples. Entries older than render time minus one
    /// second fall off, but a timeline never shrinks below the two
    /// samples interpolation needs.
    pub fn update(&mut self) {
        self.update_at(now_ms());
    }

    pub fn update_at(&mut self, now_ms: u64) {
        let render_time = now_ms.saturating_sub(self.delay_ms);
        let horizon = render_time.saturating_sub(PRUNE_HORIZON_MS);
        for timeline in self.timelines.values_mut() {
            while timeline.snapshots.len() > 2
                && timeline
                    .snapshots
                    .front()
                    .is_some_and(|s| s.timestamp_ms < horizon)
            {
                timeline.snapshots.pop_front();
            }
        }
    }

    pub fn remove_entity(&mut self, entity: &Uuid) {
        self.timelines.remove(entity);
    }

    pub fn clear(&mut self) {
        self.timelines.clear();
    }

    pub fn tracked_entity_count(&self) -> usize {
        self.timelines.len()
    }

    pub fn total_snapshots_stored(&self) -> usize {
        self.timelines.values().map(|t| t.snapshots.len()).sum()
    }
}

fn interpolate(from: &EntityState, to: &EntityState, alpha: f64) -> EntityState {
    EntityState {
        tick: from.tick + (to.tick.saturating_sub(from.tick) as f64 * alpha) as u64,
        position: from.position.lerp(to.position, alpha),
        velocity: from.velocity.lerp(to.velocity, alpha),
        facing: from.facing.lerp_shortest(to.facing, alpha),
        timestamp_ms: from.timestamp_ms
            + (to.timestamp_ms.saturating_sub(from.timestamp_ms) as f64 * alpha) as u64,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
