use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use uuid::Uuid;

use super::PlayerCommand;

pub const DEFAULT_MAX_BUFFERED: usize = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandBufferError {
    #[error("malformed command")]
    Malformed,
    #[error("duplicate command")]
    Duplicate,
    #[error("command buffer full")]
    Full,
}

/// Tick-ordered store of pending player commands.
///
/// Commands are kept twice: grouped by target tick for the simulation to
/// drain, and per player for duplicate detection and queries. Both views
/// stay in sync through add and prune.
#[derive(Debug)]
pub struct CommandBuffer {
    by_tick: BTreeMap<u64, Vec<PlayerCommand>>,
    by_player: HashMap<Uuid, Vec<PlayerCommand>>,
    max_size: usize,
    count: usize,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_BUFFERED)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            by_tick: BTreeMap::new(),
            by_player: HashMap::new(),
            max_size,
            count: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
    }

    pub fn add_command(&mut self, command: PlayerCommand) -> Result<(), CommandBufferError> {
        if !command.is_well_formed() {
            return Err(CommandBufferError::Malformed);
        }
        if self.count >= self.max_size {
            return Err(CommandBufferError::Full);
        }
        let per_player = self.by_player.entry(command.player).or_default();
        if per_player.iter().any(|c| c == &command) {
            return Err(CommandBufferError::Duplicate);
        }

        per_player.push(command.clone());
        let slot = self.by_tick.entry(command.tick).or_default();
        let at = slot.partition_point(|c| c.sequence <= command.sequence);
        slot.insert(at, command);
        self.count += 1;
        Ok(())
    }

    /// All commands targeting exactly this tick, sequence ascending.
    pub fn commands_for_tick(&self, tick: u64) -> Vec<PlayerCommand> {
        self.by_tick.get(&tick).cloned().unwrap_or_default()
    }

    /// All commands with tick <= the given tick, in (tick, sequence) order.
    pub fn commands_up_to_tick(&self, tick: u64) -> Vec<PlayerCommand> {
        self.by_tick
            .range(..=tick)
            .flat_map(|(_, cmds)| cmds.iter().cloned())
            .collect()
    }

    pub fn player_commands(&self, player: &Uuid) -> Vec<PlayerCommand> {
        self.by_player.get(player).cloned().unwrap_or_default()
    }

    pub fn has_commands_for_tick(&self, tick: u64) -> bool {
        self.by_tick.contains_key(&tick)
    }

    pub fn oldest_tick(&self) -> Option<u64> {
        self.by_tick.keys().next().copied()
    }

    pub fn newest_tick(&self) -> Option<u64> {
        self.by_tick.keys().next_back().copied()
    }

    /// Remove every command with tick strictly below the watermark,
    /// including from the per-player index.
    pub fn prune_older_than(&mut self, tick: u64) {
        let keep = self.by_tick.split_off(&tick);
        let dropped = std::mem::replace(&mut self.by_tick, keep);
        let removed: usize = dropped.values().map(Vec::len).sum();
        if removed == 0 {
            return;
        }
        self.count -= removed;
        for commands in self.by_player.values_mut() {
            commands.retain(|c| c.tick >= tick);
        }
        self.by_player.retain(|_, commands| !commands.is_empty());
    }

    pub fn command_count(&self) -> usize {
        self.count
    }

    pub fn player_count(&self) -> usize {
        self.by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.by_tick.clear();
        self.by_player.clear();
        self.count = 0;
    }
}
