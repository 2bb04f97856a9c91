use aster::{PlayerCommand, WorldSnapshot};

pub const DEFAULT_MAX_UNCONFIRMED: usize = 60;

/// Client-side prediction: run the simulation locally ahead of the
/// server, then replay still-unconfirmed inputs on top of each
/// authoritative world.
///
/// The unconfirmed list holds commands sent but not yet covered by a
/// server tick, bounded to about a second of input so a stalled server
/// cannot grow it without limit.
#[derive(Debug)]
pub struct Predictor {
    unconfirmed: Vec<PlayerCommand>,
    last_confirmed_tick: u64,
    max_unconfirmed: usize,
    prediction_errors: u64,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor {
    pub fn new() -> Self {
        Self {
            unconfirmed: Vec::new(),
            last_confirmed_tick: 0,
            max_unconfirmed: DEFAULT_MAX_UNCONFIRMED,
            prediction_errors: 0,
        }
    }

    pub fn set_max_unconfirmed(&mut self, max: usize) {
        self.max_unconfirmed = max;
    }

    pub fn record_command(&mut self, command: PlayerCommand) {
        self.unconfirmed.push(command);
        if self.unconfirmed.len() > self.max_unconfirmed {
            self.unconfirmed.remove(0);
        }
    }

    /// Clone the current world, apply the command, and step once.
    pub fn predict_next(&self, current: &WorldSnapshot, command: &PlayerCommand) -> WorldSnapshot {
        let mut predicted = current.clone();
        predicted.apply_command(command);
        predicted.step();
        predicted
    }

    /// Rebase on an authoritative world: drop commands the server has
    /// covered, replay the rest in (tick, sequence) order on a clone.
    pub fn reconcile_with_server(
        &mut self,
        server_world: &WorldSnapshot,
        server_tick: u64,
    ) -> WorldSnapshot {
        self.last_confirmed_tick = server_tick;
        self.unconfirmed.retain(|cmd| cmd.tick > server_tick);

        if self.unconfirmed.is_empty() {
            return server_world.clone();
        }

        self.unconfirmed.sort_by_key(|cmd| cmd.order_key());

        let mut reconciled = server_world.clone();
        for command in &self.unconfirmed {
            reconciled.apply_command(command);
            reconciled.step();
        }

        if reconciled.tick() != server_tick {
            self.prediction_errors += 1;
        }

        reconciled
    }

    pub fn last_confirmed_tick(&self) -> u64 {
        self.last_confirmed_tick
    }

    pub fn unconfirmed_count(&self) -> usize {
        self.unconfirmed.len()
    }

    pub fn is_predicting(&self) -> bool {
        !self.unconfirmed.is_empty()
    }

    pub fn prediction_errors(&self) -> u64 {
        self.prediction_errors
    }

    pub fn clear(&mut self) {
        self.unconfirmed.clear();
        self.last_confirmed_tick = 0;
        self.prediction_errors = 0;
    }
}
