use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use uuid::Uuid;

use super::PlayerCommand;

pub const DEFAULT_MAX_PAST_TICKS: u64 = 60;
pub const DEFAULT_MAX_FUTURE_TICKS: u64 = 60;
pub const DEFAULT_MAX_COMMANDS_PER_SECOND: u32 = 120;

const RATE_WINDOW_MS: u64 = 1000;

/// Outcome of validating one command against the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Malformed,
    InvalidPlayer,
    TooOld,
    TooFuture,
    RateLimited,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        *self == Verdict::Valid
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::Valid => "valid",
            Verdict::Malformed => "malformed command",
            Verdict::InvalidPlayer => "invalid player uuid",
            Verdict::TooOld => "command too old",
            Verdict::TooFuture => "command too far in future",
            Verdict::RateLimited => "rate limited",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Default)]
struct RateWindow {
    window_start_ms: u64,
    commands_in_window: u32,
}

/// Server-side gate for incoming commands: structural checks, a tick
/// acceptance window around the current tick, and a per-player tumbling
/// one-second rate limit.
#[derive(Debug)]
pub struct CommandValidator {
    max_past_ticks: u64,
    max_future_ticks: u64,
    max_commands_per_second: u32,
    windows: HashMap<Uuid, RateWindow>,
    total_seen: u64,
    total_rejected: u64,
    epoch: Instant,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandValidator {
    pub fn new() -> Self {
        Self {
            max_past_ticks: DEFAULT_MAX_PAST_TICKS,
            max_future_ticks: DEFAULT_MAX_FUTURE_TICKS,
            max_commands_per_second: DEFAULT_MAX_COMMANDS_PER_SECOND,
            windows: HashMap::new(),
            total_seen: 0,
            total_rejected: 0,
            epoch: Instant::now(),
        }
    }

    pub fn set_max_past_ticks(&mut self, ticks: u64) {
        self.max_past_ticks = ticks;
    }

    pub fn set_max_future_ticks(&mut self, ticks: u64) {
        self.max_future_ticks = ticks;
    }

    pub fn set_max_commands_per_second(&mut self, rate: u32) {
        self.max_commands_per_second = rate;
    }

    pub fn validate(&mut self, command: &PlayerCommand, current_tick: u64) -> Verdict {
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.validate_at(command, current_tick, now_ms)
    }

    /// Validation with an explicit wall clock, so the rate window is
    /// deterministic under test.
    pub fn validate_at(&mut self, command: &PlayerCommand, current_tick: u64, now_ms: u64) -> Verdict {
        self.total_seen += 1;

        if command.player.is_nil() {
            return self.reject(Verdict::InvalidPlayer);
        }
        if !command.is_well_formed() {
            return self.reject(Verdict::Malformed);
        }
        if command.tick < current_tick.saturating_sub(self.max_past_ticks) {
            return self.reject(Verdict::TooOld);
        }
        if command.tick > current_tick + self.max_future_ticks {
            return self.reject(Verdict::TooFuture);
        }
        if !self.check_rate(command.player, now_ms) {
            return self.reject(Verdict::RateLimited);
        }

        Verdict::Valid
    }

    fn reject(&mut self, verdict: Verdict) -> Verdict {
        self.total_rejected += 1;
        verdict
    }

    fn check_rate(&mut self, player: Uuid, now_ms: u64) -> bool {
        let window = self.windows.entry(player).or_default();
        if now_ms.saturating_sub(window.window_start_ms) >= RATE_WINDOW_MS {
            window.window_start_ms = now_ms;
            window.commands_in_window = 0;
        }
        window.commands_in_window += 1;

        let per_second =
            window.commands_in_window as f64 * 1000.0 / RATE_WINDOW_MS as f64;
        per_second <= self.max_commands_per_second as f64
    }

    /// Current rate of one player in commands per second, from the live
    /// window counter.
    pub fn player_rate(&self, player: &Uuid) -> f64 {
        self.windows
            .get(player)
            .map(|w| w.commands_in_window as f64 * 1000.0 / RATE_WINDOW_MS as f64)
            .unwrap_or(0.0)
    }

    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected
    }

    pub fn rejection_rate(&self) -> f64 {
        if self.total_seen == 0 {
            return 0.0;
        }
        self.total_rejected as f64 / self.total_seen as f64
    }

    pub fn reset_statistics(&mut self) {
        self.total_seen = 0;
        self.total_rejected = 0;
    }

    /// Drop rate tracking for a departed player.
    pub fn clear_player(&mut self, player: &Uuid) {
        self.windows.remove(player);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::controls;

    fn cmd(player: Uuid, tick: u64, sequence: u32) -> PlayerCommand {
        PlayerCommand::new(player, tick, controls::THRUST, sequence)
    }

    #[test]
    fn tick_window_gating() {
        let player = Uuid::new_v4();
        let mut validator = CommandValidator::new();
        let current = 1000;

        assert_eq!(validator.validate_at(&cmd(player, 939, 1), current, 0), Verdict::TooOld);
        assert_eq!(validator.validate_at(&cmd(player, 940, 2), current, 0), Verdict::Valid);
        assert_eq!(validator.validate_at(&cmd(player, 1060, 3), current, 0), Verdict::Valid);
        assert_eq!(validator.validate_at(&cmd(player, 1061, 4), current, 0), Verdict::TooFuture);
    }

    #[test]
    fn early_ticks_do_not_underflow() {
        let player = Uuid::new_v4();
        let mut validator = CommandValidator::new();
        assert_eq!(validator.validate_at(&cmd(player, 0, 1), 5, 0), Verdict::Valid);
    }

    #[test]
    fn nil_player_rejected() {
        let mut validator = CommandValidator::new();
        assert_eq!(
            validator.validate_at(&cmd(Uuid::nil(), 10, 1), 10, 0),
            Verdict::InvalidPlayer
        );
    }

    #[test]
    fn rate_limit_caps_at_configured_rate() {
        let player = Uuid::new_v4();
        let mut validator = CommandValidator::new();

        let mut accepted = 0;
        for i in 0..200u32 {
            if validator
                .validate_at(&cmd(player, 100, i), 100, 10)
                .is_valid()
            {
                accepted += 1;
            }
        }
        assert_eq!(accepted, DEFAULT_MAX_COMMANDS_PER_SECOND);
    }

    #[test]
    fn rate_window_resets_after_a_second() {
        let player = Uuid::new_v4();
        let mut validator = CommandValidator::new();

        for i in 0..DEFAULT_MAX_COMMANDS_PER_SECOND {
            assert!(validator.validate_at(&cmd(player, 100, i), 100, 0).is_valid());
        }
        assert_eq!(
            validator.validate_at(&cmd(player, 100, 500), 100, 10),
            Verdict::RateLimited
        );
        // A second later the window tumbles and the player is clean again.
        assert!(validator
            .validate_at(&cmd(player, 100, 501), 100, 1010)
            .is_valid());
    }

    #[test]
    fn rate_limits_are_per_player() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut validator = CommandValidator::new();

        for i in 0..DEFAULT_MAX_COMMANDS_PER_SECOND {
            validator.validate_at(&cmd(a, 100, i), 100, 0);
        }
        assert_eq!(validator.validate_at(&cmd(a, 100, 999), 100, 1), Verdict::RateLimited);
        assert!(validator.validate_at(&cmd(b, 100, 1), 100, 1).is_valid());
    }

    #[test]
    fn statistics_track_rejections() {
        let player = Uuid::new_v4();
        let mut validator = CommandValidator::new();
        validator.validate_at(&cmd(player, 100, 1), 100, 0);
        validator.validate_at(&cmd(player, 5, 2), 1000, 0);

        assert_eq!(validator.total_seen(), 2);
        assert_eq!(validator.total_rejected(), 1);
        assert!((validator.rejection_rate() - 0.5).abs() < 1e-9);
    }
}
