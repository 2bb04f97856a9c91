use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("port must not be 0")]
    BadPort,
    #[error("max_players must be between 1 and 1000")]
    BadMaxPlayers,
    #[error("simulation_hz must be between 10 and 120")]
    BadSimulationHz,
    #[error("broadcast_hz must be between 1 and simulation_hz")]
    BadBroadcastHz,
    #[error("snapshot_history_size must be between 1 and 1000")]
    BadSnapshotHistory,
    #[error("command_buffer_size must be at least 100")]
    BadCommandBuffer,
    #[error("starting_system and starting_planet must not be empty")]
    BadStartingLocation,
}

/// All server settings, loadable from a line-oriented `key = value`
/// file. Unknown keys are ignored so old configs keep working.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_players: u32,
    pub max_connections_per_ip: u32,

    pub simulation_hz: u32,
    pub broadcast_hz: u32,

    pub server_name: String,
    pub motd: String,
    pub password: String,

    pub starting_credits: i64,
    pub starting_system: String,
    pub starting_planet: String,
    pub enable_pvp: bool,

    pub snapshot_history_size: u32,
    pub command_buffer_size: u32,

    pub verbose_logging: bool,
    pub enable_console: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: aster::DEFAULT_PORT,
            max_players: 32,
            max_connections_per_ip: 3,
            simulation_hz: aster::DEFAULT_SIMULATION_HZ,
            broadcast_hz: aster::DEFAULT_BROADCAST_HZ,
            server_name: "Aster Server".into(),
            motd: "Welcome to Aster multiplayer!".into(),
            password: String::new(),
            starting_credits: 100_000,
            starting_system: "Sol".into(),
            starting_planet: "Earth".into(),
            enable_pvp: false,
            snapshot_history_size: 120,
            command_buffer_size: 10_000,
            verbose_logging: false,
            enable_console: true,
        }
    }
}

impl ServerConfig {
    /// Load settings from a file, falling back to defaults for any key
    /// the file does not mention. A missing file is an error; a file
    /// with unknown keys is not.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let mut config = Self::default();
        config.apply(&text);
        Ok(config)
    }

    fn apply(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "port" => parse_into(value, &mut self.port),
                "max_players" => parse_into(value, &mut self.max_players),
                "max_connections_per_ip" => parse_into(value, &mut self.max_connections_per_ip),
                "simulation_hz" => parse_into(value, &mut self.simulation_hz),
                "broadcast_hz" => parse_into(value, &mut self.broadcast_hz),
                "server_name" => self.server_name = value.to_string(),
                "motd" => self.motd = value.to_string(),
                "password" => self.password = value.to_string(),
                "starting_credits" => parse_into(value, &mut self.starting_credits),
                "starting_system" => self.starting_system = value.to_string(),
                "starting_planet" => self.starting_planet = value.to_string(),
                "enable_pvp" => self.enable_pvp = parse_bool(value),
                "snapshot_history_size" => parse_into(value, &mut self.snapshot_history_size),
                "command_buffer_size" => parse_into(value, &mut self.command_buffer_size),
                "verbose_logging" => self.verbose_logging = parse_bool(value),
                "enable_console" => self.enable_console = parse_bool(value),
                _ => {}
            }
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut out = String::new();
        let _ = writeln!(out, "# Aster dedicated server configuration\n");
        let _ = writeln!(out, "# Network");
        let _ = writeln!(out, "port = {}", self.port);
        let _ = writeln!(out, "max_players = {}", self.max_players);
        let _ = writeln!(out, "max_connections_per_ip = {}\n", self.max_connections_per_ip);
        let _ = writeln!(out, "# Simulation timing");
        let _ = writeln!(out, "simulation_hz = {}", self.simulation_hz);
        let _ = writeln!(out, "broadcast_hz = {}\n", self.broadcast_hz);
        let _ = writeln!(out, "# Identity");
        let _ = writeln!(out, "server_name = {}", self.server_name);
        let _ = writeln!(out, "motd = {}", self.motd);
        let _ = writeln!(out, "password = {}\n", self.password);
        let _ = writeln!(out, "# Gameplay");
        let _ = writeln!(out, "starting_credits = {}", self.starting_credits);
        let _ = writeln!(out, "starting_system = {}", self.starting_system);
        let _ = writeln!(out, "starting_planet = {}", self.starting_planet);
        let _ = writeln!(out, "enable_pvp = {}\n", self.enable_pvp);
        let _ = writeln!(out, "# Performance");
        let _ = writeln!(out, "snapshot_history_size = {}", self.snapshot_history_size);
        let _ = writeln!(out, "command_buffer_size = {}\n", self.command_buffer_size);
        let _ = writeln!(out, "# Logging");
        let _ = writeln!(out, "verbose_logging = {}", self.verbose_logging);
        let _ = writeln!(out, "enable_console = {}", self.enable_console);
        fs::write(path, out)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::BadPort);
        }
        if self.max_players == 0 || self.max_players > 1000 {
            return Err(ConfigError::BadMaxPlayers);
        }
        if !(10..=120).contains(&self.simulation_hz) {
            return Err(ConfigError::BadSimulationHz);
        }
        if self.broadcast_hz == 0 || self.broadcast_hz > self.simulation_hz {
            return Err(ConfigError::BadBroadcastHz);
        }
        if self.snapshot_history_size == 0 || self.snapshot_history_size > 1000 {
            return Err(ConfigError::BadSnapshotHistory);
        }
        if self.command_buffer_size < 100 {
            return Err(ConfigError::BadCommandBuffer);
        }
        if self.starting_system.is_empty() || self.starting_planet.is_empty() {
            return Err(ConfigError::BadStartingLocation);
        }
        Ok(())
    }

    pub fn requires_password(&self) -> bool {
        !self.password.is_empty()
    }
}

fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}

fn parse_into<T: std::str::FromStr>(value: &str, slot: &mut T) {
    if let Ok(parsed) = value.parse() {
        *slot = parsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn parses_key_value_lines() {
        let mut config = ServerConfig::default();
        config.apply(
            "# comment\n\
             \n\
             port = 4000\n\
             server_name = Test Server\n\
             broadcast_hz = 30\n\
             enable_pvp = 1\n\
             verbose_logging = yes\n\
             unknown_key = whatever\n",
        );
        assert_eq!(config.port, 4000);
        assert_eq!(config.server_name, "Test Server");
        assert_eq!(config.broadcast_hz, 30);
        assert!(config.enable_pvp);
        // Anything but true/1 is false.
        assert!(!config.verbose_logging);
    }

    #[test]
    fn broadcast_must_not_exceed_simulation() {
        let mut config = ServerConfig::default();
        config.broadcast_hz = config.simulation_hz + 1;
        assert!(matches!(config.validate(), Err(ConfigError::BadBroadcastHz)));
    }

    #[test]
    fn simulation_rate_window() {
        let mut config = ServerConfig::default();
        config.simulation_hz = 9;
        assert!(matches!(config.validate(), Err(ConfigError::BadSimulationHz)));
        config.simulation_hz = 121;
        assert!(matches!(config.validate(), Err(ConfigError::BadSimulationHz)));
        config.simulation_hz = 120;
        config.broadcast_hz = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn command_buffer_floor() {
        let mut config = ServerConfig::default();
        config.command_buffer_size = 99;
        assert!(matches!(config.validate(), Err(ConfigError::BadCommandBuffer)));
    }

    #[test]
    fn empty_spawn_location_is_invalid() {
        let mut config = ServerConfig::default();
        config.starting_system.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadStartingLocation)
        ));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let mut config = ServerConfig::default();
        config.port = 5555;
        config.server_name = "Roundtrip".into();
        config.enable_pvp = true;

        let path = std::env::temp_dir().join("aster-config-test.cfg");
        config.save_to_file(&path).unwrap();
        let loaded = ServerConfig::load_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.port, 5555);
        assert_eq!(loaded.server_name, "Roundtrip");
        assert!(loaded.enable_pvp);
    }
}
