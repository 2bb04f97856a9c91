use std::sync::mpsc::Sender;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use uuid::Uuid;

use aster::{
    Angle, CollisionAuthority, CommandBuffer, CommandValidator, InterestManager, Message, PeerId,
    Projectile, ProjectileSync, Ship, SnapshotManager, StateSync, Transport, TransportError,
    TransportEvent, WorldSnapshot,
};
use aster::command::controls;

use crate::config::{ConfigError, ServerConfig};
use crate::console::Console;
use crate::registry::PlayerRegistry;
use crate::tick::{LoopHandle, LoopHooks, LoopStats, ServerLoop, SimulationError, StatsHandle};

const PROJECTILE_SPEED: f64 = 12.0;
const COMMAND_RETENTION_SECONDS: u64 = 2;

#[derive(Debug, Clone, Default)]
pub struct ServerStatistics {
    pub tick: u64,
    pub players: usize,
    pub commands_processed: u64,
    pub commands_rejected: u64,
    pub snapshot_count: usize,
    pub snapshot_memory: usize,
    pub loop_stats: LoopStats,
}

/// The dedicated server: owns the authoritative world and wires the
/// loop, command pipeline, snapshot history and transport together.
///
/// Subsystem graph:
///   Server
///   ├── ServerLoop       (fixed-step timing)
///   ├── Transport        (datagrams in/out)
///   ├── PlayerRegistry   (roster)
///   ├── CommandBuffer    (validated input, tick-ordered)
///   ├── CommandValidator (window + rate limit)
///   ├── SnapshotManager  (world history)
///   ├── InterestManager + StateSync (per-observer updates)
///   └── ProjectileSync + CollisionAuthority (weapons fire)
pub struct Server {
    config: ServerConfig,
    transport: Box<dyn Transport>,

    world: WorldSnapshot,
    registry: PlayerRegistry,
    command_buffer: CommandBuffer,
    validator: CommandValidator,
    snapshots: SnapshotManager,
    interest: InterestManager,
    state_sync: StateSync,
    projectile_sync: ProjectileSync,
    collision: CollisionAuthority,

    server_loop: Option<ServerLoop>,
    loop_handle: LoopHandle,
    loop_stats: StatsHandle,

    console: Console,
    console_sender: Sender<String>,

    started: bool,
    next_pilot_number: u32,
    commands_processed: u64,
    commands_rejected: u64,
}

impl Server {
    /// Build the server. A configuration that fails validation refuses
    /// to construct, so a misconfigured server never opens a port.
    pub fn new(config: ServerConfig, transport: Box<dyn Transport>) -> Result<Self, ConfigError> {
        config.validate()?;

        let server_loop = ServerLoop::new(config.simulation_hz, config.broadcast_hz);
        let loop_handle = server_loop.handle();
        let loop_stats = server_loop.stats_handle();
        let (console_sender, console) = Console::new();

        Ok(Self {
            world: WorldSnapshot::new(config.starting_system.clone()),
            registry: PlayerRegistry::new(config.max_players as usize),
            command_buffer: CommandBuffer::with_capacity(config.command_buffer_size as usize),
            validator: CommandValidator::new(),
            snapshots: SnapshotManager::new(config.snapshot_history_size as usize),
            interest: InterestManager::default(),
            state_sync: StateSync::new(),
            projectile_sync: ProjectileSync::new(),
            collision: CollisionAuthority::new(),
            server_loop: Some(server_loop),
            loop_handle,
            loop_stats,
            console,
            console_sender,
            started: false,
            next_pilot_number: 1,
            commands_processed: 0,
            commands_rejected: 0,
            transport,
            config,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the transport and begin accepting connections.
    pub fn start(&mut self) -> Result<(), TransportError> {
        self.transport.start_server(self.config.port)?;
        self.started = true;
        info!(
            "{} listening on port {} ({} Hz sim, {} Hz broadcast)",
            self.config.server_name,
            self.config.port,
            self.config.simulation_hz,
            self.config.broadcast_hz
        );
        Ok(())
    }

    /// Run the loop on the calling thread until stopped. A simulation
    /// invariant breach terminates the loop and shuts down cleanly.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        let Some(mut server_loop) = self.server_loop.take() else {
            return Ok(());
        };
        let result = server_loop.run(self);
        self.server_loop = Some(server_loop);
        self.shutdown();
        result
    }

    /// Request a stop; safe from any thread or signal handler. The
    /// in-flight tick completes before the loop exits.
    pub fn shutdown_handle(&self) -> LoopHandle {
        self.loop_handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.loop_handle.is_running()
    }

    fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        info!("shutting down");
        self.broadcast(&Message::ServerMessage("Server shutting down.".into()));
        self.transport.shutdown();
        self.started = false;
    }

    /// Queue an operator command; callable from any thread.
    pub fn execute_console_command(&self, line: &str) {
        let _ = self.console_sender.send(line.to_string());
    }

    /// A sender the stdin reader thread can feed.
    pub fn console_sender(&self) -> Sender<String> {
        self.console_sender.clone()
    }

    pub fn statistics(&self) -> ServerStatistics {
        ServerStatistics {
            tick: self.world.tick(),
            players: self.registry.len(),
            commands_processed: self.commands_processed,
            commands_rejected: self.commands_rejected,
            snapshot_count: self.snapshots.len(),
            snapshot_memory: self.snapshots.memory_usage(),
            loop_stats: self.loop_stats.get(),
        }
    }

    pub fn player_count(&self) -> usize {
        self.registry.len()
    }

    pub fn game_tick(&self) -> u64 {
        self.world.tick()
    }

    // Connection handling

    fn handle_connected(&mut self, peer: PeerId) {
        let now = now_ms();
        let name = format!("Pilot {}", self.next_pilot_number);

        let (uuid, record) = match self.registry.add_player(peer, name, now) {
            Some(player) => (player.uuid(), player.record.clone()),
            None => {
                warn!("rejecting connection from {:?}: server full", peer);
                let _ = self.send_to(
                    peer,
                    &Message::ServerMessage("Server is full.".into()),
                );
                return;
            }
        };
        self.next_pilot_number += 1;

        // Spawn the player's ship before the welcome so the initial
        // world already contains it.
        let ship_uuid = self.spawn_ship_for(uuid);
        if let Some(player) = self.registry.get_mut(&uuid) {
            player.ship = Some(ship_uuid);
        }
        if let Some(ship) = self.world.ship(&ship_uuid) {
            self.interest.set_center(uuid, ship.position);
        }

        info!("{} connected as {}", record.name, uuid);

        let welcome = Message::ServerWelcome {
            player: uuid,
            world: self.world.clone(),
        };
        if let Err(e) = self.send_to(peer, &welcome) {
            warn!("failed to send welcome to {:?}: {}", peer, e);
        }
        if !self.config.motd.is_empty() {
            let _ = self.send_to(peer, &Message::ServerMessage(self.config.motd.clone()));
        }

        self.broadcast_except(peer, &Message::PlayerJoined(record));
    }

    fn handle_disconnected(&mut self, peer: PeerId) {
        let Some(player) = self.registry.remove_by_peer(peer) else {
            return;
        };
        let uuid = player.uuid();
        info!("{} disconnected", player.name());

        if let Some(ship) = player.ship {
            self.world.remove_ship(&ship);
        }
        self.interest.remove_player(&uuid);
        self.validator.clear_player(&uuid);
        self.broadcast(&Message::PlayerLeft(uuid));
    }

    fn handle_packet(&mut self, peer: PeerId, bytes: &[u8]) {
        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!("undecodable packet from {:?}: {}", peer, e);
                return;
            }
        };

        match message {
            Message::Command(command) => self.handle_command(peer, command),
            Message::Ping { timestamp } => {
                let _ = self.send_to(peer, &Message::Pong { timestamp });
            }
            Message::Pong { .. } => {}
            _ => debug!("ignoring downstream-only message from {:?}", peer),
        }

        if let Some(player) = self.registry.by_peer_mut(peer) {
            player.touch(now_ms());
        }
    }

    fn handle_command(&mut self, peer: PeerId, command: aster::PlayerCommand) {
        let Some(player) = self.registry.by_peer(peer) else {
            debug!("command from unregistered peer {:?}", peer);
            self.commands_rejected += 1;
            return;
        };
        // A command must speak for the peer's own player.
        if command.player != player.uuid() {
            self.commands_rejected += 1;
            if self.config.verbose_logging {
                debug!("command player mismatch from {:?}", peer);
            }
            return;
        }

        let verdict = self.validator.validate(&command, self.world.tick());
        if !verdict.is_valid() {
            self.commands_rejected += 1;
            if self.config.verbose_logging {
                debug!("rejected command from {}: {}", command.player, verdict);
            }
            return;
        }

        if let Err(e) = self.command_buffer.add_command(command) {
            self.commands_rejected += 1;
            if self.config.verbose_logging {
                debug!("buffer refused command: {}", e);
            }
        }
    }

    // Simulation

    fn spawn_ship_for(&mut self, owner: Uuid) -> Uuid {
        // Spread spawn positions on a ring so new arrivals never stack.
        let slot = self.next_pilot_number as f64;
        let angle = Angle::new(slot * 67.0);
        let mut ship = Ship::new(Uuid::new_v4());
        ship.owner = Some(owner);
        ship.position = angle.unit() * 400.0;
        ship.facing = angle;
        let uuid = ship.uuid;
        self.world.add_ship(ship);
        uuid
    }

    fn fire_weapons(&mut self) {
        let mut shots = Vec::new();
        for ship in &self.world.ships {
            if !ship.has_control(controls::PRIMARY_FIRE) || ship.is_disabled() {
                continue;
            }
            let mut projectile = Projectile::new(
                "blaster",
                ship.uuid,
                ship.position,
                ship.velocity + ship.facing.unit() * PROJECTILE_SPEED,
            );
            projectile.owner = ship.owner;
            projectile.facing = ship.facing;
            projectile.spawn_tick = self.world.tick();
            shots.push(projectile);
        }
        for projectile in shots {
            self.projectile_sync.register_spawn(&projectile);
            self.world.add_projectile(projectile);
        }
    }

    fn update_interest_centers(&mut self) {
        for player in self.registry.iter() {
            let Some(ship_uuid) = player.ship else {
                continue;
            };
            if let Some(ship) = self.world.ship(&ship_uuid) {
                self.interest.set_center(player.uuid(), ship.position);
            }
        }
    }

    // Console

    fn handle_console_line(&mut self, line: &str) {
        let mut parts = line.splitn(2, ' ');
        let verb = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match verb {
            "status" => self.console_status(),
            "players" => self.console_players(),
            "kick" => self.console_kick(rest),
            "say" => self.console_say(rest),
            "help" => self.console_help(),
            "shutdown" | "stop" | "quit" | "exit" => {
                println!("Shutting down...");
                self.loop_handle.stop();
            }
            "" => {}
            other => println!("Unknown command '{}'. Try 'help'.", other),
        }
    }

    fn console_status(&self) {
        let stats = self.statistics();
        println!("{}", self.config.server_name);
        println!("  tick:       {}", stats.tick);
        println!(
            "  players:    {}/{}",
            stats.players, self.config.max_players
        );
        println!(
            "  rates:      {:.1} Hz sim, {:.1} Hz broadcast (avg tick {:.2} ms)",
            stats.loop_stats.actual_simulation_hz,
            stats.loop_stats.actual_broadcast_hz,
            stats.loop_stats.average_tick_ms
        );
        println!(
            "  commands:   {} processed, {} rejected",
            stats.commands_processed, stats.commands_rejected
        );
        println!(
            "  snapshots:  {} held, ~{} KiB",
            stats.snapshot_count,
            stats.snapshot_memory / 1024
        );
    }

    fn console_players(&self) {
        if self.registry.is_empty() {
            println!("No players connected.");
            return;
        }
        for player in self.registry.iter() {
            println!(
                "  {}  {}  ship={}",
                player.uuid(),
                player.name(),
                player
                    .ship
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "<none>".into())
            );
        }
    }

    fn console_kick(&mut self, name: &str) {
        if name.is_empty() {
            println!("Usage: kick <name>");
            return;
        }
        let Some(uuid) = self.registry.by_name(name).map(|p| p.uuid()) else {
            println!("No player named '{}'.", name);
            return;
        };
        self.kick_player(&uuid, "Kicked by operator");
        println!("Kicked {}.", name);
    }

    pub fn kick_player(&mut self, uuid: &Uuid, reason: &str) {
        let Some(player) = self.registry.remove(uuid) else {
            return;
        };
        info!("kicking {}: {}", player.name(), reason);
        let _ = self.send_to(player.peer, &Message::ServerMessage(reason.to_string()));
        if let Some(ship) = player.ship {
            self.world.remove_ship(&ship);
        }
        self.interest.remove_player(uuid);
        self.validator.clear_player(uuid);
        self.broadcast(&Message::PlayerLeft(*uuid));
    }

    fn console_say(&mut self, text: &str) {
        if text.is_empty() {
            println!("Usage: say <text>");
            return;
        }
        self.broadcast(&Message::ServerMessage(text.to_string()));
        println!("Sent.");
    }

    fn console_help(&self) {
        println!("Commands:");
        println!("  status        server statistics");
        println!("  players       list connected players");
        println!("  kick <name>   disconnect a player");
        println!("  say <text>    broadcast a message");
        println!("  shutdown      stop the server (aliases: stop, quit, exit)");
    }

    // Outbound helpers

    fn send_to(&mut self, peer: PeerId, message: &Message) -> Result<(), TransportError> {
        self.transport.send(peer, &message.encode())
    }

    fn broadcast(&mut self, message: &Message) {
        let peers: Vec<PeerId> = self.registry.iter().map(|p| p.peer).collect();
        let bytes = message.encode();
        for peer in peers {
            if let Err(e) = self.transport.send(peer, &bytes) {
                debug!("broadcast to {:?} failed: {}", peer, e);
            }
        }
    }

    fn broadcast_except(&mut self, skip: PeerId, message: &Message) {
        let peers: Vec<PeerId> = self
            .registry
            .iter()
            .map(|p| p.peer)
            .filter(|&p| p != skip)
            .collect();
        let bytes = message.encode();
        for peer in peers {
            if let Err(e) = self.transport.send(peer, &bytes) {
                debug!("broadcast to {:?} failed: {}", peer, e);
            }
        }
    }
}

impl LoopHooks for Server {
    fn on_input(&mut self) -> Result<(), String> {
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Connected(peer) => self.handle_connected(peer),
                TransportEvent::Disconnected(peer) => self.handle_disconnected(peer),
                TransportEvent::Packet(peer, bytes) => self.handle_packet(peer, &bytes),
            }
        }
        while let Some(line) = self.console.poll() {
            self.handle_console_line(&line);
        }
        Ok(())
    }

    fn on_simulate(&mut self, tick: u64) -> Result<(), SimulationError> {
        if !self.world.is_valid() {
            return Err(SimulationError::new(tick, "world has no region"));
        }

        self.state_sync.set_current_tick(tick);
        self.projectile_sync.set_current_tick(tick);

        // Deterministic concurrent-input resolution: apply this tick's
        // commands in (player uuid, sequence) order.
        let mut commands = self.command_buffer.commands_for_tick(tick);
        commands.sort_by_key(|c| (c.player, c.sequence));
        for command in &commands {
            if self.world.apply_command(command) {
                self.commands_processed += 1;
            }
        }

        self.fire_weapons();
        self.world.step();
        self.collision.resolve(&mut self.world, &mut self.projectile_sync);
        self.world.projectiles.retain(|p| !p.dead);

        self.update_interest_centers();

        // Snapshot strictly after the tick has been stepped.
        self.snapshots.create_snapshot(&self.world, self.world.tick(), false);

        let watermark = tick.saturating_sub(
            COMMAND_RETENTION_SECONDS * self.config.simulation_hz as u64,
        );
        self.command_buffer.prune_older_than(watermark);

        Ok(())
    }

    fn on_broadcast(&mut self, _tick: u64) -> Result<(), String> {
        // Projectile events drain once per broadcast and go to every
        // observer; ship updates are filtered per observer.
        let spawns = self.projectile_sync.take_pending_spawns();
        let impacts = self.projectile_sync.take_pending_impacts();
        let deaths = self.projectile_sync.take_pending_deaths();

        let observers: Vec<(Uuid, PeerId)> = self
            .registry
            .iter()
            .map(|p| (p.uuid(), p.peer))
            .collect();

        for (uuid, peer) in observers {
            let ships =
                self.state_sync
                    .updates_for_player(&self.interest, &uuid, &self.world.ships);
            let message = Message::StateUpdate {
                tick: self.world.tick(),
                ships,
                spawns: spawns.clone(),
                impacts: impacts.clone(),
                deaths: deaths.clone(),
            };
            if let Err(e) = self.send_to(peer, &message) {
                debug!("state update to {:?} failed: {}", peer, e);
            }
        }
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
