use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use uuid::Uuid;

use aster::{
    Message, NetworkPlayer, PeerId, PlayerCommand, ProjectileSync, Ship, StateSync, Transport,
    TransportError, TransportEvent, WorldSnapshot,
};

use crate::interpolate::{EntityInterpolator, EntityState};
use crate::monitor::{ConnectionMonitor, Quality};
use crate::predict::Predictor;
use crate::reconcile::ClientReconciliation;

const PING_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone)]
pub struct ClientStatistics {
    pub state: ClientState,
    pub ping: u32,
    pub packet_loss: f64,
    pub jitter: u32,
    pub quality: Quality,
    pub commands_sent: u64,
    pub updates_received: u64,
    pub prediction_errors: u64,
    pub interpolated_entities: usize,
}

/// The multiplayer client: connects the transport, sends commands with
/// immediate local prediction, folds authoritative updates back in, and
/// keeps remote entities smooth through the interpolator.
pub struct MultiplayerClient {
    transport: Box<dyn Transport>,
    state: ClientState,
    server: Option<PeerId>,

    /// Predicted local world. None until the server welcome arrives.
    world: Option<WorldSnapshot>,
    player_uuid: Option<Uuid>,
    /// Identity of the local ship; resolved against the current world on
    /// use, never stored as a reference that could dangle across swaps.
    player_ship: Option<Uuid>,
    roster: Vec<NetworkPlayer>,

    predictor: Predictor,
    reconciliation: ClientReconciliation,
    interpolator: EntityInterpolator,
    monitor: ConnectionMonitor,
    state_sync: StateSync,
    projectile_sync: ProjectileSync,

    next_sequence: u32,
    packet_counter: u64,
    last_ping_sent_ms: u64,
    commands_sent: u64,
    updates_received: u64,
}

impl MultiplayerClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            state: ClientState::Disconnected,
            server: None,
            world: None,
            player_uuid: None,
            player_ship: None,
            roster: Vec::new(),
            predictor: Predictor::new(),
            reconciliation: ClientReconciliation::new(),
            interpolator: EntityInterpolator::new(),
            monitor: ConnectionMonitor::new(),
            state_sync: StateSync::new(),
            projectile_sync: ProjectileSync::new(),
            next_sequence: 1,
            packet_counter: 0,
            last_ping_sent_ms: 0,
            commands_sent: 0,
            updates_received: 0,
        }
    }

    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        self.transport.start_client(host, port)?;
        self.state = ClientState::Connecting;
        info!("connecting to {}:{}", host, port);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.state == ClientState::Disconnected {
            return;
        }
        self.state = ClientState::Disconnecting;
        self.transport.shutdown();
        self.reset_session();
        self.state = ClientState::Disconnected;
        info!("disconnected");
    }

    fn reset_session(&mut self) {
        self.server = None;
        self.world = None;
        self.player_uuid = None;
        self.player_ship = None;
        self.roster.clear();
        self.predictor.clear();
        self.interpolator.clear();
        self.state_sync.clear_reckoning();
        self.projectile_sync.clear();
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    pub fn world(&self) -> Option<&WorldSnapshot> {
        self.world.as_ref()
    }

    pub fn player_uuid(&self) -> Option<Uuid> {
        self.player_uuid
    }

    pub fn player_ship(&self) -> Option<&Ship> {
        let world = self.world.as_ref()?;
        let uuid = self.player_ship?;
        world.ship(&uuid)
    }

    pub fn roster(&self) -> &[NetworkPlayer] {
        &self.roster
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    pub fn interpolator_mut(&mut self) -> &mut EntityInterpolator {
        &mut self.interpolator
    }

    pub fn reconciliation(&self) -> &ClientReconciliation {
        &self.reconciliation
    }

    /// One frame of client upkeep: drain transport events, advance the
    /// smoothing subsystems, escalate a monitor timeout to a disconnect.
    pub fn update(&mut self) {
        self.process_events();

        if self.state != ClientState::Connected {
            return;
        }

        self.interpolator.update();
        self.reconciliation.update();
        self.monitor.update();

        let now = now_ms();
        if now.saturating_sub(self.last_ping_sent_ms) >= PING_INTERVAL_MS {
            self.send_ping(now);
        }

        if self.monitor.is_timed_out() {
            warn!("server timed out");
            self.disconnect();
        }
    }

    fn process_events(&mut self) {
        while let Some(event) = self.transport.poll_event() {
            match event {
                TransportEvent::Connected(peer) => self.on_connected(peer),
                TransportEvent::Disconnected(peer) => self.on_disconnected(peer),
                TransportEvent::Packet(peer, bytes) => self.on_packet(peer, &bytes),
            }
        }
    }

    fn on_connected(&mut self, peer: PeerId) {
        if self.state == ClientState::Connecting {
            self.server = Some(peer);
            self.state = ClientState::Connected;
            info!("transport connected, awaiting welcome");
        }
    }

    fn on_disconnected(&mut self, peer: PeerId) {
        if self.server == Some(peer) {
            info!("server closed the connection");
            self.transport.shutdown();
            self.reset_session();
            self.state = ClientState::Disconnected;
        }
    }

    fn on_packet(&mut self, peer: PeerId, bytes: &[u8]) {
        if self.server.is_some() && self.server != Some(peer) {
            return;
        }
        self.packet_counter += 1;
        self.monitor.record_packet_received(self.packet_counter);

        let message = match Message::decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!("dropping undecodable packet: {}", e);
                return;
            }
        };

        match message {
            Message::ServerWelcome { player, world } => self.on_server_welcome(player, world),
            Message::StateUpdate {
                tick,
                ships,
                spawns,
                impacts,
                deaths,
            } => self.on_state_update(tick, ships, spawns, impacts, deaths),
            Message::PlayerJoined(joined) => self.on_player_joined(joined),
            Message::PlayerLeft(left) => self.on_player_left(left),
            Message::Pong { timestamp } => {
                let rtt = now_ms().saturating_sub(timestamp);
                self.monitor.record_ping(rtt as u32);
            }
            Message::Ping { timestamp } => {
                if let Some(server) = self.server {
                    let _ = self.send_message(server, &Message::Pong { timestamp });
                }
            }
            Message::ServerMessage(text) => info!("[server] {}", text),
            Message::Command(_) => {
                debug!("ignoring upstream-only message from server");
            }
        }
    }

    fn on_server_welcome(&mut self, player: Uuid, world: WorldSnapshot) {
        info!(
            "welcome: player {} in {} at tick {}",
            player,
            world.region().unwrap_or("<none>"),
            world.tick()
        );
        self.player_uuid = Some(player);
        self.player_ship = world.player_ship(&player).map(|ship| ship.uuid);
        self.world = Some(world);
    }

    fn on_state_update(
        &mut self,
        tick: u64,
        ships: Vec<aster::ShipUpdate>,
        spawns: Vec<aster::ProjectileSpawn>,
        impacts: Vec<aster::ProjectileImpact>,
        deaths: Vec<aster::ProjectileDeath>,
    ) {
        // The authoritative view is rebuilt on a clone of the predicted
        // world: entities the update omits keep their last known state.
        let Some(mut server_world) = self.world.clone() else {
            debug!("state update before welcome, ignoring");
            return;
        };
        self.updates_received += 1;
        self.state_sync.set_current_tick(tick);
        self.projectile_sync.set_current_tick(tick);

        // Remember what prediction showed for the local ship, for error
        // smoothing after the rebase.
        let predicted = self
            .player_ship
            .and_then(|uuid| server_world.ship(&uuid))
            .map(|ship| (ship.position, ship.velocity, ship.facing));

        server_world.set_tick(tick);

        let arrival = now_ms();
        for update in &ships {
            if server_world.ship(&update.uuid).is_none() {
                // First sighting of a remote ship.
                server_world.add_ship(Ship::new(update.uuid));
            }
            if let Some(ship) = server_world.ship_mut(&update.uuid) {
                self.state_sync.apply_update(ship, update);
            }
            if Some(update.uuid) != self.player_ship {
                self.interpolator.add_snapshot(
                    update.uuid,
                    EntityState::new(update.tick, update.position, update.velocity, update.facing)
                        .at_time(arrival),
                );
            }
        }

        for spawn in &spawns {
            self.projectile_sync.apply_spawn(spawn, &mut server_world);
        }
        for impact in &impacts {
            self.projectile_sync.apply_impact(impact, &mut server_world);
        }
        for death in &deaths {
            self.projectile_sync.apply_death(death, &mut server_world);
        }

        let reconciled = self.predictor.reconcile_with_server(&server_world, tick);

        if let (Some((pos, vel, facing)), Some(ship_uuid)) = (predicted, self.player_ship) {
            if let Some(ship) = reconciled.ship(&ship_uuid) {
                self.reconciliation.reconcile_position(pos, ship.position);
                self.reconciliation.reconcile_velocity(vel, ship.velocity);
                self.reconciliation.reconcile_facing(facing, ship.facing);
            }
        }

        self.world = Some(reconciled);
    }

    fn on_player_joined(&mut self, joined: NetworkPlayer) {
        info!("player joined: {}", joined.name);
        self.roster.retain(|p| p.uuid != joined.uuid);
        self.roster.push(joined);
    }

    fn on_player_left(&mut self, left: Uuid) {
        if let Some(player) = self.roster.iter().find(|p| p.uuid == left) {
            info!("player left: {}", player.name);
        }
        self.roster.retain(|p| p.uuid != left);
        // Their ship stops receiving updates; drop its timeline.
        if let Some(world) = &self.world {
            if let Some(ship) = world.player_ship(&left) {
                self.interpolator.remove_entity(&ship.uuid);
            }
        }
    }

    /// Send one tick of input: assign the session sequence, ship it to
    /// the server, and predict the outcome locally so the player sees an
    /// immediate response.
    pub fn send_command(&mut self, controls: u32, target_point: Option<aster::Point>) {
        if self.state != ClientState::Connected {
            return;
        }
        let Some(player) = self.player_uuid else {
            return;
        };
        let Some(tick) = self.world.as_ref().map(|w| w.tick()) else {
            return;
        };

        let mut command = PlayerCommand::new(player, tick, controls, self.next_sequence);
        command.target_point = target_point;
        self.next_sequence += 1;

        if let Some(server) = self.server {
            if self.send_message(server, &Message::Command(command.clone())).is_ok() {
                self.commands_sent += 1;
            }
        }

        if let Some(world) = self.world.take() {
            let predicted = self.predictor.predict_next(&world, &command);
            self.predictor.record_command(command);
            self.world = Some(predicted);
        }
    }

    fn send_ping(&mut self, now: u64) {
        if let Some(server) = self.server {
            let _ = self.send_message(server, &Message::Ping { timestamp: now });
            self.last_ping_sent_ms = now;
        }
    }

    fn send_message(&mut self, peer: PeerId, message: &Message) -> Result<(), TransportError> {
        self.packet_counter += 1;
        self.monitor.record_packet_sent(self.packet_counter);
        self.transport.send(peer, &message.encode())
    }

    pub fn statistics(&self) -> ClientStatistics {
        ClientStatistics {
            state: self.state,
            ping: self.monitor.ping(),
            packet_loss: self.monitor.packet_loss(),
            jitter: self.monitor.jitter(),
            quality: self.monitor.quality(),
            commands_sent: self.commands_sent,
            updates_received: self.updates_received,
            prediction_errors: self.predictor.prediction_errors(),
            interpolated_entities: self.interpolator.tracked_entity_count(),
        }
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
    use aster::command::controls;
    use aster::{MemoryTransport, PlayerStatus, Point};

    fn welcome_world(player: Uuid) -> WorldSnapshot {
        let mut world = WorldSnapshot::new("Sol");
        world.set_tick(100);
        let mut ship = Ship::new(Uuid::new_v4());
        ship.owner = Some(player);
        world.add_ship(ship);
        world
    }

    fn connected_pair() -> (MemoryTransport, MultiplayerClient, PeerId) {
        let mut server = MemoryTransport::new();
        server.start_server(0).unwrap();
        let client_transport = server.client_endpoint();

        let mut client = MultiplayerClient::new(Box::new(client_transport));
        client.connect("localhost", 0).unwrap();

        let Some(TransportEvent::Connected(client_peer)) = server.poll_event() else {
            panic!("expected client connect");
        };
        client.update();
        assert_eq!(client.state(), ClientState::Connected);
        (server, client, client_peer)
    }

    #[test]
    fn welcome_establishes_identity_and_world() {
        let (mut server, mut client, client_peer) = connected_pair();
        let player = Uuid::new_v4();
        let message = Message::ServerWelcome {
            player,
            world: welcome_world(player),
        };
        server.send(client_peer, &message.encode()).unwrap();
        client.update();

        assert_eq!(client.player_uuid(), Some(player));
        assert!(client.world().is_some());
        assert!(client.player_ship().is_some());
    }

    #[test]
    fn roster_follows_join_and_leave() {
        let (mut server, mut client, client_peer) = connected_pair();
        let other = Uuid::new_v4();
        let mut record = NetworkPlayer::new(other, "Rival");
        record.status = PlayerStatus::Connected;

        server
            .send(client_peer, &Message::PlayerJoined(record).encode())
            .unwrap();
        client.update();
        assert_eq!(client.roster().len(), 1);

        server
            .send(client_peer, &Message::PlayerLeft(other).encode())
            .unwrap();
        client.update();
        assert!(client.roster().is_empty());
    }

    #[test]
    fn send_command_predicts_locally() {
        let (mut server, mut client, client_peer) = connected_pair();
        let player = Uuid::new_v4();
        let message = Message::ServerWelcome {
            player,
            world: welcome_world(player),
        };
        server.send(client_peer, &message.encode()).unwrap();
        client.update();

        client.send_command(controls::THRUST, None);

        // Local world advanced a tick ahead of the server.
        assert_eq!(client.world().unwrap().tick(), 101);
        assert_eq!(client.statistics().commands_sent, 1);

        // The command reached the server intact.
        let mut got_command = false;
        while let Some(event) = server.poll_event() {
            if let TransportEvent::Packet(_, bytes) = event {
                if let Ok(Message::Command(command)) = Message::decode(&bytes) {
                    assert_eq!(command.player, player);
                    assert_eq!(command.tick, 100);
                    got_command = true;
                }
            }
        }
        assert!(got_command);
    }

    #[test]
    fn state_update_rebases_prediction() {
        let (mut server, mut client, client_peer) = connected_pair();
        let player = Uuid::new_v4();
        let world = welcome_world(player);
        let ship_uuid = world.player_ship(&player).unwrap().uuid;
        server
            .send(
                client_peer,
                &Message::ServerWelcome {
                    player,
                    world: world.clone(),
                }
                .encode(),
            )
            .unwrap();
        client.update();

        // Authoritative update places the ship elsewhere.
        let update = aster::ShipUpdate {
            uuid: ship_uuid,
            position: Point::new(50.0, 0.0),
            velocity: Point::new(1.0, 0.0),
            facing: aster::Angle::new(0.0),
            shields: 1.0,
            hull: 1.0,
            energy: 1.0,
            fuel: 1.0,
            flags: 0,
            scope: aster::UpdateScope::Full,
            tick: 101,
        };
        let message = Message::StateUpdate {
            tick: 101,
            ships: vec![update],
            spawns: vec![],
            impacts: vec![],
            deaths: vec![],
        };
        server.send(client_peer, &message.encode()).unwrap();
        client.update();

        let world = client.world().unwrap();
        assert_eq!(world.tick(), 101);
        assert_eq!(world.ship(&ship_uuid).unwrap().position, Point::new(50.0, 0.0));
        assert_eq!(client.statistics().updates_received, 1);
    }

    #[test]
    fn disconnect_clears_session() {
        let (mut server, mut client, client_peer) = connected_pair();
        let player = Uuid::new_v4();
        server
            .send(
                client_peer,
                &Message::ServerWelcome {
                    player,
                    world: welcome_world(player),
                }
                .encode(),
            )
            .unwrap();
        client.update();

        client.disconnect();
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(client.world().is_none());
        assert!(client.player_uuid().is_none());
    }
}
