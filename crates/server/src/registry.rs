use std::collections::HashMap;

use uuid::Uuid;

use aster::{NetworkPlayer, PeerId, PlayerStatus};

/// Server-side record for one connected player: the synced roster entry
/// plus transport and activity details the clients never see.
#[derive(Debug, Clone)]
pub struct ServerPlayer {
    pub record: NetworkPlayer,
    pub peer: PeerId,
    pub ship: Option<Uuid>,
    pub joined_at_ms: u64,
    pub last_activity_ms: u64,
}

impl ServerPlayer {
    pub fn uuid(&self) -> Uuid {
        self.record.uuid
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }
}

/// Player roster keyed both by uuid and by transport peer.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: HashMap<Uuid, ServerPlayer>,
    by_peer: HashMap<PeerId, Uuid>,
    max_players: usize,
}

impl PlayerRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            by_peer: HashMap::new(),
            max_players,
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Admit a new player on a peer. Returns None when the server is
    /// full or the peer already has a player.
    pub fn add_player(&mut self, peer: PeerId, name: String, now_ms: u64) -> Option<&ServerPlayer> {
        if self.is_full() || self.by_peer.contains_key(&peer) {
            return None;
        }
        let uuid = Uuid::new_v4();
        let mut record = NetworkPlayer::new(uuid, name);
        record.status = PlayerStatus::Connected;

        self.by_peer.insert(peer, uuid);
        self.players.insert(
            uuid,
            ServerPlayer {
                record,
                peer,
                ship: None,
                joined_at_ms: now_ms,
                last_activity_ms: now_ms,
            },
        );
        self.players.get(&uuid)
    }

    pub fn remove_by_peer(&mut self, peer: PeerId) -> Option<ServerPlayer> {
        let uuid = self.by_peer.remove(&peer)?;
        self.players.remove(&uuid)
    }

    pub fn remove(&mut self, uuid: &Uuid) -> Option<ServerPlayer> {
        let player = self.players.remove(uuid)?;
        self.by_peer.remove(&player.peer);
        Some(player)
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&ServerPlayer> {
        self.players.get(uuid)
    }

    pub fn get_mut(&mut self, uuid: &Uuid) -> Option<&mut ServerPlayer> {
        self.players.get_mut(uuid)
    }

    pub fn by_peer(&self, peer: PeerId) -> Option<&ServerPlayer> {
        self.by_peer.get(&peer).and_then(|uuid| self.players.get(uuid))
    }

    pub fn by_peer_mut(&mut self, peer: PeerId) -> Option<&mut ServerPlayer> {
        let uuid = self.by_peer.get(&peer)?;
        self.players.get_mut(uuid)
    }

    pub fn by_name(&self, name: &str) -> Option<&ServerPlayer> {
        self.players.values().find(|p| p.record.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerPlayer> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_until_full() {
        let mut registry = PlayerRegistry::new(2);
        assert!(registry.add_player(PeerId(1), "one".into(), 0).is_some());
        assert!(registry.add_player(PeerId(2), "two".into(), 0).is_some());
        assert!(registry.add_player(PeerId(3), "three".into(), 0).is_none());
        assert!(registry.is_full());
    }

    #[test]
    fn one_player_per_peer() {
        let mut registry = PlayerRegistry::new(8);
        assert!(registry.add_player(PeerId(1), "one".into(), 0).is_some());
        assert!(registry.add_player(PeerId(1), "dup".into(), 0).is_none());
    }

    #[test]
    fn peer_and_uuid_indexes_stay_in_sync() {
        let mut registry = PlayerRegistry::new(8);
        let uuid = registry.add_player(PeerId(7), "x".into(), 0).unwrap().uuid();

        let removed = registry.remove_by_peer(PeerId(7)).unwrap();
        assert_eq!(removed.uuid(), uuid);
        assert!(registry.get(&uuid).is_none());
        assert!(registry.by_peer(PeerId(7)).is_none());
    }

    #[test]
    fn lookup_by_name() {
        let mut registry = PlayerRegistry::new(8);
        registry.add_player(PeerId(1), "Ada".into(), 0);
        assert!(registry.by_name("Ada").is_some());
        assert!(registry.by_name("Bob").is_none());
    }
}
