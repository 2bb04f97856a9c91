use uuid::Uuid;

/// Connection status of a player as shared with other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayerStatus {
    Connecting = 0,
    Connected = 1,
    Disconnected = 2,
}

impl PlayerStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PlayerStatus::Connecting),
            1 => Some(PlayerStatus::Connected),
            2 => Some(PlayerStatus::Disconnected),
            _ => None,
        }
    }
}

/// The roster record for one player, as announced in PLAYER_JOINED.
/// Server-side connection details live in the server's registry; this is
/// only the synced surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlayer {
    pub uuid: Uuid,
    pub name: String,
    pub status: PlayerStatus,
}

impl NetworkPlayer {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            status: PlayerStatus::Connecting,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.uuid.is_nil()
    }
}
