use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::spectate::error::SpectateError;
use crate::spectate::policy::RoomPolicy;
use crate::spectate::{RoomId, SpectatorId};

/// A viewer registered against a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spectator {
    #[serde(rename = "userId")]
    pub id: SpectatorId,
    pub name: String,
    pub room_id: RoomId,
    pub joined_at: DateTime<Utc>,
}

/// Spectators watching a single room
#[derive(Debug, Default)]
pub struct SpectatorRegistry {
    spectators: HashMap<SpectatorId, Spectator>,
}

impl SpectatorRegistry {
    pub fn new() -> Self {
        Self {
            spectators: HashMap::new(),
        }
    }

    /// Register a spectator under `policy`.
    ///
    /// Re-joining refreshes the join timestamp. The capacity check runs
    /// against the current size before the entry is written.
    pub fn join(
        &mut self,
        policy: &RoomPolicy,
        room_id: RoomId,
        id: SpectatorId,
        name: String,
        joined_at: DateTime<Utc>,
    ) -> Result<(), SpectateError> {
        if !policy.spectating_allowed {
            return Err(SpectateError::SpectatingDisabled);
        }

        if policy.is_full(self.spectators.len()) {
            return Err(SpectateError::RoomFull {
                max: policy.max_spectators,
            });
        }

        self.spectators.insert(
            id,
            Spectator {
                id,
                name,
                room_id,
                joined_at,
            },
        );

        Ok(())
    }

    /// Remove a spectator
    pub fn leave(&mut self, id: SpectatorId) -> Option<Spectator> {
        self.spectators.remove(&id)
    }

    /// Owned copy of the current members
    pub fn list(&self) -> Vec<Spectator> {
        self.spectators.values().cloned().collect()
    }

    /// Ids of the current members
    pub fn ids(&self) -> Vec<SpectatorId> {
        self.spectators.keys().copied().collect()
    }

    pub fn get(&self, id: SpectatorId) -> Option<&Spectator> {
        self.spectators.get(&id)
    }

    pub fn count(&self) -> usize {
        self.spectators.len()
    }

    pub fn contains(&self, id: SpectatorId) -> bool {
        self.spectators.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.spectators.is_empty()
    }

    pub fn clear(&mut self) {
        self.spectators.clear();
    }
}
