use std::time::{Duration, Instant};

use crate::spectate::history::DelayedStateBuffer;
use crate::spectate::policy::RoomPolicy;
use crate::spectate::registry::SpectatorRegistry;

/// All spectator state owned by one room: policy, viewers and history
#[derive(Debug)]
pub struct RoomSpectate<S> {
    /// Explicitly configured policy, `None` falls back to the service default
    pub policy: Option<RoomPolicy>,
    pub registry: SpectatorRegistry,
    pub history: DelayedStateBuffer<S>,
    pub created_at: Instant,
    /// Set once the entry has been unlinked from the service map
    pub(crate) retired: bool,
}

impl<S> RoomSpectate<S> {
    pub fn new(created_at: Instant) -> Self {
        Self {
            policy: None,
            registry: SpectatorRegistry::new(),
            history: DelayedStateBuffer::new(),
            created_at,
            retired: false,
        }
    }

    /// Effective policy given the process-wide default
    pub fn effective_policy(&self, default: &RoomPolicy) -> RoomPolicy {
        self.policy.unwrap_or(*default)
    }

    /// How long the room has held spectator state
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Nothing configured, nobody watching, no history
    pub fn is_vacant(&self) -> bool {
        self.policy.is_none() && self.registry.is_empty() && self.history.is_empty()
    }
}
