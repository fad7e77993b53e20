use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay applied to rooms without an explicit policy
pub const DEFAULT_DELAY_SECONDS: i64 = 30;
/// Default spectator capacity per room
pub const DEFAULT_MAX_SPECTATORS: i64 = 50;

/// Per-room spectator policy.
///
/// Values are stored exactly as given. A non-positive `delay_seconds`
/// disables the delay and a non-positive `max_spectators` rejects every join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPolicy {
    pub spectating_allowed: bool,
    pub delay_seconds: i64,
    pub max_spectators: i64,
    pub show_hole_cards: bool,
}

impl RoomPolicy {
    /// Delay spectators must lag behind the live table
    pub fn delay(&self) -> Duration {
        if self.delay_seconds <= 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(self.delay_seconds as u64)
        }
    }

    /// Whether a room holding `current` spectators has reached capacity
    pub fn is_full(&self, current: usize) -> bool {
        current as i64 >= self.max_spectators
    }
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            spectating_allowed: true,
            delay_seconds: DEFAULT_DELAY_SECONDS,
            max_spectators: DEFAULT_MAX_SPECTATORS,
            show_hole_cards: true,
        }
    }
}
