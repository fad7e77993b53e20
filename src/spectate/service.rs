use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::SpectateConfig;
use crate::metrics::Metrics;
use crate::spectate::clock::{Clock, SystemClock};
use crate::spectate::error::SpectateError;
use crate::spectate::history::RecordOutcome;
use crate::spectate::policy::RoomPolicy;
use crate::spectate::registry::Spectator;
use crate::spectate::room::RoomSpectate;
use crate::spectate::{RoomId, SpectatorId};

type SharedRoom<S> = Arc<RwLock<RoomSpectate<S>>>;

/// A delayed view together with the policy it was selected under
#[derive(Debug)]
pub struct DelayedFrame<S> {
    pub state: Arc<S>,
    pub captured_at: Instant,
    pub policy: RoomPolicy,
}

/// Spectator service shared by every connection and room tick.
///
/// The outer map lock only guards room creation and teardown; each room
/// carries its own reader-writer lock so rooms never contend with each other.
pub struct SpectateService<S, C = SystemClock> {
    rooms: RwLock<HashMap<RoomId, SharedRoom<S>>>,
    default_policy: RoomPolicy,
    clock: C,
    metrics: Arc<Metrics>,
}

impl<S> SpectateService<S, SystemClock> {
    pub fn new(default_policy: RoomPolicy) -> Self {
        Self::with_clock(default_policy, SystemClock)
    }

    pub fn from_config(config: &SpectateConfig) -> Self {
        Self::new(config.default_policy())
    }
}

impl<S> Default for SpectateService<S, SystemClock> {
    fn default() -> Self {
        Self::new(RoomPolicy::default())
    }
}

impl<S, C: Clock> SpectateService<S, C> {
    pub fn with_clock(default_policy: RoomPolicy, clock: C) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            default_policy,
            clock,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Report into a shared metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Policy applied to rooms without an explicit one
    pub fn default_policy(&self) -> RoomPolicy {
        self.default_policy
    }

    fn room(&self, room_id: RoomId) -> Option<SharedRoom<S>> {
        self.rooms.read().get(&room_id).cloned()
    }

    fn room_or_create(&self, room_id: RoomId) -> SharedRoom<S> {
        if let Some(room) = self.room(room_id) {
            return room;
        }

        let mut rooms = self.rooms.write();
        rooms
            .entry(room_id)
            .or_insert_with(|| {
                self.metrics.rooms_active.fetch_add(1, Ordering::Relaxed);
                Arc::new(RwLock::new(RoomSpectate::new(self.clock.now())))
            })
            .clone()
    }

    /// Run `f` under the room's write lock, creating the room if needed
    fn with_room_mut<R>(&self, room_id: RoomId, f: impl FnOnce(&mut RoomSpectate<S>) -> R) -> R {
        loop {
            let room = self.room_or_create(room_id);
            let mut guard = room.write();
            if guard.retired {
                // Unlinked between lookup and lock, fetch the live entry
                continue;
            }
            return f(&mut guard);
        }
    }

    /// Run `f` under the room's write lock if the room exists
    fn with_existing_room_mut<R>(
        &self,
        room_id: RoomId,
        f: impl FnOnce(&mut RoomSpectate<S>) -> R,
    ) -> Option<R> {
        loop {
            let room = self.room(room_id)?;
            let mut guard = room.write();
            if guard.retired {
                continue;
            }
            return Some(f(&mut guard));
        }
    }

    /// Run `f` under the room's read lock, `None` for unknown rooms
    fn with_room<R>(&self, room_id: RoomId, f: impl FnOnce(&RoomSpectate<S>) -> R) -> Option<R> {
        let room = self.room(room_id)?;
        let guard = room.read();
        Some(f(&guard))
    }

    /// Drop the room entry when it no longer holds anything
    fn prune_if_vacant(&self, room_id: RoomId) {
        let mut rooms = self.rooms.write();
        let vacant = match rooms.get(&room_id) {
            Some(room) => {
                let mut guard = room.write();
                if guard.is_vacant() {
                    guard.retired = true;
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if vacant {
            rooms.remove(&room_id);
            Metrics::decrement(&self.metrics.rooms_active, 1);
        }
    }

    // ---- Room policy ----

    /// Replace the room's policy
    pub fn set_policy(&self, room_id: RoomId, policy: RoomPolicy) {
        self.with_room_mut(room_id, |room| room.policy = Some(policy));
        info!(
            "Spectator policy for room {}: allowed={} delay={}s max={} hole_cards={}",
            room_id,
            policy.spectating_allowed,
            policy.delay_seconds,
            policy.max_spectators,
            policy.show_hole_cards
        );
    }

    /// Configured policy, or the default when none was set
    pub fn policy(&self, room_id: RoomId) -> RoomPolicy {
        self.with_room(room_id, |room| room.effective_policy(&self.default_policy))
            .unwrap_or(self.default_policy)
    }

    /// Revert the room to the default policy
    pub fn reset_policy(&self, room_id: RoomId) {
        let had_policy = self
            .with_existing_room_mut(room_id, |room| room.policy.take().is_some())
            .unwrap_or(false);
        if had_policy {
            debug!("Spectator policy for room {} reset to default", room_id);
            self.prune_if_vacant(room_id);
        }
    }

    // ---- Spectator registry ----

    /// Register `spectator_id` as a viewer of `room_id`
    pub fn join(
        &self,
        room_id: RoomId,
        spectator_id: SpectatorId,
        name: impl Into<String>,
    ) -> Result<(), SpectateError> {
        let name = name.into();
        let result = self.with_room_mut(room_id, |room| {
            let policy = room.effective_policy(&self.default_policy);
            let rejoin = room.registry.contains(spectator_id);
            room.registry
                .join(&policy, room_id, spectator_id, name, self.clock.wall_now())?;
            // Gauge moves under the room lock so it stays ordered with leave/cleanup
            if !rejoin {
                self.metrics.spectators_active.fetch_add(1, Ordering::Relaxed);
            }
            Ok::<bool, SpectateError>(rejoin)
        });

        match result {
            Ok(true) => {
                self.metrics.spectator_rejoins.fetch_add(1, Ordering::Relaxed);
                debug!("Spectator {} refreshed in room {}", spectator_id, room_id);
                Ok(())
            }
            Ok(false) => {
                self.metrics.spectator_joins.fetch_add(1, Ordering::Relaxed);
                debug!("Spectator {} joined room {}", spectator_id, room_id);
                Ok(())
            }
            Err(e) => {
                match e {
                    SpectateError::SpectatingDisabled => {
                        self.metrics.joins_rejected_disabled.fetch_add(1, Ordering::Relaxed)
                    }
                    SpectateError::RoomFull { .. } => {
                        self.metrics.joins_rejected_full.fetch_add(1, Ordering::Relaxed)
                    }
                };
                debug!(
                    "Spectator {} rejected from room {}: {}",
                    spectator_id,
                    room_id,
                    e.reason()
                );
                self.prune_if_vacant(room_id);
                Err(e)
            }
        }
    }

    /// Remove a spectator; no-op when not present
    pub fn leave(&self, room_id: RoomId, spectator_id: SpectatorId) {
        let left = self.with_existing_room_mut(room_id, |room| {
            let removed = room.registry.leave(spectator_id).is_some();
            if removed {
                Metrics::decrement(&self.metrics.spectators_active, 1);
            }
            (removed, room.registry.is_empty())
        });

        if let Some((removed, now_empty)) = left {
            if removed {
                self.metrics.spectator_leaves.fetch_add(1, Ordering::Relaxed);
                debug!("Spectator {} left room {}", spectator_id, room_id);
            }
            if now_empty {
                self.prune_if_vacant(room_id);
            }
        }
    }

    /// Owned copy of the room's spectators
    pub fn spectators(&self, room_id: RoomId) -> Vec<Spectator> {
        self.with_room(room_id, |room| room.registry.list())
            .unwrap_or_default()
    }

    /// Ids of the room's spectators, captured under the read lock
    pub fn spectator_ids(&self, room_id: RoomId) -> Vec<SpectatorId> {
        self.with_room(room_id, |room| room.registry.ids())
            .unwrap_or_default()
    }

    pub fn spectator_count(&self, room_id: RoomId) -> usize {
        self.with_room(room_id, |room| room.registry.count())
            .unwrap_or(0)
    }

    pub fn is_spectating(&self, room_id: RoomId, spectator_id: SpectatorId) -> bool {
        self.with_room(room_id, |room| room.registry.contains(spectator_id))
            .unwrap_or(false)
    }

    // ---- Delayed state ----

    /// Record the room's current state, captured now
    pub fn record_snapshot(&self, room_id: RoomId, state: S) -> RecordOutcome {
        self.record_shared_snapshot(room_id, Arc::new(state))
    }

    /// Record an already shared state value, captured now
    pub fn record_shared_snapshot(&self, room_id: RoomId, state: Arc<S>) -> RecordOutcome {
        // Timestamp is taken under the write lock so concurrent writers stay ordered
        let outcome = self.with_room_mut(room_id, |room| {
            let now = self.clock.now();
            room.history.record(state, now)
        });
        self.note_recorded(room_id, outcome);
        outcome
    }

    /// Record a state with a caller-supplied capture time
    pub fn record_snapshot_at(&self, room_id: RoomId, state: S, captured_at: Instant) -> RecordOutcome {
        let state = Arc::new(state);
        let outcome = self.with_room_mut(room_id, |room| room.history.record(state, captured_at));
        self.note_recorded(room_id, outcome);
        outcome
    }

    fn note_recorded(&self, room_id: RoomId, outcome: RecordOutcome) {
        self.metrics.snapshots_recorded.fetch_add(1, Ordering::Relaxed);
        if outcome.evicted > 0 {
            self.metrics
                .snapshots_evicted
                .fetch_add(outcome.evicted as u64, Ordering::Relaxed);
        }
        if outcome.reordered {
            self.metrics.snapshots_reordered.fetch_add(1, Ordering::Relaxed);
            warn!("Out-of-order snapshot for room {} sorted into history", room_id);
        }
    }

    /// Newest state captured strictly before `now - delay`
    pub fn delayed_view(&self, room_id: RoomId) -> Option<Arc<S>> {
        self.delayed_frame(room_id).map(|frame| frame.state)
    }

    /// Delayed view plus its capture time and the policy in force
    pub fn delayed_frame(&self, room_id: RoomId) -> Option<DelayedFrame<S>> {
        let frame = self
            .with_room(room_id, |room| {
                let policy = room.effective_policy(&self.default_policy);
                let now = self.clock.now();
                room.history
                    .delayed_view(now, policy.delay())
                    .map(|snapshot| DelayedFrame {
                        state: Arc::clone(&snapshot.state),
                        captured_at: snapshot.captured_at,
                        policy,
                    })
            })
            .flatten();

        if frame.is_some() {
            self.metrics.delayed_views_served.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.delayed_views_pending.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Number of snapshots currently retained for the room
    pub fn history_len(&self, room_id: RoomId) -> usize {
        self.with_room(room_id, |room| room.history.len())
            .unwrap_or(0)
    }

    // ---- Lifecycle ----

    /// Drop every spectator, the policy and the history of a closed room
    pub fn cleanup_room(&self, room_id: RoomId) {
        let removed = self.rooms.write().remove(&room_id);

        if let Some(room) = removed {
            let mut guard = room.write();
            guard.retired = true;
            let spectators = guard.registry.count();
            let snapshots = guard.history.len();
            let age = guard.age(self.clock.now());
            guard.registry.clear();
            guard.history.clear();
            guard.policy = None;
            Metrics::decrement(&self.metrics.spectators_active, spectators as u64);
            drop(guard);

            Metrics::decrement(&self.metrics.rooms_active, 1);
            self.metrics.rooms_cleaned.fetch_add(1, Ordering::Relaxed);
            info!(
                "Cleaned up spectator state for room {} after {:?} ({} spectators, {} snapshots)",
                room_id, age, spectators, snapshots
            );
        }
    }

    /// Rooms currently holding spectator state
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Spectators across all rooms
    pub fn total_spectators(&self) -> usize {
        let rooms: Vec<SharedRoom<S>> = self.rooms.read().values().cloned().collect();
        rooms.iter().map(|room| room.read().registry.count()).sum()
    }
}
