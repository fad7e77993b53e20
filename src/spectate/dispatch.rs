//! Spectator fan-out
//!
//! The spectator set is copied under the room's read lock and the lock is
//! released before any delivery callback runs. Callbacks are free to block
//! on I/O or call back into the service (e.g. to drop a dead connection).

use std::sync::Arc;
use std::time::Instant;

use crate::spectate::clock::Clock;
use crate::spectate::service::{DelayedFrame, SpectateService};
use crate::spectate::{RoomId, SpectatorId};

impl<S, C: Clock> SpectateService<S, C> {
    /// Invoke `deliver` once per current spectator, in no particular order.
    ///
    /// Returns the number of spectators visited. Delivery errors belong to
    /// the caller; nothing is retried here.
    pub fn for_each_spectator<F>(&self, room_id: RoomId, mut deliver: F) -> usize
    where
        F: FnMut(SpectatorId),
    {
        let started = Instant::now();
        let ids = self.spectator_ids(room_id);
        for id in &ids {
            deliver(*id);
        }
        self.metrics().record_fanout(started.elapsed(), ids.len());
        ids.len()
    }

    /// Push the room's delayed view to every spectator.
    ///
    /// The view is resolved once for the whole pass. Returns 0 without
    /// calling `deliver` when no snapshot is old enough yet.
    pub fn broadcast_delayed_view<F>(&self, room_id: RoomId, mut deliver: F) -> usize
    where
        F: FnMut(SpectatorId, &DelayedFrame<S>),
    {
        let Some(frame) = self.delayed_frame(room_id) else {
            return 0;
        };
        self.for_each_spectator(room_id, |id| deliver(id, &frame))
    }

    /// Spectator ids paired with the delayed view, for callers that drive
    /// delivery themselves (e.g. spawning one send task per spectator)
    pub fn delayed_fanout(&self, room_id: RoomId) -> Option<(Arc<S>, Vec<SpectatorId>)> {
        let frame = self.delayed_frame(room_id)?;
        Some((frame.state, self.spectator_ids(room_id)))
    }
}

#[cfg(test)]
mod tests {
    use crate::spectate::clock::ManualClock;
    use crate::spectate::policy::RoomPolicy;
    use crate::spectate::service::SpectateService;
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn service() -> (Arc<SpectateService<String, Arc<ManualClock>>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let policy = RoomPolicy {
            delay_seconds: 10,
            ..RoomPolicy::default()
        };
        (Arc::new(SpectateService::with_clock(policy, clock.clone())), clock)
    }

    #[test]
    fn test_for_each_spectator_visits_everyone() {
        let (service, _) = service();
        let room = Uuid::new_v4();
        let ids: HashSet<_> = (0..5).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            service.join(room, *id, "viewer").unwrap();
        }

        let mut visited = HashSet::new();
        let count = service.for_each_spectator(room, |id| {
            visited.insert(id);
        });

        assert_eq!(count, 5);
        assert_eq!(visited, ids);
        assert_eq!(service.metrics().broadcast_deliveries.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_for_each_spectator_empty_room() {
        let (service, _) = service();
        let mut calls = 0;
        let count = service.for_each_spectator(Uuid::new_v4(), |_| calls += 1);
        assert_eq!(count, 0);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_callback_may_reenter_service() {
        let (service, _) = service();
        let room = Uuid::new_v4();
        for _ in 0..3 {
            service.join(room, Uuid::new_v4(), "viewer").unwrap();
        }

        // Every delivery fails and the transport drops the spectator
        let visited = service.for_each_spectator(room, |id| service.leave(room, id));

        assert_eq!(visited, 3);
        assert_eq!(service.spectator_count(room), 0);
    }

    #[test]
    fn test_callback_may_join_new_spectators() {
        let (service, _) = service();
        let room = Uuid::new_v4();
        service.join(room, Uuid::new_v4(), "first").unwrap();

        let visited = service.for_each_spectator(room, |_| {
            service.join(room, Uuid::new_v4(), "late").unwrap();
        });

        // The pass works on the set captured before delivery began
        assert_eq!(visited, 1);
        assert_eq!(service.spectator_count(room), 2);
    }

    #[test]
    fn test_broadcast_waits_for_delay() {
        let (service, clock) = service();
        let room = Uuid::new_v4();
        service.join(room, Uuid::new_v4(), "viewer").unwrap();
        service.record_snapshot(room, "flop".to_string());

        let mut delivered = Vec::new();
        let count = service.broadcast_delayed_view(room, |id, frame| delivered.push((id, frame.state.clone())));
        assert_eq!(count, 0);
        assert!(delivered.is_empty());

        clock.advance(Duration::from_secs(11));
        let count = service.broadcast_delayed_view(room, |id, frame| delivered.push((id, frame.state.clone())));
        assert_eq!(count, 1);
        assert_eq!(delivered[0].1.as_str(), "flop");
    }

    #[test]
    fn test_delayed_fanout() {
        let (service, clock) = service();
        let room = Uuid::new_v4();
        let a = Uuid::new_v4();
        service.join(room, a, "a").unwrap();
        assert!(service.delayed_fanout(room).is_none());

        service.record_snapshot(room, "turn".to_string());
        clock.advance(Duration::from_secs(30));

        let (state, ids) = service.delayed_fanout(room).unwrap();
        assert_eq!(state.as_str(), "turn");
        assert_eq!(ids, vec![a]);
    }

    #[test]
    fn test_concurrent_broadcast_and_membership_changes() {
        let (service, clock) = service();
        let room = Uuid::new_v4();
        service.record_snapshot(room, "river".to_string());
        clock.advance(Duration::from_secs(60));

        let writer = {
            let service = service.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let id = Uuid::new_v4();
                    service.join(room, id, "w").unwrap();
                    service.leave(room, id);
                }
            })
        };

        let broadcaster = {
            let service = service.clone();
            std::thread::spawn(move || {
                let mut total = 0;
                for _ in 0..200 {
                    total += service.broadcast_delayed_view(room, |_, frame| {
                        assert_eq!(frame.state.as_str(), "river");
                    });
                }
                total
            })
        };

        writer.join().unwrap();
        let delivered = broadcaster.join().unwrap();
        assert!(delivered <= 200);
        assert_eq!(service.spectator_count(room), 0);
    }
}
