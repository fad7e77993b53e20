//! Spectator service benchmarks
//!
//! Measures delayed-view lookup against history depth and join/fan-out
//! cost against room size.
//!
//! Run with: cargo bench --bench spectate

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use table_spectate_server::spectate::{ManualClock, RoomPolicy, SpectateService};
use uuid::Uuid;

/// Service with one room holding `snapshots` states spread over the retention window
fn service_with_history(snapshots: u64) -> (SpectateService<u64, Arc<ManualClock>>, Uuid) {
    let clock = Arc::new(ManualClock::new());
    let service = SpectateService::with_clock(RoomPolicy::default(), clock.clone());
    let room = Uuid::new_v4();
    let step_ms = (300_000 / snapshots).max(1);

    for i in 0..snapshots {
        clock.set_offset(Duration::from_millis(i * step_ms));
        service.record_snapshot(room, i);
    }
    (service, room)
}

fn bench_delayed_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("delayed_view");

    for count in [10u64, 100, 1_000, 10_000] {
        let (service, room) = service_with_history(count);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("history", count), &count, |b, _| {
            b.iter(|| black_box(service.delayed_view(black_box(room))));
        });
    }

    group.finish();
}

fn bench_record_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_snapshot");
    let (service, room) = service_with_history(1_000);
    let clock = service.clock().clone();

    group.bench_function("steady_state", |b| {
        b.iter(|| {
            clock.advance(Duration::from_millis(300));
            black_box(service.record_snapshot(room, 42));
        });
    });

    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    let mut rng = rand::thread_rng();

    for count in [10usize, 50, 250] {
        let policy = RoomPolicy {
            max_spectators: count as i64,
            ..RoomPolicy::default()
        };
        let service: SpectateService<u64> = SpectateService::new(policy);
        let room = Uuid::new_v4();
        for _ in 0..count {
            let name = format!("viewer{}", rng.gen_range(0..1_000_000));
            let _ = service.join(room, Uuid::new_v4(), name);
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("spectators", count), &count, |b, _| {
            b.iter(|| {
                let mut sent = 0usize;
                service.for_each_spectator(room, |id| {
                    black_box(id);
                    sent += 1;
                });
                black_box(sent)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_delayed_view, bench_record_snapshot, bench_fanout);
criterion_main!(benches);
