//! Prometheus-compatible metrics endpoint
//!
//! Exposes spectator subsystem counters in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{info, debug};

const FANOUT_HISTORY_LEN: usize = 1000;

/// Metrics registry for the spectator service
#[derive(Debug)]
pub struct Metrics {
    // Occupancy
    pub rooms_active: AtomicU64,
    pub spectators_active: AtomicU64,

    // Join / leave
    pub spectator_joins: AtomicU64,
    pub spectator_rejoins: AtomicU64,
    pub joins_rejected_disabled: AtomicU64,
    pub joins_rejected_full: AtomicU64,
    pub spectator_leaves: AtomicU64,
    pub rooms_cleaned: AtomicU64,

    // Snapshot history
    pub snapshots_recorded: AtomicU64,
    pub snapshots_evicted: AtomicU64,
    pub snapshots_reordered: AtomicU64,

    // Delayed views
    pub delayed_views_served: AtomicU64,
    pub delayed_views_pending: AtomicU64,

    // Broadcast fan-out
    pub broadcasts: AtomicU64,
    pub broadcast_deliveries: AtomicU64,
    pub fanout_time_us: AtomicU64,
    pub fanout_time_p95_us: AtomicU64,
    pub fanout_time_max_us: AtomicU64,

    start_time: Instant,

    // Rolling fan-out times for percentile calculation
    fanout_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rooms_active: AtomicU64::new(0),
            spectators_active: AtomicU64::new(0),
            spectator_joins: AtomicU64::new(0),
            spectator_rejoins: AtomicU64::new(0),
            joins_rejected_disabled: AtomicU64::new(0),
            joins_rejected_full: AtomicU64::new(0),
            spectator_leaves: AtomicU64::new(0),
            rooms_cleaned: AtomicU64::new(0),
            snapshots_recorded: AtomicU64::new(0),
            snapshots_evicted: AtomicU64::new(0),
            snapshots_reordered: AtomicU64::new(0),
            delayed_views_served: AtomicU64::new(0),
            delayed_views_pending: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            broadcast_deliveries: AtomicU64::new(0),
            fanout_time_us: AtomicU64::new(0),
            fanout_time_p95_us: AtomicU64::new(0),
            fanout_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            fanout_history: RwLock::new(VecDeque::with_capacity(FANOUT_HISTORY_LEN)),
        }
    }

    /// Record one broadcast pass and update percentiles
    pub fn record_fanout(&self, duration: Duration, deliveries: usize) {
        let us = duration.as_micros() as u64;
        self.fanout_time_us.store(us, Ordering::Relaxed);
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.broadcast_deliveries.fetch_add(deliveries as u64, Ordering::Relaxed);

        let mut history = self.fanout_history.write();
        history.push_back(us);
        while history.len() > FANOUT_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            self.fanout_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.fanout_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Saturating decrement for gauges
    pub fn decrement(gauge: &AtomicU64, by: u64) {
        let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(by)));
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("spectate_rooms_active", "Rooms with spectator state", "gauge",
            self.rooms_active.load(Ordering::Relaxed));
        metric!("spectate_spectators_active", "Currently registered spectators", "gauge",
            self.spectators_active.load(Ordering::Relaxed));

        metric!("spectate_joins_total", "Successful spectator joins", "counter",
            self.spectator_joins.load(Ordering::Relaxed));
        metric!("spectate_rejoins_total", "Joins that refreshed an existing spectator", "counter",
            self.spectator_rejoins.load(Ordering::Relaxed));
        output.push_str(&format!(
            "# HELP spectate_joins_rejected_total Rejected spectator joins\n# TYPE spectate_joins_rejected_total counter\nspectate_joins_rejected_total{{reason=\"disabled\"}} {}\nspectate_joins_rejected_total{{reason=\"room_full\"}} {}\n",
            self.joins_rejected_disabled.load(Ordering::Relaxed),
            self.joins_rejected_full.load(Ordering::Relaxed),
        ));
        metric!("spectate_leaves_total", "Spectators that left", "counter",
            self.spectator_leaves.load(Ordering::Relaxed));
        metric!("spectate_rooms_cleaned_total", "Rooms torn down", "counter",
            self.rooms_cleaned.load(Ordering::Relaxed));

        metric!("spectate_snapshots_recorded_total", "Snapshots recorded", "counter",
            self.snapshots_recorded.load(Ordering::Relaxed));
        metric!("spectate_snapshots_evicted_total", "Snapshots dropped by retention", "counter",
            self.snapshots_evicted.load(Ordering::Relaxed));
        metric!("spectate_snapshots_reordered_total", "Snapshots recorded out of order", "counter",
            self.snapshots_reordered.load(Ordering::Relaxed));

        metric!("spectate_delayed_views_served_total", "Delayed views returned", "counter",
            self.delayed_views_served.load(Ordering::Relaxed));
        metric!("spectate_delayed_views_pending_total", "Delayed view requests with nothing old enough yet", "counter",
            self.delayed_views_pending.load(Ordering::Relaxed));

        metric!("spectate_broadcasts_total", "Broadcast passes", "counter",
            self.broadcasts.load(Ordering::Relaxed));
        metric!("spectate_broadcast_deliveries_total", "Per-spectator deliveries", "counter",
            self.broadcast_deliveries.load(Ordering::Relaxed));
        metric!("spectate_fanout_time_microseconds", "Last fan-out duration", "gauge",
            self.fanout_time_us.load(Ordering::Relaxed));
        metric!("spectate_fanout_time_p95_microseconds", "95th percentile fan-out duration", "gauge",
            self.fanout_time_p95_us.load(Ordering::Relaxed));
        metric!("spectate_fanout_time_max_microseconds", "Maximum fan-out duration", "gauge",
            self.fanout_time_max_us.load(Ordering::Relaxed));

        metric!("spectate_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "occupancy": {
                "rooms": self.rooms_active.load(Ordering::Relaxed),
                "spectators": self.spectators_active.load(Ordering::Relaxed),
            },
            "joins": {
                "accepted": self.spectator_joins.load(Ordering::Relaxed),
                "rejoined": self.spectator_rejoins.load(Ordering::Relaxed),
                "rejected_disabled": self.joins_rejected_disabled.load(Ordering::Relaxed),
                "rejected_full": self.joins_rejected_full.load(Ordering::Relaxed),
                "leaves": self.spectator_leaves.load(Ordering::Relaxed),
            },
            "history": {
                "recorded": self.snapshots_recorded.load(Ordering::Relaxed),
                "evicted": self.snapshots_evicted.load(Ordering::Relaxed),
                "reordered": self.snapshots_reordered.load(Ordering::Relaxed),
                "views_served": self.delayed_views_served.load(Ordering::Relaxed),
                "views_pending": self.delayed_views_pending.load(Ordering::Relaxed),
            },
            "broadcast": {
                "passes": self.broadcasts.load(Ordering::Relaxed),
                "deliveries": self.broadcast_deliveries.load(Ordering::Relaxed),
                "fanout_time_p95_us": self.fanout_time_p95_us.load(Ordering::Relaxed),
            },
            "rooms_cleaned": self.rooms_cleaned.load(Ordering::Relaxed),
            "uptime_seconds": self.uptime_seconds(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route_request(&request, &metrics);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

fn route_request(request: &str, metrics: &Metrics) -> String {
    // /metrics/json must be matched before /metrics
    if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        http_ok("application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_ok("text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        http_ok("text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

fn http_ok(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}
