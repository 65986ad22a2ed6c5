use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::{Engine, EngineError};
use crate::model::{Actor, BookingStatus};
use crate::observability;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// One reaper pass: expire every pending hold whose deadline has lapsed.
/// Each expiration goes through the validated Transition Executor, so a
/// concurrent reaper (or a guest confirming at the last moment) makes the
/// losing attempt a quiet skip, never a double write.
pub async fn reap_once(engine: &Engine) -> usize {
    let now = now_ms();
    let mut reaped = 0;
    for booking_id in engine.collect_expired_holds(now) {
        match engine
            .transition(
                booking_id,
                BookingStatus::Expired,
                Actor::system(),
                Some("hold timeout".into()),
            )
            .await
        {
            Ok(()) => {
                metrics::counter!(observability::HOLDS_EXPIRED_TOTAL).increment(1);
                info!("reaped expired hold {booking_id}");
                reaped += 1;
            }
            // Someone else transitioned it first, or it was extended
            // between the scan and the lock.
            Err(EngineError::InvalidTransition { .. }) | Err(EngineError::Validation(_)) => {
                debug!("reaper skip {booking_id}");
            }
            Err(e) => warn!("reaper failed on {booking_id}: {e}"),
        }
    }
    reaped
}

/// Periodic expiry reaper. Runs until the stop signal flips to `true`, so
/// tests and shutdown paths can halt it deterministically.
pub async fn run_reaper(engine: Arc<Engine>, every: Duration, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                reap_once(&engine).await;
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!("reaper stopping");
                    return;
                }
            }
        }
    }
}

/// Periodic WAL compactor: rewrites the log once enough appends accumulate
/// since the last compaction. Shares the reaper's stop-signal shape.
pub async fn run_compactor(
    engine: Arc<Engine>,
    threshold: u64,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if engine.wal_appends_since_compact().await >= threshold {
                    match engine.compact_wal().await {
                        Ok(()) => info!("WAL compacted"),
                        Err(e) => warn!("WAL compaction failed: {e}"),
                    }
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    info!("compactor stopping");
                    return;
                }
            }
        }
    }
}
