//! Background task driving the sync engine and fanning out updates.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{broadcast, watch},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

use crate::{
    store::Snapshot,
    sync::{SerialSource, SyncEngine, SyncOutcome, ZoneSource},
};

/// Receives every newly installed snapshot.
#[async_trait]
pub trait SnapshotListener: Send + Sync {
    async fn on_snapshot_updated(&self, snapshot: Arc<Snapshot>);
}

#[async_trait]
impl<F> SnapshotListener for F
where
    F: Fn(Arc<Snapshot>) + Send + Sync,
{
    async fn on_snapshot_updated(&self, snapshot: Arc<Snapshot>) {
        self(snapshot)
    }
}

/// Fans snapshots out to any number of subscribers, e.g. connected
/// browsers. Slow subscribers lose intermediate snapshots, not the latest.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<Snapshot>>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl SnapshotListener for Broadcaster {
    async fn on_snapshot_updated(&self, snapshot: Arc<Snapshot>) {
        // no subscribers is fine
        let _ = self.tx.send(snapshot);
    }
}

/// Runs `sync_once` every `period` until `shutdown` flips to `true`.
///
/// The first cycle runs immediately. Failures are logged and the loop
/// carries on; a cycle in progress always completes before shutdown.
pub async fn run<P, T, L>(
    engine: Arc<SyncEngine<P, T>>,
    period: Duration,
    listener: L,
    mut shutdown: watch::Receiver<bool>,
) where
    P: SerialSource,
    T: ZoneSource,
    L: SnapshotListener,
{
    let zone = engine.config().domain.clone();
    let server = engine.config().server_label();
    info!(zone = %zone, server = %server, period_secs = period.as_secs(), "poll loop started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        match engine.sync_once().await {
            SyncOutcome::Unchanged(serial) => {
                info!(zone = %zone, serial, "serial unchanged, skipping transfer");
            }
            SyncOutcome::Updated(snapshot) => {
                info!(
                    zone = %zone,
                    serial = snapshot.version,
                    records = snapshot.records.len(),
                    "installed new snapshot"
                );
                listener.on_snapshot_updated(snapshot).await;
                debug!(zone = %zone, "update broadcast");
            }
            SyncOutcome::Failed(err) if err.is_auth() => {
                error!(zone = %zone, server = %server, kind = ?err.kind(), error = %err, "sync failed");
            }
            SyncOutcome::Failed(err) => {
                warn!(zone = %zone, server = %server, kind = ?err.kind(), error = %err, "sync failed");
            }
        }
    }

    info!(zone = %zone, "poll loop stopped");
}
