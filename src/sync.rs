//! One probe-compare-transfer cycle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::{
    config::ZoneConfig,
    dns::types::{RawZone, SoaSerial},
    error::SyncError,
    normalize::{RecordFilter, normalize},
    store::{PollResult, Snapshot, SnapshotStore},
};

/// Cheap lookup of the zone's current serial.
#[async_trait]
pub trait SerialSource: Send + Sync {
    async fn fetch_serial(&self) -> Result<SoaSerial, SyncError>;
}

/// Expensive fetch of the whole zone.
#[async_trait]
pub trait ZoneSource: Send + Sync {
    async fn transfer(&self) -> Result<RawZone, SyncError>;
}

#[async_trait]
impl<S: SerialSource + ?Sized> SerialSource for Arc<S> {
    async fn fetch_serial(&self) -> Result<SoaSerial, SyncError> {
        (**self).fetch_serial().await
    }
}

#[async_trait]
impl<Z: ZoneSource + ?Sized> ZoneSource for Arc<Z> {
    async fn transfer(&self) -> Result<RawZone, SyncError> {
        (**self).transfer().await
    }
}

#[derive(Clone, Debug)]
pub enum SyncOutcome {
    Unchanged(SoaSerial),
    Updated(Arc<Snapshot>),
    Failed(SyncError),
}

/// Refreshes the store from the primary, transferring only when the SOA
/// serial differs from the installed snapshot.
pub struct SyncEngine<P, T> {
    config: Arc<ZoneConfig>,
    prober: P,
    transfer: T,
    filter: RecordFilter,
    store: Arc<SnapshotStore>,
}

impl<P, T> SyncEngine<P, T>
where
    P: SerialSource,
    T: ZoneSource,
{
    pub fn new(config: Arc<ZoneConfig>, prober: P, transfer: T, store: Arc<SnapshotStore>) -> Self {
        Self {
            config,
            prober,
            transfer,
            filter: RecordFilter::keep_all(),
            store,
        }
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Runs one cycle. The store is only touched after a complete,
    /// normalized transfer; every failure leaves it as it was.
    pub async fn sync_once(&self) -> SyncOutcome {
        let outcome = self.try_sync().await;
        self.store.record_poll(match &outcome {
            SyncOutcome::Unchanged(serial) => PollResult::Unchanged { serial: *serial },
            SyncOutcome::Updated(snapshot) => PollResult::Updated {
                serial: snapshot.version,
                records: snapshot.records.len(),
            },
            SyncOutcome::Failed(err) => PollResult::failed(err),
        });
        outcome
    }

    async fn try_sync(&self) -> SyncOutcome {
        debug!(zone = %self.config.domain, server = %self.config.server_label(), "probing SOA serial");
        let serial = match self.prober.fetch_serial().await {
            Ok(serial) => serial,
            Err(err) => return SyncOutcome::Failed(err),
        };

        let current = self.store.get();
        if current.is_synced() {
            if current.version == serial {
                return SyncOutcome::Unchanged(serial);
            }
            // a lower serial (zone recreated) still counts as a change
            info!(
                zone = %self.config.domain,
                old = current.version,
                new = serial,
                "SOA serial changed"
            );
        }

        debug!(zone = %self.config.domain, server = %self.config.server_label(), serial, "starting zone transfer");
        let zone = match self.transfer.transfer().await {
            Ok(zone) => zone,
            Err(err) => return SyncOutcome::Failed(err),
        };
        let records = match normalize(&zone, &self.filter) {
            Ok(records) => records,
            Err(err) => return SyncOutcome::Failed(err),
        };

        let snapshot = Arc::new(Snapshot::new(serial, records, Utc::now()));
        self.store.set(snapshot.clone());
        SyncOutcome::Updated(snapshot)
    }
}
