//! The current zone snapshot, swapped atomically as a whole.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    dns::types::SoaSerial,
    error::{SyncError, SyncErrorKind},
    normalize::DnsRecord,
};

/// Immutable point-in-time capture of the zone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub version: SoaSerial,
    pub records: Vec<DnsRecord>,
    /// `None` until the first successful transfer.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(version: SoaSerial, records: Vec<DnsRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            version,
            records,
            fetched_at: Some(fetched_at),
        }
    }

    /// Whether this came from a transfer. Serial 0 is a valid serial, so
    /// the version alone cannot tell.
    pub fn is_synced(&self) -> bool {
        self.fetched_at.is_some()
    }
}

/// Result of the most recent poll, for the status endpoint.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PollStatus {
    pub polled_at: Option<DateTime<Utc>>,
    pub outcome: Option<PollResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PollResult {
    Unchanged { serial: SoaSerial },
    Updated { serial: SoaSerial, records: usize },
    Failed { kind: SyncErrorKind, error: String },
}

impl PollResult {
    pub fn failed(err: &SyncError) -> Self {
        PollResult::Failed {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

/// Holds exactly one current [`Snapshot`]. Readers never block and always
/// see a complete snapshot.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    status: ArcSwap<PollStatus>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn set(&self, snapshot: Arc<Snapshot>) {
        self.current.store(snapshot);
    }

    pub fn status(&self) -> Arc<PollStatus> {
        self.status.load_full()
    }

    pub fn record_poll(&self, outcome: PollResult) {
        self.status.store(Arc::new(PollStatus {
            polled_at: Some(Utc::now()),
            outcome: Some(outcome),
        }));
    }
}
