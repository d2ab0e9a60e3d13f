//! Talking to the zone's primary server.

pub mod resolve;
pub mod soa;
pub mod transfer;
pub mod tsig;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use domain::tsig::Key;

use crate::{
    config::{SyncConfig, ZoneConfig},
    error::SyncError,
    sync::{SerialSource, ZoneSource},
};
use types::{RawZone, SoaSerial};

/// SOA prober and transfer client for one zone, sharing its config and
/// signing key.
#[derive(Clone)]
pub struct DnsClient {
    config: Arc<ZoneConfig>,
    key: Arc<Key>,
    query_timeout: Duration,
    transfer_timeout: Duration,
}

impl DnsClient {
    pub fn new(config: Arc<ZoneConfig>, sync: &SyncConfig) -> Result<Self, SyncError> {
        let key = tsig::signing_key(&config)?;
        Ok(Self {
            config,
            key,
            query_timeout: sync.query_timeout,
            transfer_timeout: sync.transfer_timeout,
        })
    }
}

#[async_trait]
impl SerialSource for DnsClient {
    async fn fetch_serial(&self) -> Result<SoaSerial, SyncError> {
        soa::fetch_serial(&self.config, self.query_timeout).await
    }
}

#[async_trait]
impl ZoneSource for DnsClient {
    async fn transfer(&self) -> Result<RawZone, SyncError> {
        transfer::perform_transfer(&self.config, self.key.clone(), self.transfer_timeout).await
    }
}
