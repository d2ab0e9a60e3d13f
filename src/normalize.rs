//! Flattens a transferred zone into one record per rdata value.

use std::{collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{dns::types::RawZone, error::SyncError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub name: String, // "www.example.com."
    #[serde(rename = "type")]
    pub record_type: String, // "A", "TXT", ...
    pub data: String, // "10.0.0.1"
    #[serde(rename = "rdataset")]
    pub raw_rdataset: String, // "300 IN A 10.0.0.1"
    pub ttl: u32,
}

/// Decides which normalized records end up in a snapshot.
#[derive(Clone, Default)]
pub struct RecordFilter(Option<Arc<dyn Fn(&DnsRecord) -> bool + Send + Sync>>);

impl RecordFilter {
    pub fn keep_all() -> Self {
        Self(None)
    }

    pub fn new<F>(keep: F) -> Self
    where
        F: Fn(&DnsRecord) -> bool + Send + Sync + 'static,
    {
        Self(Some(Arc::new(keep)))
    }

    /// Keeps only the listed record types. An empty list keeps everything.
    pub fn record_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types: HashSet<String> = types
            .into_iter()
            .map(|t| t.as_ref().trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        if types.is_empty() {
            return Self::keep_all();
        }
        Self::new(move |record| types.contains(&record.record_type))
    }

    pub fn keep(&self, record: &DnsRecord) -> bool {
        self.0.as_ref().is_none_or(|keep| keep(record))
    }
}

impl fmt::Debug for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("RecordFilter(custom)"),
            None => f.write_str("RecordFilter(all)"),
        }
    }
}

/// One [`DnsRecord`] per (name, type, rdata) in transfer order.
///
/// Fails with [`SyncError::MalformedZoneData`] when the zone carries no
/// SOA serial or no records at all.
pub fn normalize(zone: &RawZone, filter: &RecordFilter) -> Result<Vec<DnsRecord>, SyncError> {
    if zone.serial.is_none() {
        return Err(SyncError::malformed(format!(
            "zone {} has no SOA record",
            zone.origin
        )));
    }
    if zone.is_empty() {
        return Err(SyncError::malformed(format!("zone {} is empty", zone.origin)));
    }

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(zone.record_count());
    for node in &zone.nodes {
        for rrset in &node.rrsets {
            let raw = rrset.to_text();
            for rdata in &rrset.rdatas {
                if !seen.insert((&node.name, &rrset.rtype, rdata)) {
                    continue;
                }
                let record = DnsRecord {
                    name: node.name.clone(),
                    record_type: rrset.rtype.clone(),
                    data: rdata.clone(),
                    raw_rdataset: raw.clone(),
                    ttl: rrset.ttl,
                };
                if filter.keep(&record) {
                    debug!(name = %record.name, rtype = %record.record_type, data = %record.data, "found record");
                    records.push(record);
                }
            }
        }
    }
    Ok(records)
}
