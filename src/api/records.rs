// src/api/records.rs
use std::sync::Arc;

use axum::{Extension, Json, extract::{Path, Query}};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SharedState;
use crate::dns::types::{SoaSerial, fqdn};
use crate::error::AppError;
use crate::store::{PollStatus, Snapshot};

#[derive(Deserialize)]
pub struct RecordQuery {
    #[serde(rename = "type")]
    pub record_type: Option<String>,
}

// GET /api/records
pub async fn list_records(
    Extension(state): Extension<SharedState>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<Arc<Snapshot>>, AppError> {
    let snapshot = state.store.get();
    let Some(wanted) = query.record_type else {
        return Ok(Json(snapshot));
    };

    let wanted = parse_type(&wanted)?;
    let records = snapshot
        .records
        .iter()
        .filter(|r| r.record_type == wanted)
        .cloned()
        .collect();
    Ok(Json(Arc::new(Snapshot {
        version: snapshot.version,
        records,
        fetched_at: snapshot.fetched_at,
    })))
}

// GET /api/records/{name}
pub async fn records_for_name(
    Extension(state): Extension<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<Snapshot>, AppError> {
    let snapshot = state.store.get();
    let name = fqdn(&name);
    let records: Vec<_> = snapshot
        .records
        .iter()
        .filter(|r| r.name == name)
        .cloned()
        .collect();
    if records.is_empty() {
        return Err(AppError::NotFound);
    }

    Ok(Json(Snapshot {
        version: snapshot.version,
        records,
        fetched_at: snapshot.fetched_at,
    }))
}

fn parse_type(raw: &str) -> Result<String, AppError> {
    let t = raw.trim().to_ascii_uppercase();
    if t.is_empty() || t.len() > 16 || !t.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::bad_request(format!("invalid record type '{raw}'")));
    }
    Ok(t)
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub zone: String,
    pub server: String,
    pub synced: bool,
    pub serial: SoaSerial,
    pub record_count: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_poll: Arc<PollStatus>,
    pub subscribers: usize,
}

// GET /api/status
pub async fn status(Extension(state): Extension<SharedState>) -> Json<StatusResponse> {
    let snapshot = state.store.get();
    Json(StatusResponse {
        zone: state.config.domain.clone(),
        server: state.config.server_label(),
        synced: snapshot.is_synced(),
        serial: snapshot.version,
        record_count: snapshot.records.len(),
        fetched_at: snapshot.fetched_at,
        last_poll: state.store.status(),
        subscribers: state.updates.subscriber_count(),
    })
}
