//! Server-sent event stream of snapshots for connected browsers.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{
    Stream, StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::{debug, warn};

use crate::SharedState;
use crate::store::Snapshot;

/// Name of the event carrying a snapshot, as the page script expects it.
pub const RECORDS_EVENT: &str = "dns_records";

// GET /api/events
pub async fn stream(
    Extension(state): Extension<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // subscribe first so nothing installed after the initial read is lost
    let updates = BroadcastStream::new(state.updates.subscribe());
    let initial = state.store.get();
    debug!(serial = initial.version, "event subscriber connected");

    let snapshots = tokio_stream::once(initial).chain(updates.filter_map(|msg| match msg {
        Ok(snapshot) => Some(snapshot),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(skipped, "event subscriber lagged");
            None
        }
    }));

    Sse::new(snapshots.map(|snapshot| Ok(snapshot_event(&snapshot))))
        .keep_alive(KeepAlive::default())
}

pub fn snapshot_event(snapshot: &Arc<Snapshot>) -> Event {
    match Event::default().event(RECORDS_EVENT).json_data(snapshot.as_ref()) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, "failed to encode snapshot event");
            Event::default().event("error").data("encoding failed")
        }
    }
}
