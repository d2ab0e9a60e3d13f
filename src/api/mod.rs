pub mod events;
pub mod records;

use axum::{Extension, Router, routing::get};
use crate::SharedState;

pub fn create_router(state: SharedState) -> Router {
    use crate::api::{events, records};

    Router::new()
        // pull
        .route("/api/records", get(records::list_records))
        .route("/api/records/{name}", get(records::records_for_name))
        .route("/api/status", get(records::status))
        // push
        .route("/api/events", get(events::stream))
        .layer(Extension(state))
}
