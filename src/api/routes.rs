use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::handlers::{
    create_invitation, list_audit_records, purge_event, resolve_join, set_invitation_active,
};
use super::health::health;
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Operator surface, guarded by the API key
    let operator_routes = Router::new()
        .route("/events/{event_id}/invitations", post(create_invitation))
        .route(
            "/events/{event_id}/invitations/{invitation_id}",
            patch(set_invitation_active),
        )
        .route("/events/{event_id}/audit", get(list_audit_records))
        .route("/events/{event_id}", delete(purge_event))
        .layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Public join resolution
        .route("/join/{token}", get(resolve_join))
        // Operator endpoints
        .nest("/api/v1", operator_routes)
}
