//! API layer - HTTP endpoint handlers organized by domain.

mod handlers;
mod health;
mod metrics;
mod models;
mod routes;

// Re-export all handlers for use in server/app.rs
pub use handlers::{
    create_invitation, list_audit_records, purge_event, resolve_join, set_invitation_active,
};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use models::{
    AuditListResponse, AuditRecordView, CreateInvitationRequest, CreateInvitationResponse,
    InvitationView, JoinResponse, PurgeEventResponse, SetInvitationActiveRequest,
};
pub use routes::api_routes;
