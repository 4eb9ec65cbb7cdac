//! recon-id library - contact identity reconciliation service
//!
//! Links contact records that share an email or phone number into identity
//! groups, each with exactly one Primary record.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod store;

use identity::IdentityService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
}

impl AppState {
    /// Create new application state
    pub fn new(identity: IdentityService) -> Self {
        Self { identity }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/identify", post(api::identify))
        .route("/getall", get(api::list_contacts))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
