//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `POST /analyze` - Run one competitive analysis
//! - `GET /reports` - List generated PDF reports
//! - `GET /download/{filename}` - Download a report
//! - `GET /status`, `GET /api/health` - Status checks
//! - `/` - Static file serving (dashboard)

pub mod analyze;
pub mod health;
pub mod reports;
pub mod static_files;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
///
/// API routes take precedence over static files; anything unmatched falls
/// through to the static directory.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let api_router = Router::new()
        .merge(analyze::router(state.clone()))
        .merge(reports::router(state.clone()))
        .merge(health::router(state.clone()));

    let router = Router::new()
        .merge(api_router)
        .merge(static_files::router(&state.config.server.static_dir));

    apply_cors(router, &state.config.server.cors_allowed_origins).layer(TraceLayer::new_for_http())
}
