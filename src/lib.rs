// Aero Intel - competitive intelligence pipeline for aerospace products

pub mod agents;
pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod tools;     // Data source adapters (market data, news, product specs)
pub mod types;
pub mod utils;
pub mod workflow;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
pub use workflow::WorkflowController;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
