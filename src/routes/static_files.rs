//! Static File Serving
//!
//! Serves the dashboard front-end from the configured static directory.
//! When no `index.html` is present a built-in page listing the API is
//! returned instead.

use std::path::{Path, PathBuf};

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Create router for serving static files
pub fn router(static_dir: &Path) -> Router {
    if static_dir.is_dir() {
        info!(path = %static_dir.display(), "Serving static files");
    } else {
        warn!(path = %static_dir.display(), "Static files directory not found, serving built-in index");
    }

    let index = static_dir.join("index.html");
    let serve_dir = ServeDir::new(static_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(move || serve_index(index.clone())))
        .fallback_service(serve_dir)
}

async fn serve_index(index: PathBuf) -> Response {
    let body = match tokio::fs::read_to_string(&index).await {
        Ok(content) => content,
        Err(_) => FALLBACK_INDEX.to_string(),
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
        .into_response()
}

const FALLBACK_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Aero Intel - Competitive Analysis</title>
    <style>
        body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 0 auto; padding: 40px 20px; }
        h1 { color: #c8102e; }
        code { background: #f2f2f2; padding: 2px 6px; border-radius: 4px; }
        pre { background: #f2f2f2; padding: 15px; border-radius: 6px; overflow-x: auto; }
    </style>
</head>
<body>
    <h1>Aero Intel</h1>
    <p>Competitive analysis API for Honeywell Aerospace products.</p>
    <ul>
        <li><code>POST /analyze</code> - Run a competitive analysis</li>
        <li><code>GET /reports</code> - List generated reports</li>
        <li><code>GET /download/{filename}</code> - Download a report</li>
        <li><code>GET /status</code> - Service status</li>
        <li><code>GET /api/health</code> - Enabled data sources</li>
    </ul>
    <pre>curl -X POST http://localhost:3000/analyze \
  -H "Content-Type: application/json" \
  -d '{"honeywell_product": "TFE731 Engine", "competitor_query": "compare with Pratt &amp; Whitney PW500"}'</pre>
</body>
</html>"#;
