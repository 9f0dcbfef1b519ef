//! Report listing and download
//!
//! Reports are the PDFs the writer leaves in the configured output
//! directory. Only bare `.pdf` file names are ever served.

use std::path::Path;
use std::time::SystemTime;

use axum::{
    extract::{Path as UrlPath, State},
    http::header,
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::models::{AppState, ReportEntry, ReportsResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reports", get(list_reports))
        .route("/download/{filename}", get(download_report))
        .with_state(state)
}

pub async fn list_reports(State(state): State<AppState>) -> AppResult<ResponseJson<ReportsResponse>> {
    let reports = read_reports(&state.config.report.output_dir).await?;
    Ok(Json(ReportsResponse { reports }))
}

pub async fn download_report(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> AppResult<Response> {
    if !is_safe_report_name(&filename) {
        warn!(filename = %filename, "Rejected report download name");
        return Err(AppError::InvalidRequest("Invalid report name".to_string()));
    }

    let path = state.config.report.output_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound("Report not found".to_string()));
        }
        Err(e) => return Err(AppError::Io(e)),
    };

    info!(filename = %filename, size = bytes.len(), "Serving report");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// A plain `.pdf` file name with no path components.
fn is_safe_report_name(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
        && filename.to_ascii_lowercase().ends_with(".pdf")
}

/// PDFs in `dir`, newest first. A missing directory is an empty list.
async fn read_reports(dir: &Path) -> AppResult<Vec<ReportEntry>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut found: Vec<(SystemTime, ReportEntry)> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !filename.ends_with(".pdf") {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = metadata.created().unwrap_or(modified);
        found.push((
            created,
            ReportEntry {
                filename,
                size: metadata.len(),
                created: DateTime::<Utc>::from(created).to_rfc3339(),
                modified: DateTime::<Utc>::from(modified).to_rfc3339(),
            },
        ));
    }

    found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.filename.cmp(&a.1.filename)));
    Ok(found.into_iter().map(|(_, entry)| entry).collect())
}
