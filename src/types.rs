// Error types shared across the pipeline

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Analysis failed: {0}")]
    AnalysisFailure(String),

    #[error("Report generation failed: {0}")]
    ReportGeneration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message that is safe to hand back to a caller.
    ///
    /// Internal detail (paths, upstream error bodies, keys echoed by an API)
    /// stays in the logs; callers only ever see these fixed phrasings.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AnalysisFailure(_) => {
                "Analysis could not proceed: no data source returned usable data".to_string()
            }
            AppError::ReportGeneration(_) => {
                "Report generation failed; analysis results are still available".to_string()
            }
            AppError::InvalidRequest(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::Io(_) | AppError::Internal(_) => "Internal error".to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.user_message(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
