use axum::{extract::State, response::Json as ResponseJson, routing::post, Json, Router};
use tracing::info;

use crate::models::{AnalysisRequest, AnalyzeRequest, AnalyzeResponse, AppState};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .with_state(state)
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeRequest>,
) -> AppResult<ResponseJson<AnalyzeResponse>> {
    let request = AnalysisRequest::new(body.honeywell_product, body.competitor_query)?;
    info!(
        product = %request.honeywell_product,
        competitor = %request.competitor_query,
        "Received analysis request"
    );

    let result = state.workflow.run(request).await;
    info!(
        run_id = %result.run_id,
        complete = result.complete,
        "Analysis request finished"
    );

    Ok(Json(AnalyzeResponse::from(result)))
}
