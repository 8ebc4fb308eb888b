//! HTTP request handlers

use crate::api::server::AppContext;
use crate::db::history::SubmissionMetadata;
use crate::error::PipelineError;
use crate::pipeline::resolve::SpeciesPrediction;
use crate::pipeline::{RawSubmission, DEFAULT_TOP_N};
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "trino-id".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Error payload returned for any pipeline stage failure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub stage: String,
}

/// Successful inference response
#[derive(Debug, Serialize)]
pub struct InferenceResponse {
    pub duration_seconds: f64,
    pub elapsed_inference_seconds: f64,
    /// Scientific name of the primary (highest-probability) prediction
    pub predicted_species: String,
    /// Probability of the primary prediction
    pub confidence: f32,
    pub predictions: Vec<SpeciesPrediction>,
}

/// Fields collected from the multipart form
struct SubmissionForm {
    bytes: Vec<u8>,
    declared_type: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location: Option<String>,
    user_id: Option<i64>,
    top_n: usize,
}

/// POST /v1/inference/submit
///
/// Multipart form: a `file` part plus optional `latitude`, `longitude`,
/// `location`, `user_id`, and `top_n` fields. Runs the pipeline and, on
/// success, records history in a detached task so persistence faults
/// never overturn the response.
pub async fn submit_inference(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> Result<Json<InferenceResponse>, (StatusCode, Json<ErrorResponse>)> {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return Err(reject(&ctx, e, None).await),
    };

    let submission = RawSubmission {
        bytes: form.bytes,
        declared_type: form.declared_type.clone(),
        user_id: form.user_id,
        top_n: form.top_n,
    };

    let outcome = match ctx.pipeline.run(submission).await {
        Ok(outcome) => outcome,
        Err(e) => return Err(reject(&ctx, e, form.user_id).await),
    };

    let primary = outcome.predictions.first();
    let predicted_species = primary
        .map(|p| p.scientific_name.clone())
        .unwrap_or_default();
    let confidence = primary.map(|p| p.probability).unwrap_or(0.0);

    info!(
        predicted_species,
        confidence,
        duration_seconds = outcome.duration_seconds,
        "Inference complete"
    );

    ctx.history.record_detached(
        form.user_id,
        outcome.predictions.clone(),
        outcome.elapsed_inference_seconds,
        SubmissionMetadata {
            origin: "api_upload".to_string(),
            format: form.declared_type,
            latitude: form.latitude,
            longitude: form.longitude,
            location: form.location,
        },
    );

    Ok(Json(InferenceResponse {
        duration_seconds: outcome.duration_seconds,
        elapsed_inference_seconds: outcome.elapsed_inference_seconds,
        predicted_species,
        confidence,
        predictions: outcome.predictions,
    }))
}

/// Report the failure to the error sink and map it to a caller response.
async fn reject(
    ctx: &AppContext,
    error: PipelineError,
    user_id: Option<i64>,
) -> (StatusCode, Json<ErrorResponse>) {
    warn!(stage = error.stage_tag(), error = %error, "Pipeline stage failed");
    ctx.error_sink
        .report(&error.to_string(), error.stage_tag(), user_id)
        .await;
    (
        error.status_code(),
        Json(ErrorResponse {
            error: error.caller_message().to_string(),
            stage: error.stage_tag().to_string(),
        }),
    )
}

/// Collect the multipart fields. Read failures at this level belong to
/// the `read_error` stage.
async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, PipelineError> {
    let mut bytes = None;
    let mut declared_type = None;
    let mut latitude = None;
    let mut longitude = None;
    let mut location = None;
    let mut user_id = None;
    let mut top_n = DEFAULT_TOP_N;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::Read(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                declared_type = field.content_type().map(str::to_string);
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| PipelineError::Read(e.to_string()))?
                        .to_vec(),
                );
            }
            "latitude" => {
                let text = field.text().await.map_err(|e| PipelineError::Read(e.to_string()))?;
                latitude = text.parse().ok();
            }
            "longitude" => {
                let text = field.text().await.map_err(|e| PipelineError::Read(e.to_string()))?;
                longitude = text.parse().ok();
            }
            "location" => {
                let text = field.text().await.map_err(|e| PipelineError::Read(e.to_string()))?;
                if !text.is_empty() {
                    location = Some(text);
                }
            }
            "user_id" => {
                let text = field.text().await.map_err(|e| PipelineError::Read(e.to_string()))?;
                user_id = text.parse().ok();
            }
            "top_n" => {
                let text = field.text().await.map_err(|e| PipelineError::Read(e.to_string()))?;
                if let Ok(n) = text.parse::<usize>() {
                    top_n = n;
                }
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| PipelineError::Read("missing file field".to_string()))?;
    let declared_type =
        declared_type.ok_or_else(|| PipelineError::Read("file field has no content type".to_string()))?;

    Ok(SubmissionForm {
        bytes,
        declared_type,
        latitude,
        longitude,
        location,
        user_id,
        top_n,
    })
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Option<i64>,
    pub limit: Option<i64>,
}

/// One history entry, with the ranked list decoded from its JSON column
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub log_id: i64,
    pub predicted_species: String,
    pub confidence: f64,
    pub ranked_results: serde_json::Value,
    pub elapsed_seconds: f64,
    pub created_at: String,
}

/// GET /v1/inference/history
pub async fn list_history(
    State(ctx): State<AppContext>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let records = ctx
        .history
        .recent(query.user_id, limit)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to load inference history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Could not load inference history.".to_string(),
                    stage: "history".to_string(),
                }),
            )
        })?;

    let entries = records
        .into_iter()
        .map(|r| HistoryEntry {
            log_id: r.log_id,
            predicted_species: r.predicted_species,
            confidence: r.confidence,
            ranked_results: serde_json::from_str(&r.ranked_results)
                .unwrap_or(serde_json::Value::Null),
            elapsed_seconds: r.elapsed_seconds,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(entries))
}
