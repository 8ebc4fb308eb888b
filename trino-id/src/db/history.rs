//! Inference history recorder
//!
//! Persists a completed run as two related append-only records: the
//! inference row (primary prediction, full ranked list, timing) and the
//! linked audio metadata row (source format, geolocation). Invoked after
//! the response is already computed, so failures here are logged and never
//! overturn the result.

use crate::pipeline::resolve::SpeciesPrediction;
use sqlx::SqlitePool;
use tracing::warn;
use trino_common::db::models::InferenceRecord;

/// Submission metadata captured alongside an inference run
#[derive(Debug, Clone)]
pub struct SubmissionMetadata {
    pub origin: String,
    pub format: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
}

#[derive(Clone)]
pub struct HistoryRecorder {
    pool: SqlitePool,
}

impl HistoryRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one completed run. Returns the new inference row id.
    pub async fn record(
        &self,
        user_id: Option<i64>,
        predictions: &[SpeciesPrediction],
        elapsed_seconds: f64,
        metadata: &SubmissionMetadata,
    ) -> Result<i64, sqlx::Error> {
        let primary = predictions.first();
        let predicted_species = primary
            .map(|p| p.scientific_name.as_str())
            .unwrap_or_default();
        let confidence = primary.map(|p| f64::from(p.probability)).unwrap_or(0.0);
        let ranked_json =
            serde_json::to_string(predictions).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            "INSERT INTO inference_log \
             (user_id, predicted_species, confidence, ranked_results, elapsed_seconds) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(predicted_species)
        .bind(confidence)
        .bind(&ranked_json)
        .bind(elapsed_seconds)
        .execute(&self.pool)
        .await?;

        let log_id = result.last_insert_rowid();

        sqlx::query(
            "INSERT INTO audio_metadata \
             (origin, format, latitude, longitude, location, user_id, inference_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&metadata.origin)
        .bind(&metadata.format)
        .bind(metadata.latitude)
        .bind(metadata.longitude)
        .bind(&metadata.location)
        .bind(user_id)
        .bind(log_id)
        .execute(&self.pool)
        .await?;

        Ok(log_id)
    }

    /// Fire-and-forget variant: spawn the insert and log on failure.
    pub fn record_detached(
        &self,
        user_id: Option<i64>,
        predictions: Vec<SpeciesPrediction>,
        elapsed_seconds: f64,
        metadata: SubmissionMetadata,
    ) {
        let recorder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder
                .record(user_id, &predictions, elapsed_seconds, &metadata)
                .await
            {
                warn!(error = %e, "Failed to persist inference history");
            }
        });
    }

    /// Recent inference records, newest first, optionally scoped to a user.
    pub async fn recent(
        &self,
        user_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<InferenceRecord>, sqlx::Error> {
        match user_id {
            Some(uid) => {
                sqlx::query_as(
                    "SELECT log_id, user_id, predicted_species, confidence, ranked_results, \
                            elapsed_seconds, created_at \
                     FROM inference_log WHERE user_id = ? \
                     ORDER BY created_at DESC, log_id DESC LIMIT ?",
                )
                .bind(uid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT log_id, user_id, predicted_species, confidence, ranked_results, \
                            elapsed_seconds, created_at \
                     FROM inference_log ORDER BY created_at DESC, log_id DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
    }
}
