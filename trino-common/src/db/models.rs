//! Database models

use serde::{Deserialize, Serialize};

/// Row in the species catalog. `species_id` equals the classifier output
/// index for this species.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Species {
    pub species_id: i64,
    pub scientific_name: String,
    pub common_name: Option<String>,
    pub image_url: Option<String>,
}

/// Completed inference run, as persisted
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InferenceRecord {
    pub log_id: i64,
    pub user_id: Option<i64>,
    pub predicted_species: String,
    pub confidence: f64,
    /// Full ranked result list, JSON-encoded
    pub ranked_results: String,
    pub elapsed_seconds: f64,
    pub created_at: String,
}

/// Submission metadata linked to an inference run
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AudioMetadataRecord {
    pub audio_id: i64,
    pub origin: String,
    pub format: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub user_id: Option<i64>,
    pub inference_id: Option<i64>,
    pub created_at: String,
}

/// Entry in the system error log
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SystemErrorRecord {
    pub error_id: i64,
    pub message: String,
    pub stage: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: String,
}
