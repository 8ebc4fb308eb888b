//! Top-N resolution of classifier output against the species catalog
//!
//! Selects the N highest-probability indices (ties broken by ascending
//! index, so output is fully deterministic) and maps each to catalog
//! metadata. A missing catalog row degrades to a placeholder name rather
//! than failing the request: the caller still gets the index and its
//! confidence.

use crate::db::SpeciesCatalog;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Placeholder name for indices with no catalog row
pub const UNKNOWN_SPECIES: &str = "desconocido";

/// One ranked candidate species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesPrediction {
    pub species_id: i64,
    pub scientific_name: String,
    pub common_name: String,
    pub probability: f32,
    pub image_url: Option<String>,
}

/// Indices of the `top_n` highest probabilities, descending by
/// probability; equal probabilities keep ascending index order.
pub fn top_n_indices(probabilities: &[f32], top_n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probabilities.len()).collect();
    // Stable sort preserves ascending index order among ties
    indices.sort_by(|&a, &b| {
        probabilities[b]
            .partial_cmp(&probabilities[a])
            .unwrap_or(Ordering::Equal)
    });
    indices.truncate(top_n);
    indices
}

/// Resolve a probability vector into the ranked result list.
pub async fn resolve(
    catalog: &SpeciesCatalog,
    probabilities: &[f32],
    top_n: usize,
) -> Result<Vec<SpeciesPrediction>, PipelineError> {
    let mut results = Vec::with_capacity(top_n.min(probabilities.len()));

    for idx in top_n_indices(probabilities, top_n) {
        let species = catalog
            .lookup(idx as i64)
            .await
            .map_err(|e| PipelineError::Inference(format!("catalog lookup failed: {e}")))?;

        let prediction = match species {
            Some(s) => SpeciesPrediction {
                species_id: s.species_id,
                scientific_name: s.scientific_name,
                common_name: s.common_name.unwrap_or_else(|| UNKNOWN_SPECIES.to_string()),
                probability: probabilities[idx],
                image_url: s.image_url,
            },
            None => SpeciesPrediction {
                species_id: idx as i64,
                scientific_name: UNKNOWN_SPECIES.to_string(),
                common_name: UNKNOWN_SPECIES.to_string(),
                probability: probabilities[idx],
                image_url: None,
            },
        };
        results.push(prediction);
    }

    Ok(results)
}
