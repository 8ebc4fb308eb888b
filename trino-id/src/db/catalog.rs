//! Species catalog lookups
//!
//! Read-only view over the `species` table. Row identifiers double as
//! classifier output indices; `count` supports the startup check that the
//! catalog width matches the model output width.

use crate::error::Error;
use crate::pipeline::classify::Classifier;
use sqlx::SqlitePool;
use trino_common::db::models::Species;

#[derive(Clone)]
pub struct SpeciesCatalog {
    pool: SqlitePool,
}

impl SpeciesCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a species by its catalog identifier (= classifier index).
    pub async fn lookup(&self, species_id: i64) -> Result<Option<Species>, sqlx::Error> {
        sqlx::query_as::<_, Species>(
            "SELECT species_id, scientific_name, common_name, image_url \
             FROM species WHERE species_id = ?",
        )
        .bind(species_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Number of catalog entries.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM species")
            .fetch_one(&self.pool)
            .await
    }
}

/// Startup guard: classifier output index i is resolved as catalog row
/// `species_id` i, so the catalog row count must equal the model's output
/// width. A mismatch means the checkpoint and the catalog are out of sync
/// and every prediction would be mislabeled.
pub async fn validate_catalog_width(
    catalog: &SpeciesCatalog,
    classifier: &dyn Classifier,
) -> crate::error::Result<()> {
    let species_count = catalog.count().await?;
    if species_count != classifier.output_width() as i64 {
        return Err(Error::Config(format!(
            "species catalog has {} entries but the model produces {} classes; \
             refusing to start with a mismatched catalog",
            species_count,
            classifier.output_width()
        )));
    }
    Ok(())
}
