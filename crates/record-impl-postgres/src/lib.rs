//! Postgres access to image rows for the migration job.

mod store_impl;

use chrono::{DateTime, Utc};
use miette::{Context, IntoDiagnostic, miette};
use record_core::{
  ImageId, ImageRecord, RecordStoreError, RecordStoreResult,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{debug, instrument};

/// The default table holding product images.
pub const DEFAULT_IMAGE_TABLE: &str = "product_images";

/// Postgres-backed image record store.
#[derive(Clone)]
pub struct PostgresImageStore {
  pool:  PgPool,
  table: String,
}

impl std::fmt::Debug for PostgresImageStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PostgresImageStore")
      .field("table", &self.table)
      .finish_non_exhaustive()
  }
}

impl PostgresImageStore {
  /// Connect to the database at `url`, reading images from `table`.
  #[instrument(skip(url))]
  pub async fn new(url: &str, table: &str) -> miette::Result<Self> {
    debug!("Creating PostgresImageStore");
    validate_table_name(table)?;
    Ok(Self {
      pool:  PgPool::connect(url)
        .await
        .into_diagnostic()
        .context("failed to connect to database")?,
      table: table.to_owned(),
    })
  }

  #[instrument(skip(self), fields(table = %self.table))]
  async fn file_backed_images(&self) -> RecordStoreResult<Vec<ImageRecord>> {
    let query = format!(
      "SELECT id::text AS id, image_url, image_type, product_id::text AS \
       product_id, created_at::timestamptz AS created_at, \
       updated_at::timestamptz AS updated_at FROM {table} WHERE image_type = \
       'file' ORDER BY created_at ASC",
      table = self.table
    );

    let rows = sqlx::query(&query)
      .fetch_all(&self.pool)
      .await
      .into_diagnostic()
      .context("failed to read file-backed images")
      .map_err(RecordStoreError::Database)?;

    let records = rows
      .iter()
      .map(row_to_record)
      .collect::<RecordStoreResult<Vec<_>>>()?;
    debug!(count = records.len(), "Read file-backed images");
    Ok(records)
  }

  #[instrument(skip(self), fields(table = %self.table))]
  async fn update_image_address(
    &self,
    id: &ImageId,
    image_url: &str,
    updated_at: DateTime<Utc>,
  ) -> RecordStoreResult<()> {
    let query = format!(
      "UPDATE {table} SET image_url = $1, updated_at = $2 WHERE id::text = $3",
      table = self.table
    );

    let result = sqlx::query(&query)
      .bind(image_url)
      .bind(updated_at)
      .bind(id.as_str())
      .execute(&self.pool)
      .await
      .into_diagnostic()
      .context("failed to update image address")
      .map_err(RecordStoreError::Database)?;

    if result.rows_affected() == 0 {
      return Err(RecordStoreError::NotFound(id.clone()));
    }
    debug!("Updated image address");
    Ok(())
  }
}

fn row_to_record(row: &PgRow) -> RecordStoreResult<ImageRecord> {
  let read = |e: sqlx::Error| {
    RecordStoreError::Database(miette!("failed to decode image row: {e}"))
  };

  let id: String = row.try_get("id").map_err(read)?;
  Ok(ImageRecord {
    id:         ImageId::new(id),
    image_url:  row.try_get("image_url").map_err(read)?,
    image_type: row.try_get("image_type").map_err(read)?,
    product_id: row.try_get("product_id").map_err(read)?,
    created_at: row.try_get("created_at").map_err(read)?,
    updated_at: row.try_get("updated_at").map_err(read)?,
  })
}

/// Table names are interpolated into SQL, so only plain (optionally
/// schema-qualified) identifiers are accepted.
fn validate_table_name(table: &str) -> miette::Result<()> {
  let valid_part = |part: &str| {
    let mut chars = part.chars();
    chars
      .next()
      .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
      && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
  };

  let parts = table.split('.').collect::<Vec<_>>();
  if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
    return Err(miette!("invalid image table name: {table:?}"));
  }
  Ok(())
}
