//! The narrow record-store contract consumed by the image migration job.
//!
//! The job only reads file-backed image rows and rewrites their stored
//! address; row creation and deletion belong to the application.

mod error;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use self::error::{RecordStoreError, RecordStoreResult};

/// The `image_type` of rows whose address points at a stored file.
pub const FILE_IMAGE_TYPE: &str = "file";

/// The identifier of an image row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
  /// Wraps a row identifier.
  #[must_use]
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// The identifier as a string slice.
  #[must_use]
  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ImageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// An image row as the migration job sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
  /// Row identifier.
  pub id:         ImageId,
  /// The stored address of the image.
  pub image_url:  String,
  /// How the address is backed; `file` for stored files.
  pub image_type: String,
  /// The owning product, if any.
  pub product_id: Option<String>,
  /// Creation time; the job processes rows in this order.
  pub created_at: DateTime<Utc>,
  /// Last update time.
  pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
  /// A file-backed record created now.
  #[must_use]
  pub fn file(id: impl Into<String>, image_url: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id:         ImageId::new(id),
      image_url:  image_url.into(),
      image_type: FILE_IMAGE_TYPE.to_owned(),
      product_id: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// Whether the row's address points at a stored file.
  #[must_use]
  pub fn is_file_backed(&self) -> bool { self.image_type == FILE_IMAGE_TYPE }
}

/// Read/update access to image rows.
#[async_trait]
pub trait ImageRecordStoreLike: Send + Sync {
  /// All file-backed image rows, ordered by creation time, oldest first.
  async fn file_backed_images(&self) -> RecordStoreResult<Vec<ImageRecord>>;

  /// Rewrites the stored address and update time of one row.
  async fn update_image_address(
    &self,
    id: &ImageId,
    image_url: &str,
    updated_at: DateTime<Utc>,
  ) -> RecordStoreResult<()>;
}
