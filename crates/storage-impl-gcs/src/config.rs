use std::path::PathBuf;

use storage_core::UploadPolicy;

/// Folder used when none is configured.
pub const DEFAULT_FOLDER: &str = "product-images";

/// Configuration for [`GcsStorage`](crate::GcsStorage).
#[derive(Debug, Clone)]
pub struct GcsConfig {
  /// Bucket name.
  pub bucket:           String,
  /// Project that owns the bucket; needed to create it.
  pub project_id:       Option<String>,
  /// Service account or application credentials file. `None` means ambient
  /// application default credentials.
  pub credentials_path: Option<PathBuf>,
  /// Logical folder new objects are stored under.
  pub folder:           String,
  /// Input policy applied to uploads.
  pub policy:           UploadPolicy,
}

impl GcsConfig {
  /// A configuration for `bucket` with every other field defaulted.
  #[must_use]
  pub fn new(bucket: impl Into<String>) -> Self {
    Self {
      bucket:           bucket.into(),
      project_id:       None,
      credentials_path: None,
      folder:           DEFAULT_FOLDER.to_owned(),
      policy:           UploadPolicy::default(),
    }
  }
}
