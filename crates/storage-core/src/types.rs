use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage_types::BlobKey;

/// Default cap on enumeration results when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Metadata key recording the caller's original file name.
pub const META_ORIGINAL_NAME: &str = "original-name";
/// Metadata key recording the attribution tag.
pub const META_UPLOADED_BY: &str = "uploaded-by";
/// Metadata key recording the upload time (RFC 3339).
pub const META_UPLOADED_AT: &str = "uploaded-at";

/// Options for storing an object.
#[derive(Debug, Clone)]
pub struct StoreOptions {
  /// Prefix prepended to the generated object name.
  pub prefix:                Option<String>,
  /// Who or what uploaded the object.
  pub uploaded_by:           Option<String>,
  /// Free-form metadata stored alongside the object.
  pub metadata:              HashMap<String, String>,
  /// Whether the returned address is the public URL.
  pub public:                bool,
  /// Overrides the provider's content-type allow-list for this call.
  pub allowed_content_types: Option<Vec<String>>,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      prefix:                None,
      uploaded_by:           None,
      metadata:              HashMap::new(),
      public:                true,
      allowed_content_types: None,
    }
  }
}

impl StoreOptions {
  /// Sets the name prefix.
  #[must_use]
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.prefix = Some(prefix.into());
    self
  }

  /// Sets the attribution tag.
  #[must_use]
  pub fn with_uploaded_by(mut self, uploaded_by: impl Into<String>) -> Self {
    self.uploaded_by = Some(uploaded_by.into());
    self
  }

  /// Adds a metadata entry.
  #[must_use]
  pub fn with_metadata(
    mut self,
    key: impl Into<String>,
    value: impl Into<String>,
  ) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }

  /// Marks the object as private; the returned address uses the scheme form.
  #[must_use]
  pub const fn private(mut self) -> Self {
    self.public = false;
    self
  }
}

/// The outcome of a successful store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
  /// Always `true` for a returned result; failures are errors.
  pub success:      bool,
  /// The address to persist downstream.
  pub address:      String,
  /// The generated object name.
  pub name:         String,
  /// The backend-native key.
  pub key:          BlobKey,
  /// Size in bytes.
  pub size:         u64,
  /// The normalized content type.
  pub content_type: String,
  /// Echo of the caller-supplied metadata.
  pub metadata:     HashMap<String, String>,
}

/// A snapshot of one stored object's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
  /// The object's address in the provider's canonical public form.
  pub address:      String,
  /// The backend-native key.
  pub key:          BlobKey,
  /// Size in bytes.
  pub size:         u64,
  /// Content type, when known.
  pub content_type: Option<String>,
  /// Creation time, when known.
  pub created_at:   Option<DateTime<Utc>>,
  /// Last update time, when known.
  pub updated_at:   Option<DateTime<Utc>>,
  /// Entity tag, when the backend provides one.
  pub etag:         Option<String>,
  /// Custom metadata.
  pub metadata:     HashMap<String, String>,
}

/// Options for enumerating objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
  /// Maximum number of objects to return.
  pub limit: Option<usize>,
}

impl ListOptions {
  /// A listing capped at `limit` objects.
  #[must_use]
  pub const fn limit(limit: usize) -> Self { Self { limit: Some(limit) } }

  /// A listing without a cap. Only for full scans.
  #[must_use]
  pub const fn unbounded() -> Self { Self { limit: Some(usize::MAX) } }

  /// The limit in effect, falling back to [`DEFAULT_LIST_LIMIT`].
  #[must_use]
  pub fn effective_limit(&self) -> usize {
    self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
  }
}

/// Options for creating the bucket or directory.
#[derive(Debug, Clone, Default)]
pub struct ContainerOptions {
  /// Whether new objects should be publicly readable by default.
  pub public:   bool,
  /// Bucket location or region, where the backend needs one.
  pub location: Option<String>,
}
