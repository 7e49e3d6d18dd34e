//! Environment variable names and snapshots used to select and configure
//! storage providers.

use std::collections::HashMap;

/// Provider selection override.
pub const STORAGE_PROVIDER: &str = "STORAGE_PROVIDER";
/// GCS bucket name; its presence selects GCS.
pub const GCS_BUCKET_NAME: &str = "GCS_BUCKET_NAME";
/// GCS project id.
pub const GCS_PROJECT_ID: &str = "GCS_PROJECT_ID";
/// Path to the GCS credentials file.
pub const GOOGLE_APPLICATION_CREDENTIALS: &str =
  "GOOGLE_APPLICATION_CREDENTIALS";
/// GCS logical folder.
pub const GCS_FOLDER: &str = "GCS_FOLDER";
/// S3 bucket name; its presence selects S3.
pub const AWS_S3_BUCKET: &str = "AWS_S3_BUCKET";
/// S3 region.
pub const AWS_REGION: &str = "AWS_REGION";
/// S3 access key id.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// S3 secret access key.
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// S3 logical folder.
pub const AWS_S3_FOLDER: &str = "AWS_S3_FOLDER";
/// Custom endpoint for S3-compatible stores.
pub const AWS_S3_ENDPOINT: &str = "AWS_S3_ENDPOINT";
/// Local storage root directory.
pub const LOCAL_STORAGE_PATH: &str = "LOCAL_STORAGE_PATH";
/// Local logical folder.
pub const LOCAL_STORAGE_FOLDER: &str = "LOCAL_STORAGE_FOLDER";
/// Base URL the local root is served under.
pub const LOCAL_BASE_URL: &str = "LOCAL_BASE_URL";
/// Optional upload size cap in bytes.
pub const STORAGE_MAX_UPLOAD_BYTES: &str = "STORAGE_MAX_UPLOAD_BYTES";
/// Optional comma-separated content-type allow-list.
pub const STORAGE_ALLOWED_CONTENT_TYPES: &str = "STORAGE_ALLOWED_CONTENT_TYPES";

/// Every key the factory reads, with a short description, for help output.
pub const RECOGNISED_KEYS: &[(&str, &str)] = &[
  (STORAGE_PROVIDER, "force a provider: local, gcs or s3"),
  (GCS_BUCKET_NAME, "GCS bucket (selects GCS)"),
  (GCS_PROJECT_ID, "GCS project id"),
  (GOOGLE_APPLICATION_CREDENTIALS, "GCS credentials file"),
  (GCS_FOLDER, "GCS folder (default: product-images)"),
  (AWS_S3_BUCKET, "S3 bucket (selects S3)"),
  (AWS_REGION, "S3 region (default: us-east-1)"),
  (AWS_ACCESS_KEY_ID, "S3 access key id"),
  (AWS_SECRET_ACCESS_KEY, "S3 secret access key"),
  (AWS_S3_FOLDER, "S3 folder (default: product-images)"),
  (AWS_S3_ENDPOINT, "custom endpoint for S3-compatible stores"),
  (LOCAL_STORAGE_PATH, "local root directory (default: ./uploads)"),
  (LOCAL_STORAGE_FOLDER, "local folder (default: images)"),
  (
    LOCAL_BASE_URL,
    "base URL of the local root (default: http://localhost:5001/uploads)",
  ),
  (STORAGE_MAX_UPLOAD_BYTES, "maximum upload size in bytes"),
  (STORAGE_ALLOWED_CONTENT_TYPES, "comma-separated allowed content types"),
];

/// An immutable snapshot of configuration variables.
///
/// Captured once at process start and handed to the factory; providers never
/// read the process environment themselves. Empty values count as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
  vars: HashMap<String, String>,
}

impl EnvSnapshot {
  /// Captures the current process environment.
  #[must_use]
  pub fn from_process() -> Self { Self::from_pairs(std::env::vars()) }

  /// Builds a snapshot from explicit pairs.
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let vars = pairs
      .into_iter()
      .map(|(k, v)| (k.into(), v.into().trim().to_owned()))
      .filter(|(_, v)| !v.is_empty())
      .collect();
    Self { vars }
  }

  /// The value of `key`, if set and non-empty.
  #[must_use]
  pub fn get(&self, key: &str) -> Option<&str> {
    self.vars.get(key).map(String::as_str)
  }

  /// The value of `key`, or `default` when unset.
  #[must_use]
  pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
    self.get(key).unwrap_or(default)
  }

  /// Whether `key` is set and non-empty.
  #[must_use]
  pub fn contains(&self, key: &str) -> bool { self.vars.contains_key(key) }
}
