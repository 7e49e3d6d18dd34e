use std::path::PathBuf;

use storage_core::UploadPolicy;

/// Default root directory for local storage.
pub const DEFAULT_BASE_PATH: &str = "./uploads";
/// Default logical folder for local storage.
pub const DEFAULT_FOLDER: &str = "images";
/// Default base URL under which the root directory is served.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/uploads";

/// Configuration of the local filesystem provider.
#[derive(Debug, Clone)]
pub struct LocalConfig {
  /// Root directory of the object tree.
  pub base_path: PathBuf,
  /// Logical folder under the root for new objects.
  pub folder:    String,
  /// URL under which the root directory is served.
  pub base_url:  String,
  /// Input policy for uploads.
  pub policy:    UploadPolicy,
}

impl Default for LocalConfig {
  fn default() -> Self {
    Self {
      base_path: PathBuf::from(DEFAULT_BASE_PATH),
      folder:    DEFAULT_FOLDER.to_owned(),
      base_url:  DEFAULT_BASE_URL.to_owned(),
      policy:    UploadPolicy::default(),
    }
  }
}

impl LocalConfig {
  /// A configuration rooted at `base_path` with default folder and URL.
  #[must_use]
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
      ..Self::default()
    }
  }

  /// The base URL without a trailing slash.
  #[must_use]
  pub fn trimmed_base_url(&self) -> &str { self.base_url.trim_end_matches('/') }

  /// The path component of the base URL (e.g. `/uploads`), if it has one.
  #[must_use]
  pub fn server_path(&self) -> Option<&str> {
    let base = self.trimmed_base_url();
    let path = match base.split_once("://") {
      Some((_, rest)) => rest.find('/').map(|i| &rest[i..])?,
      None => base,
    };
    (path.starts_with('/') && path.len() > 1).then_some(path)
  }
}
