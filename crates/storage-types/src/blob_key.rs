use std::fmt;

use serde::{Deserialize, Serialize};

/// The backend-native key of a stored object.
///
/// For cloud backends this is the object key inside the bucket; for the local
/// backend it is the path relative to the storage root. Keys never start with
/// a separator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
  /// Create a new blob key, trimming any leading separators.
  pub fn new(key: impl Into<String>) -> Self {
    let key = key.into();
    if key.starts_with('/') {
      Self(key.trim_start_matches('/').to_owned())
    } else {
      Self(key)
    }
  }
  /// Join a folder and a file name into a key.
  #[must_use]
  pub fn join(folder: &str, name: &str) -> Self {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
      Self::new(name)
    } else {
      Self::new(format!("{folder}/{}", name.trim_start_matches('/')))
    }
  }
  /// Get the key as a string slice
  #[must_use]
  pub fn as_str(&self) -> &str { &self.0 }
  /// Convert into inner String
  #[must_use]
  pub fn into_inner(self) -> String { self.0 }
  /// The final path segment of the key.
  #[must_use]
  pub fn file_name(&self) -> &str {
    self.0.rsplit('/').next().unwrap_or(&self.0)
  }
  /// The extension of the final segment, including the leading dot.
  #[must_use]
  pub fn extension(&self) -> Option<&str> {
    let name = self.file_name();
    name.rfind('.').filter(|i| *i > 0).map(|i| &name[i..])
  }
}

impl fmt::Display for BlobKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for BlobKey {
  fn from(s: String) -> Self { Self::new(s) }
}

impl From<&str> for BlobKey {
  fn from(s: &str) -> Self { Self::new(s) }
}

impl AsRef<str> for BlobKey {
  fn as_ref(&self) -> &str { &self.0 }
}
