use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ProviderCapabilities;

/// The closed set of storage backends.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  /// Local filesystem directory tree.
  Local,
  /// Google Cloud Storage.
  Gcs,
  /// Amazon S3 or an S3-compatible store.
  S3,
}

/// Public host prefix of Google Cloud Storage object URLs.
pub(crate) const GCS_PUBLIC_HOSTS: &[&str] = &[
  "https://storage.googleapis.com/",
  "https://storage.cloud.google.com/",
];

impl ProviderKind {
  /// The lowercase identifier used in configuration.
  #[must_use]
  pub const fn as_str(self) -> &'static str {
    match self {
      ProviderKind::Local => "local",
      ProviderKind::Gcs => "gcs",
      ProviderKind::S3 => "s3",
    }
  }

  /// The human-readable backend name.
  #[must_use]
  pub const fn display_name(self) -> &'static str {
    match self {
      ProviderKind::Local => "Local Filesystem",
      ProviderKind::Gcs => "Google Cloud Storage",
      ProviderKind::S3 => "Amazon S3",
    }
  }

  /// The static capability flags of this backend.
  #[must_use]
  pub const fn capabilities(self) -> ProviderCapabilities {
    ProviderCapabilities::for_kind(self)
  }

  /// Sniffs which cloud backend produced an address, if any.
  ///
  /// Only cloud address forms are recognised; anything else (relative paths,
  /// local URLs) yields `None`.
  #[must_use]
  pub fn from_address(address: &str) -> Option<Self> {
    let address = address.trim();
    let lower = address.to_ascii_lowercase();

    if GCS_PUBLIC_HOSTS.iter().any(|h| lower.starts_with(h))
      || lower.starts_with("gs://")
    {
      return Some(ProviderKind::Gcs);
    }
    if lower.starts_with("s3://") {
      return Some(ProviderKind::S3);
    }
    if let Some(rest) = lower
      .strip_prefix("https://")
      .or_else(|| lower.strip_prefix("http://"))
    {
      let host = rest.split('/').next().unwrap_or_default();
      if host.ends_with(".amazonaws.com")
        && (host.starts_with("s3.") || host.contains(".s3."))
      {
        return Some(ProviderKind::S3);
      }
    }
    None
  }
}

/// Whether an address denotes an object in one of the cloud backends.
#[must_use]
pub fn is_cloud_address(address: &str) -> bool {
  ProviderKind::from_address(address).is_some()
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned when parsing an unrecognised provider identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProviderKind(pub String);

impl fmt::Display for UnknownProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "unknown storage provider `{}` (expected one of: local, gcs, s3)",
      self.0
    )
  }
}

impl std::error::Error for UnknownProviderKind {}

impl FromStr for ProviderKind {
  type Err = UnknownProviderKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "local" | "fs" | "filesystem" => Ok(ProviderKind::Local),
      "gcs" | "google" | "gcp" | "google-cloud" => Ok(ProviderKind::Gcs),
      "s3" | "aws" | "aws-s3" => Ok(ProviderKind::S3),
      other => Err(UnknownProviderKind(other.to_owned())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_aliases() {
    assert_eq!("google".parse::<ProviderKind>(), Ok(ProviderKind::Gcs));
    assert_eq!(" AWS ".parse::<ProviderKind>(), Ok(ProviderKind::S3));
    assert_eq!("local".parse::<ProviderKind>(), Ok(ProviderKind::Local));
    assert!("azure".parse::<ProviderKind>().is_err());
  }

  #[test]
  fn sniffs_gcs_addresses() {
    assert_eq!(
      ProviderKind::from_address(
        "https://storage.googleapis.com/bucket/product-images/a.png"
      ),
      Some(ProviderKind::Gcs)
    );
    assert_eq!(
      ProviderKind::from_address("gs://bucket/a.png"),
      Some(ProviderKind::Gcs)
    );
  }

  #[test]
  fn sniffs_s3_addresses() {
    assert_eq!(
      ProviderKind::from_address(
        "https://bucket.s3.eu-west-1.amazonaws.com/images/a.png"
      ),
      Some(ProviderKind::S3)
    );
    assert_eq!(
      ProviderKind::from_address(
        "https://s3.us-east-1.amazonaws.com/bucket/a.png"
      ),
      Some(ProviderKind::S3)
    );
    assert_eq!(
      ProviderKind::from_address("s3://bucket/a.png"),
      Some(ProviderKind::S3)
    );
  }

  #[test]
  fn local_addresses_are_not_cloud() {
    assert!(!is_cloud_address("/uploads/images/a.png"));
    assert!(!is_cloud_address("http://localhost:5001/uploads/images/a.png"));
    assert!(!is_cloud_address("images/a.png"));
    assert!(!is_cloud_address("https://example.amazonaws.com.evil/a.png"));
  }
}
