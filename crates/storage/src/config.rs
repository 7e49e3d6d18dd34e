use serde::Serialize;
use storage_core::{ProviderKind, UploadPolicy};
use storage_impl_fs::LocalConfig;
use storage_impl_gcs::GcsConfig;
use storage_impl_s3::S3Config;

/// Backend-specific connection parameters for one provider.
#[derive(Debug, Clone)]
pub enum ProviderConfig {
  /// Local filesystem parameters.
  Local(LocalConfig),
  /// Google Cloud Storage parameters.
  Gcs(GcsConfig),
  /// S3 parameters.
  S3(S3Config),
}

impl ProviderConfig {
  /// The provider kind this configuration builds.
  #[must_use]
  pub const fn kind(&self) -> ProviderKind {
    match self {
      ProviderConfig::Local(_) => ProviderKind::Local,
      ProviderConfig::Gcs(_) => ProviderKind::Gcs,
      ProviderConfig::S3(_) => ProviderKind::S3,
    }
  }

  /// The upload policy carried by the configuration.
  #[must_use]
  pub const fn policy(&self) -> &UploadPolicy {
    match self {
      ProviderConfig::Local(c) => &c.policy,
      ProviderConfig::Gcs(c) => &c.policy,
      ProviderConfig::S3(c) => &c.policy,
    }
  }
}

/// The result of checking a configuration for completeness.
///
/// Errors make the configuration unusable; warnings flag reliance on ambient
/// credentials or defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigValidation {
  /// Whether the provider can be constructed.
  pub is_valid: bool,
  /// Missing required settings.
  pub errors:   Vec<String>,
  /// Missing recommended settings.
  pub warnings: Vec<String>,
}

impl ConfigValidation {
  pub(crate) fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
    Self {
      is_valid: errors.is_empty(),
      errors,
      warnings,
    }
  }
}
