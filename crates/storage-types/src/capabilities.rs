use serde::Serialize;

use crate::ProviderKind;

/// Static feature flags of a storage backend, used for feature-gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProviderCapabilities {
  /// Time-limited signed URLs.
  pub signed_urls: bool,
  /// Directly addressable public URLs.
  pub public_urls: bool,
  /// Custom per-object metadata.
  pub metadata:    bool,
  /// Object versioning.
  pub versioning:  bool,
  /// Lifecycle rules.
  pub lifecycle:   bool,
  /// Bucket-level CORS configuration.
  pub cors:        bool,
  /// CDN fronting.
  pub cdn:         bool,
}

impl ProviderCapabilities {
  /// The capability descriptor for a provider kind.
  #[must_use]
  pub const fn for_kind(kind: ProviderKind) -> Self {
    match kind {
      ProviderKind::Local => Self {
        signed_urls: false,
        public_urls: true,
        metadata:    true,
        versioning:  false,
        lifecycle:   false,
        cors:        false,
        cdn:         false,
      },
      ProviderKind::Gcs | ProviderKind::S3 => Self {
        signed_urls: true,
        public_urls: true,
        metadata:    true,
        versioning:  true,
        lifecycle:   true,
        cors:        true,
        cdn:         true,
      },
    }
  }
}
