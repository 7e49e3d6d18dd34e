use std::io;

use miette::Diagnostic;
use storage_types::BlobKey;

/// Rejections raised before any backend call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Diagnostic)]
pub enum ValidationError {
  /// The content type is not in the allow-list.
  #[error("Content type `{content_type}` is not allowed (allowed: {allowed})")]
  DisallowedContentType {
    /// The rejected content type.
    content_type: String,
    /// The allow-list in effect, comma-separated.
    allowed:      String,
  },

  /// The payload exceeds the configured maximum size.
  #[error("Payload of {size} bytes exceeds the maximum of {max} bytes")]
  TooLarge {
    /// The payload size in bytes.
    size: u64,
    /// The configured maximum in bytes.
    max:  u64,
  },

  /// The payload is empty.
  #[error("Payload is empty")]
  EmptyPayload,
}

/// Error types for object storage operations.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum StorageError {
  /// Input rejected before reaching the backend.
  #[error("Validation failed: {0}")]
  Validation(#[from] ValidationError),

  /// Object not found.
  #[error("Object not found: {0}")]
  NotFound(BlobKey),

  /// The address is a URL or scheme form owned by another backend or bucket.
  #[error("Address `{address}` does not belong to the {provider} provider")]
  ForeignAddress {
    /// The address that could not be resolved.
    address:  String,
    /// The provider that rejected it.
    provider: &'static str,
  },

  /// The address is empty or otherwise unusable.
  #[error("Invalid address: `{0}`")]
  InvalidAddress(String),

  /// Storing an object failed.
  #[error("Upload failed: {0}")]
  Upload(miette::Report),

  /// Deleting an object failed.
  #[error("Delete failed: {0}")]
  Delete(miette::Report),

  /// Reading object metadata or content failed.
  #[error("Metadata error: {0}")]
  Metadata(miette::Report),

  /// Producing a signed URL failed.
  #[error("Signing failed: {0}")]
  Signing(miette::Report),

  /// Enumerating objects failed.
  #[error("Listing failed: {0}")]
  Listing(miette::Report),

  /// Creating or checking the bucket or directory failed.
  #[error("Container error: {0}")]
  Container(miette::Report),

  /// The provider is missing required configuration.
  #[error("Invalid configuration: {0}")]
  Configuration(miette::Report),

  /// IO error.
  #[error("IO error: {0}")]
  Io(#[from] io::Error),
}

impl StorageError {
  /// Whether this error means the object does not exist.
  #[must_use]
  pub const fn is_not_found(&self) -> bool {
    matches!(self, StorageError::NotFound(_))
  }

  /// Whether this error was raised by input validation.
  #[must_use]
  pub const fn is_validation(&self) -> bool {
    matches!(self, StorageError::Validation(_))
  }
}

/// A type alias for [`Result`] with [`StorageError`].
pub type StorageResult<T> = std::result::Result<T, StorageError>;
