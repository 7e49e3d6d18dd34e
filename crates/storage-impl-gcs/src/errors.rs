use miette::Report;
use storage_core::{BlobKey, StorageError};

/// Converts an [`object_store::Error`] raised for `key`, wrapping operation
/// failures with `wrap`.
pub(crate) fn object_store_error_to_storage_error(
  err: object_store::Error,
  key: &BlobKey,
  wrap: fn(Report) -> StorageError,
) -> StorageError {
  match err {
    object_store::Error::NotFound { .. } => StorageError::NotFound(key.clone()),
    e @ (object_store::Error::UnknownConfigurationKey { .. }
    | object_store::Error::Unauthenticated { .. }
    | object_store::Error::PermissionDenied { .. }) => {
      wrap(Report::from_err(e).wrap_err("GCS rejected the credentials"))
    }
    e => wrap(Report::from_err(e)),
  }
}

/// Converts a failed JSON API call.
pub(crate) fn json_api_error(
  err: reqwest::Error,
  wrap: fn(Report) -> StorageError,
) -> StorageError {
  wrap(Report::from_err(err).wrap_err("GCS JSON API request failed"))
}
