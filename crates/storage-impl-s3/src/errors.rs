use miette::Report;
use s3::error::S3Error;
use storage_core::{BlobKey, StorageError};

/// Whether the backend reported a missing object or bucket.
pub(crate) const fn is_not_found(err: &S3Error) -> bool {
  matches!(err, S3Error::HttpFailWithBody(404, _))
}

/// Converts an [`S3Error`] raised for `key`, wrapping operation failures with
/// `wrap` so the caller's error kind is preserved.
pub(crate) fn s3_error_to_storage_error(
  err: S3Error,
  key: &BlobKey,
  wrap: fn(Report) -> StorageError,
) -> StorageError {
  match err {
    e if is_not_found(&e) => StorageError::NotFound(key.clone()),

    // invalid config
    e @ (S3Error::Credentials(_)
    | S3Error::Region(_)
    | S3Error::UrlParse(_)
    | S3Error::WLCredentials
    | S3Error::RLCredentials
    | S3Error::CredentialsReadLock
    | S3Error::CredentialsWriteLock) => {
      StorageError::Configuration(Report::from_err(e))
    }

    // response code errors
    e @ (S3Error::HttpFailWithBody(_, _) | S3Error::HttpFail) => {
      wrap(Report::from_err(e).wrap_err("HTTP response code error"))
    }

    // an actual IO error
    S3Error::Io(err) => StorageError::Io(err),

    e => wrap(Report::from_err(e)),
  }
}

/// Converts an [`S3Error`] raised while configuring the client.
pub(crate) fn s3_config_error(err: S3Error) -> StorageError {
  StorageError::Configuration(Report::from_err(err))
}
