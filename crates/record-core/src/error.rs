use miette::Diagnostic;
use thiserror::Error;

use crate::ImageId;

/// Errors that can occur during record-store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum RecordStoreError {
  /// Record not found
  #[error("Image record not found: {0}")]
  NotFound(ImageId),

  /// Database error
  #[error("Database error: {0}")]
  Database(#[diagnostic_source] miette::Report),
}

/// A type alias for [`Result`] with [`RecordStoreError`].
pub type RecordStoreResult<T> = Result<T, RecordStoreError>;
