use std::time::Duration;

use crate::{StorageError, StorageResult};

/// Maximum lifetime of a signed URL (7 days, the S3 and GCS V4 limit).
pub const MAX_SIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Validates a signed URL lifetime. Backends sign in whole seconds, so the
/// lifetime must be at least one second.
pub fn validate_sign_ttl(ttl: Duration) -> StorageResult<()> {
  if ttl.as_secs() == 0 {
    return Err(StorageError::Signing(miette::miette!(
      "signed URL lifetime must be at least one second"
    )));
  }
  if ttl > MAX_SIGN_TTL {
    return Err(StorageError::Signing(miette::miette!(
      "signed URL lifetime of {} seconds exceeds the maximum of {} seconds",
      ttl.as_secs(),
      MAX_SIGN_TTL.as_secs()
    )));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bounds() {
    assert!(validate_sign_ttl(Duration::from_secs(3600)).is_ok());
    assert!(validate_sign_ttl(MAX_SIGN_TTL).is_ok());
    assert!(validate_sign_ttl(Duration::from_secs(1)).is_ok());
    assert!(validate_sign_ttl(Duration::ZERO).is_err());
    assert!(validate_sign_ttl(Duration::from_millis(500)).is_err());
    assert!(validate_sign_ttl(MAX_SIGN_TTL + Duration::from_secs(1)).is_err());
  }
}
