use crate::ValidationError;

/// Content types accepted when the caller configures nothing else.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &[
  "image/jpeg",
  "image/jpg",
  "image/png",
  "image/gif",
  "image/webp",
];

/// Input policy checked before any backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
  /// Accepted content types, lowercase, without parameters.
  pub allowed_content_types: Vec<String>,
  /// Optional maximum payload size in bytes.
  pub max_size:              Option<u64>,
}

impl Default for UploadPolicy {
  fn default() -> Self {
    Self {
      allowed_content_types: DEFAULT_ALLOWED_CONTENT_TYPES
        .iter()
        .map(|s| (*s).to_owned())
        .collect(),
      max_size:              None,
    }
  }
}

/// Lowercases a content type and strips parameters such as `charset`.
#[must_use]
pub fn normalize_content_type(content_type: &str) -> String {
  content_type
    .split(';')
    .next()
    .unwrap_or_default()
    .trim()
    .to_ascii_lowercase()
}

impl UploadPolicy {
  /// Sets the maximum payload size.
  #[must_use]
  pub const fn with_max_size(mut self, max_size: Option<u64>) -> Self {
    self.max_size = max_size;
    self
  }

  /// Replaces the allow-list.
  #[must_use]
  pub fn with_allowed_content_types<I, S>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.allowed_content_types = types
      .into_iter()
      .map(|t| normalize_content_type(t.as_ref()))
      .filter(|t| !t.is_empty())
      .collect();
    self
  }

  /// Checks a payload against the policy, returning the normalized content
  /// type.
  ///
  /// `override_types` replaces the allow-list for this check only.
  pub fn validate(
    &self,
    content_type: &str,
    size: u64,
    override_types: Option<&[String]>,
  ) -> Result<String, ValidationError> {
    let normalized = normalize_content_type(content_type);
    let allowed = override_types.unwrap_or(&self.allowed_content_types);

    if !allowed
      .iter()
      .any(|t| normalize_content_type(t) == normalized)
    {
      return Err(ValidationError::DisallowedContentType {
        content_type: normalized,
        allowed:      allowed.join(", "),
      });
    }

    if size == 0 {
      return Err(ValidationError::EmptyPayload);
    }

    if let Some(max) = self.max_size
      && size > max
    {
      return Err(ValidationError::TooLarge { size, max });
    }

    Ok(normalized)
  }
}
