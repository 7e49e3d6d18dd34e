//! Ordered address matching shared by all providers.
//!
//! Each provider registers the prefixes of its own full-URL and scheme forms.
//! Resolution tries them in registration order, then rejects any other
//! `scheme://` address, then treats the remainder as a relative path (when it
//! contains a separator) or as a bare name inside the configured folder.

use percent_encoding::percent_decode_str;
use storage_types::BlobKey;

use crate::{StorageError, StorageResult};

/// Maps addresses in a provider's recognised forms to backend-native keys.
#[derive(Debug, Clone)]
pub struct AddressResolver {
  provider: &'static str,
  folder:   String,
  prefixes: Vec<String>,
}

/// Removes any query string or fragment, e.g. from a signed URL.
#[must_use]
pub fn strip_query(address: &str) -> &str {
  let end = address.find(['?', '#']).unwrap_or(address.len());
  &address[..end]
}

impl AddressResolver {
  /// Creates a resolver for `provider` whose bare names live under `folder`.
  pub fn new(provider: &'static str, folder: impl Into<String>) -> Self {
    Self {
      provider,
      folder: folder.into().trim_matches('/').to_owned(),
      prefixes: Vec::new(),
    }
  }

  /// Registers an address prefix; everything after it is the key.
  #[must_use]
  pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
    let mut prefix = prefix.into();
    if !prefix.ends_with('/') {
      prefix.push('/');
    }
    self.prefixes.push(prefix);
    self
  }

  /// The folder bare names are resolved into.
  #[must_use]
  pub fn folder(&self) -> &str { &self.folder }

  /// Whether the address is in one of the registered forms.
  #[must_use]
  pub fn recognizes(&self, address: &str) -> bool {
    self.match_prefix(strip_query(address.trim())).is_some()
  }

  fn match_prefix<'a>(&self, address: &'a str) -> Option<&'a str> {
    self.prefixes.iter().find_map(|prefix| {
      address
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &address[prefix.len()..])
    })
  }

  /// Resolves an address or name to a backend-native key.
  pub fn resolve(&self, address: &str) -> StorageResult<BlobKey> {
    let trimmed = strip_query(address.trim());
    if trimmed.is_empty() {
      return Err(StorageError::InvalidAddress(address.to_owned()));
    }

    let key = if let Some(rest) = self.match_prefix(trimmed) {
      BlobKey::new(percent_decode_str(rest).decode_utf8_lossy().into_owned())
    } else if trimmed.contains("://") {
      return Err(StorageError::ForeignAddress {
        address:  address.to_owned(),
        provider: self.provider,
      });
    } else if trimmed.contains('/') {
      BlobKey::new(trimmed)
    } else {
      BlobKey::join(&self.folder, trimmed)
    };

    if key.as_str().is_empty()
      || key.as_str().split('/').any(|segment| segment == "..")
    {
      return Err(StorageError::InvalidAddress(address.to_owned()));
    }
    Ok(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn resolver() -> AddressResolver {
    AddressResolver::new("test", "images")
      .with_prefix("https://cdn.example.com/bucket")
      .with_prefix("test://bucket/")
  }

  #[test]
  fn full_url_form() {
    let key = resolver()
      .resolve("https://cdn.example.com/bucket/images/a%20b.png?sig=1")
      .unwrap();
    assert_eq!(key.as_str(), "images/a b.png");
  }

  #[test]
  fn scheme_form_is_case_insensitive_on_prefix() {
    let key = resolver().resolve("TEST://bucket/images/a.png").unwrap();
    assert_eq!(key.as_str(), "images/a.png");
  }

  #[test]
  fn relative_path_is_already_resolved() {
    let key = resolver().resolve("other/a.png").unwrap();
    assert_eq!(key.as_str(), "other/a.png");
  }

  #[test]
  fn bare_name_goes_into_folder() {
    let key = resolver().resolve("a.png").unwrap();
    assert_eq!(key.as_str(), "images/a.png");
  }

  #[test]
  fn foreign_url_is_rejected() {
    let err = resolver()
      .resolve("https://storage.googleapis.com/other/images/a.png")
      .unwrap_err();
    assert!(matches!(err, StorageError::ForeignAddress { .. }));
  }

  #[test]
  fn traversal_and_empty_are_rejected() {
    assert!(matches!(
      resolver().resolve("images/../../etc/passwd"),
      Err(StorageError::InvalidAddress(_))
    ));
    assert!(matches!(
      resolver().resolve("  "),
      Err(StorageError::InvalidAddress(_))
    ));
    assert!(matches!(
      resolver().resolve("test://bucket/"),
      Err(StorageError::InvalidAddress(_))
    ));
  }

  #[test]
  fn recognizes_only_registered_forms() {
    let r = resolver();
    assert!(r.recognizes("test://bucket/images/a.png"));
    assert!(!r.recognizes("test://other/images/a.png"));
    assert!(!r.recognizes("images/a.png"));
  }
}
