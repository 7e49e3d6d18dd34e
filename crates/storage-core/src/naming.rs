//! Collision-resistant object names.

use chrono::Utc;
use ulid::Ulid;

/// Longest extension kept from the caller's file name, including the dot.
const MAX_EXTENSION_LEN: usize = 10;

/// Generates an object name of the form
/// `{prefix}_{unix_millis}_{token}{ext}`, or `{unix_millis}_{token}{ext}`
/// without a prefix.
///
/// The token is a lowercase ULID, so concurrent calls with identical inputs
/// never produce the same name. The extension is taken from `desired_name`
/// and lowercased.
#[must_use]
pub fn generate_object_name(prefix: Option<&str>, desired_name: &str) -> String {
  let millis = Utc::now().timestamp_millis();
  let token = Ulid::new().to_string().to_ascii_lowercase();
  let ext = extension_of(desired_name);

  match prefix.map(sanitize_segment).filter(|p| !p.is_empty()) {
    Some(prefix) => format!("{prefix}_{millis}_{token}{ext}"),
    None => format!("{millis}_{token}{ext}"),
  }
}

/// Keeps ASCII alphanumerics, `-` and `_`; everything else becomes `-`.
fn sanitize_segment(input: &str) -> String {
  input
    .trim()
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        c
      } else {
        '-'
      }
    })
    .collect::<String>()
    .trim_matches('-')
    .to_owned()
}

/// The lowercase extension of the final path segment, with its dot.
fn extension_of(desired_name: &str) -> String {
  let file_name = desired_name
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or(desired_name);

  let Some(idx) = file_name.rfind('.').filter(|i| *i > 0) else {
    return String::new();
  };
  let ext = &file_name[idx..];

  if ext.len() < 2
    || ext.len() > MAX_EXTENSION_LEN
    || !ext[1..].chars().all(|c| c.is_ascii_alphanumeric())
  {
    return String::new();
  }
  ext.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use super::*;

  #[test]
  fn name_has_prefix_timestamp_token_and_extension() {
    let name = generate_object_name(Some("product"), "Photo.JPG");
    let parts: Vec<&str> = name.splitn(3, '_').collect();
    assert_eq!(parts[0], "product");
    assert!(parts[1].parse::<i64>().is_ok());
    assert!(parts[2].ends_with(".jpg"));
    assert_eq!(parts[2].len(), 26 + 4);
  }

  #[test]
  fn name_without_prefix_has_no_leading_separator() {
    let name = generate_object_name(None, "a.png");
    assert!(!name.starts_with('_'));
    assert!(name.ends_with(".png"));
    let name = generate_object_name(Some("  "), "a.png");
    assert!(!name.starts_with('_'));
  }

  #[test]
  fn prefix_is_sanitized() {
    let name = generate_object_name(Some("my prefix/../x"), "a.png");
    assert!(name.starts_with("my-prefix----x_"));
    assert!(!name.contains('/'));
  }

  #[test]
  fn odd_extensions_are_dropped() {
    assert_eq!(extension_of("archive"), "");
    assert_eq!(extension_of(".bashrc"), "");
    assert_eq!(extension_of("x.tar.gz"), ".gz");
    assert_eq!(extension_of("x.p ng"), "");
    assert_eq!(extension_of("C:\\pics\\cat.WebP"), ".webp");
  }

  #[test]
  fn identical_inputs_never_collide() {
    let names: HashSet<String> = (0..1000)
      .map(|_| generate_object_name(Some("p"), "same.png"))
      .collect();
    assert_eq!(names.len(), 1000);
  }
}
