use std::{fmt, path::PathBuf};

use record_core::ImageId;
use serde::Serialize;

/// Skip reason for records whose address is already a cloud address.
pub const ALREADY_IN_CLOUD: &str = "already in cloud storage";
/// Failure reason for records whose legacy file is gone.
pub const LOCAL_FILE_NOT_FOUND: &str = "local file not found";

/// A record whose bytes were moved and whose address was rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedImage {
  /// Row identifier.
  pub id:          ImageId,
  /// The address before the run.
  pub old_address: String,
  /// The address in the target provider.
  pub new_address: String,
  /// Bytes moved.
  pub size:        u64,
  /// The legacy file, now redundant.
  pub legacy_path: PathBuf,
}

/// A record the run could not migrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedImage {
  /// Row identifier.
  pub id:      ImageId,
  /// The record's address.
  pub address: String,
  /// What went wrong.
  pub error:   String,
}

/// A record the run left alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedImage {
  /// Row identifier.
  pub id:      ImageId,
  /// The record's address.
  pub address: String,
  /// Why it was left alone.
  pub reason:  String,
}

/// The terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
  /// Moved and rewritten.
  Succeeded(MigratedImage),
  /// Not migrated; the record is unchanged.
  Failed(FailedImage),
  /// Not eligible.
  Skipped(SkippedImage),
}

impl fmt::Display for ItemOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ItemOutcome::Succeeded(m) => write!(
        f,
        "{}: migrated {} bytes -> {}",
        m.id, m.size, m.new_address
      ),
      ItemOutcome::Failed(e) => write!(f, "{}: FAILED: {}", e.id, e.error),
      ItemOutcome::Skipped(s) => write!(f, "{}: skipped ({})", s.id, s.reason),
    }
  }
}

/// Every record's outcome for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
  /// Migrated records.
  pub successful: Vec<MigratedImage>,
  /// Failed records.
  pub failed:     Vec<FailedImage>,
  /// Skipped records.
  pub skipped:    Vec<SkippedImage>,
}

impl MigrationOutcome {
  /// Files the outcome of one record.
  pub fn push(&mut self, item: ItemOutcome) {
    match item {
      ItemOutcome::Succeeded(m) => self.successful.push(m),
      ItemOutcome::Failed(e) => self.failed.push(e),
      ItemOutcome::Skipped(s) => self.skipped.push(s),
    }
  }

  /// Number of records processed.
  #[must_use]
  pub fn total(&self) -> usize {
    self.successful.len() + self.failed.len() + self.skipped.len()
  }

  /// Bytes moved by successful records.
  #[must_use]
  pub fn total_bytes(&self) -> u64 {
    self.successful.iter().map(|m| m.size).sum()
  }

  /// Whether any record failed.
  #[must_use]
  pub fn has_failures(&self) -> bool { !self.failed.is_empty() }
}

/// Quotes a path for a POSIX shell.
fn shell_quote(path: &str) -> String {
  format!("'{}'", path.replace('\'', r"'\''"))
}

impl fmt::Display for MigrationOutcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Migration summary")?;
    writeln!(f, "  successful:  {}", self.successful.len())?;
    writeln!(f, "  skipped:     {}", self.skipped.len())?;
    writeln!(f, "  failed:      {}", self.failed.len())?;
    writeln!(f, "  total:       {}", self.total())?;
    writeln!(f, "  bytes moved: {}", self.total_bytes())?;

    if !self.failed.is_empty() {
      writeln!(f)?;
      writeln!(f, "Failed images:")?;
      for failed in &self.failed {
        writeln!(f, "  - {} ({}): {}", failed.id, failed.address, failed.error)?;
      }
    }

    if !self.successful.is_empty() {
      writeln!(f)?;
      writeln!(
        f,
        "Legacy files are now redundant. They were not deleted; to remove \
         them run:"
      )?;
      for migrated in &self.successful {
        writeln!(
          f,
          "  rm {}",
          shell_quote(&migrated.legacy_path.to_string_lossy())
        )?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_summary_lists_failures_and_rm_commands() {
    let mut outcome = MigrationOutcome::default();
    outcome.push(ItemOutcome::Succeeded(MigratedImage {
      id:          ImageId::new("a"),
      old_address: "/uploads/images/a.png".to_owned(),
      new_address: "gs://b/product-images/a.png".to_owned(),
      size:        10,
      legacy_path: PathBuf::from("/srv/uploads/images/it's.png"),
    }));
    outcome.push(ItemOutcome::Failed(FailedImage {
      id:      ImageId::new("c"),
      address: "/uploads/images/c.png".to_owned(),
      error:   LOCAL_FILE_NOT_FOUND.to_owned(),
    }));

    assert_eq!(outcome.total(), 2);
    assert_eq!(outcome.total_bytes(), 10);
    assert!(outcome.has_failures());

    let summary = outcome.to_string();
    assert!(summary.contains("successful:  1"));
    assert!(summary.contains("c (/uploads/images/c.png): local file not found"));
    assert!(summary.contains(r"rm '/srv/uploads/images/it'\''s.png'"));
  }
}
