use std::fmt;

use record_core::ImageRecord;
use serde::Serialize;

/// Maximum number of still-local addresses listed in a [`StatusReport`].
pub const SAMPLE_LIMIT: usize = 10;

/// A read-only audit of where file-backed images currently live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
  /// File-backed records inspected.
  pub total:        usize,
  /// Records still pointing at the legacy backend.
  pub local_count:  usize,
  /// Records already pointing at a cloud backend.
  pub cloud_count:  usize,
  /// Up to [`SAMPLE_LIMIT`] still-local addresses.
  pub local_sample: Vec<String>,
}

impl StatusReport {
  /// Partitions `records` by address form only. No I/O.
  #[must_use]
  pub fn from_records<F>(records: &[ImageRecord], is_cloud: F) -> Self
  where
    F: Fn(&str) -> bool,
  {
    let mut report = Self {
      total: records.len(),
      ..Self::default()
    };
    for record in records {
      if is_cloud(&record.image_url) {
        report.cloud_count += 1;
      } else {
        report.local_count += 1;
        if report.local_sample.len() < SAMPLE_LIMIT {
          report.local_sample.push(record.image_url.clone());
        }
      }
    }
    report
  }

  /// Whether a migration run has anything to do.
  #[must_use]
  pub const fn needs_migration(&self) -> bool { self.local_count > 0 }
}

impl fmt::Display for StatusReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Image storage status")?;
    writeln!(f, "  file-backed images: {}", self.total)?;
    writeln!(f, "  still local:        {}", self.local_count)?;
    writeln!(f, "  already in cloud:   {}", self.cloud_count)?;

    if self.local_sample.is_empty() {
      return writeln!(f, "\nNothing to migrate.");
    }
    writeln!(f, "\nStill local:")?;
    for address in &self.local_sample {
      writeln!(f, "  - {address}")?;
    }
    if self.local_count > self.local_sample.len() {
      writeln!(
        f,
        "  ... and {} more",
        self.local_count - self.local_sample.len()
      )?;
    }
    Ok(())
  }
}
