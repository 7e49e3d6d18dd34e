use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage_types::BlobKey;

use crate::StoredObject;

/// Count and byte total for one content type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentTypeUsage {
  /// Number of objects.
  pub count: u64,
  /// Total bytes.
  pub size:  u64,
}

/// A key paired with its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatedKey {
  /// The object key.
  pub key: BlobKey,
  /// Creation time, or last update time when creation is unknown.
  pub at:  DateTime<Utc>,
}

/// Aggregate usage of a provider's stored objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
  /// Number of objects.
  pub total_files:     u64,
  /// Total bytes.
  pub total_size:      u64,
  /// Breakdown by content type; unknown types are grouped under
  /// `application/octet-stream`.
  pub by_content_type: BTreeMap<String, ContentTypeUsage>,
  /// The oldest object, if any carries a timestamp.
  pub oldest:          Option<DatedKey>,
  /// The newest object, if any carries a timestamp.
  pub newest:          Option<DatedKey>,
}

impl UsageReport {
  /// Aggregates a full listing. O(n) in the number of objects.
  #[must_use]
  pub fn aggregate(objects: &[StoredObject]) -> Self {
    let mut report = UsageReport::default();

    for object in objects {
      report.total_files += 1;
      report.total_size += object.size;

      let content_type = object
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_owned());
      let entry = report.by_content_type.entry(content_type).or_default();
      entry.count += 1;
      entry.size += object.size;

      let Some(at) = object.created_at.or(object.updated_at) else {
        continue;
      };
      if report.oldest.as_ref().is_none_or(|o| at < o.at) {
        report.oldest = Some(DatedKey {
          key: object.key.clone(),
          at,
        });
      }
      if report.newest.as_ref().is_none_or(|n| at > n.at) {
        report.newest = Some(DatedKey {
          key: object.key.clone(),
          at,
        });
      }
    }

    report
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use chrono::TimeZone;

  use super::*;

  fn object(key: &str, size: u64, ct: Option<&str>, secs: i64) -> StoredObject {
    StoredObject {
      address:      format!("test://{key}"),
      key:          BlobKey::new(key),
      size,
      content_type: ct.map(ToOwned::to_owned),
      created_at:   Some(Utc.timestamp_opt(secs, 0).unwrap()),
      updated_at:   None,
      etag:         None,
      metadata:     HashMap::new(),
    }
  }

  #[test]
  fn aggregates_totals_types_and_extremes() {
    let objects = vec![
      object("a.png", 10, Some("image/png"), 200),
      object("b.png", 5, Some("image/png"), 100),
      object("c.bin", 1, None, 300),
    ];
    let report = UsageReport::aggregate(&objects);

    assert_eq!(report.total_files, 3);
    assert_eq!(report.total_size, 16);
    assert_eq!(report.by_content_type["image/png"], ContentTypeUsage {
      count: 2,
      size:  15,
    });
    assert_eq!(report.by_content_type["application/octet-stream"].count, 1);
    assert_eq!(report.oldest.unwrap().key.as_str(), "b.png");
    assert_eq!(report.newest.unwrap().key.as_str(), "c.bin");
  }

  #[test]
  fn empty_listing() {
    let report = UsageReport::aggregate(&[]);
    assert_eq!(report, UsageReport::default());
  }
}
