//! An in-memory image record store for tests.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::miette;
use record_core::{
  ImageId, ImageRecord, ImageRecordStoreLike, RecordStoreError,
  RecordStoreResult,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct MockImageStoreInner {
  records:          HashMap<ImageId, ImageRecord>,
  fail_all_updates: bool,
  fail_updates_for: HashSet<ImageId>,
  update_count:     usize,
}

/// An in-memory image record store, cloneable and shared.
#[derive(Clone, Default)]
pub struct MockImageStore {
  inner: Arc<RwLock<MockImageStoreInner>>,
}

impl MockImageStore {
  /// Creates an empty store.
  #[must_use]
  pub fn new() -> Self { Self::default() }

  /// Creates a store seeded with `records`.
  pub async fn with_records(
    records: impl IntoIterator<Item = ImageRecord>,
  ) -> Self {
    let store = Self::new();
    for record in records {
      store.insert(record).await;
    }
    store
  }

  /// Inserts or replaces a record.
  pub async fn insert(&self, record: ImageRecord) {
    self
      .inner
      .write()
      .await
      .records
      .insert(record.id.clone(), record);
  }

  /// Reads a record by id.
  pub async fn get(&self, id: &ImageId) -> Option<ImageRecord> {
    self.inner.read().await.records.get(id).cloned()
  }

  /// Makes every subsequent update fail.
  pub async fn fail_all_updates(&self, fail: bool) {
    self.inner.write().await.fail_all_updates = fail;
  }

  /// Makes updates of one record fail.
  pub async fn fail_updates_for(&self, id: ImageId) {
    self.inner.write().await.fail_updates_for.insert(id);
  }

  /// The number of successful updates applied.
  pub async fn update_count(&self) -> usize {
    self.inner.read().await.update_count
  }
}

#[async_trait]
impl ImageRecordStoreLike for MockImageStore {
  async fn file_backed_images(&self) -> RecordStoreResult<Vec<ImageRecord>> {
    let inner = self.inner.read().await;
    let mut records = inner
      .records
      .values()
      .filter(|r| r.is_file_backed())
      .cloned()
      .collect::<Vec<_>>();
    records.sort_by(|a, b| {
      a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
    Ok(records)
  }

  async fn update_image_address(
    &self,
    id: &ImageId,
    image_url: &str,
    updated_at: DateTime<Utc>,
  ) -> RecordStoreResult<()> {
    let mut inner = self.inner.write().await;
    if inner.fail_all_updates || inner.fail_updates_for.contains(id) {
      return Err(RecordStoreError::Database(miette!(
        "simulated update failure for {id}"
      )));
    }

    let record = inner
      .records
      .get_mut(id)
      .ok_or_else(|| RecordStoreError::NotFound(id.clone()))?;
    record.image_url = image_url.to_owned();
    record.updated_at = updated_at;
    inner.update_count += 1;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  fn record_at(id: &str, url: &str, minutes: i64) -> ImageRecord {
    let mut record = ImageRecord::file(id, url);
    record.created_at = Utc::now() + Duration::minutes(minutes);
    record
  }

  #[tokio::test]
  async fn test_file_backed_images_are_ordered() {
    let mut external = record_at("ext", "https://cdn.example.com/a.png", -10);
    external.image_type = "url".to_owned();
    let store = MockImageStore::with_records([
      record_at("b", "/uploads/images/b.png", 5),
      record_at("a", "/uploads/images/a.png", 1),
      external,
    ])
    .await;

    let ids = store
      .file_backed_images()
      .await
      .unwrap()
      .into_iter()
      .map(|r| r.id.to_string())
      .collect::<Vec<_>>();
    assert_eq!(ids, vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_update_rewrites_address() {
    let store =
      MockImageStore::with_records([record_at("a", "/uploads/a.png", 0)]).await;
    let id = ImageId::new("a");
    let now = Utc::now();

    store
      .update_image_address(&id, "gs://bucket/images/a.png", now)
      .await
      .unwrap();

    let record = store.get(&id).await.unwrap();
    assert_eq!(record.image_url, "gs://bucket/images/a.png");
    assert_eq!(record.updated_at, now);
    assert_eq!(store.update_count().await, 1);
  }

  #[tokio::test]
  async fn test_update_missing_record() {
    let store = MockImageStore::new();
    let err = store
      .update_image_address(&ImageId::new("nope"), "x", Utc::now())
      .await
      .unwrap_err();
    assert!(matches!(err, RecordStoreError::NotFound(_)));
  }

  #[tokio::test]
  async fn test_injected_update_failure() {
    let store =
      MockImageStore::with_records([record_at("a", "/uploads/a.png", 0)]).await;
    store.fail_updates_for(ImageId::new("a")).await;

    let err = store
      .update_image_address(&ImageId::new("a"), "x", Utc::now())
      .await
      .unwrap_err();
    assert!(matches!(err, RecordStoreError::Database(_)));
    assert_eq!(store.update_count().await, 0);
  }
}
