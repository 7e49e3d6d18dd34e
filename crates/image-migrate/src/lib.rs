//! Moves file-backed product images from the legacy local backend into the
//! selected cloud provider and rewrites their stored addresses.
//!
//! Records are processed one at a time, oldest first. Each record ends up
//! migrated, skipped or failed; a failure never stops the run. When the
//! record update fails after the bytes were stored, the new object is
//! deleted again so no record points at it.

mod outcome;
mod status;

use chrono::Utc;
use record_core::{ImageRecord, ImageRecordStoreLike, RecordStoreResult};
use storage::{ObjectStorageLike, StoreOptions, is_cloud_address};
use storage_impl_fs::LocalStorage;
use tracing::{debug, error, info, instrument, warn};

pub use self::{
  outcome::{
    ALREADY_IN_CLOUD, FailedImage, ItemOutcome, LOCAL_FILE_NOT_FOUND,
    MigratedImage, MigrationOutcome, SkippedImage,
  },
  status::{SAMPLE_LIMIT, StatusReport},
};

/// Attribution recorded on every object the job stores.
pub const UPLOADED_BY: &str = "image-migrate";
/// Prefix of the generated object names.
pub const OBJECT_PREFIX: &str = "product";

/// The migration batch job.
pub struct MigrationJob<T, R> {
  target:  T,
  legacy:  LocalStorage,
  records: R,
  options: StoreOptions,
}

impl<T, R> MigrationJob<T, R>
where
  T: ObjectStorageLike,
  R: ImageRecordStoreLike,
{
  /// Creates a job moving files from `legacy` into `target`.
  pub fn new(target: T, legacy: LocalStorage, records: R) -> Self {
    Self {
      target,
      legacy,
      records,
      options: StoreOptions::default()
        .with_prefix(OBJECT_PREFIX)
        .with_uploaded_by(UPLOADED_BY),
    }
  }

  /// The target provider.
  #[must_use]
  pub const fn target(&self) -> &T { &self.target }

  /// The record store.
  #[must_use]
  pub const fn records(&self) -> &R { &self.records }

  /// Whether an address needs no migration. Addresses the legacy backend
  /// recognises are local even when the target shares their form.
  fn is_migrated(&self, address: &str) -> bool {
    is_cloud_address(address)
      || (self.target.recognizes(address) && !self.legacy.recognizes(address))
  }

  /// Audits the record store without changing anything.
  #[instrument(skip(self), err)]
  pub async fn status(&self) -> RecordStoreResult<StatusReport> {
    let records = self.records.file_backed_images().await?;
    Ok(StatusReport::from_records(&records, |address| {
      self.is_migrated(address)
    }))
  }

  /// Runs the migration over every file-backed record.
  ///
  /// Only the initial record query can fail the run; per-record problems are
  /// collected in the returned [`MigrationOutcome`]. A progress line per
  /// record is printed to stdout.
  #[instrument(skip(self), fields(target = self.target.provider_name()), err)]
  pub async fn run(&self) -> RecordStoreResult<MigrationOutcome> {
    let records = self.records.file_backed_images().await?;
    let count = records.len();
    info!(count, "Starting image migration");

    let mut outcome = MigrationOutcome::default();
    for (index, record) in records.iter().enumerate() {
      let item = self.migrate_one(record).await;
      println!("[{}/{count}] {item}", index + 1);
      outcome.push(item);
    }

    info!(
      successful = outcome.successful.len(),
      skipped = outcome.skipped.len(),
      failed = outcome.failed.len(),
      "Image migration finished"
    );
    Ok(outcome)
  }

  #[instrument(skip(self, record), fields(id = %record.id))]
  async fn migrate_one(&self, record: &ImageRecord) -> ItemOutcome {
    let address = record.image_url.as_str();
    let failed = |error: String| {
      ItemOutcome::Failed(FailedImage {
        id: record.id.clone(),
        address: address.to_owned(),
        error,
      })
    };

    if self.is_migrated(address) {
      debug!(%address, "Already migrated");
      return ItemOutcome::Skipped(SkippedImage {
        id:      record.id.clone(),
        address: address.to_owned(),
        reason:  ALREADY_IN_CLOUD.to_owned(),
      });
    }

    let key = match self.legacy.resolve_address(address) {
      Ok(key) => key,
      Err(e) => return failed(e.to_string()),
    };
    let legacy_path = self.legacy.blob_path(&key);

    let object = match self.legacy.stat(address).await {
      Ok(object) => object,
      Err(e) if e.is_not_found() => {
        warn!(path = %legacy_path.display(), "Legacy file is missing");
        return failed(LOCAL_FILE_NOT_FOUND.to_owned());
      }
      Err(e) => return failed(format!("could not read local file: {e}")),
    };
    let data = match self.legacy.fetch(address).await {
      Ok(data) => data,
      Err(e) => return failed(format!("could not read local file: {e}")),
    };
    let content_type = object
      .content_type
      .as_deref()
      .unwrap_or("application/octet-stream");

    let options = self
      .options
      .clone()
      .with_metadata("record-id", record.id.as_str())
      .with_metadata("legacy-address", address);
    let result = match self
      .target
      .store(data, key.file_name(), content_type, options)
      .await
    {
      Ok(result) if result.success => result,
      Ok(_) => return failed("upload reported failure".to_owned()),
      Err(e) => return failed(format!("upload failed: {e}")),
    };

    if let Err(e) = self
      .records
      .update_image_address(&record.id, &result.address, Utc::now())
      .await
    {
      error!(
        error = %e,
        new_address = %result.address,
        "Record update failed, compensating"
      );
      match self.target.delete(&result.address).await {
        Ok(_) => {
          info!(new_address = %result.address, "Removed orphaned upload");
        }
        Err(delete_err) => warn!(
          new_address = %result.address,
          error = %delete_err,
          "Compensating delete failed, object is orphaned"
        ),
      }
      return failed(format!("record update failed: {e}"));
    }

    ItemOutcome::Succeeded(MigratedImage {
      id: record.id.clone(),
      old_address: address.to_owned(),
      new_address: result.address,
      size: result.size,
      legacy_path,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use record_core::ImageId;
  use record_impl_mock::MockImageStore;
  use storage::UploadPolicy;
  use storage_impl_fs::LocalConfig;
  use storage_impl_memory::MemoryStorage;
  use tempfile::TempDir;

  use super::*;

  const GCS_ADDRESS: &str =
    "https://storage.googleapis.com/bucket/product-images/b.png";

  fn write_legacy(root: &Path, name: &str, data: &[u8]) {
    let dir = root.join("images");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), data).unwrap();
  }

  /// Three records: a migratable file, a cloud address and a missing file.
  async fn scenario() -> (TempDir, MigrationJob<MemoryStorage, MockImageStore>)
  {
    let dir = TempDir::new().unwrap();
    write_legacy(dir.path(), "a.png", b"\x89PNG-a");

    let mut a = ImageRecord::file("a", "/uploads/images/a.png");
    let mut b = ImageRecord::file("b", GCS_ADDRESS);
    let c = ImageRecord::file("c", "/uploads/images/c.png");
    a.created_at = c.created_at - chrono::Duration::minutes(2);
    b.created_at = c.created_at - chrono::Duration::minutes(1);
    let records = MockImageStore::with_records([a, b, c]).await;

    let legacy = LocalStorage::new(LocalConfig::new(dir.path()))
      .await
      .unwrap();
    let target = MemoryStorage::with_namespace("cloud", "product-images");
    (dir, MigrationJob::new(target, legacy, records))
  }

  #[tokio::test]
  async fn test_mixed_records() {
    let (dir, job) = scenario().await;

    let outcome = job.run().await.unwrap();

    assert_eq!(outcome.successful.len(), 1);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.total(), 3);

    let migrated = &outcome.successful[0];
    assert_eq!(migrated.id, ImageId::new("a"));
    assert_eq!(migrated.size, 6);
    assert_eq!(
      migrated.legacy_path,
      std::path::absolute(dir.path()).unwrap().join("images/a.png")
    );
    assert!(job.target().exists(&migrated.new_address).await);

    assert_eq!(outcome.skipped[0].reason, ALREADY_IN_CLOUD);
    assert_eq!(outcome.failed[0].id, ImageId::new("c"));
    assert_eq!(outcome.failed[0].error, LOCAL_FILE_NOT_FOUND);

    let a = job.records().get(&ImageId::new("a")).await.unwrap();
    assert_eq!(a.image_url, migrated.new_address);
    let c = job.records().get(&ImageId::new("c")).await.unwrap();
    assert_eq!(c.image_url, "/uploads/images/c.png");

    // legacy files are never deleted
    assert!(migrated.legacy_path.exists());
  }

  #[tokio::test]
  async fn test_rerun_migrates_nothing_new() {
    let (_dir, job) = scenario().await;

    job.run().await.unwrap();
    let second = job.run().await.unwrap();

    assert!(second.successful.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(second.failed.len(), 1);
    assert_eq!(job.target().put_count(), 1);
  }

  #[tokio::test]
  async fn test_failed_update_is_compensated() {
    let (_dir, job) = scenario().await;
    job.records().fail_updates_for(ImageId::new("a")).await;

    let outcome = job.run().await.unwrap();

    assert!(outcome.successful.is_empty());
    let failed = outcome
      .failed
      .iter()
      .find(|f| f.id == ImageId::new("a"))
      .unwrap();
    assert!(failed.error.starts_with("record update failed"));
    assert_eq!(job.target().put_count(), 1);
    assert!(job.target().is_empty().await);

    let a = job.records().get(&ImageId::new("a")).await.unwrap();
    assert_eq!(a.image_url, "/uploads/images/a.png");
  }

  #[tokio::test]
  async fn test_failed_upload_keeps_record() {
    let (_dir, job) = scenario().await;
    job.target().set_fail_puts(true);

    let outcome = job.run().await.unwrap();

    assert_eq!(outcome.failed.len(), 2);
    assert_eq!(job.records().update_count().await, 0);
  }

  #[tokio::test]
  async fn test_target_policy_rejection_is_failed() {
    let (dir, job) = scenario().await;
    let MigrationJob {
      legacy, records, ..
    } = job;
    let policy =
      UploadPolicy::default().with_allowed_content_types(["image/webp"]);
    let target = MemoryStorage::with_namespace("cloud", "product-images")
      .with_policy(policy);
    let job = MigrationJob::new(target, legacy, records);

    let outcome = job.run().await.unwrap();

    let failed = outcome
      .failed
      .iter()
      .find(|f| f.id == ImageId::new("a"))
      .unwrap();
    assert!(failed.error.starts_with("upload failed"));
    assert_eq!(job.target().put_count(), 0);
    assert!(dir.path().join("images/a.png").exists());
  }

  #[tokio::test]
  async fn test_status_with_local_target_counts_legacy_as_local() {
    let dir = TempDir::new().unwrap();
    let records = MockImageStore::with_records([
      ImageRecord::file("a", "/uploads/images/a.png"),
      ImageRecord::file("b", "http://localhost:5001/uploads/images/b.png"),
      ImageRecord::file("c", GCS_ADDRESS),
    ])
    .await;
    let legacy = LocalStorage::new(LocalConfig::new(dir.path()))
      .await
      .unwrap();
    let target = LocalStorage::new(LocalConfig::new(dir.path()))
      .await
      .unwrap();
    let job = MigrationJob::new(target, legacy, records);

    let report = job.status().await.unwrap();

    assert_eq!(report.local_count, 2);
    assert_eq!(report.cloud_count, 1);
    assert!(report.needs_migration());
  }

  #[tokio::test]
  async fn test_status_before_and_after() {
    let (_dir, job) = scenario().await;

    let before = job.status().await.unwrap();
    assert_eq!(before.local_count, 2);
    assert_eq!(before.cloud_count, 1);

    job.run().await.unwrap();
    let after = job.status().await.unwrap();
    assert_eq!(after.local_count, 1);
    assert_eq!(after.cloud_count, 2);
    assert_eq!(after.local_sample, vec!["/uploads/images/c.png".to_owned()]);
  }
}
