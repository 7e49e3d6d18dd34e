use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use storage_core::{
  BlobKey, ContainerOptions, ListOptions, ObjectStorageLike,
  ProviderCapabilities, ProviderKind, StorageResult, StoreOptions,
  StoredObject, UploadPolicy, UploadResult, UsageReport,
};
use storage_impl_fs::LocalStorage;
use storage_impl_gcs::GcsStorage;
use storage_impl_s3::S3Storage;

/// A provider selected by the factory.
///
/// The provider set is closed, so dispatch is a plain `match`.
#[derive(Debug)]
pub enum ObjectStorage {
  /// Local filesystem provider.
  Local(LocalStorage),
  /// Google Cloud Storage provider.
  Gcs(GcsStorage),
  /// S3 provider.
  S3(S3Storage),
}

macro_rules! dispatch {
  ($self:ident, $inner:ident => $body:expr) => {
    match $self {
      ObjectStorage::Local($inner) => $body,
      ObjectStorage::Gcs($inner) => $body,
      ObjectStorage::S3($inner) => $body,
    }
  };
}

impl ObjectStorage {
  /// The kind of the wrapped provider.
  #[must_use]
  pub const fn kind(&self) -> ProviderKind {
    match self {
      ObjectStorage::Local(_) => ProviderKind::Local,
      ObjectStorage::Gcs(_) => ProviderKind::Gcs,
      ObjectStorage::S3(_) => ProviderKind::S3,
    }
  }

  /// The static capability flags of the wrapped provider.
  #[must_use]
  pub const fn capabilities(&self) -> ProviderCapabilities {
    self.kind().capabilities()
  }
}

#[async_trait]
impl ObjectStorageLike for ObjectStorage {
  fn provider_name(&self) -> &'static str {
    dispatch!(self, s => s.provider_name())
  }

  fn upload_policy(&self) -> &UploadPolicy {
    dispatch!(self, s => s.upload_policy())
  }

  fn folder(&self) -> &str { dispatch!(self, s => s.folder()) }

  fn public_url(&self, key: &BlobKey) -> String {
    dispatch!(self, s => s.public_url(key))
  }

  fn scheme_address(&self, key: &BlobKey) -> String {
    dispatch!(self, s => s.scheme_address(key))
  }

  fn resolve_address(&self, address: &str) -> StorageResult<BlobKey> {
    dispatch!(self, s => s.resolve_address(address))
  }

  fn recognizes(&self, address: &str) -> bool {
    dispatch!(self, s => s.recognizes(address))
  }

  async fn put_object(
    &self,
    key: &BlobKey,
    data: Bytes,
    content_type: &str,
    metadata: &HashMap<String, String>,
    public: bool,
  ) -> StorageResult<()> {
    dispatch!(self, s => {
      s.put_object(key, data, content_type, metadata, public).await
    })
  }

  async fn fetch(&self, address: &str) -> StorageResult<Bytes> {
    dispatch!(self, s => s.fetch(address).await)
  }

  async fn delete(&self, address: &str) -> StorageResult<bool> {
    dispatch!(self, s => s.delete(address).await)
  }

  async fn stat(&self, address: &str) -> StorageResult<StoredObject> {
    dispatch!(self, s => s.stat(address).await)
  }

  async fn sign(&self, address: &str, ttl: Duration) -> StorageResult<String> {
    dispatch!(self, s => s.sign(address, ttl).await)
  }

  async fn exists(&self, address: &str) -> bool {
    dispatch!(self, s => s.exists(address).await)
  }

  async fn enumerate(
    &self,
    prefix: Option<&str>,
    options: ListOptions,
  ) -> StorageResult<Vec<StoredObject>> {
    dispatch!(self, s => s.enumerate(prefix, options).await)
  }

  async fn ensure_container(
    &self,
    options: ContainerOptions,
  ) -> StorageResult<()> {
    dispatch!(self, s => s.ensure_container(options).await)
  }

  async fn store(
    &self,
    data: Bytes,
    desired_name: &str,
    content_type: &str,
    options: StoreOptions,
  ) -> StorageResult<UploadResult> {
    dispatch!(self, s => s.store(data, desired_name, content_type, options).await)
  }

  async fn report_usage(&self) -> StorageResult<UsageReport> {
    dispatch!(self, s => s.report_usage().await)
  }
}
