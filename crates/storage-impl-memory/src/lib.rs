//! In-memory implementation of the object storage contract.

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use storage_core::{
  AddressResolver, BlobKey, ContainerOptions, ListOptions, ObjectStorageLike,
  StorageError, StorageResult, StoredObject, UploadPolicy, validate_sign_ttl,
};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Default namespace used in `memory://` addresses.
pub const DEFAULT_NAMESPACE: &str = "test";

/// Internal representation of a stored object
#[derive(Debug, Clone)]
struct StoredBlob {
  data:         Bytes,
  content_type: String,
  etag:         String,
  created_at:   DateTime<Utc>,
  metadata:     HashMap<String, String>,
}

#[derive(Debug)]
struct Inner {
  objects:    RwLock<HashMap<String, StoredBlob>>,
  put_count:  AtomicUsize,
  fail_puts:  AtomicBool,
  fail_reads: AtomicBool,
}

/// In-memory implementation of [`ObjectStorageLike`].
///
/// Useful for testing and development. All data is lost when the last clone
/// is dropped. Addresses have the form `memory://{namespace}/{key}`.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
  namespace: String,
  policy:    UploadPolicy,
  resolver:  AddressResolver,
  inner:     Arc<Inner>,
}

impl MemoryStorage {
  /// Creates an empty store with the default namespace and `images` folder.
  #[must_use]
  pub fn new() -> Self { Self::with_namespace(DEFAULT_NAMESPACE, "images") }

  /// Creates an empty store with the given namespace and folder.
  #[must_use]
  pub fn with_namespace(namespace: &str, folder: &str) -> Self {
    let resolver = AddressResolver::new("memory", folder)
      .with_prefix(format!("memory://{namespace}"));
    Self {
      namespace: namespace.to_owned(),
      policy: UploadPolicy::default(),
      resolver,
      inner: Arc::new(Inner {
        objects:    RwLock::new(HashMap::new()),
        put_count:  AtomicUsize::new(0),
        fail_puts:  AtomicBool::new(false),
        fail_reads: AtomicBool::new(false),
      }),
    }
  }

  /// Replaces the upload policy.
  #[must_use]
  pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Number of backend writes attempted so far, including failed ones.
  #[must_use]
  pub fn put_count(&self) -> usize {
    self.inner.put_count.load(Ordering::SeqCst)
  }

  /// Makes every subsequent write fail with [`StorageError::Upload`].
  pub fn set_fail_puts(&self, fail: bool) {
    self.inner.fail_puts.store(fail, Ordering::SeqCst);
  }

  /// Makes every subsequent read fail with [`StorageError::Metadata`].
  pub fn set_fail_reads(&self, fail: bool) {
    self.inner.fail_reads.store(fail, Ordering::SeqCst);
  }

  /// Returns the number of objects currently stored.
  pub async fn len(&self) -> usize { self.inner.objects.read().await.len() }

  /// Returns true if no objects are stored.
  pub async fn is_empty(&self) -> bool {
    self.inner.objects.read().await.is_empty()
  }

  /// Inserts an object directly, bypassing validation and the put counter.
  pub async fn insert_raw(
    &self,
    key: &BlobKey,
    data: Bytes,
    content_type: &str,
  ) {
    let blob = StoredBlob::new(data, content_type.to_owned(), HashMap::new());
    self
      .inner
      .objects
      .write()
      .await
      .insert(key.as_str().to_owned(), blob);
  }

  fn check_reads(&self) -> StorageResult<()> {
    if self.inner.fail_reads.load(Ordering::SeqCst) {
      return Err(StorageError::Metadata(miette::miette!(
        "injected read failure"
      )));
    }
    Ok(())
  }

  fn describe(&self, key: &str, blob: &StoredBlob) -> StoredObject {
    let key = BlobKey::new(key);
    StoredObject {
      address:      self.public_url(&key),
      key,
      size:         blob.data.len() as u64,
      content_type: Some(blob.content_type.clone()),
      created_at:   Some(blob.created_at),
      updated_at:   Some(blob.created_at),
      etag:         Some(blob.etag.clone()),
      metadata:     blob.metadata.clone(),
    }
  }
}

impl StoredBlob {
  fn new(
    data: Bytes,
    content_type: String,
    metadata: HashMap<String, String>,
  ) -> Self {
    let etag = format!("{:x}", md5::compute(&data));
    Self {
      data,
      content_type,
      etag,
      created_at: Utc::now(),
      metadata,
    }
  }
}

impl Default for MemoryStorage {
  fn default() -> Self { Self::new() }
}

#[async_trait]
impl ObjectStorageLike for MemoryStorage {
  fn provider_name(&self) -> &'static str { "memory" }

  fn upload_policy(&self) -> &UploadPolicy { &self.policy }

  fn folder(&self) -> &str { self.resolver.folder() }

  fn public_url(&self, key: &BlobKey) -> String {
    format!("memory://{}/{}", self.namespace, key.as_str())
  }

  fn scheme_address(&self, key: &BlobKey) -> String { self.public_url(key) }

  fn resolve_address(&self, address: &str) -> StorageResult<BlobKey> {
    self.resolver.resolve(address)
  }

  fn recognizes(&self, address: &str) -> bool {
    self.resolver.recognizes(address)
  }

  #[instrument(skip(self, data, metadata), fields(key = %key), err)]
  async fn put_object(
    &self,
    key: &BlobKey,
    data: Bytes,
    content_type: &str,
    metadata: &HashMap<String, String>,
    _public: bool,
  ) -> StorageResult<()> {
    self.inner.put_count.fetch_add(1, Ordering::SeqCst);
    if self.inner.fail_puts.load(Ordering::SeqCst) {
      return Err(StorageError::Upload(miette::miette!(
        "injected write failure for {key}"
      )));
    }

    let blob = StoredBlob::new(data, content_type.to_owned(), metadata.clone());
    self
      .inner
      .objects
      .write()
      .await
      .insert(key.as_str().to_owned(), blob);
    debug!("Stored object in memory");
    Ok(())
  }

  #[instrument(skip(self), err)]
  async fn fetch(&self, address: &str) -> StorageResult<Bytes> {
    self.check_reads()?;
    let key = self.resolve_address(address)?;
    let objects = self.inner.objects.read().await;
    objects
      .get(key.as_str())
      .map(|blob| blob.data.clone())
      .ok_or(StorageError::NotFound(key))
  }

  #[instrument(skip(self), err)]
  async fn delete(&self, address: &str) -> StorageResult<bool> {
    let key = self.resolve_address(address)?;
    let removed = self.inner.objects.write().await.remove(key.as_str());
    debug!(existed = removed.is_some(), "Deleted object from memory");
    Ok(true)
  }

  #[instrument(skip(self), err)]
  async fn stat(&self, address: &str) -> StorageResult<StoredObject> {
    self.check_reads()?;
    let key = self.resolve_address(address)?;
    let objects = self.inner.objects.read().await;
    let blob = objects
      .get(key.as_str())
      .ok_or_else(|| StorageError::NotFound(key.clone()))?;
    Ok(self.describe(key.as_str(), blob))
  }

  #[instrument(skip(self), err)]
  async fn sign(&self, address: &str, ttl: Duration) -> StorageResult<String> {
    validate_sign_ttl(ttl)?;
    let key = self.resolve_address(address)?;
    if !self.inner.objects.read().await.contains_key(key.as_str()) {
      return Err(StorageError::NotFound(key));
    }
    Ok(format!("{}?expires={}", self.public_url(&key), ttl.as_secs()))
  }

  async fn exists(&self, address: &str) -> bool {
    let Ok(key) = self.resolve_address(address) else {
      return false;
    };
    self.inner.objects.read().await.contains_key(key.as_str())
  }

  #[instrument(skip(self), err)]
  async fn enumerate(
    &self,
    prefix: Option<&str>,
    options: ListOptions,
  ) -> StorageResult<Vec<StoredObject>> {
    self.check_reads()?;
    let prefix = prefix.map_or_else(
      || format!("{}/", self.folder()),
      |p| p.trim_start_matches('/').to_owned(),
    );

    let objects = self.inner.objects.read().await;
    let mut keys: Vec<&String> =
      objects.keys().filter(|k| k.starts_with(&prefix)).collect();
    keys.sort();

    Ok(
      keys
        .into_iter()
        .take(options.effective_limit())
        .filter_map(|k| objects.get(k).map(|blob| self.describe(k, blob)))
        .collect(),
    )
  }

  async fn ensure_container(
    &self,
    _options: ContainerOptions,
  ) -> StorageResult<()> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use storage_core::StoreOptions;

  use super::*;

  #[tokio::test]
  async fn test_store_and_fetch() {
    let storage = MemoryStorage::new();

    let result = storage
      .store(
        Bytes::from("hello world"),
        "a.png",
        "image/png",
        StoreOptions::default(),
      )
      .await
      .unwrap();

    assert!(result.address.starts_with("memory://test/images/"));
    assert!(storage.recognizes(&result.address));
    assert_eq!(
      storage.fetch(&result.address).await.unwrap(),
      Bytes::from("hello world")
    );
    assert_eq!(storage.put_count(), 1);
    assert_eq!(storage.len().await, 1);
  }

  #[tokio::test]
  async fn test_injected_put_failure_counts_attempt() {
    let storage = MemoryStorage::new();
    storage.set_fail_puts(true);

    let err = storage
      .store(Bytes::from("x"), "a.png", "image/png", StoreOptions::default())
      .await
      .unwrap_err();

    assert!(matches!(err, StorageError::Upload(_)));
    assert_eq!(storage.put_count(), 1);
    assert!(storage.is_empty().await);
  }

  #[tokio::test]
  async fn test_delete_is_idempotent() {
    let storage = MemoryStorage::new();
    let key = BlobKey::new("images/a.png");
    storage.insert_raw(&key, Bytes::from("x"), "image/png").await;

    assert!(storage.delete("memory://test/images/a.png").await.unwrap());
    assert!(storage.delete("memory://test/images/a.png").await.unwrap());
    assert!(!storage.exists("a.png").await);
  }

  #[tokio::test]
  async fn test_sign_checks_ttl() {
    let storage = MemoryStorage::new();
    let key = BlobKey::new("images/a.png");
    storage.insert_raw(&key, Bytes::from("x"), "image/png").await;

    let url = storage
      .sign("a.png", Duration::from_secs(60))
      .await
      .unwrap();
    assert_eq!(url, "memory://test/images/a.png?expires=60");

    assert!(matches!(
      storage.sign("a.png", Duration::ZERO).await,
      Err(StorageError::Signing(_))
    ));
  }
}
