//! The contract every object-storage backend implements.
//!
//! [`ObjectStorageLike`] is the provider contract. Backends implement the
//! primitive operations; [`ObjectStorageLike::store`] and
//! [`ObjectStorageLike::report_usage`] are provided on top of them so that
//! validation and naming behave identically everywhere.

pub mod address;
mod error;
pub mod mime;
pub mod naming;
mod policy;
mod presign;
mod types;
mod usage;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
pub use bytes::Bytes;
pub use storage_types::{
  BlobKey, ProviderCapabilities, ProviderKind, is_cloud_address,
};
use tracing::{debug, info};

pub use self::{
  address::AddressResolver,
  error::{StorageError, StorageResult, ValidationError},
  policy::{DEFAULT_ALLOWED_CONTENT_TYPES, UploadPolicy, normalize_content_type},
  presign::{MAX_SIGN_TTL, validate_sign_ttl},
  types::{
    ContainerOptions, DEFAULT_LIST_LIMIT, ListOptions, META_ORIGINAL_NAME,
    META_UPLOADED_AT, META_UPLOADED_BY, StoreOptions, StoredObject,
    UploadResult,
  },
  usage::{ContentTypeUsage, DatedKey, UsageReport},
};

/// The provider contract.
///
/// Every operation is independently retryable by the caller; implementations
/// perform no retries of their own.
#[async_trait]
pub trait ObjectStorageLike: Send + Sync {
  /// Short backend name used in logs and errors.
  fn provider_name(&self) -> &'static str;

  /// The input policy enforced by [`store`](Self::store).
  fn upload_policy(&self) -> &UploadPolicy;

  /// The logical folder new objects are stored under.
  fn folder(&self) -> &str;

  /// The canonical public URL of a key.
  fn public_url(&self, key: &BlobKey) -> String;

  /// The scheme-prefixed short address of a key (e.g. `gs://bucket/key`).
  fn scheme_address(&self, key: &BlobKey) -> String;

  /// Resolves a stored address or bare name to a backend-native key.
  fn resolve_address(&self, address: &str) -> StorageResult<BlobKey>;

  /// Whether the address is in one of this backend's own URL or scheme forms.
  fn recognizes(&self, address: &str) -> bool;

  /// Writes an already-validated object under `key`.
  async fn put_object(
    &self,
    key: &BlobKey,
    data: Bytes,
    content_type: &str,
    metadata: &HashMap<String, String>,
    public: bool,
  ) -> StorageResult<()>;

  /// Reads the full content of an object.
  async fn fetch(&self, address: &str) -> StorageResult<Bytes>;

  /// Deletes an object. Returns `true` if the object is gone afterwards.
  async fn delete(&self, address: &str) -> StorageResult<bool>;

  /// Reads an object's attributes.
  async fn stat(&self, address: &str) -> StorageResult<StoredObject>;

  /// Produces a time-limited URL for the object.
  async fn sign(&self, address: &str, ttl: Duration) -> StorageResult<String>;

  /// Whether the object exists. Failures collapse to `false`.
  async fn exists(&self, address: &str) -> bool;

  /// Lists objects under `prefix` (defaults to the configured folder).
  async fn enumerate(
    &self,
    prefix: Option<&str>,
    options: ListOptions,
  ) -> StorageResult<Vec<StoredObject>>;

  /// Creates the bucket or directory if it does not exist yet.
  async fn ensure_container(
    &self,
    options: ContainerOptions,
  ) -> StorageResult<()>;

  /// Validates, names and stores an object.
  ///
  /// Validation happens before any backend call. The returned address is the
  /// public URL, or the scheme form when `options.public` is false.
  async fn store(
    &self,
    data: Bytes,
    desired_name: &str,
    content_type: &str,
    options: StoreOptions,
  ) -> StorageResult<UploadResult> {
    let size = data.len() as u64;
    let content_type = self.upload_policy().validate(
      content_type,
      size,
      options.allowed_content_types.as_deref(),
    )?;

    let name = naming::generate_object_name(options.prefix.as_deref(), desired_name);
    let key = BlobKey::join(self.folder(), &name);
    debug!(
      provider = self.provider_name(),
      key = %key,
      size,
      "Storing object"
    );

    let mut stored_metadata = options.metadata.clone();
    stored_metadata.insert(META_ORIGINAL_NAME.to_owned(), desired_name.to_owned());
    stored_metadata.insert(
      META_UPLOADED_AT.to_owned(),
      chrono::Utc::now().to_rfc3339(),
    );
    if let Some(uploaded_by) = &options.uploaded_by {
      stored_metadata.insert(META_UPLOADED_BY.to_owned(), uploaded_by.clone());
    }

    self
      .put_object(&key, data, &content_type, &stored_metadata, options.public)
      .await?;

    let address = if options.public {
      self.public_url(&key)
    } else {
      self.scheme_address(&key)
    };
    info!(provider = self.provider_name(), %address, "Object stored");

    Ok(UploadResult {
      success: true,
      address,
      name,
      key,
      size,
      content_type,
      metadata: options.metadata,
    })
  }

  /// Aggregates usage over every object under the configured folder.
  ///
  /// This is a full scan, meant for diagnostics rather than hot paths.
  async fn report_usage(&self) -> StorageResult<UsageReport> {
    let objects = self.enumerate(None, ListOptions::unbounded()).await?;
    Ok(UsageReport::aggregate(&objects))
  }
}
