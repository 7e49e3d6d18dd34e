//! Filesystem-based implementation of the object storage contract.

mod config;

use std::{
  collections::HashMap,
  io,
  path::{Path, PathBuf},
  time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storage_core::{
  AddressResolver, BlobKey, ContainerOptions, ListOptions, ObjectStorageLike,
  StorageError, StorageResult, StoredObject, UploadPolicy, mime,
};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

pub use self::config::{
  DEFAULT_BASE_PATH, DEFAULT_BASE_URL, DEFAULT_FOLDER, LocalConfig,
};

/// Suffix of the sidecar file holding an object's metadata.
const SIDECAR_SUFFIX: &str = ".meta";

/// Metadata persisted next to each object, standing in for native object
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SidecarMetadata {
  content_type: String,
  size:         u64,
  etag:         String,
  created_at:   DateTime<Utc>,
  updated_at:   DateTime<Utc>,
  #[serde(default)]
  metadata:     HashMap<String, String>,
}

/// Filesystem-based implementation of [`ObjectStorageLike`].
///
/// Objects are files under the root directory; each object's metadata lives
/// in a JSON sidecar file next to it. Addresses are URLs under the configured
/// base URL.
#[derive(Debug, Clone)]
pub struct LocalStorage {
  /// Absolute root directory
  root_path: PathBuf,
  config:    LocalConfig,
  resolver:  AddressResolver,
}

impl LocalStorage {
  /// Creates a new filesystem-based storage.
  ///
  /// # Errors
  /// Returns an error if the root directory cannot be created.
  #[instrument(skip(config), fields(path = ?config.base_path))]
  pub async fn new(config: LocalConfig) -> StorageResult<Self> {
    info!("Creating filesystem object storage");

    fs::create_dir_all(&config.base_path).await.map_err(|e| {
      error!(error = ?e, "Failed to create root directory");
      StorageError::Configuration(miette::miette!(
        "could not create local storage root {}: {e}",
        config.base_path.display()
      ))
    })?;
    let root_path = std::path::absolute(&config.base_path)?;

    let mut resolver = AddressResolver::new("local", config.folder.clone())
      .with_prefix(config.trimmed_base_url())
      .with_prefix(format!("file://{}", root_path.display()));
    if let Some(server_path) = config.server_path() {
      resolver = resolver.with_prefix(server_path);
    }

    Ok(Self {
      root_path,
      config,
      resolver,
    })
  }

  /// The absolute root directory.
  #[must_use]
  pub fn root_path(&self) -> &Path { &self.root_path }

  /// Returns the file path for a given key
  #[must_use]
  pub fn blob_path(&self, key: &BlobKey) -> PathBuf {
    self.root_path.join(key.as_str())
  }

  /// Returns the sidecar path for a given key
  fn metadata_path(&self, key: &BlobKey) -> PathBuf {
    self
      .root_path
      .join(format!("{}{SIDECAR_SUFFIX}", key.as_str()))
  }

  /// Computes the MD5 hash of data
  fn compute_etag(data: &[u8]) -> String { format!("{:x}", md5::compute(data)) }

  /// Reads metadata from a sidecar file
  async fn read_metadata(
    &self,
    key: &BlobKey,
  ) -> StorageResult<SidecarMetadata> {
    let metadata_path = self.metadata_path(key);

    let content = fs::read_to_string(&metadata_path).await?;

    serde_json::from_str(&content).map_err(|e| {
      warn!(error = ?e, path = ?metadata_path, "Failed to parse sidecar JSON");
      StorageError::Metadata(miette::miette!(
        "Failed to parse sidecar {}: {e}",
        metadata_path.display()
      ))
    })
  }

  /// Writes metadata to a sidecar file
  async fn write_metadata(
    &self,
    key: &BlobKey,
    metadata: &SidecarMetadata,
  ) -> StorageResult<()> {
    let metadata_path = self.metadata_path(key);

    let content = serde_json::to_string_pretty(metadata).map_err(|e| {
      error!(error = ?e, "Failed to serialize sidecar metadata");
      StorageError::Upload(miette::miette!(
        "Failed to serialize metadata: {e}"
      ))
    })?;

    fs::write(&metadata_path, content).await.map_err(|e| {
      error!(error = ?e, path = ?metadata_path, "Failed to write sidecar file");
      StorageError::Upload(miette::miette!(
        "Failed to write sidecar {}: {e}",
        metadata_path.display()
      ))
    })
  }

  /// Builds a [`StoredObject`], preferring the sidecar and falling back to
  /// filesystem attributes.
  async fn describe(
    &self,
    key: &BlobKey,
    blob_path: &Path,
  ) -> StorageResult<StoredObject> {
    let address = self.public_url(key);

    match self.read_metadata(key).await {
      Ok(sidecar) => Ok(StoredObject {
        address,
        key: key.clone(),
        size: sidecar.size,
        content_type: Some(sidecar.content_type),
        created_at: Some(sidecar.created_at),
        updated_at: Some(sidecar.updated_at),
        etag: Some(sidecar.etag),
        metadata: sidecar.metadata,
      }),
      Err(e) => {
        debug!(error = %e, "Sidecar unavailable, using filesystem attributes");
        let file_metadata = fs::metadata(blob_path).await.map_err(|e| {
          if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(key.clone())
          } else {
            error!(error = ?e, path = ?blob_path, "Failed to read file metadata");
            StorageError::Metadata(miette::miette!(
              "Failed to stat {}: {e}",
              blob_path.display()
            ))
          }
        })?;

        Ok(StoredObject {
          address,
          key: key.clone(),
          size: file_metadata.len(),
          content_type: mime::guess_content_type(key.as_str())
            .map(ToOwned::to_owned),
          created_at: file_metadata.created().ok().map(DateTime::from),
          updated_at: file_metadata.modified().ok().map(DateTime::from),
          etag: None,
          metadata: HashMap::new(),
        })
      }
    }
  }

  /// Converts a path under the root into a key with `/` separators.
  fn key_for_path(&self, path: &Path) -> Option<BlobKey> {
    let relative = path.strip_prefix(&self.root_path).ok()?;
    let parts: Vec<_> = relative
      .components()
      .map(|c| c.as_os_str().to_string_lossy().into_owned())
      .collect();
    Some(BlobKey::new(parts.join("/")))
  }
}

#[async_trait]
impl ObjectStorageLike for LocalStorage {
  fn provider_name(&self) -> &'static str { "local" }

  fn upload_policy(&self) -> &UploadPolicy { &self.config.policy }

  fn folder(&self) -> &str { self.resolver.folder() }

  fn public_url(&self, key: &BlobKey) -> String {
    format!("{}/{}", self.config.trimmed_base_url(), key.as_str())
  }

  fn scheme_address(&self, key: &BlobKey) -> String {
    format!("file://{}", self.blob_path(key).display())
  }

  fn resolve_address(&self, address: &str) -> StorageResult<BlobKey> {
    self.resolver.resolve(address)
  }

  fn recognizes(&self, address: &str) -> bool {
    self.resolver.recognizes(address)
  }

  #[instrument(
    skip(self, data, metadata),
    fields(key = %key, size = data.len()),
    err
  )]
  async fn put_object(
    &self,
    key: &BlobKey,
    data: Bytes,
    content_type: &str,
    metadata: &HashMap<String, String>,
    _public: bool,
  ) -> StorageResult<()> {
    debug!("Writing object file");

    let blob_path = self.blob_path(key);

    // Create parent directories if they don't exist
    if let Some(parent) = blob_path.parent() {
      fs::create_dir_all(parent).await.map_err(|e| {
        error!(error = ?e, "Failed to create parent directories");
        StorageError::Upload(miette::miette!(
          "Failed to create {}: {e}",
          parent.display()
        ))
      })?;
    }

    fs::write(&blob_path, &data).await.map_err(|e| {
      error!(error = ?e, path = ?blob_path, "Failed to write object file");
      StorageError::Upload(miette::miette!(
        "Failed to write {}: {e}",
        blob_path.display()
      ))
    })?;

    let now = Utc::now();
    let sidecar = SidecarMetadata {
      content_type: content_type.to_owned(),
      size:         data.len() as u64,
      etag:         Self::compute_etag(&data),
      created_at:   now,
      updated_at:   now,
      metadata:     metadata.clone(),
    };

    if let Err(e) = self.write_metadata(key, &sidecar).await {
      // an object without its sidecar would still be served, so undo it
      let _ = fs::remove_file(&blob_path).await;
      return Err(e);
    }

    info!("Object written successfully");
    Ok(())
  }

  #[instrument(skip(self), err)]
  async fn fetch(&self, address: &str) -> StorageResult<Bytes> {
    let key = self.resolve_address(address)?;
    let blob_path = self.blob_path(&key);

    let data = fs::read(&blob_path).await.map_err(|e| {
      if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound(key.clone())
      } else {
        error!(error = ?e, path = ?blob_path, "Failed to read object file");
        StorageError::Metadata(miette::miette!(
          "Failed to read {}: {e}",
          blob_path.display()
        ))
      }
    })?;

    debug!(size = data.len(), "Read object file");
    Ok(Bytes::from(data))
  }

  #[instrument(skip(self), err)]
  async fn delete(&self, address: &str) -> StorageResult<bool> {
    let key = self.resolve_address(address)?;
    let blob_path = self.blob_path(&key);
    let metadata_path = self.metadata_path(&key);

    let removed = match fs::remove_file(&blob_path).await {
      Ok(()) => true,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        warn!(path = ?blob_path, "Object file already absent");
        false
      }
      Err(e) => {
        error!(error = ?e, path = ?blob_path, "Failed to delete object file");
        return Err(StorageError::Delete(miette::miette!(
          "Failed to delete {}: {e}",
          blob_path.display()
        )));
      }
    };

    match fs::remove_file(&metadata_path).await {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => {
        warn!(error = ?e, path = ?metadata_path, "Failed to delete sidecar file");
      }
    }

    info!(removed, "Object deleted");
    Ok(removed)
  }

  #[instrument(skip(self), err)]
  async fn stat(&self, address: &str) -> StorageResult<StoredObject> {
    let key = self.resolve_address(address)?;
    let blob_path = self.blob_path(&key);

    if !fs::try_exists(&blob_path).await.unwrap_or(false) {
      debug!("Object not found");
      return Err(StorageError::NotFound(key));
    }

    self.describe(&key, &blob_path).await
  }

  #[instrument(skip(self), fields(ttl_secs = ttl.as_secs()), err)]
  async fn sign(&self, address: &str, ttl: Duration) -> StorageResult<String> {
    // no signing on local disk, hand out the public URL instead
    let key = self.resolve_address(address)?;
    debug!("Local storage cannot sign URLs, returning public URL");
    Ok(self.public_url(&key))
  }

  async fn exists(&self, address: &str) -> bool {
    let Ok(key) = self.resolve_address(address) else {
      return false;
    };
    fs::metadata(self.blob_path(&key))
      .await
      .is_ok_and(|m| m.is_file())
  }

  #[instrument(skip(self), err)]
  async fn enumerate(
    &self,
    prefix: Option<&str>,
    options: ListOptions,
  ) -> StorageResult<Vec<StoredObject>> {
    let prefix = match prefix {
      Some(p) => p.trim_start_matches('/').to_owned(),
      None => format!("{}/", self.folder()),
    };
    let limit = options.effective_limit();

    // walk from the deepest directory the prefix fully names
    let start_dir = match prefix.rfind('/') {
      Some(idx) => self.root_path.join(&prefix[..idx]),
      None => self.root_path.clone(),
    };

    let mut keys = Vec::new();
    let mut pending = vec![start_dir];
    while let Some(dir) = pending.pop() {
      let mut entries = match fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
        Err(e) => {
          error!(error = ?e, path = ?dir, "Failed to read directory");
          return Err(StorageError::Listing(miette::miette!(
            "Failed to read {}: {e}",
            dir.display()
          )));
        }
      };

      while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
          pending.push(path);
          continue;
        }
        if path.to_string_lossy().ends_with(SIDECAR_SUFFIX) {
          continue;
        }
        let Some(key) = self.key_for_path(&path) else {
          continue;
        };
        if key.as_str().starts_with(&prefix) {
          keys.push((key, path));
        }
      }
    }

    // the limit applies to the first keys in order, not to walk order
    keys.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    keys.truncate(limit);

    let mut objects = Vec::with_capacity(keys.len());
    for (key, path) in keys {
      objects.push(self.describe(&key, &path).await?);
    }

    debug!(count = objects.len(), "Enumerated objects");
    Ok(objects)
  }

  #[instrument(skip(self), err)]
  async fn ensure_container(
    &self,
    _options: ContainerOptions,
  ) -> StorageResult<()> {
    let dir = self.root_path.join(self.folder());
    fs::create_dir_all(&dir).await.map_err(|e| {
      error!(error = ?e, path = ?dir, "Failed to create folder");
      StorageError::Container(miette::miette!(
        "Failed to create {}: {e}",
        dir.display()
      ))
    })?;
    info!(path = ?dir, "Local folder ready");
    Ok(())
  }
}
