//! An implementation of the object storage contract for Google Cloud Storage.
//!
//! Object I/O and URL signing go through `object_store`'s GCP backend. Bucket
//! creation and per-object ACLs are not covered by `object_store`, so those
//! use the JSON API directly with the same credentials.

mod config;
mod errors;

use std::{borrow::Cow, collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::{
  Attribute, AttributeValue, Attributes, CredentialProvider, GetOptions,
  ObjectMeta, ObjectStore, PutOptions, PutPayload,
  gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder},
  path::Path as ObjectPath,
  signer::Signer,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use storage_core::{
  AddressResolver, BlobKey, ContainerOptions, ListOptions, ObjectStorageLike,
  StorageError, StorageResult, StoredObject, UploadPolicy, mime,
  validate_sign_ttl,
};
use tracing::{debug, error, info, instrument, warn};

pub use self::config::{DEFAULT_FOLDER, GcsConfig};
use self::errors::{json_api_error, object_store_error_to_storage_error};

/// Host of the public object URLs.
const PUBLIC_HOST: &str = "https://storage.googleapis.com";
/// Host of the browser-authenticated object URLs.
const AUTHENTICATED_HOST: &str = "https://storage.cloud.google.com";
/// Base of the JSON API.
const JSON_API: &str = "https://storage.googleapis.com/storage/v1";

/// [`ObjectStorageLike`] implementer for Google Cloud Storage.
#[derive(Debug)]
pub struct GcsStorage {
  store:    GoogleCloudStorage,
  http:     reqwest::Client,
  config:   GcsConfig,
  resolver: AddressResolver,
}

impl GcsStorage {
  /// Creates a new [`GcsStorage`]. No network calls are made.
  #[instrument(skip(config), fields(bucket = %config.bucket))]
  pub fn new(config: GcsConfig) -> StorageResult<Self> {
    debug!(
      project_id = ?config.project_id,
      credentials_path = ?config.credentials_path,
      "Initializing GCS object storage"
    );

    let mut builder =
      GoogleCloudStorageBuilder::new().with_bucket_name(&config.bucket);
    match &config.credentials_path {
      Some(path) => {
        builder =
          builder.with_application_credentials(path.to_string_lossy());
      }
      None => {
        warn!("No GCS credentials file, using application default credentials");
      }
    }

    let store = builder.build().map_err(|e| {
      error!(error = ?e, "Failed to build GCS client");
      StorageError::Configuration(miette::Report::from_err(e))
    })?;

    let resolver = build_resolver(&config);

    info!("GCS object storage initialized successfully");
    Ok(Self {
      store,
      http: reqwest::Client::new(),
      config,
      resolver,
    })
  }

  /// The bucket name.
  #[must_use]
  pub fn bucket_name(&self) -> &str { &self.config.bucket }

  fn object_path(key: &BlobKey) -> ObjectPath { ObjectPath::from(key.as_str()) }

  async fn bearer_token(
    &self,
    wrap: fn(miette::Report) -> StorageError,
  ) -> StorageResult<String> {
    let credential =
      self.store.credentials().get_credential().await.map_err(|e| {
        error!(error = ?e, "Failed to obtain GCS access token");
        wrap(miette::Report::from_err(e))
      })?;
    Ok(credential.bearer.clone())
  }

  /// Grants `allUsers` read access to an object. Buckets with uniform
  /// bucket-level access reject object ACLs, so failures only warn.
  async fn make_public(&self, key: &BlobKey) {
    let url = format!(
      "{JSON_API}/b/{}/o/{}/acl",
      self.config.bucket,
      utf8_percent_encode(key.as_str(), NON_ALPHANUMERIC)
    );

    let result = async {
      let token = self.bearer_token(StorageError::Upload).await?;
      self
        .http
        .post(url)
        .bearer_auth(token)
        .json(&serde_json::json!({ "entity": "allUsers", "role": "READER" }))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| json_api_error(e, StorageError::Upload))?;
      Ok::<_, StorageError>(())
    }
    .await;

    if let Err(e) = result {
      warn!(
        error = %e,
        key = %key,
        "Could not apply public-read ACL; the bucket may use uniform access"
      );
    }
  }

  fn describe(
    &self,
    meta: ObjectMeta,
    attributes: Option<&Attributes>,
  ) -> StoredObject {
    let key = BlobKey::new(meta.location.to_string());

    let mut content_type = None;
    let mut metadata = HashMap::new();
    if let Some(attributes) = attributes {
      for (attribute, value) in attributes.iter() {
        match attribute {
          Attribute::ContentType => {
            content_type = Some(value.as_ref().to_owned());
          }
          Attribute::Metadata(name) => {
            metadata.insert(name.to_string(), value.as_ref().to_owned());
          }
          _ => {}
        }
      }
    }
    let content_type = content_type.or_else(|| {
      mime::guess_content_type(key.as_str()).map(ToOwned::to_owned)
    });

    StoredObject {
      address: self.public_url(&key),
      key,
      size: meta.size,
      content_type,
      created_at: Some(meta.last_modified),
      updated_at: Some(meta.last_modified),
      etag: meta.e_tag,
      metadata,
    }
  }
}

fn build_resolver(config: &GcsConfig) -> AddressResolver {
  let bucket = &config.bucket;
  AddressResolver::new("gcs", config.folder.clone())
    .with_prefix(format!("{PUBLIC_HOST}/{bucket}"))
    .with_prefix(format!("{AUTHENTICATED_HOST}/{bucket}"))
    .with_prefix(format!("gs://{bucket}"))
}

fn public_url_for(bucket: &str, key: &BlobKey) -> String {
  format!("{PUBLIC_HOST}/{bucket}/{}", key.as_str())
}

#[async_trait]
impl ObjectStorageLike for GcsStorage {
  fn provider_name(&self) -> &'static str { "gcs" }

  fn upload_policy(&self) -> &UploadPolicy { &self.config.policy }

  fn folder(&self) -> &str { self.resolver.folder() }

  fn public_url(&self, key: &BlobKey) -> String {
    public_url_for(&self.config.bucket, key)
  }

  fn scheme_address(&self, key: &BlobKey) -> String {
    format!("gs://{}/{}", self.config.bucket, key.as_str())
  }

  fn resolve_address(&self, address: &str) -> StorageResult<BlobKey> {
    self.resolver.resolve(address)
  }

  fn recognizes(&self, address: &str) -> bool {
    self.resolver.recognizes(address)
  }

  #[instrument(
    skip(self, data, metadata),
    fields(
      key = %key,
      bucket = %self.config.bucket,
      content_type = content_type,
      size = data.len(),
    ),
    err
  )]
  async fn put_object(
    &self,
    key: &BlobKey,
    data: Bytes,
    content_type: &str,
    metadata: &HashMap<String, String>,
    public: bool,
  ) -> StorageResult<()> {
    debug!("Starting object upload");

    let mut attributes = Attributes::new();
    attributes.insert(
      Attribute::ContentType,
      AttributeValue::from(content_type.to_owned()),
    );
    for (name, value) in metadata {
      attributes.insert(
        Attribute::Metadata(Cow::Owned(name.clone())),
        AttributeValue::from(value.clone()),
      );
    }
    let options = PutOptions {
      attributes,
      ..Default::default()
    };

    self
      .store
      .put_opts(&Self::object_path(key), PutPayload::from(data), options)
      .await
      .map_err(|e| {
        error!(error = ?e, "Failed to upload object");
        object_store_error_to_storage_error(e, key, StorageError::Upload)
      })?;

    if public {
      self.make_public(key).await;
    }

    info!("Object uploaded successfully");
    Ok(())
  }

  #[instrument(skip(self), fields(bucket = %self.config.bucket), err)]
  async fn fetch(&self, address: &str) -> StorageResult<Bytes> {
    let key = self.resolve_address(address)?;
    debug!(key = %key, "Retrieving object");

    let map_err = |e| {
      object_store_error_to_storage_error(e, &key, StorageError::Metadata)
    };
    let result = self
      .store
      .get(&Self::object_path(&key))
      .await
      .map_err(map_err)?;
    result.bytes().await.map_err(map_err)
  }

  #[instrument(skip(self), fields(bucket = %self.config.bucket), err)]
  async fn delete(&self, address: &str) -> StorageResult<bool> {
    let key = self.resolve_address(address)?;
    debug!(key = %key, "Deleting object");

    match self.store.delete(&Self::object_path(&key)).await {
      Ok(()) => {}
      Err(object_store::Error::NotFound { .. }) => {
        debug!("Object was already absent");
      }
      Err(e) => {
        error!(error = ?e, "Failed to delete object");
        return Err(object_store_error_to_storage_error(
          e,
          &key,
          StorageError::Delete,
        ));
      }
    }

    info!("Object deleted successfully");
    Ok(true)
  }

  #[instrument(skip(self), fields(bucket = %self.config.bucket), err)]
  async fn stat(&self, address: &str) -> StorageResult<StoredObject> {
    let key = self.resolve_address(address)?;
    debug!(key = %key, "Fetching object metadata");

    let options = GetOptions {
      head: true,
      ..Default::default()
    };
    let result = self
      .store
      .get_opts(&Self::object_path(&key), options)
      .await
      .map_err(|e| {
        object_store_error_to_storage_error(e, &key, StorageError::Metadata)
      })?;

    Ok(self.describe(result.meta, Some(&result.attributes)))
  }

  #[instrument(
    skip(self),
    fields(bucket = %self.config.bucket, ttl_secs = ttl.as_secs()),
    err
  )]
  async fn sign(&self, address: &str, ttl: Duration) -> StorageResult<String> {
    validate_sign_ttl(ttl)?;
    let key = self.resolve_address(address)?;

    let url = self
      .store
      .signed_url(reqwest::Method::GET, &Self::object_path(&key), ttl)
      .await
      .map_err(|e| {
        error!(error = ?e, "Failed to generate signed URL");
        object_store_error_to_storage_error(e, &key, StorageError::Signing)
      })?;

    info!("Signed URL generated successfully");
    Ok(url.to_string())
  }

  async fn exists(&self, address: &str) -> bool {
    let Ok(key) = self.resolve_address(address) else {
      return false;
    };
    match self.store.head(&Self::object_path(&key)).await {
      Ok(_) => true,
      Err(e) => {
        debug!(error = ?e, key = %key, "Existence check returned false");
        false
      }
    }
  }

  #[instrument(skip(self), fields(bucket = %self.config.bucket), err)]
  async fn enumerate(
    &self,
    prefix: Option<&str>,
    options: ListOptions,
  ) -> StorageResult<Vec<StoredObject>> {
    let prefix = prefix.map_or_else(
      || format!("{}/", self.folder()),
      |p| p.trim_start_matches('/').to_owned(),
    );
    debug!(prefix = %prefix, "Listing objects");

    // object_store lists by whole path segments
    let dir = prefix.rfind('/').map_or("", |idx| &prefix[..idx]);
    let dir_path = (!dir.is_empty()).then(|| ObjectPath::from(dir));

    let metas: Vec<ObjectMeta> = self
      .store
      .list(dir_path.as_ref())
      .try_filter(|meta| {
        futures::future::ready(meta.location.as_ref().starts_with(&prefix))
      })
      .take(options.effective_limit())
      .try_collect()
      .await
      .map_err(|e| {
        error!(error = ?e, "Failed to list objects");
        object_store_error_to_storage_error(
          e,
          &BlobKey::new(&prefix),
          StorageError::Listing,
        )
      })?;

    let objects: Vec<_> =
      metas.into_iter().map(|meta| self.describe(meta, None)).collect();
    debug!(count = objects.len(), "Listed objects");
    Ok(objects)
  }

  #[instrument(skip(self), fields(bucket = %self.config.bucket), err)]
  async fn ensure_container(
    &self,
    options: ContainerOptions,
  ) -> StorageResult<()> {
    let token = self.bearer_token(StorageError::Container).await?;

    let response = self
      .http
      .get(format!("{JSON_API}/b/{}", self.config.bucket))
      .bearer_auth(&token)
      .send()
      .await
      .map_err(|e| json_api_error(e, StorageError::Container))?;
    let status = response.status();
    if status.is_success() {
      debug!("Bucket already exists");
      return Ok(());
    }
    if status != reqwest::StatusCode::NOT_FOUND {
      error!(%status, "Unexpected bucket lookup response");
      return Err(StorageError::Container(miette::miette!(
        "bucket lookup for `{}` returned status {status}",
        self.config.bucket
      )));
    }

    let project_id = self.config.project_id.as_deref().ok_or_else(|| {
      StorageError::Configuration(miette::miette!(
        "GCS_PROJECT_ID is required to create bucket `{}`",
        self.config.bucket
      ))
    })?;

    let mut body = serde_json::json!({
      "name": self.config.bucket,
      "iamConfiguration": {
        "uniformBucketLevelAccess": { "enabled": !options.public }
      },
    });
    if let Some(location) = &options.location {
      body["location"] = serde_json::Value::from(location.clone());
    }

    let mut request = self
      .http
      .post(format!("{JSON_API}/b"))
      .query(&[("project", project_id)])
      .bearer_auth(&token)
      .json(&body);
    if options.public {
      request = request.query(&[("predefinedDefaultObjectAcl", "publicRead")]);
    }

    request
      .send()
      .await
      .and_then(reqwest::Response::error_for_status)
      .map_err(|e| {
        error!(error = ?e, "Failed to create bucket");
        json_api_error(e, StorageError::Container)
      })?;

    info!("Bucket created");
    Ok(())
  }
}
