//! An implementation of the object storage contract for S3 compatible stores.

mod config;
mod errors;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use miette::{Context, IntoDiagnostic};
use s3::{Bucket, BucketConfiguration, Region, creds::Credentials};
use storage_core::{
  AddressResolver, BlobKey, ContainerOptions, ListOptions, ObjectStorageLike,
  StorageError, StorageResult, StoredObject, UploadPolicy, mime,
  validate_sign_ttl,
};
use tracing::{debug, error, info, instrument, warn};

pub use self::config::{DEFAULT_FOLDER, DEFAULT_REGION, S3Config};
use self::errors::{is_not_found, s3_config_error, s3_error_to_storage_error};

/// The most keys S3 returns in one listing page.
const MAX_KEYS_PER_PAGE: usize = 1000;

/// Canned ACL header applied to public uploads.
const ACL_HEADER: &str = "x-amz-acl";
/// Prefix of user metadata headers.
const META_HEADER_PREFIX: &str = "x-amz-meta-";

/// [`ObjectStorageLike`] implementer for S3-compatible backends.
#[derive(Debug)]
pub struct S3Storage {
  bucket:      Bucket,
  region:      Region,
  credentials: Credentials,
  config:      S3Config,
  resolver:    AddressResolver,
}

impl S3Storage {
  /// Creates a new [`S3Storage`].
  ///
  /// With explicit keys no network calls are made. Without them the ambient
  /// credential chain is loaded, which can block on the instance-metadata
  /// endpoint.
  #[instrument(skip(config), fields(bucket = %config.bucket, region = %config.region))]
  pub fn new(config: S3Config) -> StorageResult<Self> {
    debug!(
      endpoint = ?config.endpoint,
      has_access_key = config.access_key_id.is_some(),
      has_secret_key = config.secret_access_key.is_some(),
      "Initializing S3 object storage"
    );

    let region = Region::Custom {
      region:   config.region.clone(),
      endpoint: config.effective_endpoint(),
    };

    let credentials =
      match (&config.access_key_id, &config.secret_access_key) {
        (Some(access_key), Some(secret_key)) => Credentials {
          access_key:     Some(access_key.clone()),
          secret_key:     Some(secret_key.clone()),
          security_token: None,
          session_token:  None,
          expiration:     None,
        },
        (None, None) => {
          warn!("No explicit S3 credentials, using the ambient credential chain");
          Credentials::default()
            .into_diagnostic()
            .context("failed to load ambient S3 credentials")
            .map_err(StorageError::Configuration)?
        }
        _ => {
          error!("Only one of the S3 access key and secret key is set");
          return Err(StorageError::Configuration(miette::miette!(
            "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"
          )));
        }
      };

    let mut bucket =
      Bucket::new(&config.bucket, region.clone(), credentials.clone())
        .map_err(s3_config_error)?;
    if config.endpoint.is_some() {
      bucket = bucket.with_path_style();
    }

    let resolver = Self::build_resolver(&config);

    info!("S3 object storage initialized successfully");
    Ok(Self {
      bucket: *bucket,
      region,
      credentials,
      config,
      resolver,
    })
  }

  fn build_resolver(config: &S3Config) -> AddressResolver {
    let S3Config { bucket, region, .. } = config;
    let mut resolver = AddressResolver::new("s3", config.folder.clone());
    if let Some(endpoint) = &config.endpoint {
      resolver = resolver
        .with_prefix(format!("{}/{bucket}", endpoint.trim_end_matches('/')));
    }
    resolver
      .with_prefix(format!("https://{bucket}.s3.{region}.amazonaws.com"))
      .with_prefix(format!("https://{bucket}.s3.amazonaws.com"))
      .with_prefix(format!("https://s3.{region}.amazonaws.com/{bucket}"))
      .with_prefix(format!("s3://{bucket}"))
  }

  /// The bucket name.
  #[must_use]
  pub fn bucket_name(&self) -> &str { &self.config.bucket }

  /// Parses an S3 `Last-Modified` value, which is RFC 2822 in HEAD responses
  /// and RFC 3339 in listings.
  fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
      .or_else(|_| DateTime::parse_from_rfc3339(value))
      .ok()
      .map(|t| t.with_timezone(&Utc))
  }
}

#[async_trait]
impl ObjectStorageLike for S3Storage {
  fn provider_name(&self) -> &'static str { "s3" }

  fn upload_policy(&self) -> &UploadPolicy { &self.config.policy }

  fn folder(&self) -> &str { self.resolver.folder() }

  fn public_url(&self, key: &BlobKey) -> String {
    let S3Config { bucket, region, .. } = &self.config;
    match &self.config.endpoint {
      Some(endpoint) => format!(
        "{}/{bucket}/{}",
        endpoint.trim_end_matches('/'),
        key.as_str()
      ),
      None => {
        format!("https://{bucket}.s3.{region}.amazonaws.com/{}", key.as_str())
      }
    }
  }

  fn scheme_address(&self, key: &BlobKey) -> String {
    format!("s3://{}/{}", self.config.bucket, key.as_str())
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
      bucket = %self.bucket.name,
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

    // per-request headers live on a clone of the bucket handle
    let mut bucket = self.bucket.clone();
    if public {
      bucket.add_header(ACL_HEADER, "public-read");
    }
    for (name, value) in metadata {
      bucket.add_header(&format!("{META_HEADER_PREFIX}{name}"), value);
    }

    bucket
      .put_object_with_content_type(key.as_str(), &data, content_type)
      .await
      .map_err(|e| {
        error!(error = ?e, "Failed to upload object");
        s3_error_to_storage_error(e, key, StorageError::Upload)
      })?;

    info!("Object uploaded successfully");
    Ok(())
  }

  #[instrument(skip(self), fields(bucket = %self.bucket.name), err)]
  async fn fetch(&self, address: &str) -> StorageResult<Bytes> {
    let key = self.resolve_address(address)?;
    debug!(key = %key, "Retrieving object");

    let response = self.bucket.get_object(key.as_str()).await.map_err(|e| {
      if !is_not_found(&e) {
        error!(error = ?e, "Failed to retrieve object");
      }
      s3_error_to_storage_error(e, &key, StorageError::Metadata)
    })?;

    Ok(response.bytes().clone())
  }

  #[instrument(skip(self), fields(bucket = %self.bucket.name), err)]
  async fn delete(&self, address: &str) -> StorageResult<bool> {
    let key = self.resolve_address(address)?;
    debug!(key = %key, "Deleting object");

    match self.bucket.delete_object(key.as_str()).await {
      Ok(_) => {}
      Err(e) if is_not_found(&e) => {
        debug!("Object was already absent");
      }
      Err(e) => {
        error!(error = ?e, "Failed to delete object");
        return Err(s3_error_to_storage_error(e, &key, StorageError::Delete));
      }
    }

    info!("Object deleted successfully");
    Ok(true)
  }

  #[instrument(skip(self), fields(bucket = %self.bucket.name), err)]
  async fn stat(&self, address: &str) -> StorageResult<StoredObject> {
    let key = self.resolve_address(address)?;
    debug!(key = %key, "Fetching object metadata");

    let (head, code) =
      self.bucket.head_object(key.as_str()).await.map_err(|e| {
        if !is_not_found(&e) {
          error!(error = ?e, "Failed to fetch object metadata");
        }
        s3_error_to_storage_error(e, &key, StorageError::Metadata)
      })?;
    debug!(status_code = code, "Received HEAD response");

    let size = head
      .content_length
      .ok_or_else(|| {
        StorageError::Metadata(miette::miette!(
          "head response did not include content_length"
        ))
      })?
      .try_into()
      .into_diagnostic()
      .context("content_length was negative in head response")
      .map_err(StorageError::Metadata)?;

    let updated_at = head
      .last_modified
      .as_deref()
      .and_then(Self::parse_timestamp);

    Ok(StoredObject {
      address: self.public_url(&key),
      key,
      size,
      content_type: head.content_type,
      created_at: updated_at,
      updated_at,
      etag: head.e_tag.map(|t| t.trim_matches('"').to_owned()),
      metadata: head.metadata.unwrap_or_default(),
    })
  }

  #[instrument(
    skip(self),
    fields(bucket = %self.bucket.name, ttl_secs = ttl.as_secs()),
    err
  )]
  async fn sign(&self, address: &str, ttl: Duration) -> StorageResult<String> {
    validate_sign_ttl(ttl)?;
    let key = self.resolve_address(address)?;

    let expiry = u32::try_from(ttl.as_secs())
      .into_diagnostic()
      .map_err(StorageError::Signing)?;

    let url = self
      .bucket
      .presign_get(key.as_str(), expiry, None)
      .await
      .map_err(|e| {
        error!(error = ?e, "Failed to generate presigned URL");
        s3_error_to_storage_error(e, &key, StorageError::Signing)
      })?;

    info!(url_length = url.len(), "Presigned URL generated successfully");
    Ok(url)
  }

  async fn exists(&self, address: &str) -> bool {
    let Ok(key) = self.resolve_address(address) else {
      return false;
    };
    match self.bucket.object_exists(key.as_str()).await {
      Ok(exists) => exists,
      Err(e) => {
        debug!(error = ?e, key = %key, "Existence check failed");
        false
      }
    }
  }

  #[instrument(skip(self), fields(bucket = %self.bucket.name), err)]
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

    let limit = options.effective_limit();
    let mut objects = Vec::new();
    let mut continuation = None;
    while objects.len() < limit {
      let (page, _) = self
        .bucket
        .list_page(
          prefix.clone(),
          None,
          continuation.take(),
          None,
          Some(page_size(limit - objects.len())),
        )
        .await
        .map_err(|e| {
          error!(error = ?e, "Failed to list objects");
          s3_error_to_storage_error(
            e,
            &BlobKey::new(&prefix),
            StorageError::Listing,
          )
        })?;

      let remaining = limit - objects.len();
      objects.extend(page.contents.into_iter().take(remaining).map(|object| {
        let key = BlobKey::new(object.key);
        let updated_at = Self::parse_timestamp(&object.last_modified);
        StoredObject {
          address: self.public_url(&key),
          content_type: mime::guess_content_type(key.as_str())
            .map(ToOwned::to_owned),
          key,
          size: object.size,
          created_at: updated_at,
          updated_at,
          etag: object.e_tag.map(|t| t.trim_matches('"').to_owned()),
          metadata: HashMap::new(),
        }
      }));

      match page.next_continuation_token {
        Some(token) if page.is_truncated => continuation = Some(token),
        _ => break,
      }
    }

    debug!(count = objects.len(), "Listed objects");
    Ok(objects)
  }

  #[instrument(skip(self), fields(bucket = %self.bucket.name), err)]
  async fn ensure_container(
    &self,
    options: ContainerOptions,
  ) -> StorageResult<()> {
    let exists = self.bucket.exists().await.map_err(|e| {
      error!(error = ?e, "Failed to check bucket");
      StorageError::Container(miette::Report::from_err(e))
    })?;
    if exists {
      debug!("Bucket already exists");
      return Ok(());
    }

    let bucket_config = if options.public {
      BucketConfiguration::public()
    } else {
      BucketConfiguration::private()
    };
    let region = match options.location {
      Some(location) => Region::Custom {
        endpoint: self.config.endpoint.clone().unwrap_or_else(|| {
          format!("https://s3.{location}.amazonaws.com")
        }),
        region:   location,
      },
      None => self.region.clone(),
    };

    let created = if self.config.endpoint.is_some() {
      Bucket::create_with_path_style(
        &self.config.bucket,
        region,
        self.credentials.clone(),
        bucket_config,
      )
      .await
    } else {
      Bucket::create(
        &self.config.bucket,
        region,
        self.credentials.clone(),
        bucket_config,
      )
      .await
    };

    let response = created.map_err(|e| {
      error!(error = ?e, "Failed to create bucket");
      StorageError::Container(miette::Report::from_err(e))
    })?;
    if !response.success() {
      return Err(StorageError::Container(miette::miette!(
        "bucket creation returned status {}: {}",
        response.response_code,
        response.response_text
      )));
    }

    info!("Bucket created");
    Ok(())
  }
}

/// Keys to request in the next listing page when `remaining` are wanted.
const fn page_size(remaining: usize) -> usize {
  if remaining < MAX_KEYS_PER_PAGE {
    remaining
  } else {
    MAX_KEYS_PER_PAGE
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config() -> S3Config {
    S3Config {
      access_key_id: Some("AKIDEXAMPLE".to_owned()),
      secret_access_key: Some("secret".to_owned()),
      region: "eu-west-2".to_owned(),
      ..S3Config::new("shop-media")
    }
  }

  #[test]
  fn test_public_and_scheme_addresses() {
    let storage = S3Storage::new(config()).unwrap();
    let key = BlobKey::new("product-images/a.png");

    assert_eq!(
      storage.public_url(&key),
      "https://shop-media.s3.eu-west-2.amazonaws.com/product-images/a.png"
    );
    assert_eq!(
      storage.scheme_address(&key),
      "s3://shop-media/product-images/a.png"
    );
  }

  #[test]
  fn test_resolves_every_recognised_form() {
    let storage = S3Storage::new(config()).unwrap();

    let cases = [
      "https://shop-media.s3.eu-west-2.amazonaws.com/product-images/a.png",
      "https://shop-media.s3.amazonaws.com/product-images/a.png",
      "https://s3.eu-west-2.amazonaws.com/shop-media/product-images/a.png",
      "s3://shop-media/product-images/a.png",
      "https://shop-media.s3.eu-west-2.amazonaws.com/product-images/a.png?X-Amz-Signature=abc",
      "product-images/a.png",
      "a.png",
    ];
    for case in cases {
      assert_eq!(
        storage.resolve_address(case).unwrap().as_str(),
        "product-images/a.png",
        "{case}"
      );
    }
  }

  #[test]
  fn test_rejects_other_buckets() {
    let storage = S3Storage::new(config()).unwrap();

    assert!(!storage.recognizes("s3://other-bucket/product-images/a.png"));
    assert!(matches!(
      storage.resolve_address("s3://other-bucket/product-images/a.png"),
      Err(StorageError::ForeignAddress { .. })
    ));
    assert!(matches!(
      storage.resolve_address("gs://shop-media/product-images/a.png"),
      Err(StorageError::ForeignAddress { .. })
    ));
  }

  #[test]
  fn test_custom_endpoint_uses_path_style_urls() {
    let storage = S3Storage::new(S3Config {
      endpoint: Some("http://localhost:9000/".to_owned()),
      ..config()
    })
    .unwrap();
    let key = BlobKey::new("product-images/a.png");

    let url = storage.public_url(&key);
    assert_eq!(url, "http://localhost:9000/shop-media/product-images/a.png");
    assert_eq!(storage.resolve_address(&url).unwrap(), key);
  }

  #[test]
  fn test_half_configured_credentials_are_rejected() {
    let err = S3Storage::new(S3Config {
      secret_access_key: None,
      ..config()
    })
    .unwrap_err();
    assert!(matches!(err, StorageError::Configuration(_)));
  }

  #[tokio::test]
  async fn test_sign_rejects_out_of_range_ttl() {
    let storage = S3Storage::new(config()).unwrap();

    let err = storage
      .sign("a.png", Duration::from_secs(8 * 24 * 60 * 60))
      .await
      .unwrap_err();
    assert!(matches!(err, StorageError::Signing(_)));

    // presigned expiry is whole seconds
    let err = storage
      .sign("a.png", Duration::from_millis(500))
      .await
      .unwrap_err();
    assert!(matches!(err, StorageError::Signing(_)));
  }

  #[test]
  fn test_listing_pages_never_exceed_the_limit() {
    assert_eq!(page_size(2), 2);
    assert_eq!(page_size(MAX_KEYS_PER_PAGE), MAX_KEYS_PER_PAGE);
    assert_eq!(page_size(5000), MAX_KEYS_PER_PAGE);
    assert_eq!(page_size(usize::MAX), MAX_KEYS_PER_PAGE);
  }

  #[test]
  fn test_parses_both_timestamp_formats() {
    assert!(
      S3Storage::parse_timestamp("Wed, 21 Oct 2015 07:28:00 GMT").is_some()
    );
    assert!(S3Storage::parse_timestamp("2015-10-21T07:28:00.000Z").is_some());
    assert!(S3Storage::parse_timestamp("yesterday").is_none());
  }
}
