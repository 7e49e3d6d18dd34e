use storage_core::UploadPolicy;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Folder used when none is configured.
pub const DEFAULT_FOLDER: &str = "product-images";

/// Configuration for [`S3Storage`](crate::S3Storage).
#[derive(Clone)]
pub struct S3Config {
  /// Bucket name.
  pub bucket:            String,
  /// Region name.
  pub region:            String,
  /// Access key id; `None` together with the secret means the ambient chain.
  pub access_key_id:     Option<String>,
  /// Secret access key.
  pub secret_access_key: Option<String>,
  /// Custom endpoint for S3-compatible stores. Enables path-style requests.
  pub endpoint:          Option<String>,
  /// Logical folder new objects are stored under.
  pub folder:            String,
  /// Input policy applied to uploads.
  pub policy:            UploadPolicy,
}

impl S3Config {
  /// A configuration for `bucket` with every other field defaulted.
  #[must_use]
  pub fn new(bucket: impl Into<String>) -> Self {
    Self {
      bucket:            bucket.into(),
      region:            DEFAULT_REGION.to_owned(),
      access_key_id:     None,
      secret_access_key: None,
      endpoint:          None,
      folder:            DEFAULT_FOLDER.to_owned(),
      policy:            UploadPolicy::default(),
    }
  }

  /// The endpoint requests go to.
  #[must_use]
  pub fn effective_endpoint(&self) -> String {
    match &self.endpoint {
      Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
      None => format!("https://s3.{}.amazonaws.com", self.region),
    }
  }
}

impl std::fmt::Debug for S3Config {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("S3Config")
      .field("bucket", &self.bucket)
      .field("region", &self.region)
      .field("has_access_key", &self.access_key_id.is_some())
      .field("has_secret_key", &self.secret_access_key.is_some())
      .field("endpoint", &self.endpoint)
      .field("folder", &self.folder)
      .finish_non_exhaustive()
  }
}
