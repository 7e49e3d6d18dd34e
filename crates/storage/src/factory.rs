use std::path::PathBuf;

use storage_core::{
  ProviderCapabilities, ProviderKind, StorageError, StorageResult,
  UploadPolicy,
};
use storage_impl_fs::{LocalConfig, LocalStorage};
use storage_impl_gcs::{GcsConfig, GcsStorage};
use storage_impl_s3::{S3Config, S3Storage};
use tracing::{debug, error, info, instrument, warn};

use crate::{
  ConfigValidation, EnvSnapshot, ObjectStorage, ProviderConfig,
  env::{
    AWS_ACCESS_KEY_ID, AWS_REGION, AWS_S3_BUCKET, AWS_S3_ENDPOINT,
    AWS_S3_FOLDER, AWS_SECRET_ACCESS_KEY, GCS_BUCKET_NAME, GCS_FOLDER,
    GCS_PROJECT_ID, GOOGLE_APPLICATION_CREDENTIALS, LOCAL_BASE_URL,
    LOCAL_STORAGE_FOLDER, LOCAL_STORAGE_PATH, STORAGE_ALLOWED_CONTENT_TYPES,
    STORAGE_MAX_UPLOAD_BYTES, STORAGE_PROVIDER,
  },
};

/// Selects, configures and builds storage providers from an [`EnvSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory {
  env: EnvSnapshot,
}

impl ProviderFactory {
  /// Creates a factory over an explicit configuration snapshot.
  #[must_use]
  pub const fn new(env: EnvSnapshot) -> Self { Self { env } }

  /// Creates a factory over the current process environment.
  #[must_use]
  pub fn from_process_env() -> Self { Self::new(EnvSnapshot::from_process()) }

  /// The configuration snapshot in use.
  #[must_use]
  pub const fn env(&self) -> &EnvSnapshot { &self.env }

  /// Works out which provider the configuration asks for.
  ///
  /// An explicit `STORAGE_PROVIDER` wins, then GCS indicators, then S3
  /// indicators. With none of those the local provider is used, with a
  /// warning.
  pub fn detect_kind(&self) -> StorageResult<ProviderKind> {
    if let Some(raw) = self.env.get(STORAGE_PROVIDER) {
      let kind = raw.parse::<ProviderKind>().map_err(|e| {
        error!(value = raw, "Unrecognised storage provider override");
        StorageError::Configuration(miette::Report::from_err(e))
      })?;
      debug!(%kind, "Provider chosen by override");
      return Ok(kind);
    }

    if self.env.contains(GCS_BUCKET_NAME) {
      debug!("GCS configuration detected");
      return Ok(ProviderKind::Gcs);
    }
    if self.env.contains(AWS_S3_BUCKET) {
      debug!("S3 configuration detected");
      return Ok(ProviderKind::S3);
    }

    warn!("No cloud storage configured, falling back to local storage");
    Ok(ProviderKind::Local)
  }

  fn max_upload_bytes(&self) -> Result<Option<u64>, String> {
    self
      .env
      .get(STORAGE_MAX_UPLOAD_BYTES)
      .map(|raw| {
        raw.parse::<u64>().map_err(|_| {
          format!("{STORAGE_MAX_UPLOAD_BYTES} must be a whole number of bytes, got `{raw}`")
        })
      })
      .transpose()
  }

  fn upload_policy(&self) -> UploadPolicy {
    let mut policy = UploadPolicy::default()
      .with_max_size(self.max_upload_bytes().ok().flatten());
    if let Some(types) = self.env.get(STORAGE_ALLOWED_CONTENT_TYPES) {
      policy = policy.with_allowed_content_types(types.split(','));
    }
    policy
  }

  /// The local backend's configuration. The migration job reads legacy
  /// files through it whatever provider is selected.
  #[must_use]
  pub fn local_config(&self) -> LocalConfig {
    let env = &self.env;
    LocalConfig {
      base_path: PathBuf::from(
        env.get_or(LOCAL_STORAGE_PATH, storage_impl_fs::DEFAULT_BASE_PATH),
      ),
      folder:    env
        .get_or(LOCAL_STORAGE_FOLDER, storage_impl_fs::DEFAULT_FOLDER)
        .to_owned(),
      base_url:  env
        .get_or(LOCAL_BASE_URL, storage_impl_fs::DEFAULT_BASE_URL)
        .to_owned(),
      policy:    self.upload_policy(),
    }
  }

  /// Derives the configuration of `kind` from the snapshot and defaults.
  /// Makes no network calls.
  #[must_use]
  pub fn config_for(&self, kind: ProviderKind) -> ProviderConfig {
    let env = &self.env;
    let policy = self.upload_policy();

    match kind {
      ProviderKind::Local => ProviderConfig::Local(self.local_config()),
      ProviderKind::Gcs => ProviderConfig::Gcs(GcsConfig {
        bucket: env.get_or(GCS_BUCKET_NAME, "").to_owned(),
        project_id: env.get(GCS_PROJECT_ID).map(ToOwned::to_owned),
        credentials_path: env
          .get(GOOGLE_APPLICATION_CREDENTIALS)
          .map(PathBuf::from),
        folder: env
          .get_or(GCS_FOLDER, storage_impl_gcs::DEFAULT_FOLDER)
          .to_owned(),
        policy,
      }),
      ProviderKind::S3 => ProviderConfig::S3(S3Config {
        bucket: env.get_or(AWS_S3_BUCKET, "").to_owned(),
        region: env
          .get_or(AWS_REGION, storage_impl_s3::DEFAULT_REGION)
          .to_owned(),
        access_key_id: env.get(AWS_ACCESS_KEY_ID).map(ToOwned::to_owned),
        secret_access_key: env
          .get(AWS_SECRET_ACCESS_KEY)
          .map(ToOwned::to_owned),
        endpoint: env.get(AWS_S3_ENDPOINT).map(ToOwned::to_owned),
        folder: env
          .get_or(AWS_S3_FOLDER, storage_impl_s3::DEFAULT_FOLDER)
          .to_owned(),
        policy,
      }),
    }
  }

  /// Checks a configuration for completeness.
  ///
  /// Missing required settings are errors. Missing recommended settings,
  /// such as explicit credentials, are warnings: the provider can still be
  /// built but relies on ambient defaults.
  #[must_use]
  pub fn validate(&self, config: &ProviderConfig) -> ConfigValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = self.max_upload_bytes() {
      errors.push(e);
    }
    if config.policy().allowed_content_types.is_empty() {
      errors.push(format!("{STORAGE_ALLOWED_CONTENT_TYPES} lists no content types"));
    }

    match config {
      ProviderConfig::Local(local) => {
        if !self.env.contains(LOCAL_STORAGE_PATH) {
          warnings.push(format!(
            "{LOCAL_STORAGE_PATH} not set, using {}",
            local.base_path.display()
          ));
        }
        if local.folder.trim_matches('/').is_empty() {
          errors.push(format!("{LOCAL_STORAGE_FOLDER} must not be empty"));
        }
        if !(local.base_url.starts_with("http://")
          || local.base_url.starts_with("https://")
          || local.base_url.starts_with('/'))
        {
          errors.push(format!(
            "{LOCAL_BASE_URL} must be an http(s) URL or an absolute path, got `{}`",
            local.base_url
          ));
        }
      }
      ProviderConfig::Gcs(gcs) => {
        if gcs.bucket.is_empty() {
          errors.push(format!("{GCS_BUCKET_NAME} is required"));
        }
        if gcs.project_id.is_none() {
          warnings.push(format!(
            "{GCS_PROJECT_ID} not set; bucket creation will not be possible"
          ));
        }
        match &gcs.credentials_path {
          None => warnings.push(format!(
            "{GOOGLE_APPLICATION_CREDENTIALS} not set, using application \
             default credentials"
          )),
          Some(path) if !path.is_file() => errors.push(format!(
            "{GOOGLE_APPLICATION_CREDENTIALS} points to a missing file: {}",
            path.display()
          )),
          Some(_) => {}
        }
      }
      ProviderConfig::S3(s3) => {
        if s3.bucket.is_empty() {
          errors.push(format!("{AWS_S3_BUCKET} is required"));
        }
        if !self.env.contains(AWS_REGION) {
          warnings.push(format!("{AWS_REGION} not set, using {}", s3.region));
        }
        match (&s3.access_key_id, &s3.secret_access_key) {
          (Some(_), Some(_)) => {}
          (None, None) => warnings.push(format!(
            "{AWS_ACCESS_KEY_ID} and {AWS_SECRET_ACCESS_KEY} not set, using \
             the ambient credential chain"
          )),
          _ => errors.push(format!(
            "{AWS_ACCESS_KEY_ID} and {AWS_SECRET_ACCESS_KEY} must be set together"
          )),
        }
      }
    }

    ConfigValidation::from_parts(errors, warnings)
  }

  /// The static capability flags of a provider kind.
  #[must_use]
  pub const fn capabilities_for(kind: ProviderKind) -> ProviderCapabilities {
    kind.capabilities()
  }

  /// Selects and builds a provider, auto-detecting the kind when `explicit`
  /// is `None`.
  ///
  /// An incomplete configuration fails immediately with
  /// [`StorageError::Configuration`].
  #[instrument(skip(self))]
  pub async fn select_provider(
    &self,
    explicit: Option<ProviderKind>,
  ) -> StorageResult<ObjectStorage> {
    let kind = match explicit {
      Some(kind) => kind,
      None => self.detect_kind()?,
    };
    let config = self.config_for(kind);

    let validation = self.validate(&config);
    for warning in &validation.warnings {
      warn!(provider = %kind, "{warning}");
    }
    if !validation.is_valid {
      error!(provider = %kind, errors = ?validation.errors, "Invalid storage configuration");
      return Err(StorageError::Configuration(miette::miette!(
        "{} is not configured: {}",
        kind.display_name(),
        validation.errors.join("; ")
      )));
    }

    let storage = Self::build(config).await?;
    info!(provider = %kind, "Storage provider selected");
    Ok(storage)
  }

  /// Builds a provider from a configuration without validating it.
  pub async fn build(config: ProviderConfig) -> StorageResult<ObjectStorage> {
    Ok(match config {
      ProviderConfig::Local(c) => ObjectStorage::Local(LocalStorage::new(c).await?),
      ProviderConfig::Gcs(c) => ObjectStorage::Gcs(GcsStorage::new(c)?),
      ProviderConfig::S3(c) => ObjectStorage::S3(S3Storage::new(c)?),
    })
  }
}

#[cfg(test)]
mod tests {
  use storage_core::ObjectStorageLike;
  use tempfile::TempDir;

  use super::*;

  fn factory<const N: usize>(pairs: [(&str, &str); N]) -> ProviderFactory {
    ProviderFactory::new(EnvSnapshot::from_pairs(pairs))
  }

  #[test]
  fn test_detection_precedence() {
    assert_eq!(factory([]).detect_kind().unwrap(), ProviderKind::Local);
    assert_eq!(
      factory([(AWS_S3_BUCKET, "b")]).detect_kind().unwrap(),
      ProviderKind::S3
    );
    assert_eq!(
      factory([(AWS_S3_BUCKET, "b"), (GCS_BUCKET_NAME, "g")])
        .detect_kind()
        .unwrap(),
      ProviderKind::Gcs
    );
    assert_eq!(
      factory([(GCS_BUCKET_NAME, "g"), (STORAGE_PROVIDER, "aws")])
        .detect_kind()
        .unwrap(),
      ProviderKind::S3
    );
  }

  #[test]
  fn test_unknown_override_is_a_configuration_error() {
    let err = factory([(STORAGE_PROVIDER, "azure")])
      .detect_kind()
      .unwrap_err();
    assert!(matches!(err, StorageError::Configuration(_)));
  }

  #[test]
  fn test_config_defaults() {
    let ProviderConfig::S3(s3) =
      factory([(AWS_S3_BUCKET, "b")]).config_for(ProviderKind::S3)
    else {
      panic!("expected an S3 configuration");
    };
    assert_eq!(s3.region, "us-east-1");
    assert_eq!(s3.folder, "product-images");

    let ProviderConfig::Local(local) =
      factory([]).config_for(ProviderKind::Local)
    else {
      panic!("expected a local configuration");
    };
    assert_eq!(local.folder, "images");
    assert_eq!(local.base_url, "http://localhost:5001/uploads");
  }

  #[test]
  fn test_policy_comes_from_env() {
    let f = factory([
      (STORAGE_MAX_UPLOAD_BYTES, "1024"),
      (STORAGE_ALLOWED_CONTENT_TYPES, "image/png, image/avif"),
    ]);
    let config = f.config_for(ProviderKind::Local);
    assert_eq!(config.policy().max_size, Some(1024));
    assert_eq!(config.policy().allowed_content_types, [
      "image/png",
      "image/avif"
    ]);
  }

  #[test]
  fn test_validation_partitions_errors_and_warnings() {
    let f = factory([(AWS_S3_BUCKET, "b")]);
    let validation = f.validate(&f.config_for(ProviderKind::S3));
    assert!(validation.is_valid);
    assert!(validation.errors.is_empty());
    assert_eq!(validation.warnings.len(), 2);

    let f = factory([(AWS_S3_BUCKET, "b"), (AWS_ACCESS_KEY_ID, "k")]);
    let validation = f.validate(&f.config_for(ProviderKind::S3));
    assert!(!validation.is_valid);

    let f = factory([]);
    let validation = f.validate(&f.config_for(ProviderKind::Gcs));
    assert!(!validation.is_valid);
    assert!(validation.errors[0].contains(GCS_BUCKET_NAME));

    let f = factory([(STORAGE_MAX_UPLOAD_BYTES, "lots")]);
    let validation = f.validate(&f.config_for(ProviderKind::Local));
    assert!(!validation.is_valid);
  }

  #[test]
  fn test_missing_credentials_file_is_an_error() {
    let f = factory([
      (GCS_BUCKET_NAME, "g"),
      (GOOGLE_APPLICATION_CREDENTIALS, "/definitely/not/here.json"),
    ]);
    let validation = f.validate(&f.config_for(ProviderKind::Gcs));
    assert!(!validation.is_valid);
  }

  #[test]
  fn test_capabilities() {
    assert!(!ProviderFactory::capabilities_for(ProviderKind::Local).signed_urls);
    assert!(ProviderFactory::capabilities_for(ProviderKind::Gcs).signed_urls);
    assert!(ProviderFactory::capabilities_for(ProviderKind::S3).public_urls);
  }

  #[tokio::test]
  async fn test_select_local_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_string_lossy().into_owned();
    let f = factory([(LOCAL_STORAGE_PATH, root.as_str())]);

    let storage = f.select_provider(None).await.unwrap();
    assert_eq!(storage.kind(), ProviderKind::Local);
    assert_eq!(storage.provider_name(), "local");
  }

  #[tokio::test]
  async fn test_select_fails_fast_on_missing_bucket() {
    let err = factory([(STORAGE_PROVIDER, "gcs")])
      .select_provider(None)
      .await
      .unwrap_err();
    assert!(matches!(err, StorageError::Configuration(_)));
  }

  #[tokio::test]
  async fn test_select_explicit_s3() {
    let f = factory([
      (AWS_S3_BUCKET, "shop-media"),
      (AWS_REGION, "eu-west-1"),
      (AWS_ACCESS_KEY_ID, "k"),
      (AWS_SECRET_ACCESS_KEY, "s"),
    ]);
    let storage = f.select_provider(Some(ProviderKind::S3)).await.unwrap();
    assert_eq!(storage.kind(), ProviderKind::S3);
    assert!(
      storage.recognizes("https://shop-media.s3.eu-west-1.amazonaws.com/a.png")
    );
  }
}
