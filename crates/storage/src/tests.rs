use std::sync::Arc;

use storage_core::ObjectStorageLike;
use storage_impl_fs::{LocalConfig, LocalStorage};
use storage_impl_memory::MemoryStorage;
use tempfile::TempDir;

/// A provider under test plus whatever must outlive it.
struct Fixture {
  storage: Arc<dyn ObjectStorageLike>,
  _dir:    Option<TempDir>,
}

trait StorageInstantiator {
  async fn init() -> Fixture;
}

struct LocalInstantiator;

impl StorageInstantiator for LocalInstantiator {
  async fn init() -> Fixture {
    let dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(LocalConfig::new(dir.path()))
      .await
      .unwrap();
    Fixture {
      storage: Arc::new(storage),
      _dir:    Some(dir),
    }
  }
}

struct MemoryInstantiator;

impl StorageInstantiator for MemoryInstantiator {
  async fn init() -> Fixture {
    Fixture {
      storage: Arc::new(MemoryStorage::new()),
      _dir:    None,
    }
  }
}

#[generic_tests::define(attrs(tokio::test))]
mod contract {
  use std::{collections::HashSet, time::Duration};

  use bytes::Bytes;
  use storage_core::{
    ContainerOptions, ListOptions, StorageError, StoreOptions, ValidationError,
  };

  use super::*;

  const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot really";

  async fn store_png(
    storage: &dyn ObjectStorageLike,
    options: StoreOptions,
  ) -> storage_core::UploadResult {
    storage
      .store(Bytes::from_static(PNG), "photo.png", "image/png", options)
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_store_round_trips<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let result =
      store_png(storage, StoreOptions::default().with_prefix("product")).await;

    assert!(result.success);
    assert_eq!(result.size, PNG.len() as u64);
    assert_eq!(result.content_type, "image/png");
    assert!(result.name.starts_with("product_"));
    assert!(result.name.ends_with(".png"));

    let key = storage.resolve_address(&result.address).unwrap();
    assert_eq!(key, result.key);
    assert!(storage.recognizes(&result.address));

    let object = storage.stat(&result.address).await.unwrap();
    assert_eq!(object.key, result.key);
    assert_eq!(object.size, PNG.len() as u64);
    assert_eq!(
      storage.fetch(&result.address).await.unwrap(),
      Bytes::from_static(PNG)
    );
  }

  #[tokio::test]
  async fn test_private_store_round_trips<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let result = store_png(storage, StoreOptions::default().private()).await;

    assert_eq!(storage.resolve_address(&result.address).unwrap(), result.key);
    assert!(storage.exists(&result.address).await);
  }

  #[tokio::test]
  async fn test_metadata_is_kept<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let result = store_png(
      storage,
      StoreOptions::default()
        .with_uploaded_by("admin")
        .with_metadata("product-id", "7"),
    )
    .await;
    assert_eq!(result.metadata["product-id"], "7");

    let object = storage.stat(&result.address).await.unwrap();
    assert_eq!(object.metadata["product-id"], "7");
    assert_eq!(object.metadata["uploaded-by"], "admin");
    assert_eq!(object.metadata["original-name"], "photo.png");
    assert!(object.metadata.contains_key("uploaded-at"));
  }

  #[tokio::test]
  async fn test_disallowed_content_type_is_rejected<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let err = storage
      .store(
        Bytes::from_static(b"%PDF-1.7"),
        "invoice.pdf",
        "application/pdf",
        StoreOptions::default(),
      )
      .await
      .unwrap_err();

    assert!(matches!(
      err,
      StorageError::Validation(ValidationError::DisallowedContentType { .. })
    ));
    let listed = storage.enumerate(None, ListOptions::default()).await.unwrap();
    assert!(listed.is_empty());
  }

  #[tokio::test]
  async fn test_caller_can_override_allow_list<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let options = StoreOptions {
      allowed_content_types: Some(vec!["application/pdf".to_owned()]),
      ..StoreOptions::default()
    };
    let result = storage
      .store(
        Bytes::from_static(b"%PDF-1.7"),
        "invoice.pdf",
        "application/pdf",
        options,
      )
      .await
      .unwrap();
    assert!(storage.exists(&result.address).await);
  }

  #[tokio::test]
  async fn test_empty_payload_is_rejected<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let err = storage
      .store(Bytes::new(), "a.png", "image/png", StoreOptions::default())
      .await
      .unwrap_err();
    assert!(err.is_validation());
  }

  #[tokio::test]
  async fn test_delete_then_exists<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let result = store_png(storage, StoreOptions::default()).await;
    assert!(storage.exists(&result.address).await);

    assert!(storage.delete(&result.address).await.unwrap());
    assert!(!storage.exists(&result.address).await);

    // deleting again is not an error
    assert!(storage.delete(&result.address).await.is_ok());
  }

  #[tokio::test]
  async fn test_stat_missing_object<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let err = storage.stat("missing.png").await.unwrap_err();
    assert!(err.is_not_found());
  }

  #[tokio::test]
  async fn test_exists_never_raises<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    assert!(!storage.exists("missing.png").await);
    assert!(!storage.exists("gs://someone-else/images/a.png").await);
    assert!(!storage.exists("").await);
  }

  #[tokio::test]
  async fn test_foreign_addresses_are_rejected<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    for address in [
      "https://storage.googleapis.com/bucket/images/a.png",
      "s3://bucket/images/a.png",
      "https://bucket.s3.us-east-1.amazonaws.com/images/a.png",
    ] {
      assert!(!storage.recognizes(address), "{address}");
      assert!(
        matches!(
          storage.resolve_address(address),
          Err(StorageError::ForeignAddress { .. })
        ),
        "{address}"
      );
    }
  }

  #[tokio::test]
  async fn test_bare_names_resolve_into_folder<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let key = storage.resolve_address("a.png").unwrap();
    assert_eq!(key.as_str(), format!("{}/a.png", storage.folder()));

    let key = storage.resolve_address("elsewhere/a.png").unwrap();
    assert_eq!(key.as_str(), "elsewhere/a.png");
  }

  #[tokio::test]
  async fn test_sign_returns_a_url<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    let result = store_png(storage, StoreOptions::default()).await;
    let url = storage
      .sign(&result.address, Duration::from_secs(3600))
      .await
      .unwrap();
    assert!(!url.is_empty());
  }

  #[tokio::test]
  async fn test_enumerate_and_usage<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    for _ in 0..3 {
      store_png(storage, StoreOptions::default()).await;
    }
    storage
      .store(
        Bytes::from_static(b"GIF89a"),
        "a.gif",
        "image/gif",
        StoreOptions::default(),
      )
      .await
      .unwrap();

    let all = storage.enumerate(None, ListOptions::default()).await.unwrap();
    assert_eq!(all.len(), 4);
    let limited = storage.enumerate(None, ListOptions::limit(2)).await.unwrap();
    assert_eq!(limited.len(), 2);

    let usage = storage.report_usage().await.unwrap();
    assert_eq!(usage.total_files, 4);
    assert_eq!(usage.total_size, 3 * PNG.len() as u64 + 6);
    assert_eq!(usage.by_content_type["image/png"].count, 3);
    assert_eq!(usage.by_content_type["image/gif"].count, 1);
    assert!(usage.oldest.is_some());
    assert!(usage.newest.is_some());
  }

  #[tokio::test]
  async fn test_ensure_container_is_idempotent<I: StorageInstantiator>() {
    let fixture = I::init().await;
    let storage = fixture.storage.as_ref();

    storage
      .ensure_container(ContainerOptions::default())
      .await
      .unwrap();
    storage
      .ensure_container(ContainerOptions::default())
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_concurrent_stores_never_collide<I: StorageInstantiator>() {
    let fixture = I::init().await;

    let mut handles = Vec::new();
    for _ in 0..1000 {
      let storage = fixture.storage.clone();
      handles.push(tokio::spawn(async move {
        storage
          .store(
            Bytes::from_static(PNG),
            "same.png",
            "image/png",
            StoreOptions::default().with_prefix("dup"),
          )
          .await
          .unwrap()
          .address
      }));
    }

    let mut addresses = HashSet::new();
    for handle in handles {
      addresses.insert(handle.await.unwrap());
    }
    assert_eq!(addresses.len(), 1000);

    for address in &addresses {
      assert!(fixture.storage.exists(address).await, "{address}");
    }
  }

  #[instantiate_tests(<LocalInstantiator>)]
  mod local {}

  #[instantiate_tests(<MemoryInstantiator>)]
  mod memory {}
}
