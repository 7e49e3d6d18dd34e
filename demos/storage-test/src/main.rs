//! Exercises the configured storage provider end to end.

use std::time::Duration;

use bytes::Bytes;
use miette::{Context, Result, ensure};
use storage::{
  ContainerOptions, ListOptions, ObjectStorageLike, ProviderFactory,
  StoreOptions,
};
use tracing_subscriber::EnvFilter;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nstorage-test";

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let storage = ProviderFactory::from_process_env()
    .select_provider(None)
    .await
    .context("failed to select a storage provider")?;
  println!(
    "using {} (capabilities: {:?})",
    storage.kind().display_name(),
    storage.capabilities()
  );

  storage
    .ensure_container(ContainerOptions::default())
    .await
    .context("failed to ensure the container exists")?;

  // upload object
  let upload = storage
    .store(
      Bytes::from_static(PNG),
      "storage-test.png",
      "image/png",
      StoreOptions::default()
        .with_prefix("smoke")
        .with_uploaded_by("storage-test"),
    )
    .await
    .context("failed to store test object")?;
  let address = upload.address.as_str();
  println!("stored {} bytes at `{address}`", upload.size);

  // get object head
  let head = storage
    .stat(address)
    .await
    .with_context(|| format!("failed to stat `{address}`"))?;
  println!("object head: {head:#?}");

  if storage.capabilities().signed_urls {
    let url = storage
      .sign(address, Duration::from_secs(15 * 60))
      .await
      .with_context(|| format!("failed to sign `{address}`"))?;
    println!("signed url: {url}");
  }

  // fetch object
  let data = storage
    .fetch(address)
    .await
    .with_context(|| format!("failed to fetch `{address}`"))?;
  ensure!(data.as_ref() == PNG, "fetched bytes differ from uploaded bytes");
  println!("fetched {} bytes back", data.len());

  let listed = storage
    .enumerate(None, ListOptions::limit(10))
    .await
    .context("failed to list objects")?;
  println!("first {} objects in folder `{}`", listed.len(), storage.folder());
  let usage = storage
    .report_usage()
    .await
    .context("failed to report usage")?;
  println!("usage: {usage:#?}");

  // delete object
  storage
    .delete(address)
    .await
    .with_context(|| format!("failed to delete `{address}`"))?;
  ensure!(!storage.exists(address).await, "object still exists after delete");
  println!("deleted `{address}`");

  Ok(())
}
