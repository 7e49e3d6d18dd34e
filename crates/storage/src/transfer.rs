use std::time::Duration;

use serde::Serialize;
use storage_core::{ObjectStorageLike, StoreOptions, StoredObject};
use tracing::{debug, info, instrument, warn};

/// Options for [`migrate_between`].
#[derive(Debug, Clone)]
pub struct TransferOptions {
  /// Lifetime of the access URL produced for each object.
  pub sign_ttl:      Duration,
  /// Read each object and store it in the target.
  pub copy_bytes:    bool,
  /// Delete the source object once the copy is confirmed in the target.
  /// Ignored unless `copy_bytes` is set.
  pub delete_source: bool,
  /// Options used when storing into the target.
  pub store:         StoreOptions,
}

impl Default for TransferOptions {
  fn default() -> Self {
    Self {
      sign_ttl:      Duration::from_secs(60 * 60),
      copy_bytes:    false,
      delete_source: false,
      store:         StoreOptions::default(),
    }
  }
}

/// What happened to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferStatus {
  /// The object was inspected and an access URL produced; nothing was copied.
  Inspected,
  /// The object was copied into the target.
  Copied {
    /// The address in the target.
    new_address:    String,
    /// Whether the source object was deleted afterwards.
    source_deleted: bool,
  },
  /// The address does not exist in the source.
  Missing,
  /// A step failed.
  Failed {
    /// The failure message.
    error: String,
  },
}

/// The per-address record produced by [`migrate_between`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferItem {
  /// The source address.
  pub address:    String,
  /// Source attributes, when they could be read.
  pub object:     Option<StoredObject>,
  /// A signed URL, or the public URL when signing was not possible.
  pub access_url: Option<String>,
  /// The outcome.
  pub status:     TransferStatus,
}

/// Moves (or, by default, inspects) a list of addresses from `source`
/// towards `target`.
///
/// For each address: check it exists in `source`, read its attributes, and
/// produce a signed access URL, falling back to the public URL when signing
/// fails. With [`TransferOptions::copy_bytes`] the bytes are then fetched and
/// stored in `target`. Items never abort the run; each gets its own status.
#[instrument(skip_all, fields(
  source = source.provider_name(),
  target = target.provider_name(),
  count = addresses.len(),
))]
pub async fn migrate_between<S, T>(
  source: &S,
  target: &T,
  addresses: &[String],
  options: &TransferOptions,
) -> Vec<TransferItem>
where
  S: ObjectStorageLike + ?Sized,
  T: ObjectStorageLike + ?Sized,
{
  let mut items = Vec::with_capacity(addresses.len());

  for address in addresses {
    let item = transfer_one(source, target, address, options).await;
    debug!(%address, status = ?item.status, "Transfer item finished");
    items.push(item);
  }

  let copied = items
    .iter()
    .filter(|i| matches!(i.status, TransferStatus::Copied { .. }))
    .count();
  info!(total = items.len(), copied, "Transfer finished");
  items
}

async fn transfer_one<S, T>(
  source: &S,
  target: &T,
  address: &str,
  options: &TransferOptions,
) -> TransferItem
where
  S: ObjectStorageLike + ?Sized,
  T: ObjectStorageLike + ?Sized,
{
  let mut item = TransferItem {
    address:    address.to_owned(),
    object:     None,
    access_url: None,
    status:     TransferStatus::Inspected,
  };

  if !source.exists(address).await {
    item.status = TransferStatus::Missing;
    return item;
  }

  let object = match source.stat(address).await {
    Ok(object) => object,
    Err(e) => {
      item.status = TransferStatus::Failed {
        error: e.to_string(),
      };
      return item;
    }
  };

  item.access_url = Some(match source.sign(address, options.sign_ttl).await {
    Ok(url) => url,
    Err(e) => {
      warn!(%address, error = %e, "Signing failed, using the public URL");
      source.public_url(&object.key)
    }
  });

  if options.copy_bytes {
    item.status = match copy_object(source, target, address, &object, options).await
    {
      Ok(status) => status,
      Err(e) => TransferStatus::Failed { error: e },
    };
  }

  item.object = Some(object);
  item
}

async fn copy_object<S, T>(
  source: &S,
  target: &T,
  address: &str,
  object: &StoredObject,
  options: &TransferOptions,
) -> Result<TransferStatus, String>
where
  S: ObjectStorageLike + ?Sized,
  T: ObjectStorageLike + ?Sized,
{
  let data = source.fetch(address).await.map_err(|e| e.to_string())?;
  let content_type = object
    .content_type
    .clone()
    .unwrap_or_else(|| "application/octet-stream".to_owned());

  let result = target
    .store(data, object.key.file_name(), &content_type, options.store.clone())
    .await
    .map_err(|e| e.to_string())?;

  let mut source_deleted = false;
  if options.delete_source {
    if target.exists(&result.address).await {
      source_deleted = source.delete(address).await.map_err(|e| e.to_string())?;
    } else {
      warn!(%address, "Copy not visible in target, keeping the source");
    }
  }

  Ok(TransferStatus::Copied {
    new_address: result.address,
    source_deleted,
  })
}
