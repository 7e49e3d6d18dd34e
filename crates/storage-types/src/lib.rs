//! Shared value types for the object-storage providers.

mod blob_key;
mod capabilities;
mod provider_kind;

pub use self::{
  blob_key::BlobKey,
  capabilities::ProviderCapabilities,
  provider_kind::{ProviderKind, UnknownProviderKind, is_cloud_address},
};
