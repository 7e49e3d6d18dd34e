//! Frontend for the object storage providers.
//!
//! [`ProviderFactory`] turns an [`EnvSnapshot`] into an [`ObjectStorage`],
//! the closed set of concrete providers behind one
//! [`ObjectStorageLike`](storage_core::ObjectStorageLike) implementation.

mod config;
pub mod env;
mod factory;
mod object_storage;
#[cfg(test)]
mod tests;
mod transfer;

pub use storage_core::*;

pub use self::{
  config::{ConfigValidation, ProviderConfig},
  env::EnvSnapshot,
  factory::ProviderFactory,
  object_storage::ObjectStorage,
  transfer::{TransferItem, TransferOptions, TransferStatus, migrate_between},
};
