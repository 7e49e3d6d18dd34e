//! Migrates file-backed product images into the configured cloud storage.

use std::fmt::Write as _;

use clap::Parser;
use image_migrate::MigrationJob;
use miette::{Context, Result, bail};
use record_impl_postgres::{DEFAULT_IMAGE_TABLE, PostgresImageStore};
use storage::{
  ObjectStorage, ProviderFactory, ProviderKind, env::RECOGNISED_KEYS,
};
use storage_impl_fs::LocalStorage;
use tracing_subscriber::EnvFilter;

/// Postgres connection string of the record store.
const DATABASE_URL: &str = "DATABASE_URL";
/// Table holding the image rows.
const IMAGE_TABLE: &str = "IMAGE_TABLE";

fn environment_help() -> String {
  let mut help = String::from("Environment variables:\n");
  let job_keys = [
    (DATABASE_URL, "Postgres connection string (required)"),
    (IMAGE_TABLE, "image table (default: product_images)"),
  ];
  for (key, description) in job_keys.iter().chain(RECOGNISED_KEYS) {
    let _ = writeln!(help, "  {key:<32} {description}");
  }
  help
}

#[derive(Parser, Debug)]
#[command(
  version,
  about = "Move file-backed product images into cloud storage",
  after_help = environment_help()
)]
struct Args {
  /// Report how many images are still local, without changing anything
  #[arg(short, long)]
  status: bool,

  /// Target provider (overrides STORAGE_PROVIDER and auto-detection)
  #[arg(long)]
  provider: Option<ProviderKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let args = Args::parse();
  let factory = ProviderFactory::from_process_env();
  let env = factory.env();

  let database_url = env
    .get(DATABASE_URL)
    .ok_or_else(|| miette::miette!("`{DATABASE_URL}` is not set"))?;
  let table = env.get_or(IMAGE_TABLE, DEFAULT_IMAGE_TABLE);
  let records = PostgresImageStore::new(database_url, table)
    .await
    .context("failed to open the image record store")?;

  let target = factory
    .select_provider(args.provider)
    .await
    .context("failed to select the target storage provider")?;
  if matches!(target, ObjectStorage::Local(_)) && !args.status {
    bail!(
      "the selected storage provider is the local filesystem; configure a \
       cloud provider before migrating"
    );
  }

  let legacy = LocalStorage::new(factory.local_config())
    .await
    .context("failed to open the legacy local storage")?;
  let job = MigrationJob::new(target, legacy, records);

  if args.status {
    let report = job.status().await?;
    print!("{report}");
    return Ok(());
  }

  let outcome = job.run().await?;
  println!();
  print!("{outcome}");
  Ok(())
}
