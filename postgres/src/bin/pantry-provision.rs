//! Run migrations and provision the predefined categories.
//!
//! ```text
//! DATABASE_URL=postgres://localhost/pantry RUST_LOG=info pantry-provision
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use pantry_core::PREDEFINED_CATEGORIES;
use pantry_postgres::{PostgresConfig, PostgresPantryStore, provision_predefined_categories};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = PostgresConfig::from_env().context("Invalid database configuration")?;
    let pool = config.connect().await.context("Failed to connect to PostgreSQL")?;

    tracing::info!("Running migrations");
    PostgresPantryStore::new(pool.clone())
        .migrate()
        .await
        .context("Migrations failed")?;

    let inserted = provision_predefined_categories(&pool, PREDEFINED_CATEGORIES, Utc::now())
        .await
        .context("Provisioning failed")?;

    tracing::info!(
        inserted,
        total = PREDEFINED_CATEGORIES.len(),
        "Predefined categories provisioned"
    );
    Ok(())
}
