//! `PostgreSQL` backend for the pantry ledger.
//!
//! This crate implements the `PantryStore` and `MembershipDirectory` traits
//! from `pantry-core` with sqlx:
//!
//! - One database transaction per atomic unit, with row locks for items and
//!   categories and transaction-scoped advisory locks for name decisions
//! - A unique index on (group, folded name, category) backing item upserts
//! - Embedded migrations
//! - Idempotent provisioning of predefined categories
//!
//! # Example
//!
//! ```ignore
//! use pantry_core::{Pantry, PantryEnvironment, SystemClock};
//! use pantry_postgres::{PostgresConfig, PostgresMembershipDirectory, PostgresPantryStore};
//! use std::sync::Arc;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = PostgresConfig::from_env()?.connect().await?;
//!     let store = PostgresPantryStore::new(pool.clone());
//!     store.migrate().await?;
//!
//!     let pantry = Pantry::new(PantryEnvironment::new(
//!         Arc::new(store),
//!         Arc::new(PostgresMembershipDirectory::new(pool)),
//!         Arc::new(SystemClock),
//!     ));
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod provision;
pub mod store;

pub use config::{ConfigError, PostgresConfig};
pub use directory::PostgresMembershipDirectory;
pub use provision::provision_predefined_categories;
pub use store::{PostgresPantryStore, PostgresTransaction};
