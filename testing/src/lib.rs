//! # Pantry Testing
//!
//! Testing utilities for the pantry ledger.
//!
//! This crate provides:
//! - [`InMemoryPantryStore`]: transactional in-memory store with fault injection
//! - [`InMemoryDirectory`]: membership directory backed by a `HashMap`
//! - [`FixedClock`]: deterministic time
//! - [`TestPantry`]: a wired pantry with one group and one member
//! - [`strategies`]: proptest strategies for quantities and names
//!
//! ## Example
//!
//! ```ignore
//! use pantry_testing::TestPantry;
//!
//! #[tokio::test]
//! async fn test_use_drains_stock() {
//!     let t = TestPantry::new();
//!     let milk = t.add("Milk", 2.0, "L", "Dairy").await;
//!
//!     let outcome = t.pantry.items().use_item(milk.item.id, 2.0, t.member.user_id).await.unwrap();
//!     assert_eq!(outcome.remaining_quantity, 0.0);
//! }
//! ```

use chrono::{DateTime, Utc};
use pantry_core::Clock;

pub mod directory;
pub mod harness;
pub mod store;
pub mod strategies;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use pantry_testing::mocks::FixedClock;
    /// use pantry_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a `RUST_LOG`-driven subscriber that writes through the test
/// harness. Safe to call from every test.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pantry_core=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
}

// Re-export commonly used items
pub use directory::InMemoryDirectory;
pub use harness::TestPantry;
pub use mocks::{FixedClock, test_clock};
pub use store::{FaultPlan, InMemoryPantryStore, InMemoryTransaction};
