//! Injected dependencies shared by every pantry component.
//!
//! Components never reach for global state: the store client, the membership
//! directory, the clock and the policy are constructed by the process entry
//! point and handed to [`crate::Pantry::new`] through a [`PantryEnvironment`].

use crate::config::PantryPolicy;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use pantry_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let now = clock.now();
/// assert!(now.timestamp() > 0);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Everything a [`crate::Pantry`] needs, wired once at start-up.
///
/// # Type Parameters
///
/// - `S`: the store client ([`crate::store::PantryStore`])
/// - `D`: the membership directory ([`crate::membership::MembershipDirectory`])
pub struct PantryEnvironment<S, D> {
    /// Shared store client.
    pub store: Arc<S>,
    /// Membership collaborator used to authorize actors.
    pub directory: Arc<D>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Notification thresholds.
    pub policy: PantryPolicy,
}

impl<S, D> PantryEnvironment<S, D> {
    /// Create a new environment with the default policy.
    #[must_use]
    pub fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
            policy: PantryPolicy::default(),
        }
    }

    /// Replace the notification policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PantryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl<S, D> Clone for PantryEnvironment<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
        }
    }
}
