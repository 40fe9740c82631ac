//! Notification policy configuration.
//!
//! Thresholds are provided by the application; the defaults reproduce the
//! reference household policy (low stock at one unit, expiring within three
//! days).

use chrono::Duration;
use std::env;
use thiserror::Error;

/// Environment variable overriding [`PantryPolicy::low_stock_threshold`].
pub const LOW_STOCK_THRESHOLD_VAR: &str = "PANTRY_LOW_STOCK_THRESHOLD";

/// Environment variable overriding the expiring-soon window, in days.
pub const EXPIRING_SOON_DAYS_VAR: &str = "PANTRY_EXPIRING_SOON_DAYS";

/// Invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid value for {var}: {value:?} ({reason})")]
pub struct ConfigError {
    /// Variable or field name
    pub var: &'static str,
    /// Offending raw value
    pub value: String,
    /// What was wrong with it
    pub reason: &'static str,
}

/// Thresholds driving the notification engine and read-side flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PantryPolicy {
    /// Quantities in `(0, low_stock_threshold]` are low stock.
    ///
    /// Default: 1.0
    pub low_stock_threshold: f64,

    /// Items expiring within this window of "now" are expiring soon.
    ///
    /// Default: 3 days
    pub expiring_soon_window: Duration,
}

impl PantryPolicy {
    /// Default low-stock threshold (one unit).
    pub const DEFAULT_LOW_STOCK_THRESHOLD: f64 = 1.0;

    /// Default expiring-soon window in days.
    pub const DEFAULT_EXPIRING_SOON_DAYS: i64 = 3;

    /// Create the reference policy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            low_stock_threshold: Self::DEFAULT_LOW_STOCK_THRESHOLD,
            expiring_soon_window: Duration::days(Self::DEFAULT_EXPIRING_SOON_DAYS),
        }
    }

    /// Set the low-stock threshold.
    #[must_use]
    pub const fn with_low_stock_threshold(mut self, threshold: f64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    /// Set the expiring-soon window.
    #[must_use]
    pub const fn with_expiring_soon_window(mut self, window: Duration) -> Self {
        self.expiring_soon_window = window;
        self
    }

    /// Whole days in the expiring-soon window, for messages.
    #[must_use]
    pub fn expiring_soon_days(&self) -> i64 {
        self.expiring_soon_window.num_days()
    }

    /// Check that thresholds are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the threshold is negative or not finite, or
    /// the window is negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.low_stock_threshold.is_finite() || self.low_stock_threshold < 0.0 {
            return Err(ConfigError {
                var: "low_stock_threshold",
                value: self.low_stock_threshold.to_string(),
                reason: "must be a finite, non-negative number",
            });
        }
        if self.expiring_soon_window < Duration::zero() {
            return Err(ConfigError {
                var: "expiring_soon_window",
                value: self.expiring_soon_window.to_string(),
                reason: "must not be negative",
            });
        }
        Ok(())
    }

    /// Load the policy from environment variables, falling back to defaults.
    ///
    /// - `PANTRY_LOW_STOCK_THRESHOLD` (float, default 1.0)
    /// - `PANTRY_EXPIRING_SOON_DAYS` (integer, default 3)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set but unparsable or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut policy = Self::new();

        if let Ok(raw) = env::var(LOW_STOCK_THRESHOLD_VAR) {
            policy.low_stock_threshold = raw.trim().parse().map_err(|_| ConfigError {
                var: LOW_STOCK_THRESHOLD_VAR,
                value: raw.clone(),
                reason: "expected a number",
            })?;
        }

        if let Ok(raw) = env::var(EXPIRING_SOON_DAYS_VAR) {
            let days: i64 = raw.trim().parse().map_err(|_| ConfigError {
                var: EXPIRING_SOON_DAYS_VAR,
                value: raw.clone(),
                reason: "expected a whole number of days",
            })?;
            policy.expiring_soon_window = Duration::days(days);
        }

        policy.validate()?;
        Ok(policy)
    }
}

impl Default for PantryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_policy() {
        let policy = PantryPolicy::default();
        assert!((policy.low_stock_threshold - 1.0).abs() < f64::EPSILON);
        assert_eq!(policy.expiring_soon_days(), 3);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn builder_overrides_thresholds() {
        let policy = PantryPolicy::new()
            .with_low_stock_threshold(2.5)
            .with_expiring_soon_window(Duration::days(7));

        assert!((policy.low_stock_threshold - 2.5).abs() < f64::EPSILON);
        assert_eq!(policy.expiring_soon_days(), 7);
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let err = PantryPolicy::new()
            .with_low_stock_threshold(-1.0)
            .validate()
            .unwrap_err();
        assert_eq!(err.var, "low_stock_threshold");
    }
}
