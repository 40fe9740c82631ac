//! Error taxonomy for pantry operations.
//!
//! Two layers:
//!
//! - [`StoreError`]: what the persistence boundary reports.
//! - [`PantryError`]: what an operation reports to its caller. Store faults are
//!   wrapped as [`PantryError::Store`] and render as a generic internal error.

use thiserror::Error;

/// Result type alias for pantry operations.
pub type Result<T> = std::result::Result<T, PantryError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a store implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The atomic unit could not be opened.
    #[error("Failed to begin transaction: {0}")]
    TransactionStart(String),

    /// The atomic unit could not be committed; nothing was applied.
    #[error("Failed to commit transaction: {0}")]
    Commit(String),

    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Any other query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    Decode(String),
}

/// Failures reported by pantry operations.
///
/// Use [`PantryError::status_code`] to map onto an HTTP response.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PantryError {
    // ═══════════════════════════════════════════════════════════
    // Caller errors
    // ═══════════════════════════════════════════════════════════

    /// Malformed input, rejected before any store access.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An opaque reference could not be parsed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Referenced resource does not exist, is inactive, or is not visible.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource kind ("item", "category", "user", ...)
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Actor lacks membership or ownership for the target.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Name collision, or a category still referenced by items.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A `use` asked for more than the current stock.
    #[error("Insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity {
        /// Amount the caller tried to consume
        requested: f64,
        /// Stock at the time of the attempt
        available: f64,
    },

    // ═══════════════════════════════════════════════════════════
    // System errors
    // ═══════════════════════════════════════════════════════════

    /// Store fault (should not be exposed to users).
    #[error("Internal error")]
    Store(#[source] StoreError),
}

impl PantryError {
    /// Shorthand for [`PantryError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// HTTP status the surrounding request layer should answer with.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pantry_core::PantryError;
    /// assert_eq!(PantryError::Forbidden("not a member".into()).status_code(), 403);
    /// assert_eq!(PantryError::not_found("item", "42").status_code(), 404);
    /// ```
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::InvalidReference(_)
            | Self::InsufficientQuantity { .. } => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Store(_) => 500,
        }
    }

    /// Returns `true` if the caller caused the failure.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl From<StoreError> for PantryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(detail) => Self::Conflict(detail),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_request_contract() {
        assert_eq!(PantryError::Validation("empty name".into()).status_code(), 400);
        assert_eq!(PantryError::InvalidReference("zzz".into()).status_code(), 400);
        assert_eq!(
            PantryError::InsufficientQuantity {
                requested: 2.0,
                available: 1.0
            }
            .status_code(),
            400
        );
        assert_eq!(PantryError::Conflict("taken".into()).status_code(), 409);
        assert_eq!(
            PantryError::Store(StoreError::Commit("socket closed".into())).status_code(),
            500
        );
    }

    #[test]
    fn unique_violation_becomes_conflict() {
        let err: PantryError = StoreError::UniqueViolation("item key".into()).into();
        assert_eq!(err, PantryError::Conflict("item key".into()));
    }

    #[test]
    fn store_faults_hide_driver_detail() {
        let err: PantryError = StoreError::Database("relation \"x\" does not exist".into()).into();
        assert_eq!(err.to_string(), "Internal error");
        assert!(!err.is_user_error());
    }
}
