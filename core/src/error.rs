//! Error types for the blood-bank lifecycle.

use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, BloodBankError>;

/// Error taxonomy for every lifecycle operation.
///
/// Errors are raised at the point of detection and never coerced: an operation
/// that fails leaves every row it touched in its prior state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BloodBankError {
    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// Input has the wrong shape or value, or names an illegal transition.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// One or more referenced entities do not exist.
    #[error("{entity} not found: {}", .ids.join(", "))]
    NotFound {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// Every id that could not be resolved
        ids: Vec<String>,
    },

    /// A state precondition does not hold (e.g. deleting a shipped distribution).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The inventory unit cannot cover the requested quantity.
    #[error("Insufficient stock in unit {unit_id}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Unit that was asked for stock
        unit_id: String,
        /// Quantity the unit can supply to this caller
        available: u32,
        /// Quantity that was asked for
        requested: u32,
    },

    /// No unit at the blood bank holds enough unexpired stock of the
    /// requested product and group.
    #[error("No matching stock at blood bank {blood_bank_id}: requested {requested}")]
    NoMatchingStock {
        /// Blood bank that was searched
        blood_bank_id: String,
        /// Quantity that was asked for
        requested: u32,
    },

    /// The acting user may not perform this operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// The persistence adapter failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The state change committed but its domain events could not be delivered.
    #[error("Committed, but event delivery failed: {0}")]
    EventDelivery(String),
}

impl BloodBankError {
    /// Build a `NotFound` error for a single id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            ids: vec![id.to_string()],
        }
    }

    /// Build a `NotFound` error listing several ids.
    pub fn not_found_many<I, T>(entity: &'static str, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self::NotFound {
            entity,
            ids: ids.into_iter().map(|id| id.to_string()).collect(),
        }
    }

    /// Returns `true` if this error is caused by the caller's input or the
    /// current state of the data, rather than by infrastructure.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bloodbank_core::BloodBankError;
    /// assert!(BloodBankError::Validation("bad".into()).is_user_error());
    /// assert!(!BloodBankError::Storage("down".into()).is_user_error());
    /// ```
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::Conflict(_)
                | Self::InsufficientStock { .. }
                | Self::NoMatchingStock { .. }
                | Self::Forbidden(_)
        )
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Only infrastructure failures qualify; the lifecycle itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_every_id() {
        let err = BloodBankError::not_found_many("Facility", ["a", "b"]);
        assert_eq!(err.to_string(), "Facility not found: a, b");
    }

    #[test]
    fn missing_stock_names_the_bank() {
        let err = BloodBankError::NoMatchingStock {
            blood_bank_id: "bank-7".to_string(),
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "No matching stock at blood bank bank-7: requested 3"
        );
        assert!(err.is_user_error());
    }

    #[test]
    fn storage_errors_are_retryable_not_user_errors() {
        let err = BloodBankError::Storage("connection reset".to_string());
        assert!(err.is_retryable());
        assert!(!err.is_user_error());
    }

    #[test]
    fn event_delivery_is_neither_user_error_nor_retryable() {
        let err = BloodBankError::EventDelivery("broker down".to_string());
        assert!(!err.is_retryable());
        assert!(!err.is_user_error());
    }
}
