use thiserror::Error;

/// Infrastructure failures raised by an [`InventoryStore`](crate::repository::InventoryStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("exclusive hold not acquired within {0} ms")]
    LockTimeout(u64),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Why the engine refused an operation. Every variant leaves durable state untouched.
#[derive(Debug, Error)]
pub enum RejectionReason {
    #[error("{0}")]
    InvalidInput(String),
    #[error("item or date not found")]
    NotFound,
    #[error("insufficient capacity. Available: {available}")]
    InsufficientCapacity { available: i32 },
    #[error("total capacity cannot drop below {committed} committed units")]
    CapacityBelowCommitted { committed: i32 },
    #[error("booking is already cancelled")]
    AlreadyCancelled,
    #[error("storage failure: {0}")]
    StorageFailure(String),
    #[error("timed out waiting for the slot")]
    Timeout,
}

impl RejectionReason {
    /// Short machine-readable code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidInput(_) => "invalid_input",
            RejectionReason::NotFound => "not_found",
            RejectionReason::InsufficientCapacity { .. } => "no_availability",
            RejectionReason::CapacityBelowCommitted { .. } => "capacity_below_committed",
            RejectionReason::AlreadyCancelled => "already_cancelled",
            RejectionReason::StorageFailure(_) => "db_error",
            RejectionReason::Timeout => "timeout",
        }
    }

    /// Whether a caller may safely resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RejectionReason::StorageFailure(_) | RejectionReason::Timeout)
    }
}

impl From<StoreError> for RejectionReason {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(_) => RejectionReason::Timeout,
            other => RejectionReason::StorageFailure(other.to_string()),
        }
    }
}

pub type EngineResult<T> = Result<T, RejectionReason>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_timeout_maps_to_timeout() {
        let reason: RejectionReason = StoreError::LockTimeout(50).into();
        assert!(matches!(reason, RejectionReason::Timeout));
        assert!(reason.is_retryable());
    }

    #[test]
    fn insufficient_capacity_message_carries_availability() {
        let reason = RejectionReason::InsufficientCapacity { available: 2 };
        assert_eq!(reason.to_string(), "insufficient capacity. Available: 2");
        assert!(!reason.is_retryable());
    }
}
