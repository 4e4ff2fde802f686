use crate::types::SubscriptionStatus;
use thiserror::Error;
use uuid::Uuid;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Pricing tier not found: {0}")]
    TierNotFound(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(Uuid),

    #[error("Invalid transition for subscription {id}: status is {status}")]
    InvalidTransition {
        id: Uuid,
        status: SubscriptionStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Usage limit exceeded: {metric} {requested} > {limit}")]
    UsageLimitExceeded {
        metric: &'static str,
        limit: u32,
        requested: u32,
    },

    #[error("Concurrent modification of subscription {0}, retry the request")]
    Conflict(Uuid),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    /// Stable machine-readable code used in API error bodies and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TierNotFound(_) => "tier_not_found",
            Self::SubscriptionNotFound(_) => "subscription_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Validation(_) => "validation_failed",
            Self::UsageLimitExceeded { .. } => "usage_limit_exceeded",
            Self::Conflict(_) => "conflict",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Config(_) => "config_error",
            Self::Serialization(_) | Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Whether a caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StorageUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_retryability() {
        let err = BillingError::TierNotFound("gold".into());
        assert_eq!(err.code(), "tier_not_found");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Pricing tier not found: gold");

        let id = Uuid::new_v4();
        assert!(BillingError::Conflict(id).is_retryable());
        assert!(BillingError::StorageUnavailable("down".into()).is_retryable());

        let err = BillingError::InvalidTransition {
            id,
            status: SubscriptionStatus::Cancelled,
        };
        assert_eq!(err.code(), "invalid_transition");
        assert!(err.to_string().contains("cancelled"));
    }
}
