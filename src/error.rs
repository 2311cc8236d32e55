//! Error taxonomy for the marketplace core.
//!
//! Two levels: `StoreError` for the storage engine, `ApiError` for every
//! operation surfaced to callers. Forbidden and Conflict messages are
//! deliberately generic: they must not reveal whether a secret was wrong
//! versus never set, nor what state an entity is currently in.

use thiserror::Error;

/// Storage-level failures (engine, encoding, filesystem).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage engine error: {0}")]
    Engine(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operation-level errors surfaced by every marketplace operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Entity id does not exist. Safe to expose.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// Secret missing or mismatched. The message never distinguishes which.
    #[error("forbidden: a valid secret is required for this operation")]
    Forbidden,

    /// Illegal state transition. The current state is never echoed back.
    #[error("conflict: the requested transition is not allowed in the current state")]
    Conflict,

    /// Malformed input. Field-level detail is safe to expose.
    #[error("validation failed on `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Registry upstream failure. Only `refresh` callers and the health
    /// check ever see this variant.
    #[error("upstream registry unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        ApiError::NotFound { entity, id }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

impl From<sled::Error> for ApiError {
    fn from(err: sled::Error) -> Self {
        ApiError::Storage(StoreError::Engine(err))
    }
}

impl From<bincode::Error> for ApiError {
    fn from(err: bincode::Error) -> Self {
        ApiError::Storage(StoreError::Encoding(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_message_is_generic() {
        // Same rendering whether the secret was wrong or never issued.
        let msg = ApiError::Forbidden.to_string();
        assert!(!msg.contains("wrong"));
        assert!(!msg.contains("missing"));
    }

    #[test]
    fn test_conflict_message_hides_state() {
        let msg = ApiError::Conflict.to_string();
        for state in ["open", "claimed", "matched", "fulfilled", "cancelled"] {
            assert!(!msg.contains(state));
        }
    }

    #[test]
    fn test_validation_carries_field() {
        let err = ApiError::validation("budget", "must be greater than zero");
        assert!(err.to_string().contains("budget"));
    }
}
