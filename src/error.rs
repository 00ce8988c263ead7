use crate::domain::{MeetingId, TradeId};
use thiserror::Error;

/// Main error type for the exchange core.
#[derive(Error, Debug)]
pub enum SwapError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Protocol errors
    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Stale revert: {0}")]
    Stale(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SwapError
pub type Result<T> = std::result::Result<T, SwapError>;

/// Specific error types for trade protocol operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("Trade not found: {trade}")]
    NotFound { trade: TradeId },

    #[error("Only the responder may act on trade {trade}")]
    NotResponder { trade: TradeId },

    #[error("Trade {trade} is {status}, expected {expected}")]
    WrongState {
        trade: TradeId,
        status: String,
        expected: String,
    },

    #[error("Item {item} is no longer available for lending")]
    ItemUnavailable { item: u64 },

    #[error("Trade {trade} cannot take another meeting")]
    MeetingCapacity { trade: TradeId },
}

/// Specific error types for meeting negotiation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeetingError {
    #[error("Meeting not found: {meeting}")]
    NotFound { meeting: MeetingId },

    #[error("Arrangement already confirmed; edit or confirmation refused")]
    AlreadyConfirmed,

    #[error("Counterpart has not proposed or edited yet; nothing to confirm")]
    NothingToConfirm,

    #[error("Meeting {meeting} is not fully arranged")]
    NotArranged { meeting: MeetingId },

    #[error("Occurrence already confirmed by this side")]
    OccurrenceAlreadyConfirmed,

    #[error("Edit limit reached: {edits} edits against a limit of {limit}")]
    EditLimit { edits: u32, limit: u32 },
}

impl From<TradeError> for SwapError {
    fn from(err: TradeError) -> Self {
        match err {
            TradeError::NotFound { .. } => SwapError::NotFound(err.to_string()),
            TradeError::NotResponder { .. } => SwapError::PermissionDenied(err.to_string()),
            TradeError::WrongState { .. }
            | TradeError::ItemUnavailable { .. }
            | TradeError::MeetingCapacity { .. } => SwapError::StateConflict(err.to_string()),
        }
    }
}

impl From<MeetingError> for SwapError {
    fn from(err: MeetingError) -> Self {
        match err {
            MeetingError::NotFound { .. } => SwapError::NotFound(err.to_string()),
            MeetingError::EditLimit { .. } => SwapError::LimitExceeded(err.to_string()),
            _ => SwapError::StateConflict(err.to_string()),
        }
    }
}
