use thiserror::Error;

/// Rejected user input inside a conversation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("empty reply")]
    Empty,
    #[error("not a valid chain address: {0}")]
    InvalidAddress(String),
    #[error("not a number: {0}")]
    NotANumber(String),
    #[error("{value} must be greater than {floor}")]
    TooSmall { value: i64, floor: i64 },
    #[error("unknown range type: {0}")]
    UnknownRangeType(String),
}

