use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid date key: {0}")]
    InvalidDateKey(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
