use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("core error: {0}")]
    Core(#[from] daygrid_core::CoreError),
}
