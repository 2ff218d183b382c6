use daygrid_core::CoreError;
use daygrid_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config io error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
