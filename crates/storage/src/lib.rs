pub mod auth;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use auth::SessionAuth;
pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::*;
