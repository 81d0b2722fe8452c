mod blob_store;
mod connection_string;
mod environment;
mod error;

pub use blob_store::{BlobStoreConfig, ConfigError, DEFAULT_AD_HOC_TTL, DEFAULT_DOWNLOAD_TTL};
pub use connection_string::ConnectionString;
pub use environment::Environment;
pub use error::{ApiErrorResponse, AppError};
