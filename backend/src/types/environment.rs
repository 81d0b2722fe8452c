//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion};
use chrono::TimeDelta;
use tracing::Level;
use url::Url;

use super::{
    BlobStoreConfig, ConfigError, ConnectionString, DEFAULT_AD_HOC_TTL, DEFAULT_DOWNLOAD_TTL,
};
use crate::blob_access::{SigningCredentials, MAX_TTL};

const DEFAULT_CONTAINER: &str = "files";
const DEFAULT_DOCUMENTS_TABLE: &str = "docvault-documents";

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack` and optionally a blob emulator)
    Development {
        /// Optional blob endpoint override, e.g. `http://127.0.0.1:10000/devstoreaccount1`
        blob_endpoint_override: Option<Url>,
    },
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => {
                let blob_endpoint_override = env::var("BLOB_ENDPOINT")
                    .ok()
                    .and_then(|val| Url::parse(val.trim()).ok());

                Self::Development {
                    blob_endpoint_override,
                }
            }
            _ => panic!("Invalid environment: {env}"),
        }
    }

    fn connection_string() -> Result<Option<ConnectionString>, ConfigError> {
        first_var(&["AZURE_STORAGE_CONNECTION_STRING"])
            .map(|raw| ConnectionString::parse(&raw))
            .transpose()
    }

    /// Builds the blob store configuration
    ///
    /// The account comes from `AZURE_STORAGE_CONNECTION_STRING` or
    /// `AZURE_STORAGE_ACCOUNT`/`BLOB_ACCOUNT`; the container from
    /// `AZURE_BLOB_CONTAINER`/`BLOB_CONTAINER` (default `files`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingVar` if no account is configured
    /// Returns `ConfigError::InvalidValue` if a value is unusable
    pub fn blob_store_config(&self) -> Result<BlobStoreConfig, ConfigError> {
        let connection_string = Self::connection_string()?;
        let container = first_var(&["AZURE_BLOB_CONTAINER", "BLOB_CONTAINER"])
            .unwrap_or_else(|| DEFAULT_CONTAINER.to_string());

        let config = match (&connection_string, self) {
            (
                _,
                Self::Development {
                    blob_endpoint_override: Some(endpoint),
                },
            ) => {
                let account = connection_string
                    .as_ref()
                    .map(|cs| cs.account_name().to_string())
                    .or_else(|| first_var(&["AZURE_STORAGE_ACCOUNT", "BLOB_ACCOUNT"]))
                    .ok_or(ConfigError::MissingVar("AZURE_STORAGE_ACCOUNT/BLOB_ACCOUNT"))?;
                BlobStoreConfig::with_endpoint(&account, &container, endpoint.clone())?
            }
            (Some(cs), _) => {
                BlobStoreConfig::with_endpoint(cs.account_name(), &container, cs.blob_endpoint()?)?
            }
            (None, _) => {
                let account = first_var(&["AZURE_STORAGE_ACCOUNT", "BLOB_ACCOUNT"])
                    .ok_or(ConfigError::MissingVar("AZURE_STORAGE_ACCOUNT/BLOB_ACCOUNT"))?;
                BlobStoreConfig::new(&account, &container)?
            }
        };

        Ok(config.with_ttls(
            hours_var("SAS_HOURS", DEFAULT_AD_HOC_TTL),
            hours_var("DOWNLOAD_SAS_HOURS", DEFAULT_DOWNLOAD_TTL),
        ))
    }

    /// Loads the account key used to sign blob URLs
    ///
    /// Production and staging refuse to start without one; development runs without
    /// signing so that display-only flows stay usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Credentials` if the key is missing where required or unusable
    pub fn signing_credentials(&self) -> Result<Option<SigningCredentials>, ConfigError> {
        let connection_string_has_key = Self::connection_string()?
            .is_some_and(|cs| cs.account_key().is_some());

        let credentials = if connection_string_has_key {
            first_var(&["AZURE_STORAGE_CONNECTION_STRING"])
                .map(|raw| SigningCredentials::from_connection_string(&raw))
        } else {
            first_var(&["AZURE_STORAGE_KEY", "BLOB_KEY"])
                .map(|key| SigningCredentials::from_account_key(&key))
        };

        match (credentials, self) {
            (Some(credentials), _) => credentials
                .map(Some)
                .map_err(|e| ConfigError::Credentials(e.to_string())),
            (None, Self::Production | Self::Staging) => Err(ConfigError::Credentials(
                "AZURE_STORAGE_KEY/BLOB_KEY is not set".to_string(),
            )),
            (None, Self::Development { .. }) => {
                tracing::warn!("No blob account key configured, signed URLs are disabled");
                Ok(None)
            }
        }
    }

    /// Returns the `DynamoDB` table holding document records
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingVar` if `DOCUMENTS_TABLE_NAME` is not set outside
    /// development
    pub fn documents_table_name(&self) -> Result<String, ConfigError> {
        match self {
            Self::Production | Self::Staging => first_var(&["DOCUMENTS_TABLE_NAME"])
                .ok_or(ConfigError::MissingVar("DOCUMENTS_TABLE_NAME")),
            Self::Development { .. } => Ok(first_var(&["DOCUMENTS_TABLE_NAME"])
                .unwrap_or_else(|| DEFAULT_DOCUMENTS_TABLE.to_string())),
        }
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub const fn override_aws_endpoint_url(&self) -> Option<&str> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development { .. } => Some("http://localhost:4566"),
        }
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// AWS `DynamoDB` service configuration
    pub async fn dynamodb_client_config(&self) -> aws_sdk_dynamodb::Config {
        let aws_config = self.aws_config().await;
        (&aws_config).into()
    }

    /// Default tracing level, overridable through `TRACING_LEVEL`
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        env::var("TRACING_LEVEL")
            .ok()
            .and_then(|val| val.parse::<Level>().ok())
            .unwrap_or(match self {
                Self::Production | Self::Staging => Level::INFO,
                Self::Development { .. } => Level::DEBUG,
            })
    }
}

/// First non-empty value among the given variables
fn first_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|val| val.trim().to_string())
        .find(|val| !val.is_empty())
}

/// Positive whole hours up to [`MAX_TTL`] from a variable, the default when unset or invalid
fn hours_var(name: &str, default: TimeDelta) -> TimeDelta {
    env::var(name)
        .ok()
        .and_then(|val| val.trim().parse::<i64>().ok())
        .filter(|hours| *hours > 0)
        .and_then(TimeDelta::try_hours)
        .filter(|ttl| *ttl <= MAX_TTL)
        .unwrap_or(default)
}
