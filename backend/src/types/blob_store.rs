//! Blob store addressing and URL lifetime settings

use chrono::TimeDelta;
use thiserror::Error;
use url::Url;

/// Default lifetime of an ad-hoc signed URL
pub const DEFAULT_AD_HOC_TTL: TimeDelta = TimeDelta::hours(1);

/// Default lifetime of a record download URL
pub const DEFAULT_DOWNLOAD_TTL: TimeDelta = TimeDelta::hours(24);

/// Errors raised while building configuration at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A variable is set but unusable
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable name
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Signing credentials are required but missing or unusable
    #[error("Blob signing credentials are not configured: {0}")]
    Credentials(String),
}

/// Where blobs live and how long minted URLs stay valid
///
/// Built once at startup and shared by reference; it never holds signing secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStoreConfig {
    account: String,
    container: String,
    endpoint: Url,
    ad_hoc_ttl: TimeDelta,
    download_ttl: TimeDelta,
}

impl BlobStoreConfig {
    /// Creates a config for `https://<account>.blob.core.windows.net`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the account or container name is empty, or if
    /// the container name contains a `/`
    pub fn new(account: &str, container: &str) -> Result<Self, ConfigError> {
        let account = account.trim();
        if account.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "account",
                reason: "must not be empty".to_string(),
            });
        }

        let endpoint = Url::parse(&format!("https://{account}.blob.core.windows.net")).map_err(
            |e| ConfigError::InvalidValue {
                name: "account",
                reason: e.to_string(),
            },
        )?;

        Self::with_endpoint(account, container, endpoint)
    }

    /// Creates a config with an explicit blob endpoint, e.g. an emulator at
    /// `http://127.0.0.1:10000/devstoreaccount1`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any part is empty or the endpoint is not an
    /// `http(s)` URL
    pub fn with_endpoint(
        account: &str,
        container: &str,
        mut endpoint: Url,
    ) -> Result<Self, ConfigError> {
        let account = account.trim();
        let container = container.trim();

        if account.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "account",
                reason: "must not be empty".to_string(),
            });
        }
        if container.is_empty() || container.contains('/') {
            return Err(ConfigError::InvalidValue {
                name: "container",
                reason: format!("'{container}' is not a container name"),
            });
        }
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.host_str().is_none() {
            return Err(ConfigError::InvalidValue {
                name: "endpoint",
                reason: format!("'{endpoint}' is not an http(s) URL"),
            });
        }

        endpoint.set_query(None);
        endpoint.set_fragment(None);

        Ok(Self {
            account: account.to_string(),
            container: container.to_string(),
            endpoint,
            ad_hoc_ttl: DEFAULT_AD_HOC_TTL,
            download_ttl: DEFAULT_DOWNLOAD_TTL,
        })
    }

    /// Overrides the ad-hoc and download URL lifetimes
    #[must_use]
    pub fn with_ttls(mut self, ad_hoc_ttl: TimeDelta, download_ttl: TimeDelta) -> Self {
        self.ad_hoc_ttl = ad_hoc_ttl;
        self.download_ttl = download_ttl;
        self
    }

    /// Storage account name
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Container that bare names and container-prefixed paths resolve into
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Blob endpoint URL
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint rendered without a trailing slash
    #[must_use]
    pub fn endpoint_base(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }

    /// Path prefix carried by the endpoint itself, empty for account-per-host endpoints
    #[must_use]
    pub fn endpoint_path_prefix(&self) -> &str {
        self.endpoint.path().trim_matches('/')
    }

    /// Whether the endpoint is served over TLS
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.endpoint.scheme() == "https"
    }

    /// Lifetime of ad-hoc signed URLs
    #[must_use]
    pub const fn ad_hoc_ttl(&self) -> TimeDelta {
        self.ad_hoc_ttl
    }

    /// Lifetime of record download URLs
    #[must_use]
    pub const fn download_ttl(&self) -> TimeDelta {
        self.download_ttl
    }
}
