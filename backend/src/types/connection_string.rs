//! Storage account connection strings
//!
//! `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=<base64>;EndpointSuffix=core.windows.net`

use url::Url;

use super::ConfigError;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Parsed storage account connection string
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    account_name: String,
    account_key: Option<String>,
    protocol: String,
    endpoint_suffix: String,
    blob_endpoint: Option<String>,
}

impl ConnectionString {
    /// Parses `Key=Value` pairs separated by `;`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a segment is not `Key=Value` or
    /// `AccountName` is missing
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            name: "AZURE_STORAGE_CONNECTION_STRING",
            reason,
        };

        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut endpoint_suffix = None;
        let mut blob_endpoint = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            // Keys are base64 and may end in '=' padding, so split on the first '=' only
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| invalid(format!("segment '{}' is not Key=Value", redact(segment))))?;
            let value = value.trim().to_string();

            match key.trim() {
                "AccountName" => account_name = Some(value),
                "AccountKey" => account_key = Some(value),
                "DefaultEndpointsProtocol" => protocol = Some(value),
                "EndpointSuffix" => endpoint_suffix = Some(value),
                "BlobEndpoint" => blob_endpoint = Some(value),
                other => tracing::debug!(key = other, "Ignoring connection string key"),
            }
        }

        let account_name = account_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("AccountName is missing".to_string()))?;

        Ok(Self {
            account_name,
            account_key: account_key.filter(|key| !key.is_empty()),
            protocol: protocol.unwrap_or_else(|| "https".to_string()),
            endpoint_suffix: endpoint_suffix.unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            blob_endpoint: blob_endpoint.filter(|endpoint| !endpoint.is_empty()),
        })
    }

    /// Storage account name
    #[must_use]
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Base64 account key, if the string carries one
    #[must_use]
    pub fn account_key(&self) -> Option<&str> {
        self.account_key.as_deref()
    }

    /// Blob endpoint: explicit `BlobEndpoint`, else `<protocol>://<account>.blob.<suffix>`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the endpoint is not a valid URL
    pub fn blob_endpoint(&self) -> Result<Url, ConfigError> {
        let endpoint = self.blob_endpoint.clone().unwrap_or_else(|| {
            format!(
                "{}://{}.blob.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            )
        });

        Url::parse(&endpoint).map_err(|e| ConfigError::InvalidValue {
            name: "AZURE_STORAGE_CONNECTION_STRING",
            reason: format!("blob endpoint '{endpoint}': {e}"),
        })
    }
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

fn redact(segment: &str) -> &str {
    if segment.starts_with("AccountKey") {
        "AccountKey=<redacted>"
    } else {
        segment
    }
}
