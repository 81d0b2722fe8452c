//! Public and time-limited access URLs for stored blobs
//!
//! [`AccessUrlIssuer::public_url`] renders a stable, token-free URL for display and bulk
//! listings. [`AccessUrlIssuer::signed_url`] mints a read-only SAS URL with a bounded
//! validity window. Grants are minted per request and never cached.

mod credentials;
mod error;
pub(crate) mod sas;

use std::fmt;

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use percent_encoding::utf8_percent_encode;
use serde::Serialize;

pub use credentials::SigningCredentials;
pub use error::{AccessError, AccessResult};
pub use sas::SAS_VERSION;

use crate::blob_ref::{strip_token, BlobPath};
use crate::types::BlobStoreConfig;

/// Grants start this far in the past to tolerate clock drift between caller and store
pub const CLOCK_SKEW_MARGIN: TimeDelta = TimeDelta::minutes(5);

/// Longest lifetime a grant may be requested with
pub const MAX_TTL: TimeDelta = TimeDelta::days(365);

/// How the browser should treat the downloaded blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Render in the browser (PDF viewer, text viewer)
    #[default]
    Inline,
    /// Force a download
    Attachment,
}

impl AccessMode {
    const fn disposition_type(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// Capability carried by a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read the blob and its properties
    Read,
}

impl Permission {
    const fn as_sas(self) -> &'static str {
        match self {
            Self::Read => "r",
        }
    }
}

/// Parameters of a signed URL request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlRequest {
    /// Inline or attachment disposition
    pub mode: AccessMode,
    /// How long the URL stays valid from now
    pub ttl: TimeDelta,
    /// Filename for `Content-Disposition`, defaults to the last path segment
    pub filename: Option<String>,
    /// `Content-Type` override; the blob's stored type applies when unset
    pub content_type: Option<String>,
}

impl SignedUrlRequest {
    /// Inline request with the given lifetime and no overrides
    #[must_use]
    pub const fn new(ttl: TimeDelta) -> Self {
        Self {
            mode: AccessMode::Inline,
            ttl,
            filename: None,
            content_type: None,
        }
    }

    /// Sets the disposition mode
    #[must_use]
    pub const fn with_mode(mut self, mode: AccessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the lifetime
    #[must_use]
    pub const fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the download filename
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Forces the response content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A freshly minted, read-only access URL
///
/// Never persisted and never logged; `Debug` output omits the signature.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    /// Signed URL
    pub url: String,
    /// Start of the validity window
    pub starts_at: DateTime<Utc>,
    /// End of the validity window
    pub expires_at: DateTime<Utc>,
    /// Granted capability
    pub permission: Permission,
    /// `Content-Disposition` the store will answer with
    pub content_disposition: String,
    /// `Content-Type` override, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("url", &format_args!("{}?<redacted>", strip_token(&self.url)))
            .field("starts_at", &self.starts_at)
            .field("expires_at", &self.expires_at)
            .field("permission", &self.permission)
            .field("content_disposition", &self.content_disposition)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Issues URLs for blobs of one storage account
///
/// Holds only addressing configuration; signing credentials are passed in per call.
#[derive(Debug, Clone, Copy)]
pub struct AccessUrlIssuer<'a> {
    config: &'a BlobStoreConfig,
}

impl<'a> AccessUrlIssuer<'a> {
    /// Creates an issuer over the given configuration
    #[must_use]
    pub const fn new(config: &'a BlobStoreConfig) -> Self {
        Self { config }
    }

    /// Stable URL without any token, safe to store and to return in listings
    #[must_use]
    pub fn public_url(&self, path: &BlobPath) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint_base(),
            utf8_percent_encode(path.container(), sas::UNRESERVED),
            utf8_percent_encode(path.object_name(), sas::OBJECT_PATH),
        )
    }

    /// Mints a read-only signed URL valid from `now - 5 minutes` to `now + ttl`
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidTtl` if the lifetime is not positive, exceeds
    /// [`MAX_TTL`] or ends beyond the representable date range
    /// Returns `AccessError::CredentialsUnavailable` if no credentials are supplied
    pub fn signed_url(
        &self,
        credentials: Option<&SigningCredentials>,
        path: &BlobPath,
        request: &SignedUrlRequest,
    ) -> AccessResult<AccessGrant> {
        self.signed_url_at(credentials, path, request, Utc::now())
    }

    /// [`AccessUrlIssuer::signed_url`] with an explicit clock
    ///
    /// # Errors
    ///
    /// Same as [`AccessUrlIssuer::signed_url`]
    pub fn signed_url_at(
        &self,
        credentials: Option<&SigningCredentials>,
        path: &BlobPath,
        request: &SignedUrlRequest,
        now: DateTime<Utc>,
    ) -> AccessResult<AccessGrant> {
        if request.ttl <= TimeDelta::zero() || request.ttl > MAX_TTL {
            return Err(AccessError::InvalidTtl(request.ttl));
        }

        let credentials = credentials.ok_or_else(|| {
            AccessError::CredentialsUnavailable("no account key configured".to_string())
        })?;

        // SAS times have second precision: round the window outwards
        let starts_at = (now - CLOCK_SKEW_MARGIN).trunc_subsecs(0);
        let expires_at = now
            .checked_add_signed(request.ttl)
            .and_then(ceil_to_second)
            .ok_or(AccessError::InvalidTtl(request.ttl))?;

        let filename = request
            .filename
            .as_deref()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| sanitize_filename(path.file_name()));
        let content_disposition = format!(
            "{}; filename=\"{filename}\"",
            request.mode.disposition_type()
        );

        let permission = Permission::Read;
        let protocol = if self.config.is_https() {
            "https"
        } else {
            "https,http"
        };

        let query = sas::sign_query(
            credentials,
            self.config.account(),
            path,
            &sas::SasParameters {
                permissions: permission.as_sas(),
                starts_at,
                expires_at,
                protocol,
                content_disposition: Some(&content_disposition),
                content_type: request.content_type.as_deref(),
            },
        )?;

        tracing::debug!(
            container = path.container(),
            object_name = path.object_name(),
            %expires_at,
            "Issued signed blob URL"
        );

        Ok(AccessGrant {
            url: format!("{}?{query}", self.public_url(path)),
            starts_at,
            expires_at,
            permission,
            content_disposition,
            content_type: request.content_type.clone(),
        })
    }
}

fn ceil_to_second(time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let floored = time.trunc_subsecs(0);
    if floored < time {
        floored.checked_add_signed(TimeDelta::seconds(1))
    } else {
        Some(floored)
    }
}

/// Keeps a filename safe inside a quoted `Content-Disposition` parameter
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect::<String>()
        .trim()
        .to_string()
}
