//! Writes to the blob store: container creation and block blob upload
//!
//! Requests are authorized with the account key (Shared Key). Reads never go through here,
//! they use signed URLs from [`crate::blob_access`].

mod error;
mod shared_key;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::{header, HeaderValue, Method, StatusCode};
use percent_encoding::utf8_percent_encode;
use reqwest::Client;
use url::Url;

pub use error::{BlobClientError, BlobClientResult};

use crate::blob_access::{sas, AccessUrlIssuer, SigningCredentials, SAS_VERSION};
use crate::blob_ref::BlobPath;
use crate::types::BlobStoreConfig;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;
const ERROR_CODE_HEADER: &str = "x-ms-error-code";
const CONTAINER_EXISTS_CODE: &str = "ContainerAlreadyExists";

/// Outcome of a container creation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// The container was created by this request
    Created,
    /// The container was already there
    AlreadyExists,
}

/// Write access to the blob store
#[async_trait]
pub trait BlobWriter: Send + Sync {
    /// Creates a private container
    async fn create_container(&self, container: &str) -> BlobClientResult<ContainerStatus>;

    /// Uploads `data` as a block blob, replacing any blob at the same path
    async fn put_blob(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        content_type: &str,
    ) -> BlobClientResult<()>;
}

/// [`BlobWriter`] over the blob service REST API
pub struct SharedKeyBlobClient {
    http_client: Client,
    config: Arc<BlobStoreConfig>,
    credentials: SigningCredentials,
}

impl SharedKeyBlobClient {
    /// Creates a client for the configured account
    ///
    /// # Errors
    ///
    /// Returns `BlobClientError::Network` if the HTTP client cannot be built
    pub fn new(
        config: Arc<BlobStoreConfig>,
        credentials: SigningCredentials,
    ) -> BlobClientResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
            .build()?;

        Ok(Self {
            http_client,
            config,
            credentials,
        })
    }

    fn container_url(&self, container: &str) -> BlobClientResult<Url> {
        let raw = format!(
            "{}/{}?restype=container",
            self.config.endpoint_base(),
            utf8_percent_encode(container, sas::UNRESERVED)
        );
        parse_url(&raw)
    }

    fn blob_url(&self, path: &BlobPath) -> BlobClientResult<Url> {
        parse_url(&AccessUrlIssuer::new(&self.config).public_url(path))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
        content_type: Option<&str>,
        extra_headers: &[(&str, &str)],
    ) -> BlobClientResult<reqwest::Response> {
        let date = shared_key::format_date(Utc::now());
        let mut ms_headers = vec![("x-ms-date", date.as_str()), ("x-ms-version", SAS_VERSION)];
        ms_headers.extend_from_slice(extra_headers);

        let authorization = shared_key::authorization(
            &self.credentials,
            self.config.account(),
            &shared_key::RequestParts {
                method: method.as_str(),
                url: &url,
                content_length: body.len(),
                content_type,
                ms_headers: &ms_headers,
            },
        )?;

        let mut request = self
            .http_client
            .request(method, url)
            .header(header::AUTHORIZATION, authorization);
        for (name, value) in &ms_headers {
            request = request.header(*name, *value);
        }
        if let Some(content_type) = content_type {
            request = request.header(header::CONTENT_TYPE, content_type);
        }

        Ok(request.body(body).send().await?)
    }
}

#[async_trait]
impl BlobWriter for SharedKeyBlobClient {
    async fn create_container(&self, container: &str) -> BlobClientResult<ContainerStatus> {
        let url = self.container_url(container)?;
        let response = self.send(Method::PUT, url, Vec::new(), None, &[]).await?;

        let status = response.status();
        let code = error_code(&response);
        match status_outcome(status, &code) {
            Ok(()) => {
                tracing::info!(container, "Created blob container");
                Ok(ContainerStatus::Created)
            }
            Err(_) if status == StatusCode::CONFLICT && code == CONTAINER_EXISTS_CODE => {
                tracing::debug!(container, "Blob container already exists");
                Ok(ContainerStatus::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn put_blob(
        &self,
        path: &BlobPath,
        data: Vec<u8>,
        content_type: &str,
    ) -> BlobClientResult<()> {
        HeaderValue::from_str(content_type).map_err(|_| {
            BlobClientError::InvalidRequest(format!("content type '{content_type}'"))
        })?;

        let url = self.blob_url(path)?;
        let size = data.len();
        let response = self
            .send(
                Method::PUT,
                url,
                data,
                Some(content_type),
                &[("x-ms-blob-type", "BlockBlob")],
            )
            .await?;

        status_outcome(response.status(), &error_code(&response))?;
        tracing::info!(blob_path = %path, size, content_type, "Uploaded blob");

        Ok(())
    }
}

fn parse_url(raw: &str) -> BlobClientResult<Url> {
    Url::parse(raw).map_err(|e| BlobClientError::InvalidRequest(format!("'{raw}': {e}")))
}

fn error_code(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn status_outcome(status: StatusCode, code: &str) -> BlobClientResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let code = code.to_string();
    if status.is_server_error() {
        Err(BlobClientError::Upstream {
            status: status.as_u16(),
            code,
        })
    } else {
        Err(BlobClientError::Rejected {
            status: status.as_u16(),
            code,
        })
    }
}
