//! Blob reference normalization
//!
//! A stored file can be referred to in three interchangeable ways:
//! - full URL: `https://acct.blob.core.windows.net/files/2024/a.pdf?<sas>`
//! - container-qualified path: `files/2024/a.pdf`
//! - bare object name: `2024/a.pdf`
//!
//! All three collapse to the same [`BlobPath`]. Normalization is pure and never keeps a
//! query string, so a normalized reference can never carry a SAS token.

mod error;

use std::fmt;

use percent_encoding::percent_decode_str;
use url::Url;

pub use error::{ReferenceError, ReferenceResult};

use crate::types::BlobStoreConfig;

/// Canonical `(container, object name)` pair of a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath {
    container: String,
    object_name: String,
}

impl BlobPath {
    /// Creates a blob path from its parts
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::InvalidReference` if the object name is empty
    /// Returns `ReferenceError::MalformedReference` if the container is empty or contains `/`,
    /// or if the object name has a `.` or `..` segment
    pub fn new(
        container: impl Into<String>,
        object_name: impl Into<String>,
    ) -> ReferenceResult<Self> {
        let container = container.into();
        let object_name = object_name.into();

        if object_name.is_empty() {
            return Err(ReferenceError::InvalidReference);
        }
        if container.is_empty() || container.contains('/') {
            return Err(ReferenceError::MalformedReference(format!(
                "'{container}' is not a container name"
            )));
        }
        // URL resolution collapses dot segments, so such a name has no stable URL
        if object_name
            .split('/')
            .any(|segment| segment == "." || segment == "..")
        {
            return Err(ReferenceError::MalformedReference(format!(
                "'{object_name}' has a dot segment"
            )));
        }

        Ok(Self {
            container,
            object_name,
        })
    }

    /// Container holding the blob
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Object name inside the container, may contain `/`
    #[must_use]
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// Last `/`-separated segment of the object name
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.object_name
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.object_name)
    }

    /// `<container>/<objectName>`, the form persisted as a record's `blobPath`
    #[must_use]
    pub fn qualified_path(&self) -> String {
        self.to_string()
    }

    /// Whether the path lives in the configured container
    ///
    /// Only such paths survive a round trip through [`BlobPath::qualified_path`] and
    /// [`normalize`]; a qualified path in any other container reads back as a bare name.
    #[must_use]
    pub fn is_in_container_of(&self, config: &BlobStoreConfig) -> bool {
        self.container == config.container()
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.object_name)
    }
}

/// A blob reference in one of its accepted representations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectReference {
    /// Absolute `http(s)` URL; query and fragment are dropped on parse
    FullUrl {
        /// `http` or `https`
        scheme: String,
        /// URL host
        host: String,
        /// First path segment after any endpoint prefix
        container: String,
        /// Remainder of the path, percent-decoded
        object_name: String,
    },
    /// `<knownContainer>/<objectName>`
    QualifiedPath {
        /// Always the configured container
        container: String,
        /// Remainder after the first `/`
        object_name: String,
    },
    /// Object name in the configured container
    BareName {
        /// The whole input
        object_name: String,
    },
}

impl ObjectReference {
    /// Classifies a raw reference
    ///
    /// Precedence, first match wins:
    /// 1. `http://` or `https://` URL
    /// 2. any other `scheme://` value is rejected
    /// 3. `<knownContainer>/` prefix
    /// 4. bare object name
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::InvalidReference` if the input is empty
    /// Returns `ReferenceError::MalformedReference` if the input looks like a URL or a
    /// qualified path but has no usable object name
    pub fn parse(raw: &str, config: &BlobStoreConfig) -> ReferenceResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ReferenceError::InvalidReference);
        }

        if has_http_scheme(value) {
            return parse_full_url(value, config);
        }

        if value.contains("://") {
            return Err(ReferenceError::MalformedReference(format!(
                "unsupported URL scheme in '{value}'"
            )));
        }

        if let Some(object_name) = value
            .strip_prefix(config.container())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            if object_name.is_empty() {
                return Err(ReferenceError::MalformedReference(format!(
                    "'{value}' names a container but no object"
                )));
            }
            return Ok(Self::QualifiedPath {
                container: config.container().to_string(),
                object_name: object_name.to_string(),
            });
        }

        Ok(Self::BareName {
            object_name: value.to_string(),
        })
    }

    /// Collapses the reference into its canonical path
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError` if the parts do not form a valid [`BlobPath`]
    pub fn into_blob_path(self, config: &BlobStoreConfig) -> ReferenceResult<BlobPath> {
        match self {
            Self::FullUrl {
                container,
                object_name,
                ..
            }
            | Self::QualifiedPath {
                container,
                object_name,
            } => BlobPath::new(container, object_name),
            Self::BareName { object_name } => BlobPath::new(config.container(), object_name),
        }
    }
}

/// Normalizes any accepted reference form to its canonical [`BlobPath`]
///
/// # Errors
///
/// Returns `ReferenceError::InvalidReference` for empty input
/// Returns `ReferenceError::MalformedReference` for unparseable URLs, non-HTTP schemes and
/// container-prefixed input without an object name
pub fn normalize(raw: &str, config: &BlobStoreConfig) -> ReferenceResult<BlobPath> {
    ObjectReference::parse(raw, config)?.into_blob_path(config)
}

/// Removes the query and fragment of an absolute URL, dropping any SAS token it carries
///
/// Anything that is not an absolute URL is returned unchanged: `?` and `#` are legal in
/// object names.
#[must_use]
pub fn strip_token(url: &str) -> &str {
    if Url::parse(url).is_err() {
        return url;
    }
    url.find(['?', '#']).map_or(url, |idx| &url[..idx])
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn parse_full_url(value: &str, config: &BlobStoreConfig) -> ReferenceResult<ObjectReference> {
    let url = Url::parse(value)
        .map_err(|e| ReferenceError::MalformedReference(format!("'{value}': {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| ReferenceError::MalformedReference(format!("'{value}' has no host")))?
        .to_string();

    let mut path = url.path().trim_start_matches('/');

    // Emulator-style endpoints put the account in the path ahead of the container
    let prefix = config.endpoint_path_prefix();
    if !prefix.is_empty() && is_same_origin(&url, config.endpoint()) {
        if let Some(rest) = path
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            path = rest;
        }
    }

    let Some((container, object_name)) = path.split_once('/') else {
        return Err(ReferenceError::MalformedReference(format!(
            "'{value}' has no container/object path"
        )));
    };
    if container.is_empty() || object_name.is_empty() {
        return Err(ReferenceError::MalformedReference(format!(
            "'{value}' has no container/object path"
        )));
    }

    if host != config.endpoint().host_str().unwrap_or_default() {
        tracing::debug!(%host, "Blob URL host differs from the configured endpoint");
    }

    Ok(ObjectReference::FullUrl {
        scheme: url.scheme().to_string(),
        host,
        container: decode(container, value)?,
        object_name: decode(object_name, value)?,
    })
}

fn is_same_origin(url: &Url, endpoint: &Url) -> bool {
    url.host_str() == endpoint.host_str()
        && url.port_or_known_default() == endpoint.port_or_known_default()
}

fn decode(segment: &str, value: &str) -> ReferenceResult<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ReferenceError::MalformedReference(format!("'{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> BlobStoreConfig {
        BlobStoreConfig::new("acct", "files").unwrap()
    }

    fn pair(path: &BlobPath) -> (&str, &str) {
        (path.container(), path.object_name())
    }

    #[test]
    fn test_full_url_with_sas_token() {
        let path = normalize(
            "https://acct.blob.core.windows.net/files/2024/a.pdf?sig=xyz",
            &config(),
        )
        .unwrap();

        assert_eq!(pair(&path), ("files", "2024/a.pdf"));
    }

    #[test]
    fn test_qualified_path() {
        let path = normalize("files/2024/a.pdf", &config()).unwrap();
        assert_eq!(pair(&path), ("files", "2024/a.pdf"));
    }

    #[test]
    fn test_bare_name() {
        let path = normalize("2024/a.pdf", &config()).unwrap();
        assert_eq!(pair(&path), ("files", "2024/a.pdf"));
    }

    #[test]
    fn test_all_forms_agree() {
        let forms = [
            "https://acct.blob.core.windows.net/files/0196792-6/foo.pdf",
            "https://acct.blob.core.windows.net/files/0196792-6/foo.pdf?sv=2021&sig=abc#page=2",
            "HTTPS://acct.blob.core.windows.net/files/0196792-6/foo.pdf",
            "files/0196792-6/foo.pdf",
            "0196792-6/foo.pdf",
            "  files/0196792-6/foo.pdf \n",
        ];

        for form in forms {
            let path = normalize(form, &config()).unwrap();
            assert_eq!(pair(&path), ("files", "0196792-6/foo.pdf"), "input: {form}");
        }
    }

    #[test]
    fn test_full_url_in_other_container() {
        let path = normalize(
            "https://acct.blob.core.windows.net/archive/2023/b.pdf?sig=1",
            &config(),
        )
        .unwrap();

        assert_eq!(pair(&path), ("archive", "2023/b.pdf"));
        assert!(!path.is_in_container_of(&config()));
    }

    #[test]
    fn test_full_url_is_percent_decoded() {
        let path = normalize(
            "https://acct.blob.core.windows.net/files/Q1%20report/r%C3%A9sum%C3%A9.pdf",
            &config(),
        )
        .unwrap();

        assert_eq!(pair(&path), ("files", "Q1 report/résumé.pdf"));
    }

    #[test]
    fn test_emulator_url_strips_account_prefix() {
        let endpoint = Url::parse("http://127.0.0.1:10000/devstoreaccount1").unwrap();
        let config = BlobStoreConfig::with_endpoint("devstoreaccount1", "files", endpoint).unwrap();

        let path = normalize(
            "http://127.0.0.1:10000/devstoreaccount1/files/2024/a.pdf?sig=1",
            &config,
        )
        .unwrap();

        assert_eq!(pair(&path), ("files", "2024/a.pdf"));
    }

    #[test]
    fn test_container_lookalike_is_not_a_url() {
        let reference = ObjectReference::parse("files/https/a.pdf", &config()).unwrap();

        assert_eq!(
            reference,
            ObjectReference::QualifiedPath {
                container: "files".to_string(),
                object_name: "https/a.pdf".to_string(),
            }
        );
    }

    #[test]
    fn test_url_never_becomes_bare_name() {
        let reference = ObjectReference::parse(
            "https://acct.blob.core.windows.net/files/a.pdf",
            &config(),
        )
        .unwrap();

        assert!(matches!(
            reference,
            ObjectReference::FullUrl { ref host, .. } if host == "acct.blob.core.windows.net"
        ));
    }

    #[test]
    fn test_prefix_must_be_whole_container_segment() {
        let path = normalize("filesystem/a.pdf", &config()).unwrap();
        assert_eq!(pair(&path), ("files", "filesystem/a.pdf"));
    }

    #[test]
    fn test_empty_reference() {
        assert_eq!(normalize("", &config()), Err(ReferenceError::InvalidReference));
        assert_eq!(normalize("   ", &config()), Err(ReferenceError::InvalidReference));
    }

    #[test]
    fn test_malformed_references() {
        let malformed = [
            ("non_http_scheme", "ftp://bad"),
            ("no_host", "https://"),
            ("container_only_url", "https://acct.blob.core.windows.net/files"),
            ("container_slash_url", "https://acct.blob.core.windows.net/files/"),
            ("host_only_url", "https://acct.blob.core.windows.net/?sig=x"),
            ("container_without_object", "files/"),
            ("parent_segment", "files/x/../a.pdf"),
            ("current_segment", "./a.pdf"),
            ("trailing_parent_segment", "reports/.."),
        ];

        for (test_name, raw) in malformed {
            let result = normalize(raw, &config());
            assert!(
                matches!(result, Err(ReferenceError::MalformedReference(_))),
                "Should reject malformed reference: {test_name} -> {result:?}"
            );
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "https://acct.blob.core.windows.net/files/2024/a.pdf?sig=xyz",
            "files/2024/a.pdf",
            "2024/a.pdf",
            "files/files/nested.pdf",
            "a.pdf",
        ];

        for input in inputs {
            let once = normalize(input, &config()).unwrap();
            let twice = normalize(&once.qualified_path(), &config()).unwrap();
            assert_eq!(once, twice, "input: {input}");
        }
    }

    #[test]
    fn test_foreign_container_is_not_idempotent() {
        let once = normalize(
            "https://acct.blob.core.windows.net/archive/x.pdf?sig=1",
            &config(),
        )
        .unwrap();
        assert_eq!(pair(&once), ("archive", "x.pdf"));
        assert!(!once.is_in_container_of(&config()));

        // Outside the configured container the qualified path reads back as a bare name,
        // which is why such paths are never persisted
        let twice = normalize(&once.qualified_path(), &config()).unwrap();
        assert_eq!(pair(&twice), ("files", "archive/x.pdf"));
        assert_ne!(once, twice);
    }

    #[test]
    fn test_dot_segments_are_rejected() {
        for name in ["x/../a.pdf", "./a.pdf", "a/.", ".."] {
            assert!(
                matches!(
                    BlobPath::new("files", name),
                    Err(ReferenceError::MalformedReference(_))
                ),
                "name: {name}"
            );
        }

        // Dots inside a segment are ordinary characters
        let path = BlobPath::new("files", "v1.2/..hidden/a..pdf").unwrap();
        assert_eq!(path.object_name(), "v1.2/..hidden/a..pdf");
    }

    #[test]
    fn test_strip_token() {
        assert_eq!(
            strip_token("https://acct.blob.core.windows.net/files/a.pdf?sv=1&sig=abc"),
            "https://acct.blob.core.windows.net/files/a.pdf"
        );
        assert_eq!(
            strip_token("https://acct.blob.core.windows.net/files/a.pdf#page=3"),
            "https://acct.blob.core.windows.net/files/a.pdf"
        );
        assert_eq!(strip_token(""), "");
        assert_eq!(strip_token("files/a.pdf"), "files/a.pdf");
    }

    #[test]
    fn test_strip_token_keeps_non_urls() {
        for value in ["2024/what?.pdf", "files/notes#1.txt", "?only-query", "  "] {
            assert_eq!(strip_token(value), value);
        }
    }

    #[test]
    fn test_strip_token_is_idempotent() {
        let urls = [
            "https://acct.blob.core.windows.net/files/a.pdf?sig=abc#frag",
            "https://acct.blob.core.windows.net/files/a.pdf",
            "?only-query",
        ];

        for url in urls {
            let once = strip_token(url);
            assert_eq!(strip_token(once), once);
        }
    }

    #[test]
    fn test_file_name() {
        let path = BlobPath::new("files", "2024/03/a.pdf").unwrap();
        assert_eq!(path.file_name(), "a.pdf");

        let path = BlobPath::new("files", "a.pdf").unwrap();
        assert_eq!(path.file_name(), "a.pdf");

        let path = BlobPath::new("files", "folder/").unwrap();
        assert_eq!(path.file_name(), "folder");
    }

    #[test]
    fn test_qualified_path_rendering() {
        let path = BlobPath::new("files", "2024/a.pdf").unwrap();
        assert_eq!(path.qualified_path(), "files/2024/a.pdf");
    }
}
