//! Service SAS construction for a single blob
//!
//! The string-to-sign follows the blob service SAS layout for version `2021-08-06`:
//!
//! ```text
//! sp \n st \n se \n /blob/<account>/<container>/<blob> \n si \n sip \n spr \n sv \n sr \n
//! snapshot \n ses \n rscc \n rscd \n rsce \n rscl \n rsct
//! ```
//!
//! and the signature is `base64(HMAC-SHA256(account_key, string_to_sign))`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;

use super::{AccessError, AccessResult, SigningCredentials};
use crate::blob_ref::BlobPath;

type HmacSha256 = Hmac<Sha256>;

/// Storage service version the signature is computed for
pub const SAS_VERSION: &str = "2021-08-06";

/// Signed resource type: a single blob
const SIGNED_RESOURCE_BLOB: &str = "b";

/// RFC 3986 unreserved characters stay literal, everything else is escaped
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Object names keep their `/` hierarchy in URL paths
pub(crate) const OBJECT_PATH: &AsciiSet = &UNRESERVED.remove(b'/');

/// Fields that go into one signed URL
#[derive(Debug)]
pub(crate) struct SasParameters<'a> {
    pub permissions: &'a str,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub protocol: &'a str,
    pub content_disposition: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Builds the newline-joined string the signature is computed over
pub(crate) fn string_to_sign(account: &str, path: &BlobPath, params: &SasParameters<'_>) -> String {
    let canonical_resource = format!(
        "/blob/{account}/{}/{}",
        path.container(),
        path.object_name()
    );

    let starts_at = format_time(params.starts_at);
    let expires_at = format_time(params.expires_at);

    [
        params.permissions,
        starts_at.as_str(),
        expires_at.as_str(),
        canonical_resource.as_str(),
        "", // signed identifier
        "", // signed IP
        params.protocol,
        SAS_VERSION,
        SIGNED_RESOURCE_BLOB,
        "", // snapshot time
        "", // encryption scope
        "", // rscc
        params.content_disposition.unwrap_or_default(),
        "", // rsce
        "", // rscl
        params.content_type.unwrap_or_default(),
    ]
    .join("\n")
}

/// `base64(HMAC-SHA256(account_key, string_to_sign))`, shared by SAS and shared-key requests
///
/// # Errors
///
/// Returns `AccessError::CredentialsUnavailable` if the key cannot initialise the MAC
pub(crate) fn signature(
    credentials: &SigningCredentials,
    string_to_sign: &str,
) -> AccessResult<String> {
    let mut mac = HmacSha256::new_from_slice(credentials.key())
        .map_err(|e| AccessError::CredentialsUnavailable(format!("invalid account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signs the parameters and renders them as a URL query string (without the leading `?`)
///
/// # Errors
///
/// Returns `AccessError::CredentialsUnavailable` if the key cannot initialise the MAC
pub(crate) fn sign_query(
    credentials: &SigningCredentials,
    account: &str,
    path: &BlobPath,
    params: &SasParameters<'_>,
) -> AccessResult<String> {
    let signature = signature(credentials, &string_to_sign(account, path, params))?;

    let mut pairs = vec![
        ("sv", SAS_VERSION.to_string()),
        ("spr", params.protocol.to_string()),
        ("st", format_time(params.starts_at)),
        ("se", format_time(params.expires_at)),
        ("sr", SIGNED_RESOURCE_BLOB.to_string()),
        ("sp", params.permissions.to_string()),
    ];
    if let Some(disposition) = params.content_disposition {
        pairs.push(("rscd", disposition.to_string()));
    }
    if let Some(content_type) = params.content_type {
        pairs.push(("rsct", content_type.to_string()));
    }
    pairs.push(("sig", signature));

    Ok(pairs
        .iter()
        .map(|(name, value)| format!("{name}={}", utf8_percent_encode(value, UNRESERVED)))
        .collect::<Vec<_>>()
        .join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn params() -> SasParameters<'static> {
        SasParameters {
            permissions: "r",
            starts_at: Utc.with_ymd_and_hms(2024, 5, 1, 11, 55, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
            protocol: "https",
            content_disposition: Some("attachment; filename=\"a.pdf\""),
            content_type: None,
        }
    }

    #[test]
    fn test_string_to_sign_layout() {
        let path = BlobPath::new("files", "2024/a.pdf").unwrap();

        let expected = "r\n\
                        2024-05-01T11:55:00Z\n\
                        2024-05-02T12:00:00Z\n\
                        /blob/acct/files/2024/a.pdf\n\
                        \n\
                        \n\
                        https\n\
                        2021-08-06\n\
                        b\n\
                        \n\
                        \n\
                        \n\
                        attachment; filename=\"a.pdf\"\n\
                        \n\
                        \n";

        assert_eq!(string_to_sign("acct", &path, &params()), expected);
    }

    #[test]
    fn test_signature_matches_hmac_of_string_to_sign() {
        let path = BlobPath::new("files", "2024/a.pdf").unwrap();
        let credentials = SigningCredentials::from_account_key("c2VjcmV0LWtleQ==").unwrap();

        let query = sign_query(&credentials, "acct", &path, &params()).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret-key").unwrap();
        mac.update(string_to_sign("acct", &path, &params()).as_bytes());
        let expected_sig = STANDARD.encode(mac.finalize().into_bytes());
        let encoded_sig = utf8_percent_encode(&expected_sig, UNRESERVED).to_string();

        assert!(query.ends_with(&format!("&sig={encoded_sig}")));
    }

    #[test]
    fn test_query_parameters_are_encoded() {
        let path = BlobPath::new("files", "2024/a.pdf").unwrap();
        let credentials = SigningCredentials::from_account_key("c2VjcmV0LWtleQ==").unwrap();

        let query = sign_query(&credentials, "acct", &path, &params()).unwrap();

        assert!(query.starts_with(
            "sv=2021-08-06&spr=https&st=2024-05-01T11%3A55%3A00Z&se=2024-05-02T12%3A00%3A00Z&sr=b&sp=r&"
        ));
        assert!(query.contains("&rscd=attachment%3B%20filename%3D%22a.pdf%22&"));
        assert!(!query.contains("rsct="));
    }

    #[test]
    fn test_different_keys_produce_different_signatures() {
        let path = BlobPath::new("files", "2024/a.pdf").unwrap();
        let first = SigningCredentials::from_account_key("a2V5LW9uZQ==").unwrap();
        let second = SigningCredentials::from_account_key("a2V5LXR3bw==").unwrap();

        assert_ne!(
            sign_query(&first, "acct", &path, &params()).unwrap(),
            sign_query(&second, "acct", &path, &params()).unwrap()
        );
    }
}
