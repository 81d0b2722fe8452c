//! Shared Key authorization for blob service requests
//!
//! ```text
//! VERB \n Content-Encoding \n Content-Language \n Content-Length \n Content-MD5 \n
//! Content-Type \n Date \n If-Modified-Since \n If-Match \n If-None-Match \n
//! If-Unmodified-Since \n Range \n CanonicalizedHeaders CanonicalizedResource
//! ```
//!
//! The `Date` slot stays empty because every request carries `x-ms-date`.

use chrono::{DateTime, Utc};
use url::Url;

use crate::blob_access::{sas, AccessResult, SigningCredentials};

/// Request parts covered by the signature
#[derive(Debug)]
pub(crate) struct RequestParts<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub content_length: usize,
    pub content_type: Option<&'a str>,
    /// `x-ms-*` headers, in any order
    pub ms_headers: &'a [(&'a str, &'a str)],
}

/// RFC 1123 date as expected in `x-ms-date`
pub(crate) fn format_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub(crate) fn string_to_sign(account: &str, parts: &RequestParts<'_>) -> String {
    // Zero is signed as an empty string since version 2015-02-21
    let content_length = if parts.content_length == 0 {
        String::new()
    } else {
        parts.content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = parts
        .ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let mut query: Vec<(String, String)> = parts
        .url
        .query_pairs()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.into_owned()))
        .collect();
    query.sort();
    let canonical_query: String = query
        .iter()
        .map(|(name, value)| format!("\n{name}:{value}"))
        .collect();

    let fields = [
        parts.method,
        "", // Content-Encoding
        "", // Content-Language
        content_length.as_str(),
        "", // Content-MD5
        parts.content_type.unwrap_or_default(),
        "", // Date
        "", // If-Modified-Since
        "", // If-Match
        "", // If-None-Match
        "", // If-Unmodified-Since
        "", // Range
    ]
    .join("\n");

    format!(
        "{fields}\n{canonical_headers}/{account}{}{canonical_query}",
        parts.url.path()
    )
}

/// `Authorization` header value
///
/// # Errors
///
/// Returns `AccessError::CredentialsUnavailable` if the key cannot initialise the MAC
pub(crate) fn authorization(
    credentials: &SigningCredentials,
    account: &str,
    parts: &RequestParts<'_>,
) -> AccessResult<String> {
    let signature = sas::signature(credentials, &string_to_sign(account, parts))?;
    Ok(format!("SharedKey {account}:{signature}"))
}
