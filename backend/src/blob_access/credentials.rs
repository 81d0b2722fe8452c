//! Account key material used to sign blob URLs

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{AccessError, AccessResult};
use crate::types::ConnectionString;

/// Shared-key secret for computing SAS signatures
///
/// Owned by the caller's environment and lent to the issuer per call.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    key: Vec<u8>,
}

impl SigningCredentials {
    /// Decodes a base64 storage account key
    ///
    /// # Errors
    ///
    /// Returns `AccessError::CredentialsUnavailable` if the key is empty or not base64
    pub fn from_account_key(account_key: &str) -> AccessResult<Self> {
        let account_key = account_key.trim();
        if account_key.is_empty() {
            return Err(AccessError::CredentialsUnavailable(
                "account key is empty".to_string(),
            ));
        }

        let key = STANDARD.decode(account_key).map_err(|e| {
            AccessError::CredentialsUnavailable(format!("account key is not base64: {e}"))
        })?;

        Ok(Self { key })
    }

    /// Takes the account key out of a storage connection string
    ///
    /// # Errors
    ///
    /// Returns `AccessError::CredentialsUnavailable` if the string does not parse, carries
    /// no `AccountKey`, or the key is not base64
    pub fn from_connection_string(connection_string: &str) -> AccessResult<Self> {
        let parsed = ConnectionString::parse(connection_string)
            .map_err(|e| AccessError::CredentialsUnavailable(e.to_string()))?;
        let account_key = parsed.account_key().ok_or_else(|| {
            AccessError::CredentialsUnavailable(
                "connection string has no AccountKey".to_string(),
            )
        })?;

        Self::from_account_key(account_key)
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("key", &"<redacted>")
            .finish()
    }
}
