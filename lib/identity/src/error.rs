//! Error types for the identity crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `SignedValueError`: Signed-value verification failures (always fail-closed)
//! - `ProviderError`: Failures talking to an external OAuth provider
//! - `StoreError`: Failures at the record-store seam
//! - `AuthError`: High-level authentication lifecycle failures

use encore_core::AuthRecordId;
use std::fmt;

/// Errors from signed-value verification.
///
/// Callers must treat every variant identically to "value absent";
/// a failed verification never carries a partially-trusted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedValueError {
    /// The value does not have the expected `payload|mac` structure.
    Malformed,
    /// A segment is not valid base64, or the payload is not UTF-8.
    BadEncoding,
    /// The transmitted MAC does not match the recomputed one.
    MacMismatch,
}

impl fmt::Display for SignedValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "signed value is malformed"),
            Self::BadEncoding => write!(f, "signed value has invalid encoding"),
            Self::MacMismatch => write!(f, "signed value failed MAC verification"),
        }
    }
}

impl std::error::Error for SignedValueError {}

/// Errors from operations against an external OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider's endpoint or redirect configuration is unusable.
    Configuration { provider: String, reason: String },
    /// The authorization-code exchange failed (network or non-2xx).
    Exchange { provider: String, reason: String },
    /// The refresh-token exchange failed.
    Refresh { provider: String, reason: String },
    /// The profile endpoint could not be reached or returned a bad status.
    IdentityTransport { provider: String, reason: String },
    /// The profile response did not have the expected shape.
    IdentityShape { provider: String, reason: String },
}

impl ProviderError {
    /// Returns the slug of the provider that produced this error.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Configuration { provider, .. }
            | Self::Exchange { provider, .. }
            | Self::Refresh { provider, .. }
            | Self::IdentityTransport { provider, .. }
            | Self::IdentityShape { provider, .. } => provider,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { provider, reason } => {
                write!(f, "invalid configuration for '{provider}': {reason}")
            }
            Self::Exchange { provider, reason } => {
                write!(f, "code exchange with '{provider}' failed: {reason}")
            }
            Self::Refresh { provider, reason } => {
                write!(f, "token refresh with '{provider}' failed: {reason}")
            }
            Self::IdentityTransport { provider, reason } => {
                write!(f, "profile fetch from '{provider}' failed: {reason}")
            }
            Self::IdentityShape { provider, reason } => {
                write!(f, "unexpected profile response from '{provider}': {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from the record-store seam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Storage operation failed.
    StorageFailed { reason: String },
    /// A uniqueness constraint was violated.
    Conflict { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => write!(f, "storage operation failed: {reason}"),
            Self::Conflict { reason } => write!(f, "storage conflict: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// High-level authentication lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The record's credentials were previously marked bad.
    ///
    /// Terminal until the user completes a fresh login; never retried
    /// with a network call.
    AuthInvalid { record: AuthRecordId },
    /// A provider operation failed.
    Provider(ProviderError),
    /// A store operation failed.
    Store(StoreError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthInvalid { record } => {
                write!(f, "auth record {record} is no longer valid")
            }
            Self::Provider(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AuthInvalid { .. } => None,
            Self::Provider(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_value_error_display() {
        assert!(
            SignedValueError::MacMismatch
                .to_string()
                .contains("MAC verification")
        );
    }

    #[test]
    fn provider_error_carries_provider() {
        let err = ProviderError::Exchange {
            provider: "spotify".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.provider(), "spotify");
        assert!(err.to_string().contains("spotify"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn auth_invalid_display_names_record() {
        let id = AuthRecordId::new();
        let err = AuthError::AuthInvalid { record: id };
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn auth_error_from_provider_error() {
        let err: AuthError = ProviderError::Refresh {
            provider: "google".to_string(),
            reason: "invalid_grant".to_string(),
        }
        .into();
        assert!(matches!(err, AuthError::Provider(_)));
    }
}
