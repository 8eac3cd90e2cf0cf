use std::fmt;

use thiserror::Error;

/// Why a login attempt failed.
///
/// Variants are ordered by severity, least severe first; when several realms
/// fail, the most severe kind is the one recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    /// No configured realm accepts the token's kind.
    UnsupportedToken,
    UnknownAccount,
    IncorrectCredentials,
    ExpiredCredentials,
    LockedAccount,
    /// A realm's backing store failed during lookup.
    AuthenticationStore,
    /// Stored credential material could not be interpreted.
    CredentialsFormat,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::UnsupportedToken => "unsupported_token",
            FailureKind::UnknownAccount => "unknown_account",
            FailureKind::IncorrectCredentials => "incorrect_credentials",
            FailureKind::ExpiredCredentials => "expired_credentials",
            FailureKind::LockedAccount => "locked_account",
            FailureKind::AuthenticationStore => "authentication_store",
            FailureKind::CredentialsFormat => "credentials_format",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The only error a login caller sees.
///
/// Neither `Display` nor `Debug` reveal which check failed. The specific kind
/// goes to logs and metrics.
#[derive(Clone, PartialEq, Eq, Error)]
#[error("Authentication failed")]
pub struct AuthenticationFailed {
    kind: FailureKind,
}

impl AuthenticationFailed {
    pub(crate) fn new(kind: FailureKind) -> Self {
        Self { kind }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> FailureKind {
        self.kind
    }
}

impl fmt::Debug for AuthenticationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthenticationFailed")
    }
}
