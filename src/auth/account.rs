use std::fmt;

use super::principal::{Principal, PrincipalCollection};
use crate::authz::AuthorizationInfo;

/// Stored credential material as a realm's backing store holds it.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Plaintext, hex, base64 or crypt-format string; the matcher decides.
    Text(String),
    /// Raw bytes, compared as-is.
    Bytes(Vec<u8>),
}

impl Credentials {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(_) => f.write_str("Text([REDACTED])"),
            Self::Bytes(_) => f.write_str("Bytes([REDACTED])"),
        }
    }
}

impl From<&str> for Credentials {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Credentials {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Credentials {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// What a realm knows about an account at login time.
///
/// Realms build this from their store; they never verify the submitted
/// secret themselves.
#[derive(Debug, Clone)]
pub struct AuthenticationInfo {
    principals: PrincipalCollection,
    credentials: Credentials,
    credentials_salt: Option<Vec<u8>>,
    authorization: Option<AuthorizationInfo>,
    locked: bool,
    credentials_expired: bool,
}

/// Account record of a realm that also authorizes.
pub type Account = AuthenticationInfo;

impl AuthenticationInfo {
    pub fn new(
        realm: impl Into<String>,
        principal: impl Into<Principal>,
        credentials: impl Into<Credentials>,
    ) -> Self {
        Self {
            principals: PrincipalCollection::single(realm, principal),
            credentials: credentials.into(),
            credentials_salt: None,
            authorization: None,
            locked: false,
            credentials_expired: false,
        }
    }

    /// Record an additional principal for the account.
    pub fn with_principal(
        mut self,
        realm: impl Into<String>,
        principal: impl Into<Principal>,
    ) -> Self {
        self.principals.add(realm, principal);
        self
    }

    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.credentials_salt = Some(salt.into());
        self
    }

    pub fn with_authorization(mut self, authorization: AuthorizationInfo) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_credentials_expired(mut self, expired: bool) -> Self {
        self.credentials_expired = expired;
        self
    }

    pub fn principals(&self) -> &PrincipalCollection {
        &self.principals
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn credentials_salt(&self) -> Option<&[u8]> {
        self.credentials_salt.as_deref()
    }

    pub fn authorization(&self) -> Option<&AuthorizationInfo> {
        self.authorization.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_credentials_expired(&self) -> bool {
        self.credentials_expired
    }

    /// The embedded authorization record, or an empty one.
    pub fn into_authorization(self) -> AuthorizationInfo {
        self.authorization.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let debug = format!("{:?}", Credentials::text("plaintext-secret"));
        assert!(!debug.contains("plaintext-secret"));
    }

    #[test]
    fn test_account_builder() {
        let account = Account::new("myRealm", "jsmith", "secret")
            .with_principal("myRealm", 1001_i64)
            .with_salt(b"pepper".to_vec())
            .with_authorization(AuthorizationInfo::new().with_role("user"))
            .with_locked(true);

        assert_eq!(account.principals().from_realm("myRealm").len(), 2);
        assert_eq!(account.credentials().as_bytes(), b"secret");
        assert_eq!(account.credentials_salt(), Some(&b"pepper"[..]));
        assert!(account.is_locked());
        assert!(!account.is_credentials_expired());
        assert!(account.into_authorization().has_role("user"));
    }
}
