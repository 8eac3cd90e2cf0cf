//! The sample realm: one hard-coded account standing in for a real store.
//!
//! Register it with a hashed sha-256 matcher (hex encoding, one iteration)
//! and log in as `jsmith` / `secret`.

use async_trait::async_trait;

use super::{RealmError, RealmSource};
use crate::{
    auth::{AuthenticationInfo, AuthenticationToken, Credentials, Principal, PrincipalCollection},
    authz::AuthorizationInfo,
};

pub const SAMPLE_USERNAME: &str = "jsmith";

/// Hex sha-256 of `secret`.
pub const SAMPLE_PASSWORD_SHA256: &str =
    "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b";

#[derive(Debug, Clone, Copy, Default)]
pub struct SampleAccountSource;

impl SampleAccountSource {
    /// What a database lookup by username would return.
    fn find_account(&self, realm: &str, username: &str) -> Option<AuthenticationInfo> {
        if username != SAMPLE_USERNAME {
            return None;
        }

        let authorization = AuthorizationInfo::new()
            .with_roles(["user", "admin"])
            .with_string_permissions(["blogEntry:edit", "printer:print:laserjet2000"]);

        Some(
            AuthenticationInfo::new(realm, username, Credentials::text(SAMPLE_PASSWORD_SHA256))
                .with_authorization(authorization),
        )
    }
}

#[async_trait]
impl RealmSource for SampleAccountSource {
    async fn authentication_info(
        &self,
        realm: &str,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError> {
        let Some(username) = token.username() else {
            return Ok(None);
        };
        Ok(self.find_account(realm, username))
    }

    async fn authorization_info(
        &self,
        realm: &str,
        principals: &PrincipalCollection,
    ) -> Result<AuthorizationInfo, RealmError> {
        let Some(username) = self
            .primary_principal(realm, principals)
            .and_then(Principal::as_str)
        else {
            return Ok(AuthorizationInfo::default());
        };

        Ok(self
            .find_account(realm, username)
            .map(AuthenticationInfo::into_authorization)
            .unwrap_or_default())
    }
}
