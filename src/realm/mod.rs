//! Realms: named sources of identity and authorization data.
//!
//! A realm answers two questions for the security manager:
//!
//! 1. Given a login token, what account does it name and what credential
//!    material is stored for it? ([`Realm::get_authentication_info`])
//! 2. Given the principals of an authenticated subject, what roles and
//!    permissions does it hold here? ([`Realm::get_authorization_info`])
//!
//! Realms never verify secrets. Verification belongs to the realm's
//! [`CredentialsMatcher`], invoked by the authenticator.
//!
//! Most realms are an [`AuthorizingRealm`] wrapped around a user-supplied
//! [`RealmSource`], which adds caching and role expansion:
//!
//! ```text
//! SecurityManager ──► AuthorizingRealm ──► RealmSource (sample, memory, custom)
//!                          │
//!                          ├── AuthorizationCache
//!                          ├── PermissionResolver
//!                          └── RolePermissionResolver
//! ```

mod authorizing;
mod cache;
mod error;
mod factory;
mod memory;
mod sample;

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
pub use authorizing::AuthorizingRealm;
pub use cache::AuthorizationCache;
pub use error::{MisconfigurationError, RealmError};
pub use factory::{RealmFactory, SourceConstructor};
pub use memory::{MemoryAccount, MemoryAccountSource};
pub use sample::{SAMPLE_PASSWORD_SHA256, SAMPLE_USERNAME, SampleAccountSource};

use crate::{
    auth::{
        AuthenticationInfo, AuthenticationToken, CredentialsMatcher, Principal,
        PrincipalCollection, TokenKind,
    },
    authz::{AuthorizationInfo, AuthzError, Permission, PermissionResolver},
};

/// Parses without interning; used by realms that do not supply a resolver.
static DEFAULT_PERMISSION_RESOLVER: crate::authz::WildcardPermissionResolver =
    crate::authz::WildcardPermissionResolver::uninterned();

/// The contract the security manager relies on.
#[async_trait]
pub trait Realm: Send + Sync {
    /// Unique within one security manager; tags the principals this realm
    /// contributes.
    fn name(&self) -> &str;

    fn supports(&self, token: &AuthenticationToken) -> bool;

    fn credentials_matcher(&self) -> &dyn CredentialsMatcher;

    fn permission_resolver(&self) -> &dyn PermissionResolver {
        &DEFAULT_PERMISSION_RESOLVER
    }

    /// Look up the account a token names. `Ok(None)` means the realm does
    /// not know it; `Err` means the store could not answer.
    async fn get_authentication_info(
        &self,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError>;

    async fn get_authorization_info(
        &self,
        principals: &PrincipalCollection,
    ) -> Result<Arc<AuthorizationInfo>, RealmError>;

    async fn is_permitted(
        &self,
        principals: &PrincipalCollection,
        permission: &Permission,
    ) -> Result<bool, AuthzError> {
        let info = self.get_authorization_info(principals).await?;
        Ok(info.implies(permission, self.permission_resolver())?)
    }

    async fn has_role(
        &self,
        principals: &PrincipalCollection,
        role: &str,
    ) -> Result<bool, AuthzError> {
        Ok(self.get_authorization_info(principals).await?.has_role(role))
    }

    /// Drop anything cached for `principals`.
    fn clear_cached_authorization_info(&self, _principals: &PrincipalCollection) {}

    fn on_logout(&self, principals: &PrincipalCollection) {
        self.clear_cached_authorization_info(principals);
    }
}

/// The data-source half of a realm, supplied by the application.
///
/// Sources receive the owning realm's name so the principals they return can
/// be tagged with it, and only the principals that realm contributed.
#[async_trait]
pub trait RealmSource: Send + Sync {
    fn supports(&self, token: &AuthenticationToken) -> bool {
        token.kind() == TokenKind::UsernamePassword
    }

    async fn authentication_info(
        &self,
        realm: &str,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError>;

    async fn authorization_info(
        &self,
        realm: &str,
        principals: &PrincipalCollection,
    ) -> Result<AuthorizationInfo, RealmError>;

    /// Which of the realm's principals identifies the account for
    /// authorization lookups. Defaults to the first one the realm added.
    fn primary_principal<'a>(
        &self,
        realm: &str,
        principals: &'a PrincipalCollection,
    ) -> Option<&'a Principal> {
        principals.from_realm(realm).into_iter().next()
    }
}

/// Reject empty or repeated realm names.
pub(crate) fn ensure_unique_names(realms: &[Arc<dyn Realm>]) -> Result<(), MisconfigurationError> {
    if realms.is_empty() {
        return Err(MisconfigurationError::NoRealms);
    }
    let mut seen = HashSet::with_capacity(realms.len());
    for realm in realms {
        let name = realm.name();
        if name.trim().is_empty() {
            return Err(MisconfigurationError::EmptyRealmName);
        }
        if !seen.insert(name) {
            return Err(MisconfigurationError::DuplicateRealmName(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm(name: &str) -> Arc<dyn Realm> {
        Arc::new(AuthorizingRealm::new(name, Arc::new(SampleAccountSource)))
    }

    #[test]
    fn test_unique_names_accepted() {
        assert!(ensure_unique_names(&[realm("a"), realm("b")]).is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        assert_eq!(
            ensure_unique_names(&[realm("a"), realm("a")]),
            Err(MisconfigurationError::DuplicateRealmName("a".into()))
        );
    }

    #[test]
    fn test_empty_realm_list_and_names_rejected() {
        assert_eq!(ensure_unique_names(&[]), Err(MisconfigurationError::NoRealms));
        assert_eq!(
            ensure_unique_names(&[realm(" ")]),
            Err(MisconfigurationError::EmptyRealmName)
        );
    }
}
