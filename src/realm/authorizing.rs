use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{AuthorizationCache, Realm, RealmError, RealmSource};
use crate::{
    auth::{
        AuthenticationInfo, AuthenticationToken, CredentialsMatcher, PrincipalCollection,
        SimpleCredentialsMatcher,
    },
    authz::{
        AuthorizationInfo, AuthzError, Permission, PermissionResolver, RolePermissionResolver,
        WildcardPermissionResolver, any_implies,
    },
    observability::metrics,
};

/// A realm built from a [`RealmSource`] plus the shared machinery: a
/// credentials matcher, optional authorization caching, permission parsing
/// and role expansion.
///
/// Authorization lookups only ever see the principals this realm contributed.
/// A subject this realm did not authenticate gets an empty record, and the
/// source is not consulted.
pub struct AuthorizingRealm {
    name: String,
    source: Arc<dyn RealmSource>,
    credentials_matcher: Arc<dyn CredentialsMatcher>,
    permission_resolver: Arc<dyn PermissionResolver>,
    role_permission_resolver: RwLock<Option<Arc<dyn RolePermissionResolver>>>,
    cache: Option<AuthorizationCache>,
}

impl AuthorizingRealm {
    pub fn new(name: impl Into<String>, source: Arc<dyn RealmSource>) -> Self {
        Self {
            name: name.into(),
            source,
            credentials_matcher: Arc::new(SimpleCredentialsMatcher),
            permission_resolver: Arc::new(WildcardPermissionResolver::new()),
            role_permission_resolver: RwLock::new(None),
            cache: None,
        }
    }

    pub fn with_credentials_matcher(mut self, matcher: Arc<dyn CredentialsMatcher>) -> Self {
        self.credentials_matcher = matcher;
        self
    }

    pub fn with_permission_resolver(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.permission_resolver = resolver;
        self
    }

    pub fn with_role_permission_resolver(self, resolver: Arc<dyn RolePermissionResolver>) -> Self {
        *self.role_permission_resolver.write() = Some(resolver);
        self
    }

    pub fn with_authorization_cache(mut self, cache: AuthorizationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn authorization_cache(&self) -> Option<&AuthorizationCache> {
        self.cache.as_ref()
    }

    /// Replace the role resolver. Cached records were computed under the old
    /// one, so the cache is cleared.
    pub fn set_role_permission_resolver(&self, resolver: Option<Arc<dyn RolePermissionResolver>>) {
        *self.role_permission_resolver.write() = resolver;
        self.clear_cache();
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
            tracing::debug!(realm = %self.name, "Authorization cache cleared");
        }
    }

    fn role_permissions(&self, info: &AuthorizationInfo) -> Vec<Permission> {
        let Some(resolver) = self.role_permission_resolver.read().clone() else {
            return Vec::new();
        };
        info.roles()
            .iter()
            .flat_map(|role| resolver.resolve_permissions_in_role(role))
            .collect()
    }

    async fn load_authorization_info(
        &self,
        own: &PrincipalCollection,
    ) -> Result<AuthorizationInfo, RealmError> {
        let info = self.source.authorization_info(&self.name, own).await?;
        tracing::debug!(
            realm = %self.name,
            roles = info.roles().len(),
            permissions = info.string_permissions().len() + info.object_permissions().len(),
            "Loaded authorization info"
        );
        Ok(info)
    }
}

impl std::fmt::Debug for AuthorizingRealm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizingRealm")
            .field("name", &self.name)
            .field("credentials_matcher", &self.credentials_matcher)
            .field("caching", &self.cache.is_some())
            .finish()
    }
}

#[async_trait]
impl Realm for AuthorizingRealm {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, token: &AuthenticationToken) -> bool {
        self.source.supports(token)
    }

    fn credentials_matcher(&self) -> &dyn CredentialsMatcher {
        self.credentials_matcher.as_ref()
    }

    fn permission_resolver(&self) -> &dyn PermissionResolver {
        self.permission_resolver.as_ref()
    }

    async fn get_authentication_info(
        &self,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError> {
        self.source.authentication_info(&self.name, token).await
    }

    async fn get_authorization_info(
        &self,
        principals: &PrincipalCollection,
    ) -> Result<Arc<AuthorizationInfo>, RealmError> {
        let own = principals.realm_subset(&self.name);
        if own.is_empty() {
            return Ok(Arc::new(AuthorizationInfo::default()));
        }

        let Some(cache) = &self.cache else {
            return Ok(Arc::new(self.load_authorization_info(&own).await?));
        };

        let key = own.iter().cloned().collect();
        let (info, hit) = cache
            .get_or_load(key, || self.load_authorization_info(&own))
            .await?;
        metrics::record_authorization_cache(&self.name, hit);
        Ok(info)
    }

    async fn is_permitted(
        &self,
        principals: &PrincipalCollection,
        permission: &Permission,
    ) -> Result<bool, AuthzError> {
        let info = self.get_authorization_info(principals).await?;
        if info.implies(permission, self.permission_resolver.as_ref())? {
            return Ok(true);
        }
        Ok(any_implies(&self.role_permissions(&info), permission))
    }

    fn clear_cached_authorization_info(&self, principals: &PrincipalCollection) {
        let Some(cache) = &self.cache else {
            return;
        };
        let own: Vec<_> = principals.from_realm(&self.name).into_iter().cloned().collect();
        if own.is_empty() {
            return;
        }
        cache.invalidate(&own);
        tracing::debug!(realm = %self.name, "Cleared cached authorization info");
    }
}
