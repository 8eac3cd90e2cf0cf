//! The security manager: owns the realms and wires them to the
//! authenticator and authorizer.

use std::sync::Arc;

use crate::{
    auth::{
        AuthenticationFailed, AuthenticationStrategy, AuthenticationToken, CredentialsMatcher,
        ModularRealmAuthenticator, PrincipalCollection, SimpleCredentialsMatcher,
    },
    authz::{
        ModularRealmAuthorizer, PermissionResolver, RolePermissionResolver,
        StaticRolePermissionResolver, WildcardPermissionResolver,
    },
    config::{ConfigError, SecurityConfig},
    realm::{AuthorizationCache, AuthorizingRealm, MisconfigurationError, Realm, RealmFactory},
    subject::Subject,
};

/// Entry point for login, logout and access checks.
///
/// There is no global instance; share one behind an `Arc`.
pub struct SecurityManager {
    realms: Vec<Arc<dyn Realm>>,
    authenticator: ModularRealmAuthenticator,
    authorizer: ModularRealmAuthorizer,
}

impl SecurityManager {
    /// Build from already-constructed realms. Fails on an empty list or
    /// duplicate realm names.
    pub fn new(
        realms: Vec<Arc<dyn Realm>>,
        strategy: AuthenticationStrategy,
    ) -> Result<Self, MisconfigurationError> {
        let authenticator = ModularRealmAuthenticator::new(realms.clone(), strategy)?;
        let authorizer = ModularRealmAuthorizer::new(realms.clone());
        Ok(Self {
            realms,
            authenticator,
            authorizer,
        })
    }

    /// Build every configured realm through `factory`.
    ///
    /// Realms share one interning permission resolver and, when `[roles]` is
    /// non-empty, one role resolver.
    pub fn from_config(
        config: &SecurityConfig,
        factory: &RealmFactory,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let permission_resolver = Arc::new(WildcardPermissionResolver::new());
        let role_resolver: Option<Arc<dyn RolePermissionResolver>> = if config.roles.is_empty() {
            None
        } else {
            let resolver = StaticRolePermissionResolver::from_strings(
                &config.roles,
                permission_resolver.as_ref(),
            )
            .map_err(|source| ConfigError::Permission {
                context: "[roles]".into(),
                source,
            })?;
            Some(Arc::new(resolver) as Arc<dyn RolePermissionResolver>)
        };

        let mut realms: Vec<Arc<dyn Realm>> = Vec::with_capacity(config.realms.len());
        for realm_config in &config.realms {
            let source = factory.build_source(realm_config)?;

            let matcher: Arc<dyn CredentialsMatcher> = match &realm_config.credentials_matcher {
                Some(name) => config
                    .matchers
                    .get(name)
                    .ok_or_else(|| MisconfigurationError::UnknownCredentialsMatcher {
                        realm: realm_config.name.clone(),
                        matcher: name.clone(),
                    })?
                    .build(),
                None => Arc::new(SimpleCredentialsMatcher),
            };

            let mut realm = AuthorizingRealm::new(realm_config.name.clone(), source)
                .with_credentials_matcher(matcher)
                .with_permission_resolver(
                    permission_resolver.clone() as Arc<dyn PermissionResolver>
                );
            if let Some(resolver) = &role_resolver {
                realm = realm.with_role_permission_resolver(resolver.clone());
            }
            let caching = config.cache.enabled && realm_config.authorization_caching();
            if caching {
                realm = realm.with_authorization_cache(AuthorizationCache::new(&config.cache));
            }

            tracing::debug!(
                realm = %realm_config.name,
                kind = %realm_config.kind,
                matcher = realm_config.credentials_matcher.as_deref().unwrap_or("simple"),
                caching,
                "Realm configured"
            );
            realms.push(Arc::new(realm));
        }

        let manager = Self::new(realms, config.authentication.strategy)?;
        tracing::info!(
            realms = ?manager.realm_names(),
            strategy = config.authentication.strategy.as_str(),
            roles = config.roles.len(),
            "Security manager initialized"
        );
        Ok(manager)
    }

    pub fn realms(&self) -> &[Arc<dyn Realm>] {
        &self.realms
    }

    pub fn realm(&self, name: &str) -> Option<&Arc<dyn Realm>> {
        self.realms.iter().find(|r| r.name() == name)
    }

    pub fn realm_names(&self) -> Vec<&str> {
        self.realms.iter().map(|r| r.name()).collect()
    }

    pub fn authenticator(&self) -> &ModularRealmAuthenticator {
        &self.authenticator
    }

    pub fn authorizer(&self) -> &ModularRealmAuthorizer {
        &self.authorizer
    }

    pub async fn authenticate(
        &self,
        token: &AuthenticationToken,
    ) -> Result<PrincipalCollection, AuthenticationFailed> {
        self.authenticator.authenticate(token).await
    }

    /// Authenticate and wrap the resulting principals in a [`Subject`].
    pub async fn login(
        self: &Arc<Self>,
        token: &AuthenticationToken,
    ) -> Result<Subject, AuthenticationFailed> {
        let principals = self.authenticate(token).await?;
        Ok(Subject::new(principals, Arc::clone(self)))
    }

    /// Notify every realm that `principals` logged out.
    pub fn logout(&self, principals: &PrincipalCollection) {
        for realm in &self.realms {
            realm.on_logout(principals);
        }
        tracing::debug!(principals = principals.len(), "Logged out");
    }

    /// Drop cached authorization data for `principals` in every realm, e.g.
    /// after changing an account's roles in its store.
    pub fn clear_cached_authorization_info(&self, principals: &PrincipalCollection) {
        for realm in &self.realms {
            realm.clear_cached_authorization_info(principals);
        }
    }
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityManager")
            .field("realms", &self.realm_names())
            .field("strategy", &self.authenticator.strategy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::Principal,
        authz::Permission,
        config::{MemoryAccountConfig, RealmConfig},
    };

    const CONFIG: &str = r#"
[authentication]
strategy = "first_successful"

[matchers.sha256]
type = "hashed"
algorithm = "sha-256"

[roles]
operator = ["printer:*"]

[[realms]]
name = "myRealm"
type = "sample"
credentials_matcher = "sha256"

[[realms]]
name = "local"
type = "memory"
authorization_caching_enabled = false

[realms.accounts.ops]
password = "letmein"
roles = ["operator"]
"#;

    fn manager() -> Arc<SecurityManager> {
        let config = SecurityConfig::from_str(CONFIG).unwrap();
        Arc::new(SecurityManager::from_config(&config, &RealmFactory::default()).unwrap())
    }

    #[test]
    fn test_from_config_builds_realms_in_order() {
        let manager = manager();
        assert_eq!(manager.realm_names(), vec!["myRealm", "local"]);
        assert_eq!(
            manager.authenticator().strategy(),
            AuthenticationStrategy::FirstSuccessful
        );
        assert!(manager.realm("local").is_some());
        assert!(manager.realm("missing").is_none());
    }

    #[tokio::test]
    async fn test_login_through_configured_realms() {
        let manager = manager();

        let jsmith = manager
            .login(&AuthenticationToken::username_password("jsmith", "secret"))
            .await
            .unwrap();
        assert_eq!(jsmith.primary_principal(), Some(&Principal::from("jsmith")));
        assert!(jsmith.has_role("admin").await);

        let ops = manager
            .login(&AuthenticationToken::username_password("ops", "letmein"))
            .await
            .unwrap();
        assert_eq!(ops.principals().realm_names(), vec!["local"]);
        assert!(
            ops.is_permitted(&Permission::parse("printer:print:any").unwrap())
                .await
        );
        assert!(!ops.has_role("admin").await);
    }

    #[tokio::test]
    async fn test_matcher_defaults_to_plaintext() {
        let manager = manager();
        let err = manager
            .authenticate(&AuthenticationToken::username_password("ops", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Authentication failed");
    }

    #[test]
    fn test_unknown_realm_type_is_startup_error() {
        let mut config = SecurityConfig::from_str(CONFIG).unwrap();
        config.realms[1].kind = "ldap".into();
        let err = SecurityManager::from_config(&config, &RealmFactory::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Misconfiguration(MisconfigurationError::UnknownRealmType { .. })
        ));
    }

    #[test]
    fn test_programmatic_config_is_validated() {
        let mut config = SecurityConfig::default();
        let realm: RealmConfig = toml::from_str("name = \"r\"\ntype = \"memory\"").unwrap();
        config.realms.push(realm);
        config.realms[0].accounts.insert(
            "u".into(),
            MemoryAccountConfig {
                password: "p".into(),
                salt: None,
                roles: vec![],
                permissions: vec!["a,,b".into()],
                locked: false,
                credentials_expired: false,
            },
        );
        let err = SecurityManager::from_config(&config, &RealmFactory::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Permission { .. }));
    }

    #[test]
    fn test_new_rejects_empty_realm_list() {
        assert_eq!(
            SecurityManager::new(vec![], AuthenticationStrategy::default()).unwrap_err(),
            MisconfigurationError::NoRealms
        );
    }
}
