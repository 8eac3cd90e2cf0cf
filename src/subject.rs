use std::{fmt, sync::Arc};

use crate::{
    auth::{Principal, PrincipalCollection},
    authz::{AuthzError, Permission},
    security_manager::SecurityManager,
};

/// An authenticated identity bound to the manager that authenticated it.
///
/// Cheap to clone. Access checks go through the manager's authorizer.
#[derive(Clone)]
pub struct Subject {
    principals: PrincipalCollection,
    manager: Arc<SecurityManager>,
}

impl Subject {
    pub(crate) fn new(principals: PrincipalCollection, manager: Arc<SecurityManager>) -> Self {
        Self {
            principals,
            manager,
        }
    }

    pub fn principals(&self) -> &PrincipalCollection {
        &self.principals
    }

    pub fn primary_principal(&self) -> Option<&Principal> {
        self.principals.primary_principal()
    }

    pub fn security_manager(&self) -> &Arc<SecurityManager> {
        &self.manager
    }

    pub async fn is_permitted(&self, permission: &Permission) -> bool {
        self.manager
            .authorizer()
            .is_permitted(&self.principals, permission)
            .await
    }

    pub async fn is_permitted_str(&self, permission: &str) -> Result<bool, AuthzError> {
        self.manager
            .authorizer()
            .is_permitted_str(&self.principals, permission)
            .await
    }

    pub async fn is_permitted_all(&self, permissions: &[Permission]) -> bool {
        self.manager
            .authorizer()
            .is_permitted_all(&self.principals, permissions)
            .await
    }

    pub async fn has_role(&self, role: &str) -> bool {
        self.manager
            .authorizer()
            .has_role(&self.principals, role)
            .await
    }

    pub async fn has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.manager
            .authorizer()
            .has_all_roles(&self.principals, roles)
            .await
    }

    pub async fn check_permission(&self, permission: &Permission) -> Result<(), AuthzError> {
        self.manager
            .authorizer()
            .check_permission(&self.principals, permission)
            .await
    }

    pub async fn check_permission_str(&self, permission: &str) -> Result<(), AuthzError> {
        self.manager
            .authorizer()
            .check_permission_str(&self.principals, permission)
            .await
    }

    pub async fn check_role(&self, role: &str) -> Result<(), AuthzError> {
        self.manager
            .authorizer()
            .check_role(&self.principals, role)
            .await
    }

    pub async fn check_roles<S: AsRef<str>>(&self, roles: &[S]) -> Result<(), AuthzError> {
        self.manager
            .authorizer()
            .check_roles(&self.principals, roles)
            .await
    }

    /// End the session: every realm drops what it cached for this subject.
    pub fn logout(self) {
        self.manager.logout(&self.principals);
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("principals", &self.principals)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AuthenticationStrategy, AuthenticationToken, HashedCredentialsMatcher},
        realm::{AuthorizationCache, AuthorizingRealm, Realm, SampleAccountSource},
    };

    fn manager() -> Arc<SecurityManager> {
        let realm = AuthorizingRealm::new("myRealm", Arc::new(SampleAccountSource))
            .with_credentials_matcher(Arc::new(HashedCredentialsMatcher::sha256()))
            .with_authorization_cache(AuthorizationCache::new(&Default::default()));
        Arc::new(
            SecurityManager::new(
                vec![Arc::new(realm) as Arc<dyn Realm>],
                AuthenticationStrategy::FirstSuccessful,
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_subject_checks() {
        let subject = manager()
            .login(&AuthenticationToken::username_password("jsmith", "secret"))
            .await
            .unwrap();

        assert!(subject.is_permitted_str("blogEntry:edit").await.unwrap());
        assert!(!subject.is_permitted_str("blogEntry:delete").await.unwrap());
        assert!(subject.has_all_roles(&["user", "admin"]).await);
        assert!(subject.check_role("guest").await.is_err());
        assert!(
            subject
                .check_permission_str("printer:print:laserjet2000")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_checks_reload_after_logout() {
        let manager = manager();
        let subject = manager
            .login(&AuthenticationToken::username_password("jsmith", "secret"))
            .await
            .unwrap();
        assert!(subject.has_role("user").await);

        let realm = manager.realm("myRealm").unwrap().clone();
        let principals = subject.principals().clone();
        let debug = format!("{subject:?}");
        assert!(debug.contains("jsmith"));

        subject.logout();
        // Authorization still works after logout; the entry is simply reloaded
        assert!(realm.has_role(&principals, "user").await.unwrap());
    }
}
