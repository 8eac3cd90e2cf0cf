use std::sync::Arc;

use super::{AuthzError, Permission};
use crate::{auth::PrincipalCollection, observability::metrics, realm::Realm};

/// Answers access checks by consulting realms in configured order.
///
/// The first realm that grants a check ends it. A realm whose lookup fails
/// is logged and counted as a denial; errors never grant access.
pub struct ModularRealmAuthorizer {
    realms: Vec<Arc<dyn Realm>>,
}

impl ModularRealmAuthorizer {
    pub fn new(realms: Vec<Arc<dyn Realm>>) -> Self {
        Self { realms }
    }

    pub fn realms(&self) -> &[Arc<dyn Realm>] {
        &self.realms
    }

    pub async fn is_permitted(
        &self,
        principals: &PrincipalCollection,
        permission: &Permission,
    ) -> bool {
        for realm in &self.realms {
            let allowed = match realm.is_permitted(principals, permission).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    tracing::error!(
                        realm = realm.name(),
                        permission = %permission,
                        error = %e,
                        "Permission check failed; denying for this realm"
                    );
                    false
                }
            };
            metrics::record_authorization_check(realm.name(), allowed);
            if allowed {
                tracing::debug!(realm = realm.name(), permission = %permission, "Permitted");
                return true;
            }
        }
        tracing::debug!(permission = %permission, "Not permitted by any realm");
        false
    }

    /// Check a permission given in string form.
    ///
    /// Each realm parses the string with its own resolver; a string that does
    /// not parse is an error rather than a denial.
    pub async fn is_permitted_str(
        &self,
        principals: &PrincipalCollection,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        for realm in &self.realms {
            let parsed = realm.permission_resolver().resolve(permission)?;
            let allowed = match realm.is_permitted(principals, &parsed).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    tracing::error!(
                        realm = realm.name(),
                        permission,
                        error = %e,
                        "Permission check failed; denying for this realm"
                    );
                    false
                }
            };
            metrics::record_authorization_check(realm.name(), allowed);
            if allowed {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True only if every permission is granted, each by any realm.
    pub async fn is_permitted_all(
        &self,
        principals: &PrincipalCollection,
        permissions: &[Permission],
    ) -> bool {
        for permission in permissions {
            if !self.is_permitted(principals, permission).await {
                return false;
            }
        }
        true
    }

    pub async fn has_role(&self, principals: &PrincipalCollection, role: &str) -> bool {
        for realm in &self.realms {
            let allowed = match realm.has_role(principals, role).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    tracing::error!(
                        realm = realm.name(),
                        role,
                        error = %e,
                        "Role check failed; denying for this realm"
                    );
                    false
                }
            };
            metrics::record_authorization_check(realm.name(), allowed);
            if allowed {
                return true;
            }
        }
        false
    }

    pub async fn has_all_roles<S: AsRef<str>>(
        &self,
        principals: &PrincipalCollection,
        roles: &[S],
    ) -> bool {
        for role in roles {
            if !self.has_role(principals, role.as_ref()).await {
                return false;
            }
        }
        true
    }

    pub async fn check_permission(
        &self,
        principals: &PrincipalCollection,
        permission: &Permission,
    ) -> Result<(), AuthzError> {
        if self.is_permitted(principals, permission).await {
            Ok(())
        } else {
            Err(AuthzError::unauthorized(format!(
                "subject lacks permission '{permission}'"
            )))
        }
    }

    pub async fn check_permission_str(
        &self,
        principals: &PrincipalCollection,
        permission: &str,
    ) -> Result<(), AuthzError> {
        if self.is_permitted_str(principals, permission).await? {
            Ok(())
        } else {
            Err(AuthzError::unauthorized(format!(
                "subject lacks permission '{permission}'"
            )))
        }
    }

    pub async fn check_role(
        &self,
        principals: &PrincipalCollection,
        role: &str,
    ) -> Result<(), AuthzError> {
        if self.has_role(principals, role).await {
            Ok(())
        } else {
            Err(AuthzError::unauthorized(format!(
                "subject lacks role '{role}'"
            )))
        }
    }

    pub async fn check_roles<S: AsRef<str>>(
        &self,
        principals: &PrincipalCollection,
        roles: &[S],
    ) -> Result<(), AuthzError> {
        for role in roles {
            self.check_role(principals, role.as_ref()).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModularRealmAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.realms.iter().map(|r| r.name()).collect();
        f.debug_struct("ModularRealmAuthorizer")
            .field("realms", &names)
            .finish()
    }
}
