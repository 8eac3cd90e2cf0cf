use std::{
    collections::BTreeSet,
    sync::{Arc, OnceLock},
};

use super::{
    error::PermissionFormatError,
    permission::{Permission, any_implies},
    resolver::PermissionResolver,
};

type Resolved = Result<Arc<[Permission]>, PermissionFormatError>;

/// Roles and permissions an account holds in one realm.
///
/// String permissions are parsed on the first check and the parsed set is
/// kept on the record. Records are shared behind `Arc` once cached, so the
/// parse happens at most once per cached record.
#[derive(Debug, Default, Clone)]
pub struct AuthorizationInfo {
    roles: BTreeSet<String>,
    string_permissions: BTreeSet<String>,
    object_permissions: Vec<Permission>,
    resolved: OnceLock<Resolved>,
}

impl AuthorizationInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.add_role(role);
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for role in roles {
            self.add_role(role);
        }
        self
    }

    pub fn with_string_permission(mut self, permission: impl Into<String>) -> Self {
        self.add_string_permission(permission);
        self
    }

    pub fn with_string_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for permission in permissions {
            self.add_string_permission(permission);
        }
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.add_permission(permission);
        self
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    pub fn add_string_permission(&mut self, permission: impl Into<String>) {
        self.string_permissions.insert(permission.into());
        self.resolved = OnceLock::new();
    }

    pub fn add_permission(&mut self, permission: Permission) {
        self.object_permissions.push(permission);
        self.resolved = OnceLock::new();
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn string_permissions(&self) -> &BTreeSet<String> {
        &self.string_permissions
    }

    pub fn object_permissions(&self) -> &[Permission] {
        &self.object_permissions
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
            && self.string_permissions.is_empty()
            && self.object_permissions.is_empty()
    }

    /// Object permissions plus every string permission parsed with `resolver`.
    ///
    /// The first call fixes the result; later calls return it regardless of
    /// the resolver passed.
    pub fn resolved_permissions(
        &self,
        resolver: &dyn PermissionResolver,
    ) -> Result<Arc<[Permission]>, PermissionFormatError> {
        self.resolved
            .get_or_init(|| {
                let mut all = self.object_permissions.clone();
                for raw in &self.string_permissions {
                    all.push(resolver.resolve(raw)?);
                }
                Ok(all.into())
            })
            .clone()
    }

    /// Whether any held permission implies `permission`.
    pub fn implies(
        &self,
        permission: &Permission,
        resolver: &dyn PermissionResolver,
    ) -> Result<bool, PermissionFormatError> {
        let held = self.resolved_permissions(resolver)?;
        Ok(any_implies(held.iter(), permission))
    }
}

impl PartialEq for AuthorizationInfo {
    fn eq(&self, other: &Self) -> bool {
        self.roles == other.roles
            && self.string_permissions == other.string_permissions
            && self.object_permissions == other.object_permissions
    }
}

impl Eq for AuthorizationInfo {}
