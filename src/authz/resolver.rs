//! Permission and role resolution.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use dashmap::DashMap;

use super::{
    error::PermissionFormatError,
    permission::{Permission, WildcardPermission},
};

/// Maximum number of distinct strings the interning resolver remembers.
const MAX_INTERNED: usize = 10_000;

/// Turns stored permission strings into [`Permission`] values.
pub trait PermissionResolver: fmt::Debug + Send + Sync {
    fn resolve(&self, permission: &str) -> Result<Permission, PermissionFormatError>;
}

/// Resolves strings as wildcard permissions, interning parsed values so that
/// accounts naming the same string share one allocation.
#[derive(Debug)]
pub struct WildcardPermissionResolver {
    case_sensitive: bool,
    interned: Option<DashMap<String, Permission>>,
}

impl WildcardPermissionResolver {
    pub fn new() -> Self {
        Self {
            case_sensitive: false,
            interned: Some(DashMap::new()),
        }
    }

    /// A resolver that parses every call and keeps nothing.
    pub const fn uninterned() -> Self {
        Self {
            case_sensitive: false,
            interned: None,
        }
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn interned_len(&self) -> usize {
        self.interned.as_ref().map_or(0, DashMap::len)
    }

    fn parse(&self, permission: &str) -> Result<Permission, PermissionFormatError> {
        let parsed = if self.case_sensitive {
            WildcardPermission::parse_case_sensitive(permission)?
        } else {
            WildcardPermission::parse(permission)?
        };
        Ok(Permission::Wildcard(parsed))
    }
}

impl Default for WildcardPermissionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionResolver for WildcardPermissionResolver {
    fn resolve(&self, permission: &str) -> Result<Permission, PermissionFormatError> {
        let Some(interned) = &self.interned else {
            return self.parse(permission);
        };

        if let Some(existing) = interned.get(permission) {
            return Ok(existing.clone());
        }

        let parsed = self.parse(permission)?;
        if interned.len() < MAX_INTERNED {
            // A racing insert of the same string is harmless: both values are equal.
            interned
                .entry(permission.to_string())
                .or_insert_with(|| parsed.clone());
        }
        Ok(parsed)
    }
}

/// Expands a role name into the permissions it grants.
pub trait RolePermissionResolver: fmt::Debug + Send + Sync {
    fn resolve_permissions_in_role(&self, role: &str) -> Vec<Permission>;
}

/// Role table fixed at construction time.
#[derive(Debug, Default, Clone)]
pub struct StaticRolePermissionResolver {
    roles: HashMap<String, Vec<Permission>>,
}

impl StaticRolePermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>, permissions: Vec<Permission>) -> Self {
        self.roles.insert(role.into(), permissions);
        self
    }

    /// Build from `role -> [permission string]`, failing on the first string
    /// that does not parse.
    pub fn from_strings(
        table: &BTreeMap<String, Vec<String>>,
        resolver: &dyn PermissionResolver,
    ) -> Result<Self, PermissionFormatError> {
        let mut roles = HashMap::with_capacity(table.len());
        for (role, permissions) in table {
            let parsed = permissions
                .iter()
                .map(|p| resolver.resolve(p))
                .collect::<Result<Vec<_>, _>>()?;
            roles.insert(role.clone(), parsed);
        }
        Ok(Self { roles })
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl RolePermissionResolver for StaticRolePermissionResolver {
    fn resolve_permissions_in_role(&self, role: &str) -> Vec<Permission> {
        self.roles.get(role).cloned().unwrap_or_default()
    }
}
