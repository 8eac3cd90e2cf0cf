//! Principals and the multi-realm principal collection.
//!
//! A principal is one identifying claim about an account: a username, a
//! numeric id, a UUID, or a small map of attributes. After a login, every
//! realm that recognized the account contributes its own principals, tagged
//! with the realm's name:
//!
//! ```text
//! PrincipalCollection
//!   myRealm   -> [Text("jsmith")]
//!   ldap      -> [Text("jsmith"), Uuid(..)]
//! ```
//!
//! The same value contributed by two realms is kept twice, once per realm.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One identifying claim about an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    Number(i64),
    Uuid(Uuid),
    Text(String),
    Compound(BTreeMap<String, String>),
}

impl Principal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Principal::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Principal::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Principal::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Number(n) => write!(f, "{n}"),
            Principal::Uuid(u) => write!(f, "{u}"),
            Principal::Text(s) => f.write_str(s),
            Principal::Compound(fields) => {
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Principal {
    fn from(value: &str) -> Self {
        Principal::Text(value.to_string())
    }
}

impl From<String> for Principal {
    fn from(value: String) -> Self {
        Principal::Text(value)
    }
}

impl From<i64> for Principal {
    fn from(value: i64) -> Self {
        Principal::Number(value)
    }
}

impl From<Uuid> for Principal {
    fn from(value: Uuid) -> Self {
        Principal::Uuid(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RealmPrincipal {
    realm: String,
    principal: Principal,
}

/// Principals gathered from one or more realms.
///
/// Iteration order is insertion order. Each realm holds a value at most once;
/// values are never merged across realms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalCollection {
    entries: Vec<RealmPrincipal>,
}

impl PrincipalCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection holding one principal from `realm`.
    pub fn single(realm: impl Into<String>, principal: impl Into<Principal>) -> Self {
        let mut collection = Self::new();
        collection.add(realm, principal);
        collection
    }

    /// Add `principal` under `realm`. Returns false if the realm already held it.
    pub fn add(&mut self, realm: impl Into<String>, principal: impl Into<Principal>) -> bool {
        let realm = realm.into();
        let principal = principal.into();
        if self
            .entries
            .iter()
            .any(|e| e.realm == realm && e.principal == principal)
        {
            return false;
        }
        self.entries.push(RealmPrincipal { realm, principal });
        true
    }

    /// Add every principal of `other`, keeping each one's realm.
    pub fn merge(&mut self, other: &PrincipalCollection) {
        for entry in &other.entries {
            self.add(entry.realm.clone(), entry.principal.clone());
        }
    }

    /// Add only the principals `other` holds under `realm`.
    pub fn merge_realm(&mut self, realm: &str, other: &PrincipalCollection) {
        for principal in other.from_realm(realm) {
            self.add(realm, principal.clone());
        }
    }

    /// The first principal added, if any.
    pub fn primary_principal(&self) -> Option<&Principal> {
        self.entries.first().map(|e| &e.principal)
    }

    /// Principals contributed by `realm`, in insertion order.
    pub fn from_realm(&self, realm: &str) -> Vec<&Principal> {
        self.entries
            .iter()
            .filter(|e| e.realm == realm)
            .map(|e| &e.principal)
            .collect()
    }

    /// A new collection with only `realm`'s partition.
    pub fn realm_subset(&self, realm: &str) -> PrincipalCollection {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| e.realm == realm)
                .cloned()
                .collect(),
        }
    }

    /// Names of contributing realms, in the order they first appear.
    pub fn realm_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if !names.contains(&entry.realm.as_str()) {
                names.push(&entry.realm);
            }
        }
        names
    }

    pub fn contains(&self, principal: &Principal) -> bool {
        self.entries.iter().any(|e| &e.principal == principal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Principal> {
        self.entries.iter().map(|e| &e.principal)
    }

    /// `(realm, principal)` pairs in insertion order.
    pub fn iter_with_realm(&self) -> impl Iterator<Item = (&str, &Principal)> {
        self.entries
            .iter()
            .map(|e| (e.realm.as_str(), &e.principal))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for PrincipalCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, realm) in self.realm_names().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{realm}:[")?;
            for (j, principal) in self.from_realm(realm).into_iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{principal}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
