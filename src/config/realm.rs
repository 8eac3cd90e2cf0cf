use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One configured realm.
///
/// ```toml
/// [[realms]]
/// name = "myRealm"
/// type = "sample"
/// credentials_matcher = "sha256"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealmConfig {
    /// Unique realm name; tags the principals the realm contributes.
    pub name: String,

    /// Realm type registered with the realm factory (`sample`, `memory`, ...).
    #[serde(rename = "type")]
    pub kind: String,

    /// Name of an entry under `[matchers]`. Plaintext comparison when unset.
    #[serde(default, alias = "credentialsMatcher")]
    pub credentials_matcher: Option<String>,

    /// Master switch for this realm's caching.
    #[serde(default = "default_true", alias = "cachingEnabled")]
    pub caching_enabled: bool,

    /// Cache authorization lookups.
    #[serde(default = "default_true", alias = "authorizationCachingEnabled")]
    pub authorization_caching_enabled: bool,

    /// Accounts for `memory` realms, keyed by username.
    #[serde(default)]
    pub accounts: BTreeMap<String, MemoryAccountConfig>,

    /// Free-form settings for application-registered realm types.
    #[serde(default)]
    pub options: toml::Table,
}

impl RealmConfig {
    pub fn authorization_caching(&self) -> bool {
        self.caching_enabled && self.authorization_caching_enabled
    }
}

/// An account of a `memory` realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryAccountConfig {
    /// Stored credential material in the realm matcher's format.
    pub password: String,

    /// Per-account salt for `salt = "account"` matchers.
    #[serde(default)]
    pub salt: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default)]
    pub locked: bool,

    #[serde(default, alias = "credentialsExpired")]
    pub credentials_expired: bool,
}

fn default_true() -> bool {
    true
}
