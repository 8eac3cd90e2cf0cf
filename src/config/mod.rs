//! Configuration for the security manager.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [authentication]
//! strategy = "first_successful"
//!
//! [matchers.sha256]
//! type = "hashed"
//! algorithm = "sha-256"
//!
//! [roles]
//! admin = ["printer:*", "blogEntry:*"]
//!
//! [[realms]]
//! name = "myRealm"
//! type = "sample"
//! credentials_matcher = "sha256"
//!
//! [[realms]]
//! name = "local"
//! type = "memory"
//!
//! [realms.accounts.ops]
//! password = "${OPS_PASSWORD_HASH}"
//! roles = ["admin"]
//! ```

mod cache;
mod matcher;
mod observability;
mod realm;

use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

pub use cache::*;
pub use matcher::*;
pub use observability::*;
pub use realm::*;
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthenticationStrategy,
    authz::{
        PermissionFormatError, PermissionResolver, StaticRolePermissionResolver,
        WildcardPermissionResolver,
    },
    realm::MisconfigurationError,
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// How realm results combine at login.
    #[serde(default)]
    pub authentication: AuthenticationConfig,

    /// Authorization cache settings.
    #[serde(default)]
    pub cache: AuthorizationCacheConfig,

    /// Named credentials matchers.
    #[serde(default)]
    pub matchers: BTreeMap<String, CredentialsMatcherConfig>,

    /// Role name to granted permission strings.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,

    /// Realms, consulted in this order.
    #[serde(default)]
    pub realms: Vec<RealmConfig>,

    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticationConfig {
    #[serde(default)]
    pub strategy: AuthenticationStrategy,
}

impl SecurityConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: SecurityConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for consistency before anything is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realms.is_empty() {
            return Err(MisconfigurationError::NoRealms.into());
        }

        let mut names = HashSet::with_capacity(self.realms.len());
        for realm in &self.realms {
            if realm.name.trim().is_empty() {
                return Err(MisconfigurationError::EmptyRealmName.into());
            }
            if !names.insert(realm.name.as_str()) {
                return Err(MisconfigurationError::DuplicateRealmName(realm.name.clone()).into());
            }
            if let Some(matcher) = &realm.credentials_matcher
                && !self.matchers.contains_key(matcher)
            {
                return Err(MisconfigurationError::UnknownCredentialsMatcher {
                    realm: realm.name.clone(),
                    matcher: matcher.clone(),
                }
                .into());
            }
        }

        for (name, matcher) in &self.matchers {
            matcher.validate(name)?;
        }
        self.cache.validate()?;

        let resolver = WildcardPermissionResolver::uninterned();
        StaticRolePermissionResolver::from_strings(&self.roles, &resolver).map_err(|source| {
            ConfigError::Permission {
                context: "[roles]".into(),
                source,
            }
        })?;

        for realm in &self.realms {
            for (username, account) in &realm.accounts {
                for permission in &account.permissions {
                    resolver
                        .resolve(permission)
                        .map_err(|source| ConfigError::Permission {
                            context: format!("realm '{}' account '{}'", realm.name, username),
                            source,
                        })?;
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Realm misconfiguration: {0}")]
    Misconfiguration(#[from] MisconfigurationError),

    #[error("Invalid permission in {context}: {source}")]
    Permission {
        context: String,
        source: PermissionFormatError,
    },
}

/// Expand `${VAR}` references, leaving anything after a `#` untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("env pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip variables inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
