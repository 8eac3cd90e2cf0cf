use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{RealmError, RealmSource};
use crate::{
    auth::{AuthenticationInfo, AuthenticationToken, Credentials, Principal, PrincipalCollection},
    authz::AuthorizationInfo,
    config::MemoryAccountConfig,
};

/// An account held by a [`MemoryAccountSource`].
#[derive(Debug, Clone)]
pub struct MemoryAccount {
    pub credentials: Credentials,
    pub salt: Option<Vec<u8>>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub locked: bool,
    pub credentials_expired: bool,
}

impl MemoryAccount {
    pub fn new(credentials: impl Into<Credentials>) -> Self {
        Self {
            credentials: credentials.into(),
            salt: None,
            roles: Vec::new(),
            permissions: Vec::new(),
            locked: false,
            credentials_expired: false,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_credentials_expired(mut self, expired: bool) -> Self {
        self.credentials_expired = expired;
        self
    }

    fn authorization(&self) -> AuthorizationInfo {
        AuthorizationInfo::new()
            .with_roles(self.roles.iter().cloned())
            .with_string_permissions(self.permissions.iter().cloned())
    }
}

impl From<&MemoryAccountConfig> for MemoryAccount {
    fn from(config: &MemoryAccountConfig) -> Self {
        let account = Self::new(config.password.clone())
            .with_roles(config.roles.iter().cloned())
            .with_permissions(config.permissions.iter().cloned())
            .with_locked(config.locked)
            .with_credentials_expired(config.credentials_expired);
        match &config.salt {
            Some(salt) => account.with_salt(salt.as_bytes()),
            None => account,
        }
    }
}

/// Accounts held in process memory, keyed by username.
///
/// Changing an account does not touch any realm cache; call
/// `SecurityManager::clear_cached_authorization_info` for the account after
/// an update.
#[derive(Debug, Default)]
pub struct MemoryAccountSource {
    accounts: RwLock<HashMap<String, MemoryAccount>>,
}

impl MemoryAccountSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(accounts: &BTreeMap<String, MemoryAccountConfig>) -> Self {
        let source = Self::new();
        for (username, account) in accounts {
            source.add_account(username.clone(), MemoryAccount::from(account));
        }
        source
    }

    /// Insert or replace an account.
    pub fn add_account(&self, username: impl Into<String>, account: MemoryAccount) {
        self.accounts.write().insert(username.into(), account);
    }

    pub fn remove_account(&self, username: &str) -> Option<MemoryAccount> {
        self.accounts.write().remove(username)
    }

    /// Replace an account's stored credentials. Returns false if unknown.
    pub fn set_credentials(&self, username: &str, credentials: impl Into<Credentials>) -> bool {
        match self.accounts.write().get_mut(username) {
            Some(account) => {
                account.credentials = credentials.into();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl RealmSource for MemoryAccountSource {
    async fn authentication_info(
        &self,
        realm: &str,
        token: &AuthenticationToken,
    ) -> Result<Option<AuthenticationInfo>, RealmError> {
        let Some(username) = token.username() else {
            return Ok(None);
        };
        let accounts = self.accounts.read();
        let Some(account) = accounts.get(username) else {
            return Ok(None);
        };

        let mut info = AuthenticationInfo::new(realm, username, account.credentials.clone())
            .with_authorization(account.authorization())
            .with_locked(account.locked)
            .with_credentials_expired(account.credentials_expired);
        if let Some(salt) = &account.salt {
            info = info.with_salt(salt.clone());
        }
        Ok(Some(info))
    }

    async fn authorization_info(
        &self,
        realm: &str,
        principals: &PrincipalCollection,
    ) -> Result<AuthorizationInfo, RealmError> {
        let Some(username) = self
            .primary_principal(realm, principals)
            .and_then(Principal::as_str)
        else {
            return Ok(AuthorizationInfo::default());
        };
        Ok(self
            .accounts
            .read()
            .get(username)
            .map(MemoryAccount::authorization)
            .unwrap_or_default())
    }
}
