//! Realm-based authentication and authorization.
//!
//! A [`SecurityManager`] owns an ordered list of named realms. Login tokens
//! are run through every realm that supports them; each realm looks the
//! account up and its credentials matcher verifies the submitted secret.
//! The principals of the realms that succeeded form the subject's identity.
//! Access checks then ask the realms, in order, whether that identity holds
//! a role or a permission that implies the one requested.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use realmguard::{
//!     SecurityManager,
//!     auth::{AuthenticationStrategy, AuthenticationToken, HashedCredentialsMatcher},
//!     realm::{AuthorizingRealm, Realm, SampleAccountSource},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let realm = AuthorizingRealm::new("myRealm", Arc::new(SampleAccountSource))
//!     .with_credentials_matcher(Arc::new(HashedCredentialsMatcher::sha256()));
//! let manager = Arc::new(SecurityManager::new(
//!     vec![Arc::new(realm) as Arc<dyn Realm>],
//!     AuthenticationStrategy::FirstSuccessful,
//! )?);
//!
//! let subject = manager
//!     .login(&AuthenticationToken::username_password("jsmith", "secret"))
//!     .await?;
//! assert!(subject.is_permitted_str("printer:print:laserjet2000").await?);
//! subject.logout();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod authz;
pub mod config;
pub mod observability;
pub mod realm;
pub mod security_manager;
pub mod subject;
#[cfg(test)]
mod tests;

pub use auth::{AuthenticationFailed, AuthenticationToken, Principal, PrincipalCollection};
pub use authz::{AuthzError, Permission};
pub use config::{ConfigError, SecurityConfig};
pub use realm::{Realm, RealmFactory, RealmSource};
pub use security_manager::SecurityManager;
pub use subject::Subject;
