use thiserror::Error;

/// A realm lookup that could not complete.
#[derive(Debug, Error)]
pub enum RealmError {
    #[error("Backing store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RealmError {
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Store(err.into())
    }
}

/// Realm setup that cannot work; fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MisconfigurationError {
    #[error("No realms configured")]
    NoRealms,

    #[error("Realm name must not be empty")]
    EmptyRealmName,

    #[error("Duplicate realm name '{0}'")]
    DuplicateRealmName(String),

    #[error("Realm '{realm}' has unknown type '{kind}'")]
    UnknownRealmType { realm: String, kind: String },

    #[error("Realm '{realm}' references unknown credentials matcher '{matcher}'")]
    UnknownCredentialsMatcher { realm: String, matcher: String },

    #[error("Realm '{realm}': {message}")]
    InvalidRealm { realm: String, message: String },
}
