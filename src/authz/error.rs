//! Authorization errors.

use thiserror::Error;

use crate::realm::RealmError;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid permission: {0}")]
    PermissionFormat(#[from] PermissionFormatError),

    #[error("Authorization lookup failed: {0}")]
    Realm(#[from] RealmError),
}

impl AuthzError {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }
}

/// A permission string that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionFormatError {
    #[error("permission string is empty")]
    Empty,

    #[error("permission '{0}' contains only dividers")]
    OnlyDividers(String),

    #[error("permission '{input}' has an empty token in part {part}")]
    EmptyToken { input: String, part: usize },
}
