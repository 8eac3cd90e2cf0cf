//! Login tokens submitted by callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::principal::Principal;

/// The shape of a login token; realms advertise the kinds they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    UsernamePassword,
    Bearer,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::UsernamePassword => "username_password",
            TokenKind::Bearer => "bearer",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct UsernamePasswordToken {
    username: String,
    password: String,
    host: Option<String>,
}

impl UsernamePasswordToken {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl fmt::Debug for UsernamePasswordToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePasswordToken")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .finish()
    }
}

/// An opaque bearer credential. The token is both principal and secret.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// What a caller submits to log in.
#[derive(Debug, Clone)]
pub enum AuthenticationToken {
    UsernamePassword(UsernamePasswordToken),
    Bearer(BearerToken),
}

impl AuthenticationToken {
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword(UsernamePasswordToken::new(username, password))
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(BearerToken::new(token))
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Self::UsernamePassword(_) => TokenKind::UsernamePassword,
            Self::Bearer(_) => TokenKind::Bearer,
        }
    }

    /// The submitted identity.
    pub fn principal(&self) -> Principal {
        match self {
            Self::UsernamePassword(t) => Principal::from(t.username()),
            Self::Bearer(t) => Principal::from(t.token()),
        }
    }

    /// The submitted secret as bytes.
    pub fn credentials(&self) -> &[u8] {
        match self {
            Self::UsernamePassword(t) => t.password().as_bytes(),
            Self::Bearer(t) => t.token().as_bytes(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword(t) => Some(t.username()),
            Self::Bearer(_) => None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            Self::UsernamePassword(t) => t.host(),
            Self::Bearer(_) => None,
        }
    }
}

impl From<UsernamePasswordToken> for AuthenticationToken {
    fn from(token: UsernamePasswordToken) -> Self {
        Self::UsernamePassword(token)
    }
}

impl From<BearerToken> for AuthenticationToken {
    fn from(token: BearerToken) -> Self {
        Self::Bearer(token)
    }
}
