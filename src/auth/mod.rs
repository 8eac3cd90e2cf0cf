//! Authentication: tokens, principals, stored credentials and the
//! authenticator that runs a token through the configured realms.

mod account;
mod authenticator;
mod credentials;
mod error;
mod principal;
mod token;

pub use account::{Account, AuthenticationInfo, Credentials};
pub use authenticator::{AuthenticationStrategy, ModularRealmAuthenticator};
pub use credentials::{
    AllowAllCredentialsMatcher, CredentialsError, CredentialsMatcher, DEFAULT_SALT_LEN,
    HashAlgorithm, HashedCredentialsMatcher, SaltStyle, SimpleCredentialsMatcher, StoredEncoding,
    generate_salt,
};
pub use error::{AuthenticationFailed, FailureKind};
pub use principal::{Principal, PrincipalCollection};
pub use token::{AuthenticationToken, BearerToken, TokenKind, UsernamePasswordToken};
