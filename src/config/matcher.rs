use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::auth::{
    AllowAllCredentialsMatcher, CredentialsMatcher, HashAlgorithm, HashedCredentialsMatcher,
    SaltStyle, SimpleCredentialsMatcher, StoredEncoding,
};

/// A named credentials matcher, referenced from realms by name.
///
/// ```toml
/// [matchers.sha256]
/// type = "hashed"
/// algorithm = "sha-256"
/// iterations = 1
/// encoding = "hex"
/// salt = "none"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum CredentialsMatcherConfig {
    /// Plaintext comparison.
    Simple,

    /// Accept any secret.
    AllowAll,

    /// Digest comparison.
    Hashed(HashedMatcherConfig),
}

impl CredentialsMatcherConfig {
    pub fn build(&self) -> Arc<dyn CredentialsMatcher> {
        match self {
            Self::Simple => Arc::new(SimpleCredentialsMatcher),
            Self::AllowAll => Arc::new(AllowAllCredentialsMatcher),
            Self::Hashed(hashed) => Arc::new(hashed.matcher()),
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if let Self::Hashed(hashed) = self
            && hashed.iterations == 0
        {
            return Err(ConfigError::Validation(format!(
                "matchers.{name}.iterations must be at least 1"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HashedMatcherConfig {
    #[serde(default = "default_algorithm")]
    pub algorithm: HashAlgorithm,

    #[serde(default = "default_iterations", alias = "hashIterations")]
    pub iterations: u32,

    /// Text encoding of stored digests.
    #[serde(default)]
    pub encoding: StoredEncoding,

    #[serde(default)]
    pub salt: SaltStyle,
}

impl HashedMatcherConfig {
    pub fn matcher(&self) -> HashedCredentialsMatcher {
        HashedCredentialsMatcher::new(self.algorithm)
            .with_iterations(self.iterations)
            .with_encoding(self.encoding)
            .with_salt_style(self.salt)
    }
}

fn default_algorithm() -> HashAlgorithm {
    HashAlgorithm::Sha256
}

fn default_iterations() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hashed() {
        let config: CredentialsMatcherConfig = toml::from_str(
            r#"
            type = "hashed"
            algorithm = "sha-512"
            iterations = 1024
            encoding = "base64"
            salt = "crypt"
            "#,
        )
        .unwrap();

        let CredentialsMatcherConfig::Hashed(hashed) = &config else {
            panic!("expected hashed matcher");
        };
        let matcher = hashed.matcher();
        assert_eq!(matcher.algorithm(), HashAlgorithm::Sha512);
        assert_eq!(matcher.iterations(), 1024);
        assert_eq!(matcher.encoding(), StoredEncoding::Base64);
        assert_eq!(matcher.salt_style(), SaltStyle::Crypt);
    }

    #[test]
    fn test_parse_simple_and_allow_all() {
        let simple: CredentialsMatcherConfig = toml::from_str(r#"type = "simple""#).unwrap();
        assert!(matches!(simple, CredentialsMatcherConfig::Simple));
        let allow: CredentialsMatcherConfig = toml::from_str(r#"type = "allow_all""#).unwrap();
        assert!(matches!(allow, CredentialsMatcherConfig::AllowAll));
    }

    #[test]
    fn test_hashed_defaults() {
        let config: CredentialsMatcherConfig = toml::from_str(r#"type = "hashed""#).unwrap();
        let CredentialsMatcherConfig::Hashed(hashed) = config else {
            panic!("expected hashed matcher");
        };
        assert_eq!(hashed.algorithm, HashAlgorithm::Sha256);
        assert_eq!(hashed.iterations, 1);
        assert_eq!(hashed.encoding, StoredEncoding::Hex);
        assert_eq!(hashed.salt, SaltStyle::None);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let config: CredentialsMatcherConfig =
            toml::from_str("type = \"hashed\"\niterations = 0").unwrap();
        assert!(config.validate("bad").is_err());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let result: Result<CredentialsMatcherConfig, _> =
            toml::from_str("type = \"hashed\"\nalgorithm = \"md5\"");
        assert!(result.is_err());
    }
}
