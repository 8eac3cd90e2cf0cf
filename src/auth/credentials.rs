//! Credential matching: does a submitted secret match what the store holds?
//!
//! Every comparison of secret or digest bytes goes through
//! [`subtle::ConstantTimeEq`], so the time taken does not depend on how many
//! leading bytes match.
//!
//! # Stored formats
//!
//! | Salt style | Stored material | Digest |
//! |---|---|---|
//! | `none` | hex/base64 digest | `H^n(password)` |
//! | `account` | hex/base64 digest, salt on the account | `H^(n-1)(H(salt ‖ password))` |
//! | `crypt` | `$<algorithm>$<iterations>$<salt-b64>$<hash-b64>` | as `account` |

use std::{fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::{
    account::{AuthenticationInfo, Credentials},
    token::AuthenticationToken,
};

/// Default salt length for generated salts, in bytes.
pub const DEFAULT_SALT_LEN: usize = 16;

/// Stored credential material that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("Stored credentials are not valid {encoding}: {message}")]
    Decode {
        encoding: &'static str,
        message: String,
    },

    #[error("Malformed crypt credential: {0}")]
    MalformedCrypt(String),

    #[error("Unsupported hash algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("Account has no credentials salt")]
    MissingSalt,
}

/// Verifies a submitted secret against stored credential material.
pub trait CredentialsMatcher: fmt::Debug + Send + Sync {
    /// `Ok(false)` on mismatch; `Err` when the stored material is unusable.
    fn matches(
        &self,
        token: &AuthenticationToken,
        info: &AuthenticationInfo,
    ) -> Result<bool, CredentialsError>;
}

/// Byte-for-byte comparison of the submitted secret with the stored one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCredentialsMatcher;

impl CredentialsMatcher for SimpleCredentialsMatcher {
    fn matches(
        &self,
        token: &AuthenticationToken,
        info: &AuthenticationInfo,
    ) -> Result<bool, CredentialsError> {
        Ok(token
            .credentials()
            .ct_eq(info.credentials().as_bytes())
            .into())
    }
}

/// Accepts any secret. For realms whose tokens were verified upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllCredentialsMatcher;

impl CredentialsMatcher for AllowAllCredentialsMatcher {
    fn matches(
        &self,
        _token: &AuthenticationToken,
        _info: &AuthenticationInfo,
    ) -> Result<bool, CredentialsError> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "sha-256", alias = "sha256", alias = "SHA-256")]
    Sha256,
    #[serde(rename = "sha-384", alias = "sha384", alias = "SHA-384")]
    Sha384,
    #[serde(rename = "sha-512", alias = "sha512", alias = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha-256",
            HashAlgorithm::Sha384 => "sha-384",
            HashAlgorithm::Sha512 => "sha-512",
        }
    }

    /// Digest `salt ‖ input`, then re-digest the result `iterations - 1` times.
    pub fn hash(&self, salt: Option<&[u8]>, input: &[u8], iterations: u32) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => iterated_hash::<Sha256>(salt, input, iterations),
            HashAlgorithm::Sha384 => iterated_hash::<Sha384>(salt, input, iterations),
            HashAlgorithm::Sha512 => iterated_hash::<Sha512>(salt, input, iterations),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = CredentialsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha-256" | "sha256" => Ok(HashAlgorithm::Sha256),
            "sha-384" | "sha384" => Ok(HashAlgorithm::Sha384),
            "sha-512" | "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(CredentialsError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

fn iterated_hash<D: Digest>(salt: Option<&[u8]>, input: &[u8], iterations: u32) -> Vec<u8> {
    let mut hasher = D::new();
    if let Some(salt) = salt {
        hasher.update(salt);
    }
    hasher.update(input);
    let mut digest = hasher.finalize().to_vec();
    for _ in 1..iterations {
        digest = D::digest(&digest).to_vec();
    }
    digest
}

/// Text encoding of stored digests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredEncoding {
    #[default]
    Hex,
    Base64,
}

impl StoredEncoding {
    pub fn encode(&self, bytes: &[u8]) -> String {
        match self {
            StoredEncoding::Hex => hex::encode(bytes),
            StoredEncoding::Base64 => STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self, text: &str) -> Result<Vec<u8>, CredentialsError> {
        match self {
            StoredEncoding::Hex => hex::decode(text.trim()).map_err(|e| CredentialsError::Decode {
                encoding: "hex",
                message: e.to_string(),
            }),
            StoredEncoding::Base64 => {
                STANDARD
                    .decode(text.trim())
                    .map_err(|e| CredentialsError::Decode {
                        encoding: "base64",
                        message: e.to_string(),
                    })
            }
        }
    }
}

/// Where the salt for a hashed credential comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaltStyle {
    #[default]
    None,
    /// Salt stored on the account record.
    Account,
    /// Salt, algorithm and iteration count embedded in the stored string.
    Crypt,
}

/// Parsed `$<algorithm>$<iterations>$<salt-b64>$<hash-b64>` credential.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CryptCredential {
    algorithm: HashAlgorithm,
    iterations: u32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl FromStr for CryptCredential {
    type Err = CredentialsError;

    fn from_str(stored: &str) -> Result<Self, Self::Err> {
        let body = stored
            .trim()
            .strip_prefix('$')
            .ok_or_else(|| CredentialsError::MalformedCrypt("missing leading '$'".into()))?;

        let mut fields = body.split('$');
        let (Some(algorithm), Some(iterations), Some(salt), Some(hash), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            return Err(CredentialsError::MalformedCrypt(
                "expected four '$'-separated fields".into(),
            ));
        };

        let algorithm = algorithm.parse()?;
        let iterations = match iterations.parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(CredentialsError::MalformedCrypt(format!(
                    "invalid iteration count '{iterations}'"
                )));
            }
        };
        let salt = StoredEncoding::Base64.decode(salt)?;
        let hash = StoredEncoding::Base64.decode(hash)?;
        if hash.is_empty() {
            return Err(CredentialsError::MalformedCrypt("empty hash".into()));
        }

        Ok(Self {
            algorithm,
            iterations,
            salt,
            hash,
        })
    }
}

/// Compares a digest of the submitted secret with a stored digest.
#[derive(Debug, Clone)]
pub struct HashedCredentialsMatcher {
    algorithm: HashAlgorithm,
    iterations: u32,
    encoding: StoredEncoding,
    salt_style: SaltStyle,
}

impl HashedCredentialsMatcher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            iterations: 1,
            encoding: StoredEncoding::Hex,
            salt_style: SaltStyle::None,
        }
    }

    pub fn sha256() -> Self {
        Self::new(HashAlgorithm::Sha256)
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn with_encoding(mut self, encoding: StoredEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_salt_style(mut self, salt_style: SaltStyle) -> Self {
        self.salt_style = salt_style;
        self
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn encoding(&self) -> StoredEncoding {
        self.encoding
    }

    pub fn salt_style(&self) -> SaltStyle {
        self.salt_style
    }

    /// Produce stored credential material for `password` in this matcher's
    /// format. The `account` style requires a salt; `crypt` embeds it.
    pub fn hash_password(
        &self,
        password: &[u8],
        salt: Option<&[u8]>,
    ) -> Result<String, CredentialsError> {
        match self.salt_style {
            SaltStyle::None => Ok(self
                .encoding
                .encode(&self.algorithm.hash(None, password, self.iterations))),
            SaltStyle::Account => {
                let salt = salt.ok_or(CredentialsError::MissingSalt)?;
                Ok(self
                    .encoding
                    .encode(&self.algorithm.hash(Some(salt), password, self.iterations)))
            }
            SaltStyle::Crypt => {
                let salt = salt.unwrap_or_default();
                let digest = self.algorithm.hash(Some(salt), password, self.iterations);
                Ok(format!(
                    "${}${}${}${}",
                    self.algorithm.name(),
                    self.iterations,
                    STANDARD.encode(salt),
                    STANDARD.encode(digest)
                ))
            }
        }
    }

    fn stored_text(credentials: &Credentials) -> Result<&str, CredentialsError> {
        match credentials {
            Credentials::Text(s) => Ok(s),
            Credentials::Bytes(b) => std::str::from_utf8(b).map_err(|e| CredentialsError::Decode {
                encoding: "utf-8",
                message: e.to_string(),
            }),
        }
    }

    fn stored_digest(&self, credentials: &Credentials) -> Result<Vec<u8>, CredentialsError> {
        match credentials {
            Credentials::Text(s) => self.encoding.decode(s),
            Credentials::Bytes(b) => Ok(b.clone()),
        }
    }
}

impl Default for HashedCredentialsMatcher {
    fn default() -> Self {
        Self::sha256()
    }
}

impl CredentialsMatcher for HashedCredentialsMatcher {
    fn matches(
        &self,
        token: &AuthenticationToken,
        info: &AuthenticationInfo,
    ) -> Result<bool, CredentialsError> {
        let submitted = token.credentials();
        let (computed, expected) = match self.salt_style {
            SaltStyle::None => (
                self.algorithm.hash(None, submitted, self.iterations),
                self.stored_digest(info.credentials())?,
            ),
            SaltStyle::Account => {
                let salt = info
                    .credentials_salt()
                    .ok_or(CredentialsError::MissingSalt)?;
                (
                    self.algorithm.hash(Some(salt), submitted, self.iterations),
                    self.stored_digest(info.credentials())?,
                )
            }
            SaltStyle::Crypt => {
                let crypt: CryptCredential = Self::stored_text(info.credentials())?.parse()?;
                (
                    crypt
                        .algorithm
                        .hash(Some(&crypt.salt), submitted, crypt.iterations),
                    crypt.hash,
                )
            }
        };

        Ok(computed.ct_eq(&expected).into())
    }
}

/// Random salt bytes for new credentials.
pub fn generate_salt(len: usize) -> Vec<u8> {
    let mut salt = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const SECRET_SHA256_HEX: &str =
        "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b";
    const SECRET_SHA256_TWICE_HEX: &str =
        "3881219d087dd9c634373fd33dfa33a2cb6bfc6c520b64b8bb60ef2ceb534ae7";
    const PEPPER_SECRET_SHA256_HEX: &str =
        "744a9101f7182a6ae0d978121ff74e33cac8d2832579c0637c1c37e9bbb6c065";
    const SECRET_SHA512_B64: &str =
        "vSsar3708Jvp9Szi2NWZZ02Bqp1qRCFpbcTZPdBhnWgs5WtNZKnvCXdhztmeD2cmW192CF5bDufKRpayrW/isg==";
    const SECRET_SHA384_HEX: &str = concat!(
        "58a775ba4112be3005ae4407ce757d88fda71d40",
        "497bb8026ecac54d4e3ffc7232ce8de3ab5acb30ae39760fee7c53ed"
    );
    const SECRET_CRYPT: &str = "$sha-256$3$TmFDbA==$8hdKlxwU8xNH03r01gMLyZKgxfyhA0ZOeehZJ+EwypQ=";

    fn token(password: &str) -> AuthenticationToken {
        AuthenticationToken::username_password("jsmith", password)
    }

    fn account(stored: &str) -> AuthenticationInfo {
        AuthenticationInfo::new("test", "jsmith", stored)
    }

    #[test]
    fn test_simple_matcher() {
        let matcher = SimpleCredentialsMatcher;
        assert!(matcher.matches(&token("secret"), &account("secret")).unwrap());
        assert!(!matcher.matches(&token("Secret"), &account("secret")).unwrap());
        assert!(!matcher.matches(&token("secret!"), &account("secret")).unwrap());
    }

    #[test]
    fn test_allow_all_matcher() {
        assert!(
            AllowAllCredentialsMatcher
                .matches(&token("anything"), &account("else"))
                .unwrap()
        );
    }

    #[rstest]
    #[case(HashAlgorithm::Sha256, 1, StoredEncoding::Hex, SECRET_SHA256_HEX)]
    #[case(HashAlgorithm::Sha256, 2, StoredEncoding::Hex, SECRET_SHA256_TWICE_HEX)]
    #[case(HashAlgorithm::Sha384, 1, StoredEncoding::Hex, SECRET_SHA384_HEX)]
    #[case(HashAlgorithm::Sha512, 1, StoredEncoding::Base64, SECRET_SHA512_B64)]
    fn test_hashed_matcher_known_vectors(
        #[case] algorithm: HashAlgorithm,
        #[case] iterations: u32,
        #[case] encoding: StoredEncoding,
        #[case] stored: &str,
    ) {
        let matcher = HashedCredentialsMatcher::new(algorithm)
            .with_iterations(iterations)
            .with_encoding(encoding);
        assert!(matcher.matches(&token("secret"), &account(stored)).unwrap());
        assert!(!matcher.matches(&token("wrong"), &account(stored)).unwrap());
        assert_eq!(matcher.hash_password(b"secret", None).unwrap(), stored);
    }

    #[test]
    fn test_hashed_matcher_accepts_uppercase_hex() {
        let matcher = HashedCredentialsMatcher::sha256();
        let stored = SECRET_SHA256_HEX.to_uppercase();
        assert!(matcher.matches(&token("secret"), &account(&stored)).unwrap());
    }

    #[test]
    fn test_account_salt_style() {
        let matcher = HashedCredentialsMatcher::sha256().with_salt_style(SaltStyle::Account);
        let salted = account(PEPPER_SECRET_SHA256_HEX).with_salt(b"pepper".to_vec());
        assert!(matcher.matches(&token("secret"), &salted).unwrap());
        assert!(!matcher.matches(&token("pepper"), &salted).unwrap());

        let unsalted = account(PEPPER_SECRET_SHA256_HEX);
        assert_eq!(
            matcher.matches(&token("secret"), &unsalted),
            Err(CredentialsError::MissingSalt)
        );
    }

    #[test]
    fn test_crypt_salt_style() {
        let matcher = HashedCredentialsMatcher::sha256().with_salt_style(SaltStyle::Crypt);
        assert!(
            matcher
                .matches(&token("secret"), &account(SECRET_CRYPT))
                .unwrap()
        );
        assert!(!matcher.matches(&token("nope"), &account(SECRET_CRYPT)).unwrap());

        let produced = matcher
            .clone()
            .with_iterations(3)
            .hash_password(b"secret", Some(b"NaCl"))
            .unwrap();
        assert_eq!(produced, SECRET_CRYPT);
    }

    #[test]
    fn test_crypt_carries_its_own_algorithm() {
        // The matcher is configured for sha-512, the stored string says sha-256.
        let matcher = HashedCredentialsMatcher::new(HashAlgorithm::Sha512)
            .with_salt_style(SaltStyle::Crypt);
        assert!(
            matcher
                .matches(&token("secret"), &account(SECRET_CRYPT))
                .unwrap()
        );
    }

    #[rstest]
    #[case("not-hex!")]
    #[case("abc")]
    fn test_undecodable_hex_is_format_error(#[case] stored: &str) {
        let matcher = HashedCredentialsMatcher::sha256();
        let err = matcher
            .matches(&token("secret"), &account(stored))
            .unwrap_err();
        assert!(matches!(err, CredentialsError::Decode { encoding: "hex", .. }));
    }

    #[rstest]
    #[case("sha-256$1$AA==$AA==")]
    #[case("$sha-256$1$AA==")]
    #[case("$sha-256$0$AA==$AA==")]
    #[case("$sha-256$x$AA==$AA==")]
    #[case("$sha-256$1$AA==$")]
    #[case("$sha-256$1$AA==$AA==$extra")]
    fn test_malformed_crypt(#[case] stored: &str) {
        let matcher = HashedCredentialsMatcher::sha256().with_salt_style(SaltStyle::Crypt);
        let err = matcher
            .matches(&token("secret"), &account(stored))
            .unwrap_err();
        assert!(matches!(err, CredentialsError::MalformedCrypt(_)));
    }

    #[test]
    fn test_crypt_unknown_algorithm() {
        let matcher = HashedCredentialsMatcher::sha256().with_salt_style(SaltStyle::Crypt);
        let err = matcher
            .matches(&token("secret"), &account("$md5$1$AA==$AA=="))
            .unwrap_err();
        assert_eq!(err, CredentialsError::UnsupportedAlgorithm("md5".into()));
    }

    #[test]
    fn test_raw_byte_credentials_compare_as_digest() {
        let matcher = HashedCredentialsMatcher::sha256();
        let digest = hex::decode(SECRET_SHA256_HEX).unwrap();
        let info = AuthenticationInfo::new("test", "jsmith", digest);
        assert!(matcher.matches(&token("secret"), &info).unwrap());
    }

    #[test]
    fn test_hash_algorithm_parse() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }

    #[test]
    fn test_generate_salt() {
        let a = generate_salt(DEFAULT_SALT_LEN);
        let b = generate_salt(DEFAULT_SALT_LEN);
        assert_eq!(a.len(), DEFAULT_SALT_LEN);
        assert_ne!(a, b);
    }

    /// Mismatch timing must not depend on where the first differing byte is.
    /// Statistical, so not run by default.
    #[test]
    #[ignore]
    fn test_mismatch_timing_is_position_independent() {
        use std::time::Instant;

        let matcher = HashedCredentialsMatcher::sha256();
        let info = account(SECRET_SHA256_HEX);
        let mut digests = Vec::new();
        for candidate in ["aecret", "secreu"] {
            let start = Instant::now();
            for _ in 0..50_000 {
                let _ = matcher.matches(&token(candidate), &info);
            }
            digests.push(start.elapsed().as_nanos() as f64);
        }
        let ratio = digests[0] / digests[1];
        assert!((0.8..1.25).contains(&ratio), "timing ratio {ratio}");
    }
}
