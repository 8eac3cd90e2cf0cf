use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    AuthenticationInfo, AuthenticationToken, PrincipalCollection,
    error::{AuthenticationFailed, FailureKind},
};
use crate::{
    observability::metrics,
    realm::{MisconfigurationError, Realm, ensure_unique_names},
};

/// How the results of several realms combine into one login outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationStrategy {
    /// Stop at the first realm that authenticates the token.
    FirstSuccessful,
    /// Consult every supporting realm; succeed if any did.
    #[default]
    AtLeastOneSuccessful,
    /// Every supporting realm must authenticate the token.
    AllSuccessful,
}

impl AuthenticationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSuccessful => "first_successful",
            Self::AtLeastOneSuccessful => "at_least_one_successful",
            Self::AllSuccessful => "all_successful",
        }
    }
}

/// Runs a login token through the configured realms.
///
/// For each supporting realm, in order: look the account up once, run the
/// realm's credentials matcher once, then check the account flags. Each
/// successful realm contributes only the principals it tagged with its own
/// name.
pub struct ModularRealmAuthenticator {
    realms: Vec<Arc<dyn Realm>>,
    strategy: AuthenticationStrategy,
}

impl ModularRealmAuthenticator {
    pub fn new(
        realms: Vec<Arc<dyn Realm>>,
        strategy: AuthenticationStrategy,
    ) -> Result<Self, MisconfigurationError> {
        ensure_unique_names(&realms)?;
        Ok(Self { realms, strategy })
    }

    pub fn strategy(&self) -> AuthenticationStrategy {
        self.strategy
    }

    pub fn realms(&self) -> &[Arc<dyn Realm>] {
        &self.realms
    }

    /// Authenticate `token`, returning the principals of every realm that
    /// accepted it.
    #[tracing::instrument(
        name = "authenticate",
        skip_all,
        fields(token_kind = %token.kind(), strategy = self.strategy.as_str())
    )]
    pub async fn authenticate(
        &self,
        token: &AuthenticationToken,
    ) -> Result<PrincipalCollection, AuthenticationFailed> {
        match self.do_authenticate(token).await {
            Ok(principals) => {
                tracing::info!(
                    principals = principals.len(),
                    realms = ?principals.realm_names(),
                    "Authentication succeeded"
                );
                metrics::record_authentication("success", None);
                Ok(principals)
            }
            Err(kind) => {
                match kind {
                    FailureKind::CredentialsFormat | FailureKind::AuthenticationStore => {
                        tracing::error!(kind = %kind, "Authentication failed")
                    }
                    _ => tracing::warn!(kind = %kind, "Authentication failed"),
                }
                metrics::record_authentication("failure", Some(kind.as_str()));
                Err(AuthenticationFailed::new(kind))
            }
        }
    }

    async fn do_authenticate(
        &self,
        token: &AuthenticationToken,
    ) -> Result<PrincipalCollection, FailureKind> {
        let supporting: Vec<&Arc<dyn Realm>> =
            self.realms.iter().filter(|r| r.supports(token)).collect();
        if supporting.is_empty() {
            return Err(FailureKind::UnsupportedToken);
        }

        let mut principals = PrincipalCollection::new();
        let mut failures = Vec::new();

        for realm in supporting {
            match attempt(realm.as_ref(), token).await {
                Ok(info) => {
                    principals.merge_realm(realm.name(), info.principals());
                    if self.strategy == AuthenticationStrategy::FirstSuccessful {
                        break;
                    }
                }
                Err(kind) => {
                    if self.strategy == AuthenticationStrategy::AllSuccessful {
                        return Err(kind);
                    }
                    failures.push(kind);
                }
            }
        }

        if principals.is_empty() {
            // Most severe kind wins
            return Err(failures
                .into_iter()
                .max()
                .unwrap_or(FailureKind::UnknownAccount));
        }
        Ok(principals)
    }
}

/// One realm's verdict on a token.
async fn attempt(
    realm: &dyn Realm,
    token: &AuthenticationToken,
) -> Result<AuthenticationInfo, FailureKind> {
    let realm_name = realm.name();

    let info = match realm.get_authentication_info(token).await {
        Ok(Some(info)) => info,
        Ok(None) => {
            tracing::debug!(realm = realm_name, "No account for token");
            return Err(FailureKind::UnknownAccount);
        }
        Err(e) => {
            tracing::error!(realm = realm_name, error = %e, "Account lookup failed");
            return Err(FailureKind::AuthenticationStore);
        }
    };

    match realm.credentials_matcher().matches(token, &info) {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(realm = realm_name, "Credentials did not match");
            return Err(FailureKind::IncorrectCredentials);
        }
        Err(e) => {
            tracing::error!(realm = realm_name, error = %e, "Stored credentials unusable");
            return Err(FailureKind::CredentialsFormat);
        }
    }

    if info.is_locked() {
        return Err(FailureKind::LockedAccount);
    }
    if info.is_credentials_expired() {
        return Err(FailureKind::ExpiredCredentials);
    }

    if info.principals().from_realm(realm_name).is_empty() {
        tracing::warn!(
            realm = realm_name,
            "Realm returned an account without principals of its own"
        );
        return Err(FailureKind::UnknownAccount);
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::{
        auth::{
            Credentials, CredentialsError, CredentialsMatcher, HashedCredentialsMatcher, Principal,
            SimpleCredentialsMatcher,
        },
        authz::AuthorizationInfo,
        realm::{
            AuthorizingRealm, RealmError, RealmSource, SAMPLE_PASSWORD_SHA256,
            SampleAccountSource,
        },
    };

    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Ok,
        Unknown,
        Store,
        Locked,
        Expired,
    }

    /// Source with scripted outcomes that counts lookups.
    struct ScriptedSource {
        outcome: Outcome,
        lookups: AtomicUsize,
        foreign_principal: bool,
    }

    impl ScriptedSource {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                lookups: AtomicUsize::new(0),
                foreign_principal: false,
            })
        }
    }

    #[async_trait]
    impl RealmSource for ScriptedSource {
        async fn authentication_info(
            &self,
            realm: &str,
            token: &AuthenticationToken,
        ) -> Result<Option<AuthenticationInfo>, RealmError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let Some(username) = token.username() else {
                return Ok(None);
            };
            let info = AuthenticationInfo::new(realm, username, "pw");
            let info = if self.foreign_principal {
                info.with_principal("intruder", "root")
            } else {
                info
            };
            match self.outcome {
                Outcome::Ok => Ok(Some(info)),
                Outcome::Unknown => Ok(None),
                Outcome::Store => Err(RealmError::store("connection reset")),
                Outcome::Locked => Ok(Some(info.with_locked(true))),
                Outcome::Expired => Ok(Some(info.with_credentials_expired(true))),
            }
        }

        async fn authorization_info(
            &self,
            _realm: &str,
            _principals: &PrincipalCollection,
        ) -> Result<AuthorizationInfo, RealmError> {
            Ok(AuthorizationInfo::default())
        }
    }

    /// Matcher that counts invocations and fails on stored `"garbage"`.
    #[derive(Debug, Default)]
    struct CountingMatcher {
        calls: AtomicUsize,
    }

    impl CredentialsMatcher for CountingMatcher {
        fn matches(
            &self,
            token: &AuthenticationToken,
            info: &AuthenticationInfo,
        ) -> Result<bool, CredentialsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if info.credentials() == &Credentials::text("garbage") {
                return Err(CredentialsError::MalformedCrypt("garbage".into()));
            }
            SimpleCredentialsMatcher.matches(token, info)
        }
    }

    fn realm(name: &str, source: Arc<dyn RealmSource>) -> Arc<dyn Realm> {
        Arc::new(AuthorizingRealm::new(name, source))
    }

    fn sample_realm(name: &str) -> Arc<dyn Realm> {
        Arc::new(
            AuthorizingRealm::new(name, Arc::new(SampleAccountSource))
                .with_credentials_matcher(Arc::new(HashedCredentialsMatcher::sha256())),
        )
    }

    fn login(user: &str, password: &str) -> AuthenticationToken {
        AuthenticationToken::username_password(user, password)
    }

    #[tokio::test]
    async fn test_sample_realm_login() {
        let authenticator = ModularRealmAuthenticator::new(
            vec![sample_realm("myRealm")],
            AuthenticationStrategy::FirstSuccessful,
        )
        .unwrap();

        let principals = authenticator
            .authenticate(&login("jsmith", "secret"))
            .await
            .unwrap();
        assert_eq!(
            principals.from_realm("myRealm"),
            vec![&Principal::from("jsmith")]
        );
        assert_eq!(SAMPLE_PASSWORD_SHA256.len(), 64);
    }

    #[rstest]
    #[case("jsmith", "wrong", FailureKind::IncorrectCredentials)]
    #[case("mallory", "secret", FailureKind::UnknownAccount)]
    #[tokio::test]
    async fn test_sample_realm_failures(
        #[case] user: &str,
        #[case] password: &str,
        #[case] expected: FailureKind,
    ) {
        let authenticator = ModularRealmAuthenticator::new(
            vec![sample_realm("myRealm")],
            AuthenticationStrategy::FirstSuccessful,
        )
        .unwrap();

        let err = authenticator
            .authenticate(&login(user, password))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), expected);
    }

    #[tokio::test]
    async fn test_unsupported_token() {
        let authenticator = ModularRealmAuthenticator::new(
            vec![sample_realm("myRealm")],
            AuthenticationStrategy::AtLeastOneSuccessful,
        )
        .unwrap();
        let err = authenticator
            .authenticate(&AuthenticationToken::bearer("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnsupportedToken);
    }

    #[tokio::test]
    async fn test_lookup_and_matcher_run_once_per_realm() {
        let source = ScriptedSource::new(Outcome::Ok);
        let matcher = Arc::new(CountingMatcher::default());
        let realm: Arc<dyn Realm> = Arc::new(
            AuthorizingRealm::new("only", source.clone()).with_credentials_matcher(matcher.clone()),
        );
        let authenticator =
            ModularRealmAuthenticator::new(vec![realm], AuthenticationStrategy::AllSuccessful)
                .unwrap();

        authenticator.authenticate(&login("u", "pw")).await.unwrap();
        assert_eq!(source.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_successful_stops_early() {
        let first = ScriptedSource::new(Outcome::Ok);
        let second = ScriptedSource::new(Outcome::Ok);
        let authenticator = ModularRealmAuthenticator::new(
            vec![realm("a", first.clone()), realm("b", second.clone())],
            AuthenticationStrategy::FirstSuccessful,
        )
        .unwrap();

        let principals = authenticator.authenticate(&login("u", "pw")).await.unwrap();
        assert_eq!(principals.realm_names(), vec!["a"]);
        assert_eq!(second.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_successful_skips_failing_realm() {
        let authenticator = ModularRealmAuthenticator::new(
            vec![
                realm("a", ScriptedSource::new(Outcome::Unknown)),
                realm("b", ScriptedSource::new(Outcome::Ok)),
            ],
            AuthenticationStrategy::FirstSuccessful,
        )
        .unwrap();

        let principals = authenticator.authenticate(&login("u", "pw")).await.unwrap();
        assert_eq!(principals.realm_names(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_at_least_one_merges_successes() {
        let authenticator = ModularRealmAuthenticator::new(
            vec![
                realm("a", ScriptedSource::new(Outcome::Ok)),
                realm("b", ScriptedSource::new(Outcome::Unknown)),
                realm("c", ScriptedSource::new(Outcome::Ok)),
            ],
            AuthenticationStrategy::AtLeastOneSuccessful,
        )
        .unwrap();

        let principals = authenticator.authenticate(&login("u", "pw")).await.unwrap();
        assert_eq!(principals.realm_names(), vec!["a", "c"]);
        assert_eq!(principals.len(), 2);
    }

    #[tokio::test]
    async fn test_all_successful_fails_on_any_failure() {
        let third = ScriptedSource::new(Outcome::Ok);
        let authenticator = ModularRealmAuthenticator::new(
            vec![
                realm("a", ScriptedSource::new(Outcome::Ok)),
                realm("b", ScriptedSource::new(Outcome::Locked)),
                realm("c", third.clone()),
            ],
            AuthenticationStrategy::AllSuccessful,
        )
        .unwrap();

        let err = authenticator
            .authenticate(&login("u", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::LockedAccount);
        assert_eq!(third.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_most_severe_failure_reported() {
        let authenticator = ModularRealmAuthenticator::new(
            vec![
                realm("a", ScriptedSource::new(Outcome::Unknown)),
                realm("b", ScriptedSource::new(Outcome::Expired)),
                realm("c", ScriptedSource::new(Outcome::Store)),
                realm("d", ScriptedSource::new(Outcome::Locked)),
            ],
            AuthenticationStrategy::AtLeastOneSuccessful,
        )
        .unwrap();

        let err = authenticator
            .authenticate(&login("u", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::AuthenticationStore);
    }

    #[tokio::test]
    async fn test_credentials_format_outranks_everything() {
        struct GarbageSource;

        #[async_trait]
        impl RealmSource for GarbageSource {
            async fn authentication_info(
                &self,
                realm: &str,
                token: &AuthenticationToken,
            ) -> Result<Option<AuthenticationInfo>, RealmError> {
                Ok(token
                    .username()
                    .map(|u| AuthenticationInfo::new(realm, u, "garbage")))
            }

            async fn authorization_info(
                &self,
                _realm: &str,
                _principals: &PrincipalCollection,
            ) -> Result<AuthorizationInfo, RealmError> {
                Ok(AuthorizationInfo::default())
            }
        }

        let garbage: Arc<dyn Realm> = Arc::new(
            AuthorizingRealm::new("garbage", Arc::new(GarbageSource))
                .with_credentials_matcher(Arc::new(CountingMatcher::default())),
        );
        let authenticator = ModularRealmAuthenticator::new(
            vec![realm("store", ScriptedSource::new(Outcome::Store)), garbage],
            AuthenticationStrategy::AtLeastOneSuccessful,
        )
        .unwrap();

        let err = authenticator
            .authenticate(&login("u", "pw"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialsFormat);
    }

    #[tokio::test]
    async fn test_locked_account_requires_matching_secret() {
        let authenticator = ModularRealmAuthenticator::new(
            vec![realm("a", ScriptedSource::new(Outcome::Locked))],
            AuthenticationStrategy::FirstSuccessful,
        )
        .unwrap();

        let err = authenticator
            .authenticate(&login("u", "not-pw"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::IncorrectCredentials);
    }

    #[tokio::test]
    async fn test_only_own_partition_is_merged() {
        let source = Arc::new(ScriptedSource {
            outcome: Outcome::Ok,
            lookups: AtomicUsize::new(0),
            foreign_principal: true,
        });
        let authenticator = ModularRealmAuthenticator::new(
            vec![realm("a", source)],
            AuthenticationStrategy::FirstSuccessful,
        )
        .unwrap();

        let principals = authenticator.authenticate(&login("u", "pw")).await.unwrap();
        assert_eq!(principals.realm_names(), vec!["a"]);
        assert!(principals.from_realm("intruder").is_empty());
    }

    #[test]
    fn test_duplicate_realm_names_rejected() {
        let result = ModularRealmAuthenticator::new(
            vec![sample_realm("x"), sample_realm("x")],
            AuthenticationStrategy::FirstSuccessful,
        );
        assert!(matches!(
            result,
            Err(MisconfigurationError::DuplicateRealmName(_))
        ));
    }
}
