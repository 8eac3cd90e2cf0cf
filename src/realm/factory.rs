use std::{collections::HashMap, fmt, sync::Arc};

use super::{MemoryAccountSource, MisconfigurationError, RealmSource, SampleAccountSource};
use crate::config::RealmConfig;

/// Builds a realm source from its configuration entry.
pub type SourceConstructor =
    dyn Fn(&RealmConfig) -> Result<Arc<dyn RealmSource>, MisconfigurationError> + Send + Sync;

/// Maps configured realm types to source constructors.
///
/// `sample` and `memory` are registered by default; applications register
/// their own types before building the security manager.
pub struct RealmFactory {
    constructors: HashMap<String, Box<SourceConstructor>>,
}

impl RealmFactory {
    /// A factory with no realm types.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F)
    where
        F: Fn(&RealmConfig) -> Result<Arc<dyn RealmSource>, MisconfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(kind.into(), Box::new(constructor));
    }

    pub fn with<F>(mut self, kind: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&RealmConfig) -> Result<Arc<dyn RealmSource>, MisconfigurationError>
            + Send
            + Sync
            + 'static,
    {
        self.register(kind, constructor);
        self
    }

    pub fn supports(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn build_source(
        &self,
        config: &RealmConfig,
    ) -> Result<Arc<dyn RealmSource>, MisconfigurationError> {
        let constructor = self.constructors.get(&config.kind).ok_or_else(|| {
            MisconfigurationError::UnknownRealmType {
                realm: config.name.clone(),
                kind: config.kind.clone(),
            }
        })?;
        constructor(config)
    }
}

impl Default for RealmFactory {
    fn default() -> Self {
        Self::empty()
            .with("sample", |_| Ok(Arc::new(SampleAccountSource) as Arc<dyn RealmSource>))
            .with("memory", |config| {
                Ok(Arc::new(MemoryAccountSource::from_config(&config.accounts))
                    as Arc<dyn RealmSource>)
            })
    }
}

impl fmt::Debug for RealmFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.constructors.keys().collect();
        kinds.sort();
        f.debug_struct("RealmFactory").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: &str) -> RealmConfig {
        toml::from_str(&format!("name = \"r\"\ntype = \"{kind}\"")).unwrap()
    }

    #[test]
    fn test_builtin_types() {
        let factory = RealmFactory::default();
        assert!(factory.supports("sample"));
        assert!(factory.supports("memory"));
        assert!(factory.build_source(&config("sample")).is_ok());
        assert!(factory.build_source(&config("memory")).is_ok());
    }

    #[test]
    fn test_unknown_type() {
        let err = RealmFactory::default()
            .build_source(&config("ldap"))
            .err()
            .unwrap();
        assert_eq!(
            err,
            MisconfigurationError::UnknownRealmType {
                realm: "r".into(),
                kind: "ldap".into()
            }
        );
    }

    #[test]
    fn test_custom_type_can_reject_options() {
        let factory = RealmFactory::empty().with("custom", |config| {
            if !config.options.contains_key("url") {
                return Err(MisconfigurationError::InvalidRealm {
                    realm: config.name.clone(),
                    message: "options.url is required".into(),
                });
            }
            Ok(Arc::new(SampleAccountSource) as Arc<dyn RealmSource>)
        });
        assert!(matches!(
            factory.build_source(&config("custom")),
            Err(MisconfigurationError::InvalidRealm { .. })
        ));
    }
}
