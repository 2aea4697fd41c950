//! Name -> factory registry for processing strategies.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::error::RegistryError;
use crate::strategy::ProcessingStrategy;

/// Builds a strategy instance wired with the given collaborators.
pub type StrategyFactory =
    Arc<dyn Fn(Collaborators) -> Arc<dyn ProcessingStrategy> + Send + Sync>;

/// Maps strategy names to factories.
///
/// Every name resolves through the same factory call; nothing is special-cased,
/// so adding a strategy never touches this type.
pub struct StrategyRegistry {
    collaborators: Collaborators,
    bindings: RwLock<HashMap<String, StrategyFactory>>,
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("collaborators", &self.collaborators)
            .field("names", &self.list_names())
            .finish()
    }
}

impl StrategyRegistry {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Register a factory under `name`. A later registration with the same
    /// name replaces the earlier one.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(Collaborators) -> Arc<dyn ProcessingStrategy> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        if bindings.insert(name.clone(), Arc::new(factory)).is_some() {
            info!(strategy = %name, "replaced strategy registration");
        } else {
            debug!(strategy = %name, "registered strategy");
        }
    }

    /// Build a fresh strategy instance for `name`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProcessingStrategy>, RegistryError> {
        let factory = {
            let bindings = self.bindings.read().unwrap_or_else(PoisonError::into_inner);
            bindings
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownStrategy(name.to_string()))?
        };
        Ok(factory(self.collaborators.clone()))
    }

    pub fn list_names(&self) -> BTreeSet<String> {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrategyError;
    use crate::strategy::StrategyInput;
    use async_trait::async_trait;
    use collage_job_queue::ArtifactRef;

    struct Named(&'static str);

    #[async_trait]
    impl ProcessingStrategy for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self, _input: &StrategyInput) -> Result<ArtifactRef, StrategyError> {
            Ok(ArtifactRef::new(self.0, 0))
        }
    }

    fn registry() -> StrategyRegistry {
        let dir = std::env::temp_dir();
        StrategyRegistry::new(Collaborators::local(&dir, &dir))
    }

    #[test]
    fn resolves_registered_names() {
        let registry = registry();
        registry.register("fast", |_| Arc::new(Named("fast")));
        registry.register("thorough", |_| Arc::new(Named("thorough")));

        assert_eq!(registry.resolve("fast").unwrap().name(), "fast");
        assert_eq!(
            registry.list_names().into_iter().collect::<Vec<_>>(),
            vec!["fast".to_string(), "thorough".to_string()]
        );
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = registry();
        let err = registry.resolve("sepia").err().expect("should fail");
        assert!(matches!(err, RegistryError::UnknownStrategy(name) if name == "sepia"));
    }

    #[test]
    fn last_registration_wins() {
        let registry = registry();
        registry.register("fast", |_| Arc::new(Named("first")));
        registry.register("fast", |_| Arc::new(Named("second")));
        assert_eq!(registry.resolve("fast").unwrap().name(), "second");
        assert_eq!(registry.list_names().len(), 1);
    }

    #[test]
    fn factory_receives_registry_collaborators() {
        let registry = registry();
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = seen.clone();
        registry.register("counting", move |collaborators| {
            let _ = collaborators.storage.resolve_destination_path("o", "i");
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Arc::new(Named("counting"))
        });

        registry.resolve("counting").unwrap();
        registry.resolve("counting").unwrap();
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
