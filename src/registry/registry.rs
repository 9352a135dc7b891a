use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use strum::IntoEnumIterator;
use thiserror::Error;

use super::default_priority::default_priority;
use crate::media::Operation;
use crate::providers::{providers::ProviderIdentifier, MediaProvider, Model};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The same provider was added twice
    #[error("provider \"{0}\" was registered twice")]
    DuplicateProvider(ProviderIdentifier),
    /// A default model was configured for an operation the provider does not perform
    #[error("provider \"{provider}\" does not perform {operation}, it cannot have a default {operation} model")]
    UnsupportedDefaultModel {
        provider: ProviderIdentifier,
        operation: Operation,
    },
    /// The credential-free provider is absent
    #[error("the fallback provider \"{0}\" is not registered")]
    FallbackMissing(ProviderIdentifier),
    /// More than one provider claims to need no credential
    #[error("exactly one provider may be always available, found {0:?}")]
    AmbiguousFallback(Vec<ProviderIdentifier>),
}

struct ProviderEntry {
    provider: Option<Arc<dyn MediaProvider>>,
    priority: u8,
    default_models: HashMap<Operation, String>,
}

/// The providers that can serve requests, together with their priority and
/// configured default models. Providers which are not added are unavailable.
pub struct Registry {
    providers: HashMap<ProviderIdentifier, ProviderEntry>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut available: Vec<(ProviderIdentifier, u8)> = self
            .providers
            .iter()
            .filter(|(_, entry)| entry.provider.is_some())
            .map(|(id, entry)| (*id, entry.priority))
            .collect();

        available.sort();

        f.debug_map().entries(available).finish()
    }
}

pub struct ProvidedModel {
    pub provider: ProviderIdentifier,
    pub model: Model,
}

impl Registry {
    pub fn new() -> Registry {
        let providers = ProviderIdentifier::iter().map(|id| {
            (
                id,
                ProviderEntry {
                    provider: None,
                    priority: default_priority(id),
                    default_models: HashMap::new(),
                },
            )
        });

        Registry {
            providers: HashMap::from_iter(providers),
        }
    }

    pub fn add_provider(
        &mut self,
        provider: Arc<dyn MediaProvider>,
        priority: Option<u8>,
        default_models: HashMap<Operation, String>,
    ) -> Result<(), Error> {
        let id = provider.id();

        if let Some(operation) = default_models.keys().find(|op| !provider.supports(**op)) {
            return Err(Error::UnsupportedDefaultModel {
                provider: id,
                operation: *operation,
            });
        }

        let entry = self.entry_mut(id);

        if entry.provider.is_some() {
            return Err(Error::DuplicateProvider(id));
        }

        entry.provider.replace(provider);

        if let Some(priority) = priority {
            entry.priority = priority;
        }

        entry.default_models = default_models;

        Ok(())
    }

    fn entry(&self, id: ProviderIdentifier) -> &ProviderEntry {
        // Every identifier is inserted by `new`
        &self.providers[&id]
    }

    fn entry_mut(&mut self, id: ProviderIdentifier) -> &mut ProviderEntry {
        self.providers
            .entry(id)
            .or_insert_with(|| ProviderEntry {
                provider: None,
                priority: default_priority(id),
                default_models: HashMap::new(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.providers.values().all(|ent| ent.provider.is_none())
    }

    pub fn provider(&self, id: ProviderIdentifier) -> Option<&Arc<dyn MediaProvider>> {
        self.entry(id).provider.as_ref()
    }

    pub fn priority(&self, id: ProviderIdentifier) -> u8 {
        self.entry(id).priority
    }

    /// The configured default model for `operation`, falling back to the first
    /// model the provider lists for it.
    pub fn default_model(&self, id: ProviderIdentifier, operation: Operation) -> Option<String> {
        let ProviderEntry {
            provider,
            priority: _,
            default_models,
        } = self.entry(id);

        let provider = provider.as_ref()?;

        match default_models.get(&operation) {
            Some(model) => Some(model.clone()),
            None => provider.default_model(operation).map(|m| m.id.clone()),
        }
    }

    /// Models of every registered provider, including configured defaults
    /// which are not part of the provider's own listing.
    pub fn registered_models(&self) -> Vec<ProvidedModel> {
        let mut models = Vec::new();

        for id in ProviderIdentifier::iter() {
            let ProviderEntry {
                provider,
                priority: _,
                default_models,
            } = self.entry(id);

            let provider = match provider {
                Some(provider) => provider,
                None => continue,
            };

            for model in provider.models() {
                models.push(ProvidedModel {
                    provider: id,
                    model: model.clone(),
                });
            }

            let mut extra: Vec<_> = default_models
                .iter()
                .filter(|(op, model_id)| {
                    !provider
                        .models()
                        .iter()
                        .any(|m| m.operation == **op && &m.id == *model_id)
                })
                .collect();

            extra.sort();

            for (operation, model_id) in extra {
                models.push(ProvidedModel {
                    provider: id,
                    model: Model::new(model_id, *operation),
                });
            }
        }

        models
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::media::CanonicalMediaResult;
    use crate::providers::{Error as ProviderError, GenerationInput};
    use async_trait::async_trait;

    /// A provider which serves the given models and never generates anything.
    pub(crate) struct StaticProvider {
        pub id: ProviderIdentifier,
        pub models: Vec<Model>,
    }

    #[async_trait]
    impl MediaProvider for StaticProvider {
        fn id(&self) -> ProviderIdentifier {
            self.id
        }

        fn models(&self) -> &[Model] {
            &self.models
        }

        async fn generate(
            &self,
            _model: &str,
            _input: &GenerationInput<'_>,
        ) -> Result<CanonicalMediaResult, ProviderError> {
            Err(ProviderError::from_kind(
                crate::providers::ErrorKind::UnspecifiedError,
            ))
        }
    }

    pub(crate) fn static_provider(
        id: ProviderIdentifier,
        models: &[(&str, Operation)],
    ) -> Arc<dyn MediaProvider> {
        Arc::new(StaticProvider {
            id,
            models: models.iter().map(|(m, op)| Model::new(m, *op)).collect(),
        })
    }

    #[test]
    fn test_registry_starts_empty_with_default_priorities() {
        let registry = Registry::new();

        assert!(registry.is_empty());
        assert!(registry.provider(ProviderIdentifier::OpenAI).is_none());
        assert_eq!(registry.priority(ProviderIdentifier::OpenAI), 10);
        assert_eq!(registry.priority(ProviderIdentifier::Pollinations), 250);
    }

    #[test]
    fn test_duplicate_provider_is_rejected() {
        let mut registry = Registry::new();

        let provider = static_provider(ProviderIdentifier::OpenAI, &[("m", Operation::Image)]);

        registry
            .add_provider(provider.clone(), None, HashMap::new())
            .unwrap();

        assert_eq!(
            registry.add_provider(provider, None, HashMap::new()),
            Err(Error::DuplicateProvider(ProviderIdentifier::OpenAI))
        );
    }

    #[test]
    fn test_default_model_override() {
        let mut registry = Registry::new();

        let provider = static_provider(
            ProviderIdentifier::Replicate,
            &[("a/one", Operation::Image), ("a/two", Operation::Image)],
        );

        let defaults = HashMap::from([(Operation::Image, "a/custom".to_string())]);

        registry.add_provider(provider, Some(5), defaults).unwrap();

        assert_eq!(registry.priority(ProviderIdentifier::Replicate), 5);
        assert_eq!(
            registry.default_model(ProviderIdentifier::Replicate, Operation::Image),
            Some("a/custom".to_string())
        );
        assert_eq!(
            registry.default_model(ProviderIdentifier::Replicate, Operation::Video),
            None
        );

        let ids: Vec<_> = registry
            .registered_models()
            .into_iter()
            .map(|pm| pm.model.id)
            .collect();

        assert_eq!(ids, vec!["a/one", "a/two", "a/custom"]);
    }

    #[test]
    fn test_default_for_unsupported_operation_is_rejected() {
        let mut registry = Registry::new();

        let provider = static_provider(ProviderIdentifier::OpenAI, &[("m", Operation::Image)]);

        let defaults = HashMap::from([(Operation::Video, "v".to_string())]);

        assert_eq!(
            registry.add_provider(provider, None, defaults),
            Err(Error::UnsupportedDefaultModel {
                provider: ProviderIdentifier::OpenAI,
                operation: Operation::Video
            })
        );
    }
}
