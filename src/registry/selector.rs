use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strum::IntoEnumIterator;
use thiserror::Error;

use super::registry::{Error, ProvidedModel, Registry};
use crate::media::{Operation, ProviderChoice, ValidationError};
use crate::providers::{providers::ProviderIdentifier, MediaProvider};

/// A row of the provider table the selector decides from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub id: ProviderIdentifier,
    /// Whether the provider was activated. Derived once at startup from the
    /// presence of a credential.
    pub is_available: bool,
    /// Lower values are preferred
    pub priority: u8,
    /// Set only for the provider which needs no credential
    pub always_available: bool,
    /// Empty for unavailable providers
    pub operations: Vec<Operation>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectionError {
    #[error("provider \"{0}\" is not available, its credential is not configured")]
    ProviderUnavailable(ProviderIdentifier),
    #[error("none of the available providers perform {0}")]
    NoProviderFor(Operation),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// The provider and model chosen for a request.
#[derive(Clone)]
pub struct Selection {
    pub provider: Arc<dyn MediaProvider>,
    pub model: String,
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("provider", &self.provider.id())
            .field("model", &self.model)
            .finish()
    }
}

impl Selection {
    pub fn provider_id(&self) -> ProviderIdentifier {
        self.provider.id()
    }
}

/// Returns the single always-available provider of a table.
pub(crate) fn check_descriptors(
    descriptors: &[ProviderDescriptor],
) -> Result<ProviderIdentifier, Error> {
    let fallbacks: Vec<_> = descriptors
        .iter()
        .filter(|d| d.always_available)
        .collect();

    match fallbacks.as_slice() {
        [fallback] if fallback.is_available => Ok(fallback.id),
        [fallback] => Err(Error::FallbackMissing(fallback.id)),
        [] => Err(Error::AmbiguousFallback(Vec::new())),
        many => Err(Error::AmbiguousFallback(many.iter().map(|d| d.id).collect())),
    }
}

/// Chooses providers and models for requests. Built once from a populated
/// [`Registry`] and read-only afterwards, so selection never touches the
/// network.
pub struct Selector {
    registry: Registry,
    /// Sorted by ascending priority, ties broken by identifier
    descriptors: Vec<ProviderDescriptor>,
    /// The preferred available provider of each (operation, model) pair
    models: HashMap<(Operation, String), ProviderIdentifier>,
    fallback: ProviderIdentifier,
}

impl Selector {
    pub fn new(registry: Registry) -> Result<Selector, Error> {
        let mut descriptors: Vec<ProviderDescriptor> = ProviderIdentifier::iter()
            .map(|id| {
                let provider = registry.provider(id);

                let operations = match provider {
                    Some(provider) => Operation::iter().filter(|op| provider.supports(*op)).collect(),
                    None => Vec::new(),
                };

                ProviderDescriptor {
                    id,
                    is_available: provider.is_some(),
                    priority: registry.priority(id),
                    always_available: id.always_available(),
                    operations,
                }
            })
            .collect();

        descriptors.sort_by_key(|d| (d.priority, d.id));

        let fallback = check_descriptors(&descriptors)?;

        let mut models = HashMap::new();

        // Registered models arrive in identifier order, keep the better priority
        for ProvidedModel { provider: id, model } in registry.registered_models() {
            let key = (model.operation, model.id);

            let shadowed = match models.get(&key) {
                Some(alt_id) => (registry.priority(*alt_id), *alt_id) <= (registry.priority(id), id),
                None => false,
            };

            if !shadowed {
                models.insert(key, id);
            }
        }

        Ok(Selector {
            registry,
            descriptors,
            models,
            fallback,
        })
    }

    /// The provider table in selection order.
    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, id: ProviderIdentifier) -> Option<&ProviderDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// Picks the provider for `operation`.
    ///
    /// An explicit choice is honored or fails. `Auto` takes the preferred
    /// available provider performing the operation and otherwise returns the
    /// fallback, so it never fails.
    pub fn select(
        &self,
        choice: ProviderChoice,
        operation: Operation,
    ) -> Result<&ProviderDescriptor, SelectionError> {
        match choice {
            ProviderChoice::Explicit(id) => {
                let descriptor = self
                    .descriptor(id)
                    .filter(|d| d.is_available)
                    .ok_or(SelectionError::ProviderUnavailable(id))?;

                if !descriptor.operations.contains(&operation) {
                    return Err(ValidationError::UnsupportedOperation {
                        provider: id,
                        operation,
                    }
                    .into());
                }

                Ok(descriptor)
            }
            ProviderChoice::Auto => {
                let preferred = self
                    .descriptors
                    .iter()
                    .find(|d| d.is_available && d.operations.contains(&operation));

                match preferred {
                    Some(descriptor) => Ok(descriptor),
                    None => self
                        .descriptor(self.fallback)
                        .ok_or(SelectionError::ProviderUnavailable(self.fallback)),
                }
            }
        }
    }

    /// Picks the provider and model for a request.
    ///
    /// With `Auto` and a model hint, the hint decides the provider. An explicit
    /// provider accepts any hint, including models it does not list.
    pub fn resolve(
        &self,
        choice: ProviderChoice,
        operation: Operation,
        model_hint: Option<&str>,
    ) -> Result<Selection, SelectionError> {
        let (id, model) = match (choice, model_hint) {
            (ProviderChoice::Auto, Some(hint)) => {
                let id = self
                    .models
                    .get(&(operation, hint.to_string()))
                    .ok_or_else(|| ValidationError::UnknownModel {
                        model: hint.to_string(),
                        operation,
                    })?;

                (*id, hint.to_string())
            }
            (choice, hint) => {
                let descriptor = self.select(choice, operation)?;

                let model = match hint {
                    Some(hint) => hint.to_string(),
                    None => self
                        .registry
                        .default_model(descriptor.id, operation)
                        .ok_or(SelectionError::NoProviderFor(operation))?,
                };

                (descriptor.id, model)
            }
        };

        let provider = self
            .registry
            .provider(id)
            .ok_or(SelectionError::ProviderUnavailable(id))?
            .clone();

        Ok(Selection { provider, model })
    }

    /// Models of the available providers, best priority first.
    pub fn available_models(&self) -> Vec<ProvidedModel> {
        let mut models = self.registry.registered_models();

        models.sort_by_key(|pm| (self.registry.priority(pm.provider), pm.provider));

        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::registry::tests::static_provider;

    fn fallback() -> Arc<dyn MediaProvider> {
        static_provider(
            ProviderIdentifier::Pollinations,
            &[("flux", Operation::Image), ("turbo", Operation::Image)],
        )
    }

    fn selector_with(providers: Vec<(Arc<dyn MediaProvider>, Option<u8>)>) -> Selector {
        let mut registry = Registry::new();

        for (provider, priority) in providers {
            registry
                .add_provider(provider, priority, HashMap::new())
                .unwrap();
        }

        Selector::new(registry).unwrap()
    }

    fn openai() -> Arc<dyn MediaProvider> {
        static_provider(
            ProviderIdentifier::OpenAI,
            &[("dall-e-3", Operation::Image), ("gpt-image-1", Operation::Image)],
        )
    }

    fn replicate() -> Arc<dyn MediaProvider> {
        static_provider(
            ProviderIdentifier::Replicate,
            &[
                ("black-forest-labs/flux-schnell", Operation::Image),
                ("minimax/video-01", Operation::Video),
                ("shared", Operation::Image),
            ],
        )
    }

    #[test]
    fn test_auto_without_credentials_returns_fallback() {
        let selector = selector_with(vec![(fallback(), None)]);

        let descriptor = selector.select(ProviderChoice::Auto, Operation::Image).unwrap();

        assert_eq!(descriptor.id, ProviderIdentifier::Pollinations);
        assert!(descriptor.always_available);

        // Total even for operations the fallback cannot perform
        let descriptor = selector.select(ProviderChoice::Auto, Operation::Video).unwrap();
        assert_eq!(descriptor.id, ProviderIdentifier::Pollinations);
    }

    #[test]
    fn test_auto_prefers_lowest_priority_value() {
        let selector = selector_with(vec![(fallback(), None), (openai(), None), (replicate(), None)]);

        let image = selector.select(ProviderChoice::Auto, Operation::Image).unwrap();
        assert_eq!(image.id, ProviderIdentifier::OpenAI);

        let video = selector.select(ProviderChoice::Auto, Operation::Video).unwrap();
        assert_eq!(video.id, ProviderIdentifier::Replicate);

        let selector = selector_with(vec![(fallback(), None), (openai(), None), (replicate(), Some(1))]);

        let image = selector.select(ProviderChoice::Auto, Operation::Image).unwrap();
        assert_eq!(image.id, ProviderIdentifier::Replicate);
    }

    #[test]
    fn test_priority_ties_break_by_identifier() {
        let selector = selector_with(vec![
            (fallback(), None),
            (replicate(), Some(7)),
            (openai(), Some(7)),
        ]);

        let image = selector.select(ProviderChoice::Auto, Operation::Image).unwrap();
        assert_eq!(image.id, ProviderIdentifier::OpenAI);
    }

    #[test]
    fn test_explicit_unavailable_provider() {
        let selector = selector_with(vec![(fallback(), None)]);

        assert_eq!(
            selector
                .select(ProviderChoice::Explicit(ProviderIdentifier::OpenAI), Operation::Image)
                .unwrap_err(),
            SelectionError::ProviderUnavailable(ProviderIdentifier::OpenAI)
        );
    }

    #[test]
    fn test_explicit_provider_without_operation_is_invalid() {
        let selector = selector_with(vec![(fallback(), None), (openai(), None)]);

        assert_eq!(
            selector
                .select(ProviderChoice::Explicit(ProviderIdentifier::OpenAI), Operation::Video)
                .unwrap_err(),
            SelectionError::Invalid(ValidationError::UnsupportedOperation {
                provider: ProviderIdentifier::OpenAI,
                operation: Operation::Video
            })
        );
    }

    #[test]
    fn test_resolve_default_model() {
        let selector = selector_with(vec![(fallback(), None), (replicate(), None)]);

        let selection = selector.resolve(ProviderChoice::Auto, Operation::Video, None).unwrap();

        assert_eq!(selection.provider_id(), ProviderIdentifier::Replicate);
        assert_eq!(selection.model, "minimax/video-01");
    }

    #[test]
    fn test_resolve_model_hint_picks_provider() {
        let selector = selector_with(vec![(fallback(), None), (openai(), None), (replicate(), None)]);

        let selection = selector
            .resolve(ProviderChoice::Auto, Operation::Image, Some("black-forest-labs/flux-schnell"))
            .unwrap();

        assert_eq!(selection.provider_id(), ProviderIdentifier::Replicate);

        let err = selector
            .resolve(ProviderChoice::Auto, Operation::Image, Some("midjourney"))
            .unwrap_err();

        assert!(matches!(
            err,
            SelectionError::Invalid(ValidationError::UnknownModel { .. })
        ));

        // A listed model requested for the wrong operation is unknown as well
        let err = selector
            .resolve(ProviderChoice::Auto, Operation::Video, Some("dall-e-3"))
            .unwrap_err();

        assert!(matches!(
            err,
            SelectionError::Invalid(ValidationError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_shared_model_resolves_to_preferred_provider() {
        let shared = static_provider(ProviderIdentifier::HuggingFace, &[("shared", Operation::Image)]);

        let selector = selector_with(vec![(fallback(), None), (shared, Some(1)), (replicate(), None)]);

        let selection = selector
            .resolve(ProviderChoice::Auto, Operation::Image, Some("shared"))
            .unwrap();

        assert_eq!(selection.provider_id(), ProviderIdentifier::HuggingFace);
    }

    #[test]
    fn test_explicit_provider_accepts_unlisted_model() {
        let selector = selector_with(vec![(fallback(), None), (openai(), None)]);

        let selection = selector
            .resolve(
                ProviderChoice::Explicit(ProviderIdentifier::OpenAI),
                Operation::Image,
                Some("dall-e-4"),
            )
            .unwrap();

        assert_eq!(selection.model, "dall-e-4");
    }

    #[test]
    fn test_resolve_when_nothing_performs_operation() {
        let selector = selector_with(vec![(fallback(), None), (openai(), None)]);

        assert_eq!(
            selector
                .resolve(ProviderChoice::Auto, Operation::Video, None)
                .err(),
            Some(SelectionError::NoProviderFor(Operation::Video))
        );
    }

    #[test]
    fn test_missing_fallback_is_rejected() {
        let mut registry = Registry::new();

        registry.add_provider(openai(), None, HashMap::new()).unwrap();

        assert!(matches!(
            Selector::new(registry),
            Err(Error::FallbackMissing(ProviderIdentifier::Pollinations))
        ));
    }

    #[test]
    fn test_table_with_two_fallbacks_is_rejected() {
        let descriptor = |id, always_available| ProviderDescriptor {
            id,
            is_available: true,
            priority: 1,
            always_available,
            operations: vec![Operation::Image],
        };

        let table = vec![
            descriptor(ProviderIdentifier::OpenAI, true),
            descriptor(ProviderIdentifier::Pollinations, true),
        ];

        assert_eq!(
            check_descriptors(&table),
            Err(Error::AmbiguousFallback(vec![
                ProviderIdentifier::OpenAI,
                ProviderIdentifier::Pollinations
            ]))
        );

        let table = vec![
            descriptor(ProviderIdentifier::OpenAI, false),
            descriptor(ProviderIdentifier::Pollinations, true),
        ];

        assert_eq!(check_descriptors(&table), Ok(ProviderIdentifier::Pollinations));
    }
}
