//! Concrete types for providers, along with their identifiers

use serde::{Deserialize, Serialize};
use strum_macros;

/// The `ProviderIdentifier` is a unique per-provider identifier. It is used to
/// differentiate providers at runtime in code which is generic over different
/// providers.
///
/// The `to_string` and `FromStr` are part of the CLI and configuration and
/// should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderIdentifier {
    OpenAI,
    Stability,
    Replicate,
    HuggingFace,
    Pollinations,
}

impl ProviderIdentifier {
    /// The environment variable holding this provider's bearer credential, or
    /// None for providers which need no credential.
    pub fn credential_env_var(self) -> Option<&'static str> {
        match self {
            ProviderIdentifier::OpenAI => Some("OPENAI_API_KEY"),
            ProviderIdentifier::Stability => Some("STABILITY_API_KEY"),
            ProviderIdentifier::Replicate => Some("REPLICATE_API_TOKEN"),
            ProviderIdentifier::HuggingFace => Some("HUGGINGFACE_API_TOKEN"),
            ProviderIdentifier::Pollinations => None,
        }
    }

    /// Whether the provider works without any credential, making it usable as
    /// the selector's provider of last resort.
    pub fn always_available(self) -> bool {
        self.credential_env_var().is_none()
    }
}

pub(crate) use super::huggingface::HuggingFaceProvider;
pub(crate) use super::openai::OpenAIProvider;
pub(crate) use super::pollinations::PollinationsProvider;
pub(crate) use super::replicate::ReplicateProvider;
pub(crate) use super::stability::StabilityProvider;

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_exactly_one_credential_free_provider() {
        let fallbacks: Vec<_> = ProviderIdentifier::iter()
            .filter(|id| id.always_available())
            .collect();

        assert_eq!(fallbacks, vec![ProviderIdentifier::Pollinations]);
    }

    #[test]
    fn test_identifiers_are_lowercase() {
        assert_eq!(ProviderIdentifier::OpenAI.to_string(), "openai");
        assert_eq!(ProviderIdentifier::HuggingFace.to_string(), "huggingface");
    }
}
