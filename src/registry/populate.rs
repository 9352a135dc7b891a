use std::env::VarError;
use std::sync::Arc;

use secrecy::SecretString;
use strum::IntoEnumIterator;
use thiserror::Error;

use super::registry::{self, Registry};
use super::selector::Selector;
use crate::config::{Config, ProviderActivationPolicy, ProviderConfig};
use crate::providers::providers::{
    HuggingFaceProvider, OpenAIProvider, PollinationsProvider, ProviderIdentifier,
    ReplicateProvider, StabilityProvider,
};
use crate::providers::{self, MediaProvider};

#[derive(Error, Debug)]
pub enum Error {
    #[error("the \"{provider}\" provider is enabled but the API key is not defined, either add it to the config or define {env_var}")]
    MissingCredential {
        provider: ProviderIdentifier,
        env_var: &'static str,
    },
    #[error("failed to parse {0}")]
    CredentialNotUnicode(&'static str),
    #[error("failed to initialize provider \"{0}\": {1}")]
    ProviderInit(ProviderIdentifier, #[source] providers::Error),
    #[error(transparent)]
    Registry(#[from] registry::Error),
}

/// Reads a credential. Empty values count as absent.
fn credential<F>(
    config: &ProviderConfig,
    env_var: &'static str,
    env: &F,
) -> Result<Option<SecretString>, Error>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    if let Some(api_key) = config.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        return Ok(Some(SecretString::from(api_key.clone())));
    }

    match env(env_var) {
        Ok(api_key) if !api_key.trim().is_empty() => Ok(Some(SecretString::from(api_key))),
        Ok(_) => Ok(None),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(Error::CredentialNotUnicode(env_var)),
    }
}

fn build_provider(
    id: ProviderIdentifier,
    api_key: SecretString,
    api_base: Option<&str>,
) -> Result<Arc<dyn MediaProvider>, providers::Error> {
    let provider: Arc<dyn MediaProvider> = match id {
        ProviderIdentifier::OpenAI => Arc::new(OpenAIProvider::new(api_key, api_base)?),
        ProviderIdentifier::Stability => Arc::new(StabilityProvider::new(api_key, api_base)?),
        ProviderIdentifier::Replicate => Arc::new(ReplicateProvider::new(api_key, api_base)?),
        ProviderIdentifier::HuggingFace => Arc::new(HuggingFaceProvider::new(api_key, api_base)?),
        // Needs no credential
        ProviderIdentifier::Pollinations => Arc::new(PollinationsProvider::new(api_base)?),
    };

    Ok(provider)
}

/// Populate a registry with the available providers, reading credentials
/// through `env`.
pub fn populate_with<F>(config: &Config, env: F) -> Result<Registry, Error>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let mut registry = Registry::new();

    for id in ProviderIdentifier::iter() {
        let (section, env_var) = match (config.providers.credentialed(id), id.credential_env_var()) {
            (Some(section), Some(env_var)) => (section, env_var),
            _ => continue,
        };

        let api_key = match section.activate {
            ProviderActivationPolicy::Auto => credential(section, env_var, &env)?,
            ProviderActivationPolicy::Enabled => match credential(section, env_var, &env)? {
                Some(api_key) => Some(api_key),
                None => return Err(Error::MissingCredential { provider: id, env_var }),
            },
            ProviderActivationPolicy::Disabled => None,
        };

        let api_key = match api_key {
            Some(api_key) => api_key,
            None => {
                tracing::debug!(provider = %id, "provider is not available");
                continue;
            }
        };

        let provider = build_provider(id, api_key, section.api_base.as_deref())
            .map_err(|e| Error::ProviderInit(id, e))?;

        registry.add_provider(provider, section.priority, section.default_models.to_map())?;

        tracing::debug!(provider = %id, "provider is available");
    }

    {
        let fallback = &config.providers.pollinations;

        let provider = PollinationsProvider::new(fallback.api_base.as_deref())
            .map_err(|e| Error::ProviderInit(ProviderIdentifier::Pollinations, e))?;

        registry.add_provider(
            Arc::new(provider),
            fallback.priority,
            fallback.default_models.to_map(),
        )?;
    }

    Ok(registry)
}

/// Populate a registry with the available providers
pub fn populated_registry(config: &Config) -> Result<Registry, Error> {
    populate_with(config, |key| std::env::var(key))
}

/// Populate a registry and build the selector over it
pub fn populated_selector(config: &Config) -> Result<Selector, Error> {
    Ok(Selector::new(populated_registry(config)?)?)
}
