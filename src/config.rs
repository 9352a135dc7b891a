use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml;

use crate::media::Operation;
use crate::providers::providers::ProviderIdentifier;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read config \"{0}\": {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to reserialize config: {0}")]
    Reserialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Default, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderActivationPolicy {
    /// Activate when a credential is present
    #[default]
    Auto,
    /// Activate, failing when the credential is missing
    Enabled,
    /// Never activate
    Disabled,
}

/// One optional value per [`Operation`].
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PerOperation<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<T>,
}

impl<T> Default for PerOperation<T> {
    fn default() -> Self {
        PerOperation {
            image: None,
            video: None,
            edit: None,
        }
    }
}

impl<T: Clone> PerOperation<T> {
    pub fn get(&self, operation: Operation) -> Option<&T> {
        match operation {
            Operation::Image => self.image.as_ref(),
            Operation::Video => self.video.as_ref(),
            Operation::Edit => self.edit.as_ref(),
        }
    }

    pub fn to_map(&self) -> HashMap<Operation, T> {
        [Operation::Image, Operation::Video, Operation::Edit]
            .into_iter()
            .filter_map(|op| self.get(op).map(|v| (op, v.clone())))
            .collect()
    }
}

#[derive(Deserialize, Serialize, Default, Clone)]
pub struct ProviderConfig {
    #[serde(default)]
    pub activate: ProviderActivationPolicy,
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub priority: Option<u8>,
    #[serde(default)]
    pub default_models: PerOperation<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("activate", &self.activate)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("priority", &self.priority)
            .field("default_models", &self.default_models)
            .finish()
    }
}

/// The credential-free provider. It is always active.
#[derive(Deserialize, Serialize, Default, Clone, Debug)]
pub struct FallbackConfig {
    pub api_base: Option<String>,
    pub priority: Option<u8>,
    #[serde(default)]
    pub default_models: PerOperation<String>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub struct Providers {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub stability: ProviderConfig,
    #[serde(default)]
    pub replicate: ProviderConfig,
    #[serde(default)]
    pub huggingface: ProviderConfig,
    #[serde(default)]
    pub pollinations: FallbackConfig,
}

impl Providers {
    /// The section of a provider which needs a credential.
    pub fn credentialed(&self, id: ProviderIdentifier) -> Option<&ProviderConfig> {
        match id {
            ProviderIdentifier::OpenAI => Some(&self.openai),
            ProviderIdentifier::Stability => Some(&self.stability),
            ProviderIdentifier::Replicate => Some(&self.replicate),
            ProviderIdentifier::HuggingFace => Some(&self.huggingface),
            ProviderIdentifier::Pollinations => None,
        }
    }
}

fn default_max_prompt_length() -> usize {
    1000
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_storage_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Dispatch {
    /// Upper bound on the prompt, in characters
    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    #[serde(default = "default_storage_timeout_secs")]
    pub storage_timeout_secs: u64,
}

impl Default for Dispatch {
    fn default() -> Self {
        Dispatch {
            max_prompt_length: default_max_prompt_length(),
            provider_timeout_secs: default_provider_timeout_secs(),
            storage_timeout_secs: default_storage_timeout_secs(),
        }
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Storage {
    /// Where generated files are written
    pub directory: Option<PathBuf>,
    /// Prefix of the URLs handed out for stored files. Without it, `file://`
    /// URLs are returned.
    pub public_base_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CostOverride {
    pub operation: Operation,
    pub model: String,
    pub cost: u64,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Metering {
    /// Cost of models missing from the cost table
    #[serde(default)]
    pub default_costs: PerOperation<u64>,
    #[serde(default)]
    pub costs: Vec<CostOverride>,
}

#[derive(Deserialize, Serialize, Default, Debug)]
pub struct Config {
    #[serde(default)]
    pub dispatch: Dispatch,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub metering: Metering,
    #[serde(default)]
    pub providers: Providers,
}

fn get_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME");

    if let Some(home) = home {
        let home = PathBuf::from(home);

        const USER_PATHS: [&str; 2] = [".config/mediaforge/config.toml", ".mediaforge.toml"];

        for &path in USER_PATHS.iter() {
            let fullpath = home.join(path);

            if fullpath.exists() {
                return Some(fullpath);
            }
        }
    }

    let system_config = PathBuf::from("/etc/mediaforge.toml");

    if system_config.exists() {
        Some(system_config)
    } else {
        None
    }
}

fn extra_fields_helper<'a>(
    path: &mut Vec<&'a String>,
    user_config: &'a toml::Table,
    config: &'a toml::Table,
    extra: &mut Vec<String>,
) {
    for (user_key, user_value) in user_config {
        path.push(user_key);

        if let Some(config_value) = config.get(user_key) {
            match (user_value, config_value) {
                (toml::Value::Table(user_value), toml::Value::Table(config_value)) => {
                    extra_fields_helper(path, user_value, config_value, extra)
                }
                _ => {}
            }
        } else {
            let path: Vec<&str> = path.iter().map(|&s| s.as_str()).collect();

            extra.push(path.join("."));
        }

        path.pop();
    }
}

/// Returns the dotted paths of keys in `raw_config` which `config` does not
/// use.
fn extra_fields(config: &Config, raw_config: &str) -> Result<Vec<String>, Error> {
    let user_config: toml::Table = toml::de::from_str(raw_config)?;

    let config: toml::Table = {
        let seralized_config = toml::ser::to_string(&config)?;

        toml::de::from_str(&seralized_config)?
    };

    let mut path = Vec::new();
    let mut extra = Vec::new();

    extra_fields_helper(&mut path, &user_config, &config, &mut extra);

    Ok(extra)
}

/// Parses a configuration, warning about keys which are not understood.
pub fn parse_config(raw_config: &str) -> Result<Config, Error> {
    let config: Config = toml::de::from_str(raw_config)?;

    for key in extra_fields(&config, raw_config)? {
        crate::warn!("config contains extraneous key \"{}\", ignoring", key);
    }

    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<Config, Error> {
    let raw_config =
        std::fs::read_to_string(path).map_err(|e| Error::Read(path.to_path_buf(), e))?;

    parse_config(&raw_config)
}

/// Reads `config`, or the first configuration found in the default locations.
/// Without any configuration the defaults are used.
pub fn read_config(config: Option<PathBuf>) -> Result<Config, Error> {
    let config_path = config.or_else(get_config_path);

    match config_path {
        Some(path) => read_config_file(&path),
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.dispatch.max_prompt_length, 1000);
        assert_eq!(config.dispatch.provider_timeout_secs, 120);
        assert_eq!(config.dispatch.storage_timeout_secs, 30);
        assert_eq!(config.providers.openai.activate, ProviderActivationPolicy::Auto);
        assert!(config.metering.costs.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
            [dispatch]
            max_prompt_length = 500

            [storage]
            directory = "/var/lib/mediaforge"
            public_base_url = "https://cdn.example.com/media"

            [metering.default_costs]
            video = 150

            [[metering.costs]]
            operation = "image"
            model = "dall-e-3"
            cost = 7

            [providers.openai]
            activate = "enabled"
            api_key = "sk-test"
            priority = 3

            [providers.replicate.default_models]
            video = "luma/ray"

            [providers.stability]
            activate = "disabled"

            [providers.pollinations]
            api_base = "http://localhost:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.dispatch.max_prompt_length, 500);
        assert_eq!(config.dispatch.provider_timeout_secs, 120);
        assert_eq!(
            config.storage.public_base_url.as_deref(),
            Some("https://cdn.example.com/media")
        );
        assert_eq!(config.metering.default_costs.get(Operation::Video), Some(&150));
        assert_eq!(config.metering.default_costs.get(Operation::Image), None);
        assert_eq!(
            config.metering.costs,
            vec![CostOverride {
                operation: Operation::Image,
                model: "dall-e-3".to_string(),
                cost: 7
            }]
        );
        assert_eq!(config.providers.openai.activate, ProviderActivationPolicy::Enabled);
        assert_eq!(config.providers.openai.priority, Some(3));
        assert_eq!(
            config.providers.replicate.default_models.to_map(),
            HashMap::from([(Operation::Video, "luma/ray".to_string())])
        );
        assert_eq!(
            config.providers.stability.activate,
            ProviderActivationPolicy::Disabled
        );
        assert_eq!(
            config.providers.pollinations.api_base.as_deref(),
            Some("http://localhost:9000")
        );
    }

    #[test]
    fn test_extraneous_keys_are_reported() {
        let raw = r#"
            editor = "vim"

            [providers.openai]
            api_key = "sk-test"
            model = "dall-e-3"
        "#;

        let config: Config = toml::de::from_str(raw).unwrap();

        let mut extra = extra_fields(&config, raw).unwrap();
        extra.sort();

        assert_eq!(extra, vec!["editor", "providers.openai.model"]);
    }

    #[test]
    fn test_unknown_activation_policy_is_rejected() {
        let err = parse_config(
            r#"
            [providers.openai]
            activate = "sometimes"
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_api_key_is_redacted() {
        let config = ProviderConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };

        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "[dispatch]\nprovider_timeout_secs = 5\n").unwrap();

        let config = read_config_file(&path).unwrap();

        assert_eq!(config.dispatch.provider_timeout_secs, 5);

        let missing = read_config_file(&dir.path().join("missing.toml")).unwrap_err();

        assert!(matches!(missing, Error::Read(..)));
    }
}
