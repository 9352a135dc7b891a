use async_trait::async_trait;
use lazy_static::lazy_static;
use secrecy::SecretString;

use crate::media::{CanonicalMediaResult, Operation};
use crate::providers::stability::api;
use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, GenerationInput, MediaProvider, Model,
};

lazy_static! {
    static ref STABILITY_MODELS: [Model; 5] = [
        Model::new("stable-image-core", Operation::Image),
        Model::new("sd3.5-large", Operation::Image),
        Model::new("sd3.5-large-turbo", Operation::Image),
        Model::new("sd3.5-medium", Operation::Image),
        Model::new("stable-image-ultra", Operation::Image),
    ];
}

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) => ErrorKind::Authentication,
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_) => ErrorKind::BadRequest,
            api::Error::ContentModeration(_) | api::Error::OutputFiltered => {
                ErrorKind::ContentFiltered
            }
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            api::Error::GatewayTimeout(_) => ErrorKind::TimedOut,
            api::Error::UnknownStatus(_) | api::Error::RequestFailed(_) => {
                ErrorKind::UnspecifiedError
            }
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}

pub(crate) struct StabilityProvider {
    api: api::StabilityApi,
}

impl StabilityProvider {
    pub(crate) fn new(api_key: SecretString, api_base: Option<&str>) -> Result<StabilityProvider, Error> {
        let api = match api_base {
            Some(api_base) => api::StabilityApi::new(api_key, api_base)?,
            None => api::StabilityApi::with_api_key(api_key)?,
        };

        Ok(StabilityProvider { api })
    }
}

#[async_trait]
impl MediaProvider for StabilityProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Stability
    }

    fn models(&self) -> &[Model] {
        STABILITY_MODELS.as_slice()
    }

    async fn generate(
        &self,
        model: &str,
        input: &GenerationInput<'_>,
    ) -> Result<CanonicalMediaResult, Error> {
        if input.operation != Operation::Image {
            return Err(Error::from_kind(ErrorKind::UnsupportedOperation));
        }

        let generation = self.api.generate(model, input.prompt).await?;

        let mime_type = format!("image/{}", api::OUTPUT_FORMAT);

        Ok(CanonicalMediaResult::from_base64(&generation.image, mime_type)?)
    }
}
