use async_trait::async_trait;
use secrecy::SecretString;

use crate::media::{CanonicalMediaResult, Operation};
use crate::providers::openai::api;
use crate::providers::openai::models::OPENAI_MODELS;
use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, GenerationInput, MediaProvider, Model,
};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) | api::Error::PermissionDenied(_) => {
                ErrorKind::Authentication
            }
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_) => ErrorKind::BadRequest,
            api::Error::ContentPolicy(_) => ErrorKind::ContentFiltered,
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            api::Error::GatewayTimeout(_) => ErrorKind::TimedOut,
            api::Error::EmptyResponse => ErrorKind::UnexpectedResponse,
            api::Error::UnknownStatus(_) => ErrorKind::UnspecifiedError,
            api::Error::RequestFailed(_) => ErrorKind::UnspecifiedError,
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}

pub(crate) struct OpenAIProvider {
    api: api::OpenAIApi,
}

impl OpenAIProvider {
    pub(crate) fn new(api_key: SecretString, api_base: Option<&str>) -> Result<OpenAIProvider, Error> {
        let api = match api_base {
            Some(api_base) => api::OpenAIApi::new(api_key, api_base)?,
            None => api::OpenAIApi::with_api_key(api_key)?,
        };

        Ok(OpenAIProvider { api })
    }
}

fn canonicalize(image: api::ImageData) -> Result<CanonicalMediaResult, Error> {
    // Both image models produce PNG unless asked otherwise
    match (image.b64_json, image.url) {
        (Some(b64), _) => Ok(CanonicalMediaResult::from_base64(&b64, "image/png")?),
        (None, Some(url)) => Ok(CanonicalMediaResult::remote_url(url, "image/png")),
        (None, None) => Err(api::Error::EmptyResponse.into()),
    }
}

#[async_trait]
impl MediaProvider for OpenAIProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::OpenAI
    }

    fn models(&self) -> &[Model] {
        OPENAI_MODELS.as_slice()
    }

    async fn generate(
        &self,
        model: &str,
        input: &GenerationInput<'_>,
    ) -> Result<CanonicalMediaResult, Error> {
        if input.operation != Operation::Image {
            return Err(Error::from_kind(ErrorKind::UnsupportedOperation));
        }

        let image = self.api.generate_image(model, input.prompt).await?;

        canonicalize(image)
    }
}
