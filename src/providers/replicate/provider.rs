use async_trait::async_trait;
use lazy_static::lazy_static;
use secrecy::SecretString;
use url::Url;

use crate::media::{CanonicalMediaResult, Operation};
use crate::providers::replicate::api;
use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, GenerationInput, MediaProvider, Model,
};

lazy_static! {
    // Replicate hosts far more models than this. These are the ones offered
    // in the catalog, the first of each operation being the default.
    static ref REPLICATE_MODELS: [Model; 6] = [
        Model::new("black-forest-labs/flux-schnell", Operation::Image),
        Model::new("black-forest-labs/flux-1.1-pro", Operation::Image),
        Model::new("minimax/video-01", Operation::Video),
        Model::new("luma/ray", Operation::Video),
        Model::new("black-forest-labs/flux-kontext-pro", Operation::Edit),
        Model::new("black-forest-labs/flux-kontext-max", Operation::Edit),
    ];
}

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) => ErrorKind::Authentication,
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_)
            | api::Error::InvalidModel(_) => ErrorKind::BadRequest,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            // The wait window elapsed, the prediction itself may still succeed
            api::Error::GatewayTimeout(_) | api::Error::PredictionPending(_) => ErrorKind::TimedOut,
            api::Error::PredictionFailed(_) | api::Error::PredictionCanceled => {
                ErrorKind::UnspecifiedError
            }
            api::Error::EmptyOutput => ErrorKind::UnexpectedResponse,
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

/// Guesses the media type of a delivery URL from its extension.
fn guess_mime_type(url: &str, operation: Operation) -> String {
    let guessed = Url::parse(url)
        .ok()
        .and_then(|url| mime_guess::from_path(url.path()).first_raw());

    match (guessed, operation) {
        (Some(mime_type), _) => mime_type.to_string(),
        (None, Operation::Video) => "video/mp4".to_string(),
        (None, _) => "image/webp".to_string(),
    }
}

fn canonicalize(output: String, operation: Operation) -> Result<CanonicalMediaResult, Error> {
    if output.starts_with("data:") {
        return Ok(CanonicalMediaResult::data_uri(output)?);
    }

    let mime_type = guess_mime_type(&output, operation);

    Ok(CanonicalMediaResult::remote_url(output, mime_type))
}

pub(crate) struct ReplicateProvider {
    api: api::ReplicateApi,
}

impl ReplicateProvider {
    pub(crate) fn new(api_token: SecretString, api_base: Option<&str>) -> Result<ReplicateProvider, Error> {
        let api = match api_base {
            Some(api_base) => api::ReplicateApi::new(api_token, api_base)?,
            None => api::ReplicateApi::with_api_token(api_token)?,
        };

        Ok(ReplicateProvider { api })
    }
}

#[async_trait]
impl MediaProvider for ReplicateProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Replicate
    }

    fn models(&self) -> &[Model] {
        REPLICATE_MODELS.as_slice()
    }

    async fn generate(
        &self,
        model: &str,
        input: &GenerationInput<'_>,
    ) -> Result<CanonicalMediaResult, Error> {
        let input_image = match input.operation {
            Operation::Edit => input.source_image,
            Operation::Image | Operation::Video => None,
        };

        let output = self.api.predict(model, input.prompt, input_image).await?;

        canonicalize(output, input.operation)
    }
}
