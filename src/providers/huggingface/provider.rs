use async_trait::async_trait;
use lazy_static::lazy_static;
use secrecy::SecretString;

use crate::media::{CanonicalMediaResult, Operation};
use crate::providers::apireq;
use crate::providers::huggingface::api;
use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, GenerationInput, MediaProvider, Model,
};

lazy_static! {
    static ref HUGGINGFACE_MODELS: [Model; 3] = [
        Model::new("black-forest-labs/FLUX.1-schnell", Operation::Image),
        Model::new("stabilityai/stable-diffusion-xl-base-1.0", Operation::Image),
        Model::new("black-forest-labs/FLUX.1-dev", Operation::Image),
    ];
}

// The inference API answers with JPEG unless the model says otherwise
const DEFAULT_MIME_TYPE: &'static str = "image/jpeg";

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_)
            | api::Error::BadRequest(_) => ErrorKind::BadRequest,
            api::Error::ModelLoading(_) | api::Error::Unavailable(_) => ErrorKind::ApiOverloaded,
            api::Error::Authentication(_) => ErrorKind::Authentication,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::NotAnImage(_) => ErrorKind::UnexpectedResponse,
            api::Error::UnspecifiedError(_) | api::Error::RequestFailed(_) => {
                ErrorKind::UnspecifiedError
            }
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}

pub(crate) struct HuggingFaceProvider {
    api: api::HuggingFaceApi,
}

impl HuggingFaceProvider {
    pub(crate) fn new(
        api_token: SecretString,
        api_base: Option<&str>,
    ) -> Result<HuggingFaceProvider, Error> {
        let api = match api_base {
            Some(api_base) => api::HuggingFaceApi::with_api_base(api_token, api_base)?,
            None => api::HuggingFaceApi::new(api_token)?,
        };

        Ok(HuggingFaceProvider { api })
    }
}

#[async_trait]
impl MediaProvider for HuggingFaceProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::HuggingFace
    }

    fn models(&self) -> &[Model] {
        HUGGINGFACE_MODELS.as_slice()
    }

    async fn generate(
        &self,
        model: &str,
        input: &GenerationInput<'_>,
    ) -> Result<CanonicalMediaResult, Error> {
        if input.operation != Operation::Image {
            return Err(Error::from_kind(ErrorKind::UnsupportedOperation));
        }

        let output = self.api.text_to_image(model, input.prompt).await?;

        let mime_type = apireq::image_mime_type(output.content_type, DEFAULT_MIME_TYPE)?;

        Ok(CanonicalMediaResult::inline_bytes(output.bytes, mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::providers::ErrorClass;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn generate_against(template: ResponseTemplate) -> Result<CanonicalMediaResult, Error> {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(template)
            .mount(&server)
            .await;

        let provider =
            HuggingFaceProvider::new(SecretString::from("k".to_string()), Some(&server.uri()))
                .unwrap();

        let input = GenerationInput {
            prompt: "a red bicycle",
            operation: Operation::Image,
            source_image: None,
        };

        provider
            .generate("stabilityai/stable-diffusion-xl-base-1.0", &input)
            .await
    }

    #[tokio::test]
    async fn test_binary_body_becomes_inline_bytes() {
        let media = generate_against(
            ResponseTemplate::new(200).set_body_raw(b"\x89PNG\r\n\x1a\n".to_vec(), "image/png"),
        )
        .await
        .unwrap();

        assert_eq!(media.kind(), MediaKind::InlineBytes);
        assert_eq!(media.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn test_unlabelled_body_defaults_to_jpeg() {
        let media = generate_against(
            ResponseTemplate::new(200).set_body_raw(vec![1, 2, 3], "application/octet-stream"),
        )
        .await
        .unwrap();

        assert_eq!(media.mime_type(), DEFAULT_MIME_TYPE);
    }

    #[tokio::test]
    async fn test_html_body_is_unexpected() {
        let err = generate_against(
            ResponseTemplate::new(200)
                .set_body_raw(b"<html>Service busy</html>".to_vec(), "text/html"),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
        assert_eq!(err.class(), ErrorClass::Permanent);
    }

    #[tokio::test]
    async fn test_model_loading_is_transient() {
        let err = generate_against(ResponseTemplate::new(503).set_body_json(json!({
            "error": "Model is currently loading",
            "estimated_time": 42.5
        })))
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ApiOverloaded);
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[tokio::test]
    async fn test_bad_token_requires_auth() {
        let err = generate_against(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid credentials in Authorization header" })),
        )
        .await
        .unwrap_err();

        assert_eq!(err.class(), ErrorClass::AuthRequired);
    }
}
