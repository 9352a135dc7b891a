use async_trait::async_trait;
use lazy_static::lazy_static;

use crate::media::{CanonicalMediaResult, Operation};
use crate::providers::apireq;
use crate::providers::pollinations::api;
use crate::providers::{
    providers::ProviderIdentifier, Error, ErrorKind, GenerationInput, MediaProvider, Model,
};

lazy_static! {
    static ref POLLINATIONS_MODELS: [Model; 2] = [
        Model::new("flux", Operation::Image),
        Model::new("turbo", Operation::Image),
    ];
}

const DEFAULT_MIME_TYPE: &'static str = "image/jpeg";

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_)
            | api::Error::BadRequest(_) => ErrorKind::BadRequest,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::Unavailable(_) => ErrorKind::ApiOverloaded,
            api::Error::InternalError(_) => ErrorKind::InternalError,
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

pub(crate) struct PollinationsProvider {
    api: api::PollinationsApi,
}

impl PollinationsProvider {
    pub(crate) fn new(api_base: Option<&str>) -> Result<PollinationsProvider, Error> {
        let api = match api_base {
            Some(api_base) => api::PollinationsApi::with_api_base(api_base)?,
            None => api::PollinationsApi::new()?,
        };

        Ok(PollinationsProvider { api })
    }
}

#[async_trait]
impl MediaProvider for PollinationsProvider {
    fn id(&self) -> ProviderIdentifier {
        ProviderIdentifier::Pollinations
    }

    fn models(&self) -> &[Model] {
        POLLINATIONS_MODELS.as_slice()
    }

    async fn generate(
        &self,
        model: &str,
        input: &GenerationInput<'_>,
    ) -> Result<CanonicalMediaResult, Error> {
        if input.operation != Operation::Image {
            return Err(Error::from_kind(ErrorKind::UnsupportedOperation));
        }

        let seed: u32 = rand::random();

        let output = self.api.image(model, input.prompt, seed).await?;

        let mime_type = apireq::image_mime_type(output.content_type, DEFAULT_MIME_TYPE)?;

        Ok(CanonicalMediaResult::inline_bytes(output.bytes, mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use crate::providers::ErrorClass;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_returns_inline_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/prompt/.+$"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xff, 0xd8, 0xff], "image/jpeg"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(Some(&server.uri())).unwrap();

        let input = GenerationInput {
            prompt: "a red bicycle",
            operation: Operation::Image,
            source_image: None,
        };

        let media = provider.generate("flux", &input).await.unwrap();

        assert_eq!(media.kind(), MediaKind::InlineBytes);
        assert_eq!(media.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_html_error_page_is_unexpected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/prompt/.+$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"<html>Service busy</html>".to_vec(), "text/html"),
            )
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(Some(&server.uri())).unwrap();

        let input = GenerationInput {
            prompt: "a red bicycle",
            operation: Operation::Image,
            source_image: None,
        };

        let err = provider.generate("flux", &input).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
    }

    #[tokio::test]
    async fn test_video_is_unsupported_without_a_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = PollinationsProvider::new(Some(&server.uri())).unwrap();

        let input = GenerationInput {
            prompt: "waves",
            operation: Operation::Video,
            source_image: None,
        };

        let err = provider.generate("flux", &input).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.class(), ErrorClass::Permanent);
    }

    #[test]
    fn test_only_images_are_served() {
        let provider = PollinationsProvider::new(None).unwrap();

        assert!(provider.supports(Operation::Image));
        assert!(!provider.supports(Operation::Video));
        assert!(!provider.supports(Operation::Edit));
        assert_eq!(provider.default_model(Operation::Image).unwrap().id, "flux");
    }
}
