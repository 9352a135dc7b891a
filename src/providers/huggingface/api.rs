use bytes::Bytes;
use reqwest::{Client, IntoUrl, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::providers::apireq::{self, Url};

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    #[error("invalid hugging face api base: {0}")]
    InvalidApiBase(reqwest::Error),

    #[error("invalid hugging face endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("a request to hugging face failed: {0}")]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("the model is loading, estimated wait {0:.0}s")]
    ModelLoading(f64),

    #[error("hugging face rejected the token: {0}")]
    Authentication(String),

    #[error("failed to query hugging face resource: {0}")]
    NotFound(String),

    #[error("request to the hugging face api failed: {0}")]
    BadRequest(String),

    #[error("rate limited by hugging face: {0}")]
    RateLimit(String),

    #[error("hugging face is unavailable: {0}")]
    Unavailable(String),

    #[error("hugging face encountered an internal error: {0}")]
    InternalError(String),

    #[error("the hugging face API returned an unspecified error: {0}")]
    UnspecifiedError(String),

    #[error("expected an image but the response was \"{0}\"")]
    NotAnImage(String),
}

#[derive(Serialize, Debug)]
struct InferenceRequest<'p> {
    inputs: &'p str,
}

// Errors
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
    #[serde(default)]
    estimated_time: Option<f64>,
}

impl ApiError {
    fn parse(body: String) -> ApiError {
        match serde_json::from_str::<ApiError>(&body) {
            Ok(err) => err,
            Err(_) => ApiError {
                error: body,
                estimated_time: None,
            },
        }
    }
}

/// The raw image along with the content type declared by the server.
#[derive(Debug)]
pub(super) struct InferenceOutput {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

const HUGGINGFACE_DEFAULT_ENDPOINT: &'static str = "https://router.huggingface.co/hf-inference";

pub(super) struct HuggingFaceApi {
    client: Client,
    api_base: Url,
    api_token: SecretString,
}

impl HuggingFaceApi {
    pub(super) fn with_api_base<U: IntoUrl>(
        api_token: SecretString,
        api_base: U,
    ) -> Result<HuggingFaceApi, Error> {
        Ok(HuggingFaceApi {
            client: Client::new(),
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
            api_token,
        })
    }

    pub(super) fn new(api_token: SecretString) -> Result<HuggingFaceApi, Error> {
        Self::with_api_base(api_token, HUGGINGFACE_DEFAULT_ENDPOINT)
    }

    async fn parse_api_error(res: reqwest::Response) -> Error {
        let status = res.status();
        let err = ApiError::parse(apireq::error_text(res).await);

        match status {
            StatusCode::SERVICE_UNAVAILABLE => match err.estimated_time {
                Some(estimated_time) => Error::ModelLoading(estimated_time),
                None => Error::Unavailable(err.error),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(err.error),
            StatusCode::NOT_FOUND => Error::NotFound(err.error),
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimit(err.error),
            StatusCode::GATEWAY_TIMEOUT => Error::Unavailable(err.error),
            code => match code.as_u16() {
                400..=499 => Error::BadRequest(err.error),
                500..=599 => Error::InternalError(err.error),
                _ => Error::UnspecifiedError(err.error),
            },
        }
    }

    /// Runs text-to-image inference. `model` is a hub repository id such as
    /// `black-forest-labs/FLUX.1-schnell`.
    pub(super) async fn text_to_image(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<InferenceOutput, Error> {
        let segments = std::iter::once("models").chain(model.split('/'));

        let url = apireq::endpoint(&self.api_base, segments)?;

        let res = self
            .client
            .post(url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        if !res.status().is_success() {
            return Err(Self::parse_api_error(res).await);
        }

        let content_type = apireq::content_type(&res);

        if content_type.as_deref() == Some("application/json") {
            return Err(Error::NotAnImage(apireq::error_text(res).await));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        Ok(InferenceOutput {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> HuggingFaceApi {
        HuggingFaceApi::with_api_base(SecretString::from("hf_test".to_string()), server.uri())
            .unwrap()
    }

    #[tokio::test]
    async fn test_text_to_image_returns_raw_bytes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/black-forest-labs/FLUX.1-schnell"))
            .and(header("Authorization", "Bearer hf_test"))
            .and(body_json(json!({ "inputs": "a red bicycle" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![0xff, 0xd8, 0xff, 0xe0], "image/jpeg"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = api(&server)
            .text_to_image("black-forest-labs/FLUX.1-schnell", "a red bicycle")
            .await
            .unwrap();

        assert_eq!(output.bytes.as_ref(), &[0xff, 0xd8, 0xff, 0xe0]);
        assert_eq!(output.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_model_loading() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": "Model black-forest-labs/FLUX.1-schnell is currently loading",
                "estimated_time": 20.0
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .text_to_image("black-forest-labs/FLUX.1-schnell", "a red bicycle")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ModelLoading(t) if t == 20.0));
    }

    #[tokio::test]
    async fn test_json_success_is_not_an_image() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": "hi" }])),
            )
            .mount(&server)
            .await;

        let err = api(&server)
            .text_to_image("gpt2", "a red bicycle")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotAnImage(_)));
    }
}
