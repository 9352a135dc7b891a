use reqwest::{Client, IntoUrl};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::providers::apireq::{self, Url};

use super::models::{accepts_response_format, default_size};

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        apireq::ReqwestError,
    ),

    /// Your request was malformed or missing some required parameters.
    #[error("{}", .0.message)]
    BadRequest(ApiErrorPayload),

    /// The prompt or the generated image was rejected by the safety system.
    #[error("{}", .0.message)]
    ContentPolicy(ApiErrorPayload),

    /// The API key is missing or not correct.
    #[error("{}", .0.message)]
    Authentication(ApiErrorPayload),

    /// You don't have access to the requested resource.
    #[error("{}", .0.message)]
    PermissionDenied(ApiErrorPayload),

    /// Requested model does not exist.
    #[error("{}", .0.message)]
    NotFound(ApiErrorPayload),

    /// You have hit your assigned rate limit.
    #[error("{}", .0.message)]
    RateLimit(ApiErrorPayload),

    /// OpenAI has an internal issue
    #[error("{}", .0.message)]
    InternalError(ApiErrorPayload),

    /// The engine is currently overloaded, please try again later
    #[error("{}", .0.message)]
    ApiOverloaded(ApiErrorPayload),

    /// The gateway timed out waiting for the image
    #[error("{}", .0.message)]
    GatewayTimeout(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0.message)]
    UnknownStatus(ApiErrorPayload),

    /// A successful response without any image in it
    #[error("the response contained no image")]
    EmptyResponse,
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 if payload.code.as_deref() == Some("content_policy_violation") => {
                Error::ContentPolicy(payload)
            }
            400 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            504 => Error::GatewayTimeout(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

/* Structures to serialize /v1/images/generations */

#[derive(Serialize, Debug)]
struct ImageGenerationRequest<'o> {
    model: &'o str,
    prompt: &'o str,
    n: u32,
    size: &'o str,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'o str>,
}

/* Structures to deserialize /v1/images/generations */

#[derive(Deserialize, Debug, Default)]
pub(super) struct ImageData {
    pub b64_json: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ImagesResponse {
    data: Vec<ImageData>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
pub(super) struct ApiErrorPayload {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

impl ApiErrorPayload {
    fn parse(body: String) -> ApiErrorPayload {
        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(response) => response.error,
            Err(_) => ApiErrorPayload {
                message: body,
                code: None,
            },
        }
    }
}

const DEFAULT_API_BASE: &'static str = "https://api.openai.com";

pub(super) struct OpenAIApi {
    client: Client,
    api_base: Url,
    api_key: SecretString,
}

impl OpenAIApi {
    pub(super) fn new<U: IntoUrl>(api_key: SecretString, api_base: U) -> Result<OpenAIApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        Ok(OpenAIApi {
            client: Client::new(),
            api_base,
            api_key,
        })
    }

    pub(super) fn with_api_key(api_key: SecretString) -> Result<OpenAIApi, Error> {
        Self::new(api_key, DEFAULT_API_BASE)
    }

    pub(super) async fn generate_image(&self, model: &str, prompt: &str) -> Result<ImageData, Error> {
        let url = apireq::endpoint(&self.api_base, ["v1", "images", "generations"])?;

        // Hosted URLs expire after an hour, so ask for the image itself
        let response_format = accepts_response_format(model).then_some("b64_json");

        let res = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&ImageGenerationRequest {
                model,
                prompt,
                n: 1,
                size: default_size(model),
                response_format,
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if !status.is_success() {
            let payload = ApiErrorPayload::parse(apireq::error_text(res).await);

            return Err(Error::from_status(status.as_u16(), payload));
        }

        let images: ImagesResponse = res
            .json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        images.data.into_iter().next().ok_or(Error::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> OpenAIApi {
        OpenAIApi::new(SecretString::from("test-key".to_string()), server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_generate_image_requests_base64_for_dalle() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "dall-e-3",
                "prompt": "a red bicycle",
                "n": 1,
                "response_format": "b64_json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1589478378,
                "data": [{ "b64_json": "aGVsbG8=", "revised_prompt": "a shiny red bicycle" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let image = api(&server)
            .generate_image("dall-e-3", "a red bicycle")
            .await
            .unwrap();

        assert_eq!(image.b64_json.as_deref(), Some("aGVsbG8="));
        assert_eq!(image.revised_prompt.as_deref(), Some("a shiny red bicycle"));
    }

    #[tokio::test]
    async fn test_content_policy_violation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "message": "Your request was rejected by our safety system.",
                    "type": "invalid_request_error",
                    "code": "content_policy_violation"
                }
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .generate_image("dall-e-3", "something")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ContentPolicy(_)));
    }

    #[tokio::test]
    async fn test_invalid_creds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .generate_image("dall-e-3", "something")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_unstructured_error_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&server)
            .await;

        let err = api(&server)
            .generate_image("dall-e-3", "something")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ApiOverloaded(_)));
        assert_eq!(err.to_string(), "upstream overloaded");
    }

    #[tokio::test]
    async fn test_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;

        let err = api(&server)
            .generate_image("gpt-image-1", "something")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyResponse));
    }
}
