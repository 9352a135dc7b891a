use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::{Client, IntoUrl};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::providers::apireq::{self, Url};

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    #[error("invalid endpoint")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("{}", .0)]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("{0}")]
    BadRequest(ApiErrorPayload),

    #[error("{0}")]
    Authentication(ApiErrorPayload),

    /// The prompt was flagged by the moderation system
    #[error("{0}")]
    ContentModeration(ApiErrorPayload),

    #[error("{0}")]
    NotFound(ApiErrorPayload),

    #[error("{0}")]
    RateLimit(ApiErrorPayload),

    #[error("{0}")]
    InternalError(ApiErrorPayload),

    #[error("{0}")]
    ApiOverloaded(ApiErrorPayload),

    #[error("{0}")]
    GatewayTimeout(ApiErrorPayload),

    #[error("{0}")]
    UnknownStatus(ApiErrorPayload),

    /// The request succeeded but the output was withheld by the filter
    #[error("the generated image was filtered")]
    OutputFiltered,
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 | 413 | 422 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 if payload.name == "content_moderation" => Error::ContentModeration(payload),
            403 => Error::Authentication(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            504 => Error::GatewayTimeout(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

/* Structures to deserialize /v2beta/stable-image/generate/{route} */

#[derive(Deserialize, Debug)]
pub(super) struct GenerationResponse {
    pub image: String,
    pub finish_reason: String,
    #[serde(default)]
    pub seed: Option<u64>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
pub(super) struct ApiErrorPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    errors: Vec<String>,
}

impl std::fmt::Display for ApiErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}", self.errors.join("; "))
        }
    }
}

impl ApiErrorPayload {
    fn parse(body: String) -> ApiErrorPayload {
        match serde_json::from_str::<ApiErrorPayload>(&body) {
            Ok(payload) => payload,
            Err(_) => ApiErrorPayload {
                name: String::new(),
                errors: vec![body],
            },
        }
    }
}

/// The generation route serving `model`, and the `model` form field it takes,
/// if any. The Stable Diffusion 3 family shares a route.
fn route(model: &str) -> (&'static str, Option<&str>) {
    match model {
        "stable-image-core" => ("core", None),
        "stable-image-ultra" => ("ultra", None),
        model => ("sd3", Some(model)),
    }
}

pub(super) const OUTPUT_FORMAT: &'static str = "png";

const DEFAULT_API_BASE: &'static str = "https://api.stability.ai";

pub(super) struct StabilityApi {
    client: Client,
    api_base: Url,
    api_key: SecretString,
}

impl StabilityApi {
    pub(super) fn new<U: IntoUrl>(api_key: SecretString, api_base: U) -> Result<StabilityApi, Error> {
        Ok(StabilityApi {
            client: Client::new(),
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
            api_key,
        })
    }

    pub(super) fn with_api_key(api_key: SecretString) -> Result<StabilityApi, Error> {
        Self::new(api_key, DEFAULT_API_BASE)
    }

    pub(super) async fn generate(&self, model: &str, prompt: &str) -> Result<GenerationResponse, Error> {
        let (route, model_field) = route(model);

        let url = apireq::endpoint(
            &self.api_base,
            ["v2beta", "stable-image", "generate", route],
        )?;

        let mut form = Form::new()
            .text("prompt", prompt.to_string())
            .text("output_format", OUTPUT_FORMAT);

        if let Some(model) = model_field {
            form = form.text("model", model.to_string());
        }

        let res = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if !status.is_success() {
            let payload = ApiErrorPayload::parse(apireq::error_text(res).await);

            return Err(Error::from_status(status.as_u16(), payload));
        }

        let generation: GenerationResponse = res
            .json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        if generation.finish_reason == "CONTENT_FILTERED" {
            return Err(Error::OutputFiltered);
        }

        Ok(generation)
    }
}
