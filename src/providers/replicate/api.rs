use reqwest::{Client, IntoUrl};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::providers::apireq::{self, Url};

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    #[error("invalid endpoint")]
    InvalidEndpoint(#[from] url::ParseError),

    /// Replicate model identifiers have the form `owner/name`
    #[error("\"{0}\" is not a replicate model identifier")]
    InvalidModel(String),

    #[error("{}", .0)]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("{}", .0.detail)]
    BadRequest(ApiErrorPayload),

    #[error("{}", .0.detail)]
    Authentication(ApiErrorPayload),

    #[error("{}", .0.detail)]
    NotFound(ApiErrorPayload),

    #[error("{}", .0.detail)]
    RateLimit(ApiErrorPayload),

    #[error("{}", .0.detail)]
    InternalError(ApiErrorPayload),

    #[error("{}", .0.detail)]
    ApiOverloaded(ApiErrorPayload),

    #[error("{}", .0.detail)]
    GatewayTimeout(ApiErrorPayload),

    #[error("{}", .0.detail)]
    UnknownStatus(ApiErrorPayload),

    /// The prediction did not finish within the synchronous wait window
    #[error("prediction {0} is still running")]
    PredictionPending(String),

    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    #[error("prediction was canceled")]
    PredictionCanceled,

    #[error("prediction succeeded without output")]
    EmptyOutput,
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 | 422 => Error::BadRequest(payload),
            401 | 403 => Error::Authentication(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            504 => Error::GatewayTimeout(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

/* Structures to serialize /v1/models/{owner}/{name}/predictions */

#[derive(Serialize, Debug)]
struct PredictionInput<'i> {
    prompt: &'i str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_image: Option<&'i str>,
}

#[derive(Serialize, Debug)]
struct PredictionRequest<'i> {
    input: PredictionInput<'i>,
}

/* Structures to deserialize predictions */

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(super) enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PredictionOutput {
    Single(String),
    Many(Vec<String>),
}

#[derive(Deserialize, Debug)]
struct Prediction {
    id: String,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<String>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
pub(super) struct ApiErrorPayload {
    detail: String,
}

impl ApiErrorPayload {
    fn parse(body: String) -> ApiErrorPayload {
        match serde_json::from_str::<ApiErrorPayload>(&body) {
            Ok(payload) => payload,
            Err(_) => ApiErrorPayload { detail: body },
        }
    }
}

const DEFAULT_API_BASE: &'static str = "https://api.replicate.com";

pub(super) struct ReplicateApi {
    client: Client,
    api_base: Url,
    api_token: SecretString,
}

impl ReplicateApi {
    pub(super) fn new<U: IntoUrl>(api_token: SecretString, api_base: U) -> Result<ReplicateApi, Error> {
        Ok(ReplicateApi {
            client: Client::new(),
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
            api_token,
        })
    }

    pub(super) fn with_api_token(api_token: SecretString) -> Result<ReplicateApi, Error> {
        Self::new(api_token, DEFAULT_API_BASE)
    }

    /// Creates a prediction and waits for it synchronously. Returns the first
    /// output, which is either a URL or a data URI.
    pub(super) async fn predict(
        &self,
        model: &str,
        prompt: &str,
        input_image: Option<&str>,
    ) -> Result<String, Error> {
        let (owner, name) = model
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| Error::InvalidModel(model.to_string()))?;

        let url = apireq::endpoint(&self.api_base, ["v1", "models", owner, name, "predictions"])?;

        let res = self
            .client
            .post(url)
            .bearer_auth(self.api_token.expose_secret())
            .header("Prefer", "wait")
            .json(&PredictionRequest {
                input: PredictionInput {
                    prompt,
                    input_image,
                },
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if !status.is_success() {
            let payload = ApiErrorPayload::parse(apireq::error_text(res).await);

            return Err(Error::from_status(status.as_u16(), payload));
        }

        let prediction: Prediction = res
            .json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        match prediction.status {
            PredictionStatus::Succeeded => {}
            PredictionStatus::Starting | PredictionStatus::Processing => {
                return Err(Error::PredictionPending(prediction.id))
            }
            PredictionStatus::Failed => {
                return Err(Error::PredictionFailed(
                    prediction.error.unwrap_or_else(|| "unknown error".to_string()),
                ))
            }
            PredictionStatus::Canceled => return Err(Error::PredictionCanceled),
        }

        let output = match prediction.output {
            Some(PredictionOutput::Single(output)) => Some(output),
            Some(PredictionOutput::Many(outputs)) => outputs.into_iter().next(),
            None => None,
        };

        output.ok_or(Error::EmptyOutput)
    }
}
