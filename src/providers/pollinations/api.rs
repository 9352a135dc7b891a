use bytes::Bytes;
use reqwest::{Client, IntoUrl, StatusCode};

use crate::providers::apireq::{self, Url};

const POLLINATIONS_DEFAULT_ENDPOINT: &'static str = "https://image.pollinations.ai";

const IMAGE_SIZE: u32 = 1024;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    #[error("invalid pollinations api base: {0}")]
    InvalidApiBase(reqwest::Error),

    #[error("invalid pollinations endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("a request to pollinations failed: {0}")]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("request to the pollinations api failed: {0}")]
    BadRequest(String),

    #[error("rate limited by pollinations: {0}")]
    RateLimit(String),

    #[error("pollinations is unavailable: {0}")]
    Unavailable(String),

    #[error("pollinations encountered an internal error: {0}")]
    InternalError(String),

    #[error("the pollinations API returned an unspecified error: {0}")]
    UnspecifiedError(String),
}

#[derive(Debug)]
pub(super) struct ImageOutput {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

pub(super) struct PollinationsApi {
    client: Client,
    api_base: Url,
}

impl PollinationsApi {
    pub(super) fn with_api_base<U: IntoUrl>(api_base: U) -> Result<PollinationsApi, Error> {
        Ok(PollinationsApi {
            client: Client::new(),
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
        })
    }

    pub(super) fn new() -> Result<PollinationsApi, Error> {
        Self::with_api_base(POLLINATIONS_DEFAULT_ENDPOINT)
    }

    async fn parse_api_error(res: reqwest::Response) -> Error {
        let status = res.status();
        let text = apireq::error_text(res).await;

        match status {
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimit(text),
            StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::BAD_GATEWAY
            | StatusCode::GATEWAY_TIMEOUT => Error::Unavailable(text),
            code => match code.as_u16() {
                400..=499 => Error::BadRequest(text),
                500..=599 => Error::InternalError(text),
                _ => Error::UnspecifiedError(text),
            },
        }
    }

    /// Fetches an image rendered from `prompt`. The seed pins the output so
    /// the same request URL keeps producing the same image.
    pub(super) async fn image(&self, model: &str, prompt: &str, seed: u32) -> Result<ImageOutput, Error> {
        let mut url = apireq::endpoint(&self.api_base, ["prompt", prompt])?;

        url.query_pairs_mut()
            .append_pair("model", model)
            .append_pair("width", &IMAGE_SIZE.to_string())
            .append_pair("height", &IMAGE_SIZE.to_string())
            .append_pair("seed", &seed.to_string())
            .append_pair("nologo", "true");

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        if !res.status().is_success() {
            return Err(Self::parse_api_error(res).await);
        }

        let content_type = apireq::content_type(&res);

        let bytes = res
            .bytes()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        Ok(ImageOutput {
            bytes,
            content_type,
        })
    }
}
