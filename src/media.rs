//! Type definitions for generation requests and their results.
//!

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::providers::providers::ProviderIdentifier;

/// The kind of media a request asks for.
///
/// The `to_string` and `FromStr` forms appear in configuration files and on the
/// command line and should remain stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    /// Text to image
    Image,
    /// Text to video
    Video,
    /// Prompted modification of an existing image
    Edit,
}

/// Which provider should serve a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderChoice {
    /// Let the selector pick by priority
    #[default]
    Auto,
    /// Use exactly this provider or fail
    Explicit(ProviderIdentifier),
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderChoice::Auto => write!(f, "auto"),
            ProviderChoice::Explicit(id) => write!(f, "{}", id),
        }
    }
}

impl FromStr for ProviderChoice {
    type Err = strum::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(ProviderChoice::Auto);
        }

        ProviderIdentifier::from_str(s).map(ProviderChoice::Explicit)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("the prompt is empty")]
    EmptyPrompt,
    #[error("the prompt is {length} characters long, the limit is {limit}")]
    PromptTooLong { length: usize, limit: usize },
    #[error("an edit requires a source image")]
    MissingSourceImage,
    #[error("the source image \"{0}\" is not an http(s) or data URL")]
    InvalidSourceImage(String),
    #[error("model \"{model}\" is not offered for {operation} by any available provider")]
    UnknownModel { model: String, operation: Operation },
    #[error("provider \"{provider}\" does not support {operation}")]
    UnsupportedOperation {
        provider: ProviderIdentifier,
        operation: Operation,
    },
}

/// A request to generate a single piece of media.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub operation: Operation,
    /// A model identifier. When absent, the provider's default model is used.
    pub model_hint: Option<String>,
    pub provider: ProviderChoice,
    /// Input image for [`Operation::Edit`]. Ignored by other operations.
    pub source_image: Option<String>,
}

impl GenerationRequest {
    pub fn new<S: Into<String>>(prompt: S, operation: Operation) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.into(),
            operation,
            model_hint: None,
            provider: ProviderChoice::Auto,
            source_image: None,
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> GenerationRequest {
        self.model_hint = Some(model.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderChoice) -> GenerationRequest {
        self.provider = provider;
        self
    }

    pub fn with_source_image<S: Into<String>>(mut self, source_image: S) -> GenerationRequest {
        self.source_image = Some(source_image.into());
        self
    }

    /// Checks the request against `max_prompt_length` (in characters).
    pub fn validate(&self, max_prompt_length: usize) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        let length = self.prompt.chars().count();

        if length > max_prompt_length {
            return Err(ValidationError::PromptTooLong {
                length,
                limit: max_prompt_length,
            });
        }

        if self.operation == Operation::Edit {
            let source = self
                .source_image
                .as_deref()
                .ok_or(ValidationError::MissingSourceImage)?;

            let acceptable = Url::parse(source)
                .map(|url| matches!(url.scheme(), "http" | "https" | "data"))
                .unwrap_or(false);

            if !acceptable {
                return Err(ValidationError::InvalidSourceImage(source.to_string()));
            }
        }

        Ok(())
    }
}

/// The representation a [`CanonicalMediaResult`] is carried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    InlineBytes,
    RemoteUrl,
    DataUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    /// Raw bytes that still need a durable home
    InlineBytes(Bytes),
    /// A URL hosted by the vendor
    RemoteUrl(String),
    /// A self-contained `data:` URI
    DataUri(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("the vendor returned invalid base64 data")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("malformed data URI")]
    MalformedDataUri,
}

/// Every adapter normalizes its vendor's response into this type. The payload
/// enum guarantees that exactly one representation is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMediaResult {
    payload: MediaPayload,
    mime_type: String,
}

impl CanonicalMediaResult {
    pub fn inline_bytes<B: Into<Bytes>, S: Into<String>>(
        bytes: B,
        mime_type: S,
    ) -> CanonicalMediaResult {
        CanonicalMediaResult {
            payload: MediaPayload::InlineBytes(bytes.into()),
            mime_type: mime_type.into(),
        }
    }

    pub fn remote_url<U: Into<String>, S: Into<String>>(
        url: U,
        mime_type: S,
    ) -> CanonicalMediaResult {
        CanonicalMediaResult {
            payload: MediaPayload::RemoteUrl(url.into()),
            mime_type: mime_type.into(),
        }
    }

    /// Wraps an existing data URI, taking the MIME type from its header.
    pub fn data_uri<S: Into<String>>(uri: S) -> Result<CanonicalMediaResult, MediaError> {
        let uri = uri.into();
        let (mime_type, _) = split_data_uri(&uri)?;

        Ok(CanonicalMediaResult {
            mime_type: mime_type.to_string(),
            payload: MediaPayload::DataUri(uri),
        })
    }

    /// Encodes bytes as a data URI.
    pub fn encoded_data_uri(bytes: &[u8], mime_type: &str) -> CanonicalMediaResult {
        CanonicalMediaResult {
            payload: MediaPayload::DataUri(encode_data_uri(bytes, mime_type)),
            mime_type: mime_type.to_string(),
        }
    }

    /// Decodes a base64 body into inline bytes.
    pub fn from_base64<S: Into<String>>(
        encoded: &str,
        mime_type: S,
    ) -> Result<CanonicalMediaResult, MediaError> {
        let bytes = STANDARD.decode(encoded.trim())?;

        Ok(CanonicalMediaResult::inline_bytes(bytes, mime_type))
    }

    pub fn kind(&self) -> MediaKind {
        match self.payload {
            MediaPayload::InlineBytes(_) => MediaKind::InlineBytes,
            MediaPayload::RemoteUrl(_) => MediaKind::RemoteUrl,
            MediaPayload::DataUri(_) => MediaKind::DataUri,
        }
    }

    pub fn payload(&self) -> &MediaPayload {
        &self.payload
    }

    pub fn into_payload(self) -> MediaPayload {
        self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The stable reference for this result, if it has one. Inline bytes have
    /// no reference until they are persisted.
    pub fn reference(&self) -> Option<&str> {
        match &self.payload {
            MediaPayload::InlineBytes(_) => None,
            MediaPayload::RemoteUrl(url) => Some(url),
            MediaPayload::DataUri(uri) => Some(uri),
        }
    }
}

/// Serialized as its kind, MIME type and reference. Inline bytes are
/// summarized by their size.
impl Serialize for CanonicalMediaResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("CanonicalMediaResult", 3)?;

        state.serialize_field("kind", &self.kind().to_string())?;
        state.serialize_field("mime_type", &self.mime_type)?;

        match &self.payload {
            MediaPayload::InlineBytes(bytes) => state.serialize_field("size", &bytes.len())?,
            MediaPayload::RemoteUrl(reference) | MediaPayload::DataUri(reference) => {
                state.serialize_field("reference", reference)?
            }
        }

        state.end()
    }
}

/// Encodes `bytes` as a base64 `data:` URI.
pub fn encode_data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// Splits a `data:` URI into its MIME type and payload.
fn split_data_uri(uri: &str) -> Result<(&str, &str), MediaError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or(MediaError::MalformedDataUri)?;

    let (header, payload) = rest.split_once(',').ok_or(MediaError::MalformedDataUri)?;

    let mime_type = header.split(';').next().unwrap_or_default();

    // RFC 2397 default
    let mime_type = if mime_type.is_empty() {
        "text/plain"
    } else {
        mime_type
    };

    Ok((mime_type, payload))
}
