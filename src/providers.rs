//! Traits and type definitions for media generation providers.
//!
//! The interface for all generation backends is provided by the [`MediaProvider`]
//! trait. Each API provider (e.g., OpenAI or Replicate) implements it to be usable
//! by the dispatcher. Providers must support two essential operations:
//! - Models: a static listing of the models the provider serves, along with the
//!   operation (image, video, edit) each model performs.
//! - Generation: a single request to the vendor that yields exactly one
//!   [`CanonicalMediaResult`], regardless of whether the vendor answered with raw
//!   bytes, base64 in a JSON body, a hosted URL or a data URI.
//!
//! Providers never retry. Retry and fallback policy belongs to the caller.
//!
//! ## Error Handling
//!
//! Each vendor has its own bespoke error system. Every provider has its own
//! error type, which is encapsulated in [`Error`]. The [`ErrorKind`] enum gives
//! the category of the failure and [`ErrorClass`] condenses it into what a
//! caller needs to decide between retrying and giving up.

mod apireq;
mod huggingface;
mod openai;
mod pollinations;
mod replicate;
mod stability;

pub mod providers;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use self::providers::ProviderIdentifier;
use crate::media::{CanonicalMediaResult, Operation};

/// This is a list specifying general categories of errors that
/// can be returned by a [`MediaProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to connect to the underlying API service.
    Connection,
    /// A request timed out.
    TimedOut,
    /// An API key was not provided, was rejected or lacks permissions.
    Authentication,
    /// A rate limit was reached.
    ExcessUsage,
    /// The servers are overloaded or the model is still loading. This is
    /// non-fatal and a retry may succeed later.
    ApiOverloaded,
    /// The requested model was not found.
    NotFound,
    /// The request was malformed or is otherwise improper.
    BadRequest,
    /// The server encountered an error.
    InternalError,
    /// An API response could not be deserialized or violated the
    /// assumptions of the client.
    UnexpectedResponse,
    /// The vendor refused the prompt or the output on content grounds.
    ContentFiltered,
    /// The provider cannot perform the requested operation.
    UnsupportedOperation,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

/// The caller-facing condensation of an [`ErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorClass {
    /// Safe to retry later without changing the input.
    Transient,
    /// Will not succeed on retry without changing the input.
    Permanent,
    /// Credentials are missing or invalid.
    AuthRequired,
}

impl ErrorKind {
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::Connection
            | ErrorKind::TimedOut
            | ErrorKind::ExcessUsage
            | ErrorKind::ApiOverloaded => ErrorClass::Transient,
            ErrorKind::Authentication => ErrorClass::AuthRequired,
            ErrorKind::NotFound
            | ErrorKind::BadRequest
            | ErrorKind::InternalError
            | ErrorKind::UnexpectedResponse
            | ErrorKind::ContentFiltered
            | ErrorKind::UnsupportedOperation
            | ErrorKind::UnspecifiedError => ErrorClass::Permanent,
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded",
            ErrorKind::ApiOverloaded => "API server(s) are currently overloaded",
            ErrorKind::NotFound => "the requested model was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the server encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::ContentFiltered => "the content was rejected by the provider's filter",
            ErrorKind::UnsupportedOperation => "the provider does not support this operation",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message(), source),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// The ID of the model. This must be an acceptable parameter to
    /// [`MediaProvider::generate`].
    pub id: String,
    /// The operation this model performs.
    pub operation: Operation,
}

impl Model {
    pub(crate) fn new(id: &str, operation: Operation) -> Model {
        Model {
            id: id.to_string(),
            operation,
        }
    }
}

/// The vendor-neutral part of a generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub prompt: &'a str,
    pub operation: Operation,
    pub source_image: Option<&'a str>,
}

/// A trait implemented by all media providers.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderIdentifier;

    /// Returns the models this provider serves. The first model listed for an
    /// operation is the provider's default for that operation.
    fn models(&self) -> &[Model];

    /// Returns the default model for `operation`, or None if the provider
    /// does not perform it.
    fn default_model(&self, operation: Operation) -> Option<&Model> {
        self.models().iter().find(|m| m.operation == operation)
    }

    fn supports(&self, operation: Operation) -> bool {
        self.default_model(operation).is_some()
    }

    /// Issues exactly one request to the vendor and normalizes the answer.
    ///
    /// `model`: The id of the model.
    /// `input`: The prompt and operation.
    async fn generate(
        &self,
        model: &str,
        input: &GenerationInput<'_>,
    ) -> Result<CanonicalMediaResult, Error>;
}
