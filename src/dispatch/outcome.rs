use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::media::{CanonicalMediaResult, ValidationError};
use crate::metering::Balance;
use crate::providers::{self, providers::ProviderIdentifier, ErrorClass};

/// The category of a failed (or degraded) dispatch. Each kind has a stable
/// code which callers may match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    InsufficientCredits,
    ProviderUnavailable,
    ProviderError(ErrorClass),
    StorageUnavailable,
    Cancelled,
    InternalError,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::InsufficientCredits => "insufficient_credits",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::ProviderError(ErrorClass::Transient) => "provider_error.transient",
            ErrorKind::ProviderError(ErrorClass::Permanent) => "provider_error.permanent",
            ErrorKind::ProviderError(ErrorClass::AuthRequired) => "provider_error.auth_required",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("the request costs {cost} credits but the balance is {balance}")]
    InsufficientCredits { cost: u64, balance: u64 },
    #[error("{0}")]
    ProviderUnavailable(String),
    #[error(transparent)]
    Provider(#[from] providers::Error),
    #[error("the generation was cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Validation(_) => ErrorKind::ValidationError,
            DispatchError::InsufficientCredits { .. } => ErrorKind::InsufficientCredits,
            DispatchError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            DispatchError::Provider(err) => ErrorKind::ProviderError(err.class()),
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

/// A problem which did not fail the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: ErrorKind,
    pub message: String,
}

/// What a dispatch produced. Built once per request and never modified
/// afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub success: bool,
    /// The persisted media, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<CanonicalMediaResult>,
    /// Set once a provider was chosen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub cost_charged: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<Balance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<Warning>,
}

impl GenerationOutcome {
    pub(crate) fn succeeded(
        media: CanonicalMediaResult,
        provider: ProviderIdentifier,
        model: String,
        cost_charged: u64,
        remaining_balance: Balance,
        warning: Option<Warning>,
    ) -> GenerationOutcome {
        GenerationOutcome {
            success: true,
            media: Some(media),
            provider: Some(provider),
            model: Some(model),
            cost_charged,
            remaining_balance: Some(remaining_balance),
            error_kind: None,
            message: None,
            warning,
        }
    }

    pub(crate) fn failed(err: &DispatchError) -> GenerationOutcome {
        GenerationOutcome {
            success: false,
            media: None,
            provider: None,
            model: None,
            cost_charged: 0,
            remaining_balance: None,
            error_kind: Some(err.kind()),
            message: Some(err.to_string()),
            warning: None,
        }
    }

    pub(crate) fn with_selection(mut self, provider: ProviderIdentifier, model: &str) -> Self {
        self.provider = Some(provider);
        self.model = Some(model.to_string());
        self
    }

    pub(crate) fn with_balance(mut self, balance: Balance) -> Self {
        self.remaining_balance = Some(balance);
        self
    }

    /// The stable code of the failure, if any.
    pub fn code(&self) -> Option<&'static str> {
        self.error_kind.map(|kind| kind.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Error, ErrorKind as ProviderErrorKind};

    #[test]
    fn test_codes() {
        assert_eq!(ErrorKind::ValidationError.code(), "validation_error");
        assert_eq!(
            ErrorKind::ProviderError(ErrorClass::AuthRequired).code(),
            "provider_error.auth_required"
        );
        assert_eq!(ErrorKind::StorageUnavailable.to_string(), "storage_unavailable");
    }

    #[test]
    fn test_provider_errors_keep_their_class() {
        let err: DispatchError = Error::from_kind(ProviderErrorKind::ApiOverloaded).into();

        assert_eq!(err.kind(), ErrorKind::ProviderError(ErrorClass::Transient));

        let outcome = GenerationOutcome::failed(&err);

        assert!(!outcome.success);
        assert_eq!(outcome.code(), Some("provider_error.transient"));
        assert_eq!(outcome.cost_charged, 0);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = GenerationOutcome::succeeded(
            CanonicalMediaResult::remote_url("https://cdn.example.com/a.png", "image/png"),
            ProviderIdentifier::OpenAI,
            "dall-e-3".to_string(),
            4,
            Balance::Limited(6),
            Some(Warning {
                kind: ErrorKind::StorageUnavailable,
                message: "bucket is gone".to_string(),
            }),
        );

        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["provider"], "openai");
        assert_eq!(value["remaining_balance"], 6);
        assert_eq!(value["warning"]["kind"], "storage_unavailable");
        assert!(value.get("error_kind").is_none());
    }
}
