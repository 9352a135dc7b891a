//! Reqwest's error type, condensed into a kind that can be matched exhaustively

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    ConnectFailed,
    TimedOut,
    DecodingFailed,
    BodyFailed,
    RedirectPolicyViolated,
    /// The request could not be built, usually a malformed URL or header
    InvalidRequest,
    UnknownReqwestError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: reqwest::Error,
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // A body read that times out is also a body error, so timeouts go first
        let kind = if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_connect() {
            ErrorKind::ConnectFailed
        } else if err.is_decode() {
            ErrorKind::DecodingFailed
        } else if err.is_body() {
            ErrorKind::BodyFailed
        } else if err.is_redirect() {
            ErrorKind::RedirectPolicyViolated
        } else if err.is_builder() {
            ErrorKind::InvalidRequest
        } else {
            ErrorKind::UnknownReqwestError
        };

        Error { kind, source: err }
    }
}

impl Error {
    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ErrorKind::ConnectFailed => "connection failed",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::DecodingFailed => "decoding failed",
            ErrorKind::BodyFailed => "failed to read the response body",
            ErrorKind::RedirectPolicyViolated => "redirect policy violated",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::UnknownReqwestError => "unknown reqwest error",
        };

        match self.source.url().and_then(|url| url.host_str()) {
            Some(host) => write!(f, "{} ({})", what, host),
            None => f.write_str(what),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection() {
        // Nothing listens on port 1
        let err = reqwest::get("http://127.0.0.1:1/").await.unwrap_err();

        let err = Error::from(err);

        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert_eq!(err.to_string(), "connection failed (127.0.0.1)");
    }
}
