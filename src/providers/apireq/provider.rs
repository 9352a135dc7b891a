//! Conversions between request errors and provider error types

use crate::media::MediaError;
use crate::providers::apireq::{error::ErrorKind as ReqwestErrorKind, ReqwestError};
use crate::providers::{Error, ErrorKind};

impl From<ReqwestError> for Error {
    fn from(value: ReqwestError) -> Self {
        let kind: ErrorKind = match &value.kind() {
            ReqwestErrorKind::ConnectFailed => ErrorKind::Connection,
            ReqwestErrorKind::DecodingFailed
            | ReqwestErrorKind::BodyFailed
            | ReqwestErrorKind::RedirectPolicyViolated => ErrorKind::UnexpectedResponse,
            ReqwestErrorKind::TimedOut => ErrorKind::TimedOut,
            ReqwestErrorKind::InvalidRequest => ErrorKind::BadRequest,
            ReqwestErrorKind::UnknownReqwestError => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}

impl From<MediaError> for Error {
    fn from(value: MediaError) -> Self {
        Error::from_source(ErrorKind::UnexpectedResponse, Box::new(value))
    }
}

/// The MIME type of a raw image body. A missing or generic `Content-Type`
/// falls back to `default`; anything other than an image is an unexpected
/// response, typically an error page sent with a success status.
pub(crate) fn image_mime_type(content_type: Option<String>, default: &str) -> Result<String, Error> {
    match content_type {
        None => Ok(default.to_string()),
        Some(essence) if essence == "application/octet-stream" => Ok(default.to_string()),
        Some(essence) if essence.starts_with("image/") => Ok(essence),
        Some(essence) => Err(Error::from_source(
            ErrorKind::UnexpectedResponse,
            format!("expected an image but received \"{}\"", essence).into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(None, "image/jpeg").unwrap(), "image/jpeg");
        assert_eq!(
            image_mime_type(Some("application/octet-stream".to_string()), "image/jpeg").unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            image_mime_type(Some("image/webp".to_string()), "image/jpeg").unwrap(),
            "image/webp"
        );

        let err = image_mime_type(Some("text/html".to_string()), "image/jpeg").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnexpectedResponse);
    }
}
