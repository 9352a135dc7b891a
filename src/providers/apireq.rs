//! A utility module with helpers for making and parsing API requests.

mod error;
mod provider;
mod response;

pub(crate) use error::Error as ReqwestError;
pub(crate) use provider::image_mime_type;
pub(crate) use reqwest::Url;

pub(crate) use response::{content_type, endpoint, error_text};
