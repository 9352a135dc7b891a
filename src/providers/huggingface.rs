//! An umbrella module for the Hugging Face inference provider

mod api;
mod provider;

pub(crate) use self::provider::HuggingFaceProvider;
