//! An umbrella module for the Stability AI provider

mod api;
mod provider;

pub(crate) use self::provider::StabilityProvider;
