//! An umbrella module for the Replicate provider

mod api;
mod provider;

pub(crate) use self::provider::ReplicateProvider;
