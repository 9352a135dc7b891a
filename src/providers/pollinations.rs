//! An umbrella module for the Pollinations provider. Pollinations needs no
//! credential, which makes it the provider of last resort.

mod api;
mod provider;

pub(crate) use self::provider::PollinationsProvider;
