//! The registry handles provider and model resolution. It is a database populated
//! with the available providers and their models. Only providers with a credential
//! are inserted into the registry, along with the credential-free fallback which is
//! always present.
//!
//! Each provider is assigned a "priority", an eight bit unsigned number where lower
//! values are preferred. The fallback sits at the bottom so that it only serves
//! requests nothing else can serve. Ties between equal priorities are broken by
//! the provider identifier order.
//!
//! The [`selector::Selector`] is built once from a populated registry. It picks a
//! provider for a request ("auto" or an explicit provider) and a model (a hint or
//! the provider's default for the operation). Selection is pure, it never touches
//! the network.

pub mod populate;
pub mod registry;
pub mod selector;

mod default_priority;
