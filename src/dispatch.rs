//! Request dispatch.
//!
//! The [`Dispatcher`] owns the provider table, the cost table, a balance store
//! and the persistence bridge. A request flows through them in a fixed order:
//! validation, provider selection, pricing and the balance check, exactly one
//! provider call, persistence and finally the debit. Failures before the debit
//! never charge the account.
//!
//! Every request yields a [`GenerationOutcome`]. Nothing is raised to the
//! caller; the outcome carries a stable error code instead.

pub mod dispatcher;
pub mod outcome;

pub use dispatcher::{DispatchSettings, Dispatcher, ModelListing};
pub use outcome::{DispatchError, ErrorKind, GenerationOutcome, Warning};
