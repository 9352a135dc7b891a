//! Persistence of generated media.
//!
//! Vendors hand back either a reference (a hosted URL or a data URI) or raw
//! bytes. References are already stable and pass through. Bytes are checked
//! against an allow-list of media types and uploaded to [`ObjectStorage`].
//! When storage is down the bytes are returned inline as a data URI so that a
//! paid-for generation is never lost.

pub mod bridge;
pub mod mime;
pub mod storage;

pub use bridge::{Persisted, PersistenceBridge};
pub use storage::{LocalDirectoryStorage, ObjectStorage, StorageError};
