//! Study material library.
//!
//! Ties the blob store ([`revisit_storage`]) and the record store
//! ([`revisit_records`]) together and ranks the result with
//! [`revisit_priority`]. The stores are injected as trait handles, so the
//! same [`Library`] runs against local files and SQLite, S3, or in-memory
//! mocks in tests.

pub mod error;
mod key;
mod library;
mod orphans;

pub use crate::key::{basename, storage_key};
pub use crate::library::{Library, Upload};
