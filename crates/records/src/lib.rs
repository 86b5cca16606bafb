//! Persistent records of uploaded study materials.
//!
//! Each record describes one uploaded PDF: where its bytes live in the blob
//! store and how often (and how well) it has been revised. The record store
//! is the source of truth for what the library contains; blobs without a
//! record are orphans.
//!
//! Two implementations of [`RecordStore`] are provided: [`Repository`] on
//! top of SQLite, and (behind the `mock` feature) an in-memory
//! [`MockRecords`] for tests in other crates.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod models;
mod repo;
mod store;

pub use crate::db::Database;
#[cfg(feature = "mock")]
pub use crate::mock::MockRecords;
pub use crate::repo::Repository;
pub use crate::store::{RecordHandle, RecordStore};
