//! Record store trait.

use crate::error::Result;
use async_trait::async_trait;
use revisit_priority::models::{Material, MaterialId, NewMaterial};
use std::sync::Arc;

/// Shared handle to a record store.
pub type RecordHandle = Arc<dyn RecordStore + Send + Sync>;

/// Persistence for [`Material`] records.
///
/// The store assigns identifiers and guards against lost updates: a material
/// may only be written back if nobody has rated it since it was read.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All materials, most recently added first.
    async fn list_all(&self) -> Result<Vec<Material>>;

    /// A single material, or `None` if the id is unknown.
    async fn get(&self, id: &MaterialId) -> Result<Option<Material>>;

    /// Record a freshly uploaded file and return it with its new id.
    ///
    /// The returned material is exactly what a later [`get()`](Self::get)
    /// would return (timestamps have whole-second precision).
    async fn insert(&self, new: NewMaterial) -> Result<Material>;

    /// Write back the revision fields of `material`.
    ///
    /// Succeeds only if the stored revision count still equals
    /// `expected_revision_count`; otherwise fails with
    /// [`Conflict`](crate::error::ErrorKind::Conflict). Unknown ids fail with
    /// [`NotFound`](crate::error::ErrorKind::NotFound). Identity fields
    /// (`filename`, `storage_path`, `date_added`) are never changed.
    async fn update(&self, material: &Material, expected_revision_count: u32) -> Result<Material>;

    /// Remove a material.
    ///
    /// Fails with [`NotFound`](crate::error::ErrorKind::NotFound) if the id is
    /// unknown.
    async fn delete(&self, id: &MaterialId) -> Result<()>;
}

/// Generate a fresh material identifier.
pub(crate) fn generate_id() -> MaterialId {
    MaterialId::from(uuid::Uuid::new_v4().to_string())
}
