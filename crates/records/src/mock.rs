//! In-memory record store for testing.

use crate::error::{ErrorKind, Result};
use crate::models::MaterialRow;
use crate::store::{RecordStore, generate_id};
use async_trait::async_trait;
use revisit_priority::models::{Material, MaterialId, NewMaterial};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory record store for testing.
///
/// Materials go through the same row conversion as the SQLite repository,
/// so timestamps come back with whole-second precision. Every trait call is
/// counted and writes can be made to fail on demand.
#[derive(Default)]
pub struct MockRecords {
    // Insertion order.
    materials: RwLock<Vec<Material>>,
    calls: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockRecords {
    /// Make every subsequent insert fail with a database error.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent update fail with a database error.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail with a database error.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of trait calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of materials currently stored.
    pub async fn len(&self) -> usize {
        self.materials.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    async fn list_all(&self) -> Result<Vec<Material>> {
        self.record_call();
        let mut materials = self.materials.read().await.clone();
        materials.reverse();
        // Stable, so equal dates stay newest-inserted first.
        materials.sort_by(|a, b| b.date_added.cmp(&a.date_added));
        Ok(materials)
    }

    async fn get(&self, id: &MaterialId) -> Result<Option<Material>> {
        self.record_call();
        Ok(self.materials.read().await.iter().find(|m| &m.id == id).cloned())
    }

    async fn insert(&self, new: NewMaterial) -> Result<Material> {
        self.record_call();
        if self.fail_inserts.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        let material = Material::try_from(MaterialRow::try_from(&Material::new(generate_id(), new))?)?;
        let mut guard = self.materials.write().await;
        if guard.iter().any(|m| m.storage_path == material.storage_path) {
            exn::bail!(ErrorKind::Database);
        }
        guard.push(material.clone());
        Ok(material)
    }

    async fn update(&self, material: &Material, expected_revision_count: u32) -> Result<Material> {
        self.record_call();
        if self.fail_updates.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        let incoming = Material::try_from(MaterialRow::try_from(material)?)?;
        let mut guard = self.materials.write().await;
        let Some(stored) = guard.iter_mut().find(|m| m.id == material.id) else {
            exn::bail!(ErrorKind::NotFound(material.id.clone()));
        };
        if stored.revision_count != expected_revision_count {
            exn::bail!(ErrorKind::Conflict(material.id.clone()));
        }
        stored.last_revised = incoming.last_revised;
        stored.revision_count = incoming.revision_count;
        stored.last_score = incoming.last_score;
        stored.revision_history = incoming.revision_history;
        Ok(stored.clone())
    }

    async fn delete(&self, id: &MaterialId) -> Result<()> {
        self.record_call();
        if self.fail_deletes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        let mut guard = self.materials.write().await;
        let Some(index) = guard.iter().position(|m| &m.id == id) else {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        };
        guard.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_priority::models::Score;
    use time::UtcDateTime;

    fn upload(name: &str) -> NewMaterial {
        NewMaterial {
            filename: name.to_string(),
            storage_path: format!("1767225600000_a1b2c3d4_{name}"),
            date_added: UtcDateTime::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_update_delete() {
        let store = MockRecords::default();
        let mut material = store.insert(upload("notes.pdf")).await.unwrap();
        material.revise(UtcDateTime::now(), Score::Okay);
        let updated = store.update(&material, 0).await.unwrap();
        assert_eq!(updated.revision_count, 1);
        let err = store.update(&material, 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        store.delete(&material.id).await.unwrap();
        assert!(store.is_empty().await);
        // Inspecting the contents is not a store call.
        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MockRecords::default();
        store.fail_inserts(true);
        assert!(store.insert(upload("notes.pdf")).await.is_err());
        assert!(store.is_empty().await);
    }
}
