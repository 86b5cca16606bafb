//! SQLite-backed record store.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::MaterialRow;
use crate::store::{RecordStore, generate_id};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use revisit_priority::models::{Material, MaterialId, NewMaterial};
use sqlx::SqlitePool;
use tracing::instrument;

/// Repository for materials in the SQLite database.
///
/// The revision history is stored as a JSON column alongside the
/// denormalized `last_revised`, `revision_count` and `last_score` columns,
/// and `revision_count` doubles as the row version for optimistic
/// concurrency.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: &MaterialId) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(include_str!("../queries/exists_by_id.sql"))
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(found != 0)
    }
}

#[async_trait]
impl RecordStore for Repository {
    #[instrument(level = "debug", skip(self))]
    async fn list_all(&self) -> Result<Vec<Material>> {
        let rows: Vec<MaterialRow> = sqlx::query_as(include_str!("../queries/list_all.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Material::try_from).collect()
    }

    #[instrument(level = "debug", skip(self), fields(id = %id))]
    async fn get(&self, id: &MaterialId) -> Result<Option<Material>> {
        let row: Option<MaterialRow> = sqlx::query_as(include_str!("../queries/get_by_id.sql"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Material::try_from).transpose()
    }

    #[instrument(level = "debug", skip_all, fields(filename = %new.filename))]
    async fn insert(&self, new: NewMaterial) -> Result<Material> {
        let material = Material::new(generate_id(), new);
        let row = MaterialRow::try_from(&material)?;
        sqlx::query(include_str!("../queries/insert.sql"))
            .bind(&row.id)
            .bind(&row.filename)
            .bind(&row.storage_path)
            .bind(row.date_added)
            .bind(row.last_revised)
            .bind(row.revision_count)
            .bind(row.last_score)
            .bind(&row.revision_history)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tracing::debug!(id = %material.id, "material recorded");
        Material::try_from(row)
    }

    #[instrument(level = "debug", skip_all, fields(id = %material.id, expected = expected_revision_count))]
    async fn update(&self, material: &Material, expected_revision_count: u32) -> Result<Material> {
        let row = MaterialRow::try_from(material)?;
        let result = sqlx::query(include_str!("../queries/update_revision.sql"))
            .bind(row.last_revised)
            .bind(row.revision_count)
            .bind(row.last_score)
            .bind(&row.revision_history)
            .bind(&row.id)
            .bind(i64::from(expected_revision_count))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            if self.exists(&material.id).await? {
                exn::bail!(ErrorKind::Conflict(material.id.clone()));
            }
            exn::bail!(ErrorKind::NotFound(material.id.clone()));
        }
        self.get(&material.id).await?.ok_or_raise(|| ErrorKind::NotFound(material.id.clone()))
    }

    #[instrument(level = "debug", skip(self), fields(id = %id))]
    async fn delete(&self, id: &MaterialId) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/delete_by_id.sql"))
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_priority::models::Score;
    use time::{Duration, UtcDateTime};

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn upload(name: &str, date_added: UtcDateTime) -> NewMaterial {
        NewMaterial {
            filename: name.to_string(),
            storage_path: format!("{}_a1b2c3d4_{name}", date_added.unix_timestamp() * 1000),
            date_added,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = repo().await;
        let added = UtcDateTime::now();
        let material = repo.insert(upload("Organic Chemistry.pdf", added)).await.unwrap();
        assert_eq!(material.revision_count, 0);
        assert_eq!(material.last_score, None);
        assert_eq!(material.last_revised, material.date_added);
        assert_eq!(material.date_added.unix_timestamp(), added.unix_timestamp());
        assert_eq!(repo.get(&material.id).await.unwrap(), Some(material));
    }

    #[tokio::test]
    async fn test_insert_assigns_unique_ids() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        let a = repo.insert(upload("a.pdf", now)).await.unwrap();
        let b = repo.insert(upload("b.pdf", now + Duration::seconds(1))).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_duplicate_storage_path_rejected() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        repo.insert(upload("a.pdf", now)).await.unwrap();
        let err = repo.insert(upload("a.pdf", now)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Database));
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let repo = repo().await;
        assert_eq!(repo.get(&MaterialId::from("missing")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let repo = repo().await;
        let now = UtcDateTime::now();
        repo.insert(upload("old.pdf", now - Duration::days(10))).await.unwrap();
        repo.insert(upload("new.pdf", now)).await.unwrap();
        repo.insert(upload("mid.pdf", now - Duration::days(5))).await.unwrap();
        let names: Vec<_> = repo.list_all().await.unwrap().into_iter().map(|m| m.filename).collect();
        assert_eq!(names, ["new.pdf", "mid.pdf", "old.pdf"]);
    }

    #[tokio::test]
    async fn test_update_appends_revision() {
        let repo = repo().await;
        let mut material = repo.insert(upload("Physics.pdf", UtcDateTime::now() - Duration::days(3))).await.unwrap();
        let expected = material.revision_count;
        material.revise(UtcDateTime::now(), Score::Hard);
        let updated = repo.update(&material, expected).await.unwrap();
        assert_eq!(updated.revision_count, 1);
        assert_eq!(updated.last_score, Some(Score::Hard));
        assert_eq!(updated.revision_history.len(), 1);
        assert_eq!(repo.get(&material.id).await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_update_conflict() {
        let repo = repo().await;
        let original = repo.insert(upload("Physics.pdf", UtcDateTime::now())).await.unwrap();

        let mut first = original.clone();
        first.revise(UtcDateTime::now(), Score::Easy);
        repo.update(&first, 0).await.unwrap();

        let mut second = original.clone();
        second.revise(UtcDateTime::now(), Score::Hard);
        let err = repo.update(&second, 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conflict(_)));
        assert!(err.is_retryable());

        let stored = repo.get(&original.id).await.unwrap().unwrap();
        assert_eq!(stored.last_score, Some(Score::Easy));
        assert_eq!(stored.revision_count, 1);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let repo = repo().await;
        let mut material = Material::new("missing", upload("x.pdf", UtcDateTime::now()));
        material.revise(UtcDateTime::now(), Score::Okay);
        let err = repo.update(&material, 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_identity_fields() {
        let repo = repo().await;
        let original = repo.insert(upload("Physics.pdf", UtcDateTime::now())).await.unwrap();
        let mut changed = original.clone();
        changed.filename = "Renamed.pdf".to_string();
        changed.revise(UtcDateTime::now(), Score::Okay);
        let updated = repo.update(&changed, 0).await.unwrap();
        assert_eq!(updated.filename, original.filename);
        assert_eq!(updated.storage_path, original.storage_path);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = repo().await;
        let material = repo.insert(upload("Physics.pdf", UtcDateTime::now())).await.unwrap();
        repo.delete(&material.id).await.unwrap();
        assert_eq!(repo.get(&material.id).await.unwrap(), None);
        let err = repo.delete(&material.id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
