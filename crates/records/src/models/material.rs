use super::RevisionEntryProxy;
use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use facet_json::{from_str as from_json, to_string as to_json};
use revisit_priority::models::{Material, MaterialId, RevisionEntry, Score};
use time::UtcDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct MaterialRow {
    pub(crate) id: String,
    pub(crate) filename: String,
    pub(crate) storage_path: String,
    pub(crate) date_added: i64,
    pub(crate) last_revised: i64,
    pub(crate) revision_count: i64,
    pub(crate) last_score: Option<i64>,
    pub(crate) revision_history: String,
}
impl TryFrom<&Material> for MaterialRow {
    type Error = Error;
    fn try_from(material: &Material) -> Result<Self, Self::Error> {
        if !material.is_consistent() {
            exn::bail!(ErrorKind::InvalidData("revision history"));
        }
        let history: Vec<RevisionEntryProxy> = material.revision_history.iter().map(Into::into).collect();
        Ok(Self {
            id: material.id.to_string(),
            filename: material.filename.clone(),
            storage_path: material.storage_path.clone(),
            date_added: material.date_added.unix_timestamp(),
            last_revised: material.last_revised.unix_timestamp(),
            revision_count: i64::from(material.revision_count),
            last_score: material.last_score.map(|score| i64::from(score.value())),
            revision_history: to_json(&history).or_raise(|| ErrorKind::InvalidData("revision history"))?,
        })
    }
}
impl TryFrom<MaterialRow> for Material {
    type Error = Error;
    fn try_from(row: MaterialRow) -> Result<Self, Self::Error> {
        let revision_history = from_json::<Vec<RevisionEntryProxy>>(&row.revision_history)
            .or_raise(|| ErrorKind::InvalidData("revision history"))?
            .into_iter()
            .map(RevisionEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let material = Self {
            id: MaterialId::from(row.id),
            filename: row.filename,
            storage_path: row.storage_path,
            date_added: UtcDateTime::from_unix_timestamp(row.date_added)
                .or_raise(|| ErrorKind::InvalidData("date added"))?,
            last_revised: UtcDateTime::from_unix_timestamp(row.last_revised)
                .or_raise(|| ErrorKind::InvalidData("last revised"))?,
            revision_count: u32::try_from(row.revision_count).or_raise(|| ErrorKind::InvalidData("revision count"))?,
            last_score: row
                .last_score
                .map(Score::try_from)
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("last score"))?,
            revision_history,
        };
        if !material.is_consistent() {
            exn::bail!(ErrorKind::InvalidData("revision history"));
        }
        Ok(material)
    }
}
