use super::Score;
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::UtcDateTime;

/// Opaque identifier assigned by the record store when a material is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(String);
impl MaterialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl From<String> for MaterialId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl From<&str> for MaterialId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
impl AsRef<str> for MaterialId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Display for MaterialId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

/// A single rating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevisionEntry {
    pub date: UtcDateTime,
    pub score: Score,
}

/// Fields supplied when a freshly uploaded file is recorded.
///
/// Everything else about a new [`Material`] is implied: no revisions yet,
/// no score, and "last revised" starts out as the date it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMaterial {
    /// Original file name, display only.
    pub filename: String,
    /// Key of the uploaded bytes in the blob store.
    pub storage_path: String,
    pub date_added: UtcDateTime,
}

/// One uploaded PDF and its revision metadata.
///
/// The denormalized fields (`last_revised`, `revision_count`, `last_score`)
/// always mirror the tail of `revision_history`; [`revise()`](Self::revise)
/// is the only mutation and keeps them in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub id: MaterialId,
    pub filename: String,
    pub storage_path: String,
    pub date_added: UtcDateTime,
    pub last_revised: UtcDateTime,
    pub revision_count: u32,
    pub last_score: Option<Score>,
    /// Append-only, oldest first.
    pub revision_history: Vec<RevisionEntry>,
}
impl Material {
    /// Build the record for a material that has never been revised.
    pub fn new(id: impl Into<MaterialId>, new: NewMaterial) -> Self {
        Self {
            id: id.into(),
            filename: new.filename,
            storage_path: new.storage_path,
            date_added: new.date_added,
            last_revised: new.date_added,
            revision_count: 0,
            last_score: None,
            revision_history: Vec::new(),
        }
    }

    /// Record a rating event.
    pub fn revise(&mut self, at: UtcDateTime, score: Score) {
        self.revision_history.push(RevisionEntry { date: at, score });
        self.revision_count = self.revision_count.saturating_add(1);
        self.last_revised = at;
        self.last_score = Some(score);
    }

    /// Whether the denormalized fields agree with the revision history.
    pub fn is_consistent(&self) -> bool {
        let count_matches = usize::try_from(self.revision_count).is_ok_and(|c| c == self.revision_history.len());
        match self.revision_history.last() {
            Some(last) => count_matches && self.last_score == Some(last.score) && self.last_revised == last.date,
            None => count_matches && self.last_score.is_none() && self.last_revised == self.date_added,
        }
    }
}
impl AsRef<Material> for Material {
    fn as_ref(&self) -> &Material {
        self
    }
}
