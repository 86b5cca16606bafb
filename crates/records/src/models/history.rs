use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use revisit_priority::models::{RevisionEntry, Score};
use time::UtcDateTime;

/// JSON shape of one entry in the `revision_history` column.
#[derive(facet::Facet)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct RevisionEntryProxy {
    /// Unix timestamp (seconds).
    date: i64,
    score: u8,
}
impl From<&RevisionEntry> for RevisionEntryProxy {
    fn from(entry: &RevisionEntry) -> Self {
        Self {
            date: entry.date.unix_timestamp(),
            score: entry.score.value(),
        }
    }
}
impl TryFrom<RevisionEntryProxy> for RevisionEntry {
    type Error = Error;
    fn try_from(proxy: RevisionEntryProxy) -> Result<Self, Self::Error> {
        Ok(Self {
            date: UtcDateTime::from_unix_timestamp(proxy.date).or_raise(|| ErrorKind::InvalidData("revision date"))?,
            score: Score::try_from(proxy.score).or_raise(|| ErrorKind::InvalidData("revision score"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_json::{from_str as from_json, to_string as to_json};

    #[test]
    fn test_history_json_shape() {
        let entries = vec![
            RevisionEntryProxy { date: 1_767_225_600, score: 1 },
            RevisionEntryProxy { date: 1_767_312_000, score: 3 },
        ];
        let json = to_json(&entries).unwrap();
        assert_eq!(json, r#"[{"date":1767225600,"score":1},{"date":1767312000,"score":3}]"#);
        assert_eq!(from_json::<Vec<RevisionEntryProxy>>(&json).unwrap(), entries);
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let err = RevisionEntry::try_from(RevisionEntryProxy { date: 0, score: 4 }).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("revision score")));
    }
}
