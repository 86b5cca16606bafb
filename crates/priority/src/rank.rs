use crate::models::Material;
use crate::priority::{PriorityConfig, calculate_priority};
use std::cmp::Ordering;
use std::ops::Deref;
use time::UtcDateTime;
use tracing::instrument;

/// A [`Material`] annotated with its computed priority.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
    pub material: Material,
    pub priority: f64,
}
impl Deref for Ranked {
    type Target = Material;
    fn deref(&self) -> &Material {
        &self.material
    }
}

/// Attach a priority to every material and sort by descending priority.
///
/// The sort is stable: materials with equal priority keep the order they
/// were given in (newest upload first, when coming straight from the record
/// store).
#[instrument(level = "debug", skip_all, fields(materials = materials.len()))]
pub fn rank_all(materials: Vec<Material>, now: UtcDateTime, config: &PriorityConfig) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = materials
        .into_iter()
        .map(|material| {
            let priority = calculate_priority(&material, now, config);
            Ranked { material, priority }
        })
        .collect();
    ranked.sort_by(|a, b| descending(a.priority, b.priority));
    ranked
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMaterial, Score};
    use time::Duration;

    fn now() -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_767_225_600).unwrap()
    }

    fn material(id: &str, days_ago: i64, score: Option<Score>) -> Material {
        let added = now() - Duration::days(days_ago);
        let mut material = Material::new(
            id,
            NewMaterial {
                filename: format!("{id}.pdf"),
                storage_path: format!("1_abcdefgh_{id}.pdf"),
                date_added: added,
            },
        );
        if let Some(score) = score {
            material.revise(added, score);
        }
        material
    }

    #[test]
    fn test_sorted_descending() {
        let materials = vec![
            material("fresh", 0, None),
            material("stale-hard", 30, Some(Score::Hard)),
            material("week-easy", 7, Some(Score::Easy)),
        ];
        let ranked = rank_all(materials, now(), &PriorityConfig::default());
        let ids: Vec<_> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["stale-hard", "week-easy", "fresh"]);
        assert!(ranked.windows(2).all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn test_is_a_permutation_with_priorities() {
        let materials: Vec<_> = (0..10).map(|i| material(&format!("m{i}"), i * 3 % 7, None)).collect();
        let ranked = rank_all(materials.clone(), now(), &PriorityConfig::default());
        assert_eq!(ranked.len(), materials.len());
        for original in &materials {
            let found = ranked.iter().find(|r| r.id == original.id).unwrap();
            assert_eq!(&found.material, original);
            assert_eq!(found.priority, calculate_priority(original, now(), &PriorityConfig::default()));
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let materials = vec![
            material("c", 2, Some(Score::Okay)),
            material("a", 2, Some(Score::Okay)),
            material("b", 2, Some(Score::Okay)),
            material("z", 9, Some(Score::Hard)),
        ];
        let ranked = rank_all(materials, now(), &PriorityConfig::default());
        let ids: Vec<_> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["z", "c", "a", "b"]);
    }

    #[test]
    fn test_empty() {
        assert!(rank_all(vec![], now(), &PriorityConfig::default()).is_empty());
    }
}
