//! Terminal rendering of the ranked material list.

use clap::ValueEnum;
use comfy_table::{ContentArrangement, Table};
use revisit_priority::{Ranked, days_since_revision};
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::UtcDateTime;

/// Priorities above this are shown as high.
pub const HIGH_PRIORITY_THRESHOLD: f64 = 10.0;
/// Priorities above this (and not high) are shown as medium.
pub const MEDIUM_PRIORITY_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    High,
    Medium,
    Low,
}
impl Tier {
    pub fn of(priority: f64) -> Self {
        if priority > HIGH_PRIORITY_THRESHOLD {
            Self::High
        } else if priority > MEDIUM_PRIORITY_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}

pub fn format_time_ago(days: u64) -> String {
    match days {
        0 => "Today".to_string(),
        1 => "1 day ago".to_string(),
        n => format!("{n} days ago"),
    }
}

/// Column to order the list by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    #[default]
    Priority,
    Name,
    Revisions,
    /// Days since last revision.
    Date,
}

/// Reorder an already ranked list. Descending unless `ascending`; ties keep
/// their ranked order.
pub fn sort(materials: &mut [Ranked], key: SortKey, ascending: bool, now: UtcDateTime) {
    materials.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Priority => a.priority.total_cmp(&b.priority),
            SortKey::Name => {
                a.filename.to_lowercase().cmp(&b.filename.to_lowercase()).then_with(|| a.filename.cmp(&b.filename))
            },
            SortKey::Revisions => a.revision_count.cmp(&b.revision_count),
            SortKey::Date => days_since_revision(a, now).cmp(&days_since_revision(b, now)),
        };
        if ascending { ordering } else { ordering.reverse() }
    });
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}
impl Stats {
    pub fn of(materials: &[Ranked]) -> Self {
        materials.iter().fold(Self::default(), |mut stats, material| {
            stats.total += 1;
            match Tier::of(material.priority) {
                Tier::High => stats.high += 1,
                Tier::Medium => stats.medium += 1,
                Tier::Low => stats.low += 1,
            }
            stats
        })
    }
}
impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} materials: {} high, {} medium, {} low priority",
            self.total, self.high, self.medium, self.low
        )
    }
}

/// One row per material, in the given order. Long names wrap to fit the
/// terminal.
pub fn table(materials: &[Ranked], now: UtcDateTime) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "ID", "Name", "Priority", "Tier", "Last revised", "Revisions", "Score"]);
    for (index, material) in materials.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            material.id.to_string(),
            material.filename.clone(),
            format!("{:.1}", material.priority),
            Tier::of(material.priority).to_string(),
            format_time_ago(days_since_revision(material, now)),
            material.revision_count.to_string(),
            material.last_score.map_or("-", |score| score.label()).to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_priority::models::{Material, NewMaterial, Score};
    use revisit_priority::{PriorityConfig, rank_all};
    use rstest::rstest;
    use time::Duration;

    fn material(name: &str, last_revised: UtcDateTime, revisions: &[Score]) -> Material {
        let mut material = Material::new(
            name,
            NewMaterial {
                filename: name.to_string(),
                storage_path: format!("1767225600000_a1b2c3d4_{name}"),
                date_added: last_revised - Duration::days(revisions.len() as i64),
            },
        );
        for (i, score) in revisions.iter().enumerate() {
            let at = material.date_added + Duration::days(i as i64 + 1);
            material.revise(at, *score);
        }
        material
    }

    fn ranked(now: UtcDateTime) -> Vec<Ranked> {
        rank_all(
            vec![
                // (1 day) 1 × 2 × 1 = 2.00
                material("beta.pdf", now, &[]),
                // 5^1.2 × 3 × 1/3 = 6.90
                material("Alpha.pdf", now - Duration::days(5), &[Score::Okay, Score::Hard]),
                // 20^1.2 × 2 × 1 = 72.83
                material("gamma.pdf", now - Duration::days(20), &[]),
            ],
            now,
            &PriorityConfig::default(),
        )
    }

    #[rstest]
    #[case(10.01, Tier::High)]
    #[case(10.0, Tier::Medium)]
    #[case(5.01, Tier::Medium)]
    #[case(5.0, Tier::Low)]
    #[case(0.0, Tier::Low)]
    fn test_tiers(#[case] priority: f64, #[case] expected: Tier) {
        assert_eq!(Tier::of(priority), expected);
    }

    #[rstest]
    #[case(0, "Today")]
    #[case(1, "1 day ago")]
    #[case(2, "2 days ago")]
    #[case(45, "45 days ago")]
    fn test_format_time_ago(#[case] days: u64, #[case] expected: &str) {
        assert_eq!(format_time_ago(days), expected);
    }

    #[rstest]
    #[case(SortKey::Priority, false, ["gamma.pdf", "Alpha.pdf", "beta.pdf"])]
    #[case(SortKey::Priority, true, ["beta.pdf", "Alpha.pdf", "gamma.pdf"])]
    #[case(SortKey::Name, true, ["Alpha.pdf", "beta.pdf", "gamma.pdf"])]
    #[case(SortKey::Revisions, false, ["Alpha.pdf", "gamma.pdf", "beta.pdf"])]
    #[case(SortKey::Date, false, ["gamma.pdf", "Alpha.pdf", "beta.pdf"])]
    fn test_sort(#[case] key: SortKey, #[case] ascending: bool, #[case] expected: [&str; 3]) {
        let now = UtcDateTime::now();
        let mut materials = ranked(now);
        sort(&mut materials, key, ascending, now);
        let names: Vec<_> = materials.iter().map(|m| m.filename.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_stats() {
        let now = UtcDateTime::now();
        assert_eq!(Stats::of(&ranked(now)), Stats { total: 3, high: 1, medium: 1, low: 1 });
        assert_eq!(Stats::of(&[]).to_string(), "0 materials: 0 high, 0 medium, 0 low priority");
    }

    #[test]
    fn test_table() {
        let now = UtcDateTime::now();
        let rendered = table(&ranked(now), now).to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.iter().filter(|l| l.contains(".pdf")).count(), 3);
        assert!(lines.iter().any(|l| l.contains("Priority") && l.contains("Last revised")));
        let row = |name: &str| lines.iter().position(|l| l.contains(name)).unwrap();
        let (gamma, alpha, beta) = (row("gamma.pdf"), row("Alpha.pdf"), row("beta.pdf"));
        assert!(gamma < alpha && alpha < beta);
        assert!(lines[gamma].contains("72.8") && lines[gamma].contains("20 days ago") && lines[gamma].contains("high"));
        assert!(lines[alpha].contains("6.9") && lines[alpha].contains("medium") && lines[alpha].contains("Hard"));
        assert!(lines[beta].contains("Today") && lines[beta].contains("low") && lines[beta].contains(" - "));
    }
}
