//! Aggregates over stored resume data that feed the dashboard charts.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::resume::model::{Section, Skill};
use crate::resume::store::ResumeStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgCount {
    pub org: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub average_proficiency: f64,
}

/// Every dashboard aggregate, computed from one store snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub entries_per_year: Vec<YearCount>,
    pub entries_by_org: Vec<OrgCount>,
    pub skills_by_category: Vec<CategorySummary>,
}

impl MetricsSnapshot {
    pub fn compute(sections: &[Section], skills: &[Skill]) -> Self {
        Self {
            entries_per_year: entries_per_year(sections),
            entries_by_org: entries_by_org(sections),
            skills_by_category: skills_by_category(skills),
        }
    }
}

pub async fn load_metrics(store: &dyn ResumeStore) -> Result<MetricsSnapshot, AppError> {
    let snapshot = store.load_snapshot().await?;
    Ok(MetricsSnapshot::compute(&snapshot.sections, &snapshot.skills))
}

/// Entries per start year, ascending by year.
pub fn entries_per_year(sections: &[Section]) -> Vec<YearCount> {
    let mut years: BTreeMap<i32, usize> = BTreeMap::new();
    for entry in sections.iter().flat_map(|s| &s.entries) {
        *years.entry(entry.start_date.year()).or_default() += 1;
    }
    years
        .into_iter()
        .map(|(year, count)| YearCount { year, count })
        .collect()
}

/// Entries per organization, busiest first. Entries without one are skipped.
pub fn entries_by_org(sections: &[Section]) -> Vec<OrgCount> {
    let mut orgs: BTreeMap<&str, usize> = BTreeMap::new();
    for org in sections
        .iter()
        .flat_map(|s| &s.entries)
        .filter_map(|e| e.organization.as_deref())
    {
        *orgs.entry(org).or_default() += 1;
    }
    let mut out: Vec<OrgCount> = orgs
        .into_iter()
        .map(|(org, count)| OrgCount {
            org: org.to_string(),
            count,
        })
        .collect();
    // BTreeMap order already breaks ties by name.
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

pub fn skills_by_category(skills: &[Skill]) -> Vec<CategorySummary> {
    let mut groups: BTreeMap<&str, (usize, u32)> = BTreeMap::new();
    for skill in skills {
        let (count, total) = groups.entry(skill.category.as_str()).or_default();
        *count += 1;
        *total += u32::from(skill.proficiency_level);
    }
    groups
        .into_iter()
        .map(|(category, (count, total))| CategorySummary {
            category: category.to_string(),
            count,
            average_proficiency: f64::from(total) / count as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::model::Entry;
    use chrono::NaiveDate;

    fn entry(org: Option<&str>, year: i32) -> Entry {
        Entry {
            id: None,
            title: "Role".into(),
            organization: org.map(str::to_string),
            location: None,
            start_date: NaiveDate::from_ymd_opt(year, 3, 1).unwrap(),
            end_date: None,
            description: None,
            tech_stack: None,
            bullet_points: vec![],
        }
    }

    fn sections() -> Vec<Section> {
        vec![
            Section {
                entries: vec![entry(Some("Beta"), 2021), entry(Some("Alpha"), 2019)],
                ..Section::new("Experience", 0)
            },
            Section {
                entries: vec![entry(Some("Beta"), 2021), entry(None, 2015)],
                ..Section::new("Education", 1)
            },
        ]
    }

    #[test]
    fn test_entries_per_year_sorted() {
        assert_eq!(
            entries_per_year(&sections()),
            vec![
                YearCount { year: 2015, count: 1 },
                YearCount { year: 2019, count: 1 },
                YearCount { year: 2021, count: 2 },
            ]
        );
    }

    #[test]
    fn test_entries_by_org_busiest_first() {
        let out = entries_by_org(&sections());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], OrgCount { org: "Beta".into(), count: 2 });
        assert_eq!(out[1].org, "Alpha");
    }

    #[test]
    fn test_skills_by_category_averages() {
        let skill = |title: &str, level, category: &str| Skill {
            id: None,
            title: title.into(),
            description: None,
            proficiency_level: level,
            years_experience: 0,
            category: category.into(),
        };
        let out = skills_by_category(&[
            skill("Rust", 8, "Languages"),
            skill("Go", 5, "Languages"),
            skill("Postgres", 9, "Data"),
        ]);
        assert_eq!(out[0].category, "Data");
        assert_eq!(out[1].count, 2);
        assert!((out[1].average_proficiency - 6.5).abs() < f64::EPSILON);
    }
}
