//! Read path: the stored graph projected into the transport shape served at
//! `GET /api/resume`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::resume::model::{Entry, Section, Skill};
use crate::resume::store::ResumeStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletPointDto {
    pub order: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeEntryDto {
    pub id: i64,
    pub title: String,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub tech_stack: Option<String>,
    pub bullet_points: Vec<BulletPointDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSectionDto {
    pub id: i64,
    pub section_title: String,
    pub order: i32,
    pub entries: Vec<ResumeEntryDto>,
}

/// A section as stored, with its display order exposed rather than applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionGraphDto {
    pub id: i64,
    pub section_title: String,
    pub display_order: i32,
    pub entries: Vec<ResumeEntryDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDto {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub proficiency_level: u8,
    pub years_experience: u16,
    pub category: String,
}

pub async fn load_projection(store: &dyn ResumeStore) -> Result<Vec<ResumeSectionDto>, AppError> {
    let sections = store.load_sections().await?;
    Ok(project(&sections))
}

/// Sections by `display_order`, entries by start date then title, bullets by
/// `order`. Items not yet saved project with id 0.
pub fn project(sections: &[Section]) -> Vec<ResumeSectionDto> {
    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| (s.display_order, s.id));
    ordered.into_iter().map(project_section).collect()
}

/// The stored graph in storage (id) order, for clients that do their own
/// ordering.
pub fn section_graph(sections: &[Section]) -> Vec<SectionGraphDto> {
    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|s| s.id);
    ordered
        .into_iter()
        .map(|section| {
            let mut entries: Vec<&Entry> = section.entries.iter().collect();
            entries.sort_by_key(|e| e.id);
            SectionGraphDto {
                id: section.id.unwrap_or_default(),
                section_title: section.title.clone(),
                display_order: section.display_order,
                entries: entries.into_iter().map(project_entry).collect(),
            }
        })
        .collect()
}

fn project_section(section: &Section) -> ResumeSectionDto {
    let mut entries: Vec<&Entry> = section.entries.iter().collect();
    entries.sort_by(|a, b| a.display_cmp(b));

    ResumeSectionDto {
        id: section.id.unwrap_or_default(),
        section_title: section.title.clone(),
        order: section.display_order,
        entries: entries.into_iter().map(project_entry).collect(),
    }
}

fn project_entry(entry: &Entry) -> ResumeEntryDto {
    let mut bullets: Vec<BulletPointDto> = entry
        .bullet_points
        .iter()
        .map(|b| BulletPointDto {
            order: b.order,
            text: b.text.clone(),
        })
        .collect();
    // Stable: equal orders keep load (insertion) order.
    bullets.sort_by_key(|b| b.order);

    ResumeEntryDto {
        id: entry.id.unwrap_or_default(),
        title: entry.title.clone(),
        organization: entry.organization.clone(),
        location: entry.location.clone(),
        start_date: entry.start_date,
        end_date: entry.end_date,
        description: entry.description.clone(),
        tech_stack: entry.tech_stack.clone(),
        bullet_points: bullets,
    }
}

/// Category, then proficiency descending, then title.
pub fn project_skills(skills: &[Skill]) -> Vec<SkillDto> {
    let mut ordered: Vec<&Skill> = skills.iter().collect();
    ordered.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then_with(|| b.proficiency_level.cmp(&a.proficiency_level))
            .then_with(|| a.title.cmp(&b.title))
    });
    ordered
        .into_iter()
        .map(|s| SkillDto {
            id: s.id.unwrap_or_default(),
            title: s.title.clone(),
            description: s.description.clone(),
            proficiency_level: s.proficiency_level,
            years_experience: s.years_experience,
            category: s.category.clone(),
        })
        .collect()
}
