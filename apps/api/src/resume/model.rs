use std::cmp::Ordering;

use anyhow::{anyhow, bail};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::resume::ResumeItemRow;

/// Maximum bullet length, in characters. Mirrors `VARCHAR(400)` in the schema.
pub const MAX_BULLET_CHARS: usize = 400;

/// Discriminator stored in `resume_items.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Entry,
    Skill,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Entry => "entry",
            ItemKind::Skill => "skill",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(ItemKind::Entry),
            "skill" => Some(ItemKind::Skill),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletPoint {
    pub text: String,
    pub order: i32,
}

impl BulletPoint {
    /// Builds bullets whose `order` is their position in `lines`.
    pub fn sequence<S: AsRef<str>>(lines: &[S]) -> Vec<BulletPoint> {
        lines
            .iter()
            .enumerate()
            .map(|(i, text)| BulletPoint {
                text: text.as_ref().to_string(),
                order: i as i32,
            })
            .collect()
    }
}

/// Identity used to match canonical records against stored entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NaturalKey {
    pub organization: Option<String>,
    pub year: i32,
    pub month: u32,
}

impl NaturalKey {
    pub fn new(organization: Option<&str>, start_date: NaiveDate) -> Self {
        Self {
            organization: organization.map(str::to_string),
            year: start_date.year(),
            month: start_date.month(),
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ {:04}-{:02}",
            self.organization.as_deref().unwrap_or("<none>"),
            self.year,
            self.month
        )
    }
}

/// A job or education record. `id` is `None` until the store assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Option<i64>,
    pub title: String,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub tech_stack: Option<String>,
    pub bullet_points: Vec<BulletPoint>,
}

impl Entry {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.organization.as_deref(), self.start_date)
    }

    /// Display order inside a section: start date, then title, then
    /// ongoing entries last, then id.
    pub fn display_cmp(&self, other: &Entry) -> Ordering {
        self.start_date
            .cmp(&other.start_date)
            .then_with(|| self.title.cmp(&other.title))
            .then_with(|| cmp_end_dates(self.end_date, other.end_date))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// `None` (ongoing) sorts after every concrete end date.
pub fn cmp_end_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: Option<i64>,
    pub title: String,
    pub display_order: i32,
    pub entries: Vec<Entry>,
}

impl Section {
    pub fn new(title: impl Into<String>, display_order: i32) -> Self {
        Self {
            id: None,
            title: title.into(),
            display_order,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    /// 1 to 10
    pub proficiency_level: u8,
    pub years_experience: u16,
    pub category: String,
}

impl Skill {
    pub fn key(&self) -> (String, String) {
        (self.category.clone(), self.title.clone())
    }
}

/// A stored resume item, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeItem {
    Entry(Entry),
    Skill(Skill),
}

impl ResumeItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ResumeItem::Entry(_) => ItemKind::Entry,
            ResumeItem::Skill(_) => ItemKind::Skill,
        }
    }
}

/// Decodes a row into its variant. Bullets are attached by the caller.
impl TryFrom<ResumeItemRow> for ResumeItem {
    type Error = anyhow::Error;

    fn try_from(row: ResumeItemRow) -> Result<Self, Self::Error> {
        let kind = ItemKind::parse(&row.kind)
            .ok_or_else(|| anyhow!("resume item {} has unknown kind '{}'", row.id, row.kind))?;

        match kind {
            ItemKind::Entry => {
                let Some(start_date) = row.start_date else {
                    bail!("entry {} has no start_date", row.id);
                };
                Ok(ResumeItem::Entry(Entry {
                    id: Some(row.id),
                    title: row.title,
                    organization: row.organization,
                    location: row.location,
                    start_date,
                    end_date: row.end_date,
                    description: row.description,
                    tech_stack: row.tech_stack,
                    bullet_points: Vec::new(),
                }))
            }
            ItemKind::Skill => {
                let (Some(level), Some(category)) = (row.proficiency_level, row.category) else {
                    bail!("skill {} is missing proficiency_level or category", row.id);
                };
                let proficiency_level = u8::try_from(level)
                    .ok()
                    .filter(|l| (1..=10).contains(l))
                    .ok_or_else(|| anyhow!("skill {} has proficiency {level}", row.id))?;
                Ok(ResumeItem::Skill(Skill {
                    id: Some(row.id),
                    title: row.title,
                    description: row.description,
                    proficiency_level,
                    years_experience: row.years_experience.unwrap_or(0).max(0) as u16,
                    category,
                }))
            }
        }
    }
}
