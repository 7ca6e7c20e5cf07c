//! Canonical seed document: the authoritative resume content the store is
//! reconciled against. Shipped embedded in the binary and overridable with a
//! JSON file at `SEED_PATH`.

use std::collections::HashSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::resume::model::{BulletPoint, Entry, NaturalKey, Skill, MAX_BULLET_CHARS};

const DEFAULT_SEED: &str = include_str!("../../seed/resume.json");

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("seed document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("section title must not be blank")]
    BlankSectionTitle,

    #[error("section '{0}' appears more than once")]
    DuplicateSection(String),

    #[error("section '{section}': record #{index} has a blank {field}")]
    BlankField {
        section: String,
        index: usize,
        field: &'static str,
    },

    #[error("section '{section}': '{title}' has a bullet of {len} characters (max 400)")]
    BulletTooLong {
        section: String,
        title: String,
        len: usize,
    },

    #[error("section '{section}': '{title}' ends before it starts")]
    EndBeforeStart { section: String, title: String },

    #[error("section '{section}': natural key {key} is used by more than one record")]
    DuplicateNaturalKey { section: String, key: NaturalKey },

    #[error("skill '{title}': proficiency {level} is outside 1-10")]
    ProficiencyOutOfRange { title: String, level: u8 },

    #[error("skill '{title}' in category '{category}' appears more than once")]
    DuplicateSkill { category: String, title: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedDocument {
    pub version: u32,
    pub sections: Vec<CanonicalSection>,
    #[serde(default)]
    pub skills: Vec<CanonicalSkill>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSection {
    pub title: String,
    pub display_order: i32,
    #[serde(default)]
    pub records: Vec<CanonicalRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub title: String,
    pub organization: Option<String>,
    pub location: Option<String>,
    #[serde(deserialize_with = "month_or_date")]
    pub start_date: NaiveDate,
    #[serde(default, deserialize_with = "optional_month_or_date")]
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub tech_stack: Option<String>,
    #[serde(default)]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSkill {
    pub title: String,
    pub description: Option<String>,
    pub proficiency_level: u8,
    #[serde(default)]
    pub years_experience: u16,
    pub category: String,
}

impl SeedDocument {
    /// The document compiled into the binary.
    pub fn builtin() -> Result<Self, SeedError> {
        Self::from_json(DEFAULT_SEED)
    }

    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        let doc: SeedDocument = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let json = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Loads `path` when given, otherwise the built-in document.
    pub fn load(path: Option<&Path>) -> Result<Self, SeedError> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    pub fn validate(&self) -> Result<(), SeedError> {
        let mut titles = HashSet::new();
        for section in &self.sections {
            if section.title.trim().is_empty() {
                return Err(SeedError::BlankSectionTitle);
            }
            if !titles.insert(section.title.as_str()) {
                return Err(SeedError::DuplicateSection(section.title.clone()));
            }
            section.validate()?;
        }

        let mut skills = HashSet::new();
        for skill in &self.skills {
            if skill.title.trim().is_empty() || skill.category.trim().is_empty() {
                return Err(SeedError::BlankField {
                    section: "skills".to_string(),
                    index: skills.len(),
                    field: "title or category",
                });
            }
            if !(1..=10).contains(&skill.proficiency_level) {
                return Err(SeedError::ProficiencyOutOfRange {
                    title: skill.title.clone(),
                    level: skill.proficiency_level,
                });
            }
            if !skills.insert((skill.category.as_str(), skill.title.as_str())) {
                return Err(SeedError::DuplicateSkill {
                    category: skill.category.clone(),
                    title: skill.title.clone(),
                });
            }
        }
        Ok(())
    }
}

impl CanonicalSection {
    fn validate(&self) -> Result<(), SeedError> {
        let mut keys = HashSet::new();
        for (index, record) in self.records.iter().enumerate() {
            let blank = |field: &'static str| SeedError::BlankField {
                section: self.title.clone(),
                index,
                field,
            };
            if record.title.trim().is_empty() {
                return Err(blank("title"));
            }
            if record
                .organization
                .as_deref()
                .map_or(true, |o| o.trim().is_empty())
            {
                return Err(blank("organization"));
            }
            if record.bullets.iter().any(|b| b.trim().is_empty()) {
                return Err(blank("bullet"));
            }
            if let Some(len) = record
                .bullets
                .iter()
                .map(|b| b.chars().count())
                .find(|len| *len > MAX_BULLET_CHARS)
            {
                return Err(SeedError::BulletTooLong {
                    section: self.title.clone(),
                    title: record.title.clone(),
                    len,
                });
            }
            if record.end_date.is_some_and(|end| end < record.start_date) {
                return Err(SeedError::EndBeforeStart {
                    section: self.title.clone(),
                    title: record.title.clone(),
                });
            }
            let key = record.natural_key();
            if !keys.insert(key.clone()) {
                return Err(SeedError::DuplicateNaturalKey {
                    section: self.title.clone(),
                    key,
                });
            }
        }
        Ok(())
    }

    pub fn keys(&self) -> HashSet<NaturalKey> {
        self.records.iter().map(CanonicalRecord::natural_key).collect()
    }
}

impl CanonicalRecord {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(self.organization.as_deref(), self.start_date)
    }

    pub fn bullet_points(&self) -> Vec<BulletPoint> {
        BulletPoint::sequence(&self.bullets)
    }

    /// A fresh, unsaved entry carrying this record's content.
    pub fn to_entry(&self) -> Entry {
        Entry {
            id: None,
            title: self.title.clone(),
            organization: self.organization.clone(),
            location: self.location.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            description: self.description.clone(),
            tech_stack: self.tech_stack.clone(),
            bullet_points: self.bullet_points(),
        }
    }
}

impl CanonicalSkill {
    pub fn to_skill(&self) -> Skill {
        Skill {
            id: None,
            title: self.title.clone(),
            description: self.description.clone(),
            proficiency_level: self.proficiency_level,
            years_experience: self.years_experience,
            category: self.category.clone(),
        }
    }
}

/// Accepts `YYYY-MM` (first of the month) or `YYYY-MM-DD`.
pub fn parse_month_or_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
        .ok()
}

fn month_or_date<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
    let s = String::deserialize(d)?;
    parse_month_or_date(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{s}', expected YYYY-MM or YYYY-MM-DD")))
}

fn optional_month_or_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) => parse_month_or_date(&s).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid date '{s}', expected YYYY-MM or YYYY-MM-DD"))
        }),
    }
}
