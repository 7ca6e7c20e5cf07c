use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionRow {
    pub id: i64,
    pub section_title: String,
    pub display_order: i32,
}

/// One row of `resume_items`. Which columns are populated depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeItemRow {
    pub id: i64,
    pub kind: String,
    pub section_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub organization: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub tech_stack: Option<String>,
    pub proficiency_level: Option<i16>,
    pub years_experience: Option<i16>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BulletPointRow {
    pub id: i64,
    pub entry_id: i64,
    pub text: String,
    pub sort_order: i32,
}
