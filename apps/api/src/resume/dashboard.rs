//! Fixed dashboard feeds served under `/api/metrics/*`.
//!
//! These series are not derived from the resume store. They ship as a JSON
//! document next to the seed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
    pub label: String,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Sparkline, oldest first.
    pub spark: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityQuarter {
    pub period: String,
    pub apps: u32,
    pub funcs: u32,
    pub adf: u32,
    pub pbi: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPoint {
    pub date: NaiveDate,
    pub migrated: u32,
    pub target: u32,
}

/// Actual against goal, for a bullet chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulletGauge {
    pub value: u32,
    pub target: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageItem {
    pub label: String,
    pub value: u32,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityCoverage {
    pub feature: String,
    pub target: String,
    pub pct: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillUsage {
    pub skill: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardFixture {
    pub kpis: Vec<Kpi>,
    pub velocity: Vec<VelocityQuarter>,
    pub migrations: Vec<MigrationPoint>,
    pub ado_migrations: BulletGauge,
    pub bi_coverage: Vec<CoverageItem>,
    pub security_coverage: Vec<SecurityCoverage>,
    pub skills_rolling: Vec<SkillUsage>,
}

impl DashboardFixture {
    pub fn builtin() -> Result<Self, serde_json::Error> {
        serde_json::from_str(include_str!("../../seed/dashboard.json"))
    }
}
