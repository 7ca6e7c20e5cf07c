//! Persistence boundary for the resume aggregate.
//!
//! `AppState` holds an `Arc<dyn ResumeStore>`; production uses
//! [`PgResumeStore`], tests use the in-memory store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::resume::model::{Section, Skill};
use crate::resume::reconcile::ReconcilePlan;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgResumeStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub items: i64,
    pub sections: i64,
    pub entries: i64,
}

/// Sections and skills read together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeSnapshot {
    pub sections: Vec<Section>,
    pub skills: Vec<Skill>,
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Every section with its entries and each entry's bullets, read as one
    /// consistent snapshot. Order is unspecified.
    async fn load_sections(&self) -> Result<Vec<Section>, AppError>;

    async fn load_skills(&self) -> Result<Vec<Skill>, AppError>;

    /// Sections and skills from a single consistent read. Reconciliation
    /// plans against this so both halves of the plan see the same state.
    async fn load_snapshot(&self) -> Result<ResumeSnapshot, AppError>;

    /// Commits a reconciliation plan. Either every change lands or none does.
    async fn apply(&self, plan: &ReconcilePlan) -> Result<(), AppError>;

    async fn counts(&self) -> Result<StoreCounts, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}
