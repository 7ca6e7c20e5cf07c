use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::errors::AppError;
use crate::resume::model::{Section, Skill};
use crate::resume::reconcile::ReconcilePlan;
use crate::resume::store::{ResumeSnapshot, ResumeStore, StoreCounts};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    sections: Vec<Section>,
    skills: Vec<Skill>,
    next_id: i64,
}

impl MemoryState {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`ResumeStore`] with the same all-or-nothing `apply` semantics
/// as the Postgres store. Ids are assigned in increasing order.
#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    state: Mutex<MemoryState>,
    unavailable: Mutex<bool>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing rows. Every item must already carry an id.
    pub fn with_sections(sections: Vec<Section>) -> Self {
        let next_id = sections
            .iter()
            .flat_map(|s| s.id.into_iter().chain(s.entries.iter().filter_map(|e| e.id)))
            .max()
            .unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState {
                sections,
                skills: Vec::new(),
                next_id,
            }),
            unavailable: Mutex::new(false),
        }
    }

    pub fn snapshot(&self) -> Vec<Section> {
        self.state.lock().unwrap().sections.clone()
    }

    /// While set, every operation fails as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn check(&self) -> Result<(), AppError> {
        if *self.unavailable.lock().unwrap() {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn load_sections(&self) -> Result<Vec<Section>, AppError> {
        self.check()?;
        Ok(self.snapshot())
    }

    async fn load_skills(&self) -> Result<Vec<Skill>, AppError> {
        self.check()?;
        Ok(self.state.lock().unwrap().skills.clone())
    }

    async fn load_snapshot(&self) -> Result<ResumeSnapshot, AppError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(ResumeSnapshot {
            sections: state.sections.clone(),
            skills: state.skills.clone(),
        })
    }

    async fn apply(&self, plan: &ReconcilePlan) -> Result<(), AppError> {
        self.check()?;
        let mut guard = self.state.lock().unwrap();
        // Work on a copy and swap it in only when every step succeeded.
        let mut next = guard.clone();

        for section_plan in &plan.sections {
            let idx = match section_plan.section_id {
                Some(id) => next
                    .sections
                    .iter()
                    .position(|s| s.id == Some(id))
                    .ok_or_else(|| anyhow!("section {id} not found"))?,
                None => {
                    let id = next.assign_id();
                    next.sections.push(Section {
                        id: Some(id),
                        ..Section::new(section_plan.title.clone(), section_plan.display_order)
                    });
                    next.sections.len() - 1
                }
            };

            let mut section = next.sections[idx].clone();
            section.display_order = section_plan.display_order;
            section
                .entries
                .retain(|e| !e.id.is_some_and(|id| section_plan.deletes.contains(&id)));
            for update in &section_plan.updates {
                let slot = section
                    .entries
                    .iter_mut()
                    .find(|e| e.id.is_some() && e.id == update.id)
                    .ok_or_else(|| anyhow!("entry {:?} not found", update.id))?;
                *slot = update.clone();
            }
            for insert in &section_plan.inserts {
                let mut entry = insert.clone();
                entry.id = Some(next.assign_id());
                section.entries.push(entry);
            }
            next.sections[idx] = section;
        }

        let skills = &plan.skills;
        next.skills
            .retain(|s| !s.id.is_some_and(|id| skills.deletes.contains(&id)));
        for update in &skills.updates {
            let slot = next
                .skills
                .iter_mut()
                .find(|s| s.id.is_some() && s.id == update.id)
                .ok_or_else(|| anyhow!("skill {:?} not found", update.id))?;
            *slot = update.clone();
        }
        for insert in &skills.inserts {
            let mut skill = insert.clone();
            skill.id = Some(next.assign_id());
            next.skills.push(skill);
        }

        *guard = next;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts, AppError> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let entries = state.sections.iter().map(|s| s.entries.len()).sum::<usize>() as i64;
        Ok(StoreCounts {
            items: entries + state.skills.len() as i64,
            sections: state.sections.len() as i64,
            entries,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check()
    }
}
