//! Reconciliation: brings stored sections, entries and skills into line with
//! the canonical seed document.
//!
//! Planning is pure: the loaded aggregate is mutated in memory and every change
//! is recorded in a [`ReconcilePlan`]. The store then commits the whole plan in
//! one transaction, so a failed run leaves the previous state intact.
//!
//! Policy, applied uniformly to every section named by the seed:
//! 1. entries sharing a natural key are collapsed onto the lowest id;
//! 2. canonical records are upserted by natural key (id and section kept);
//! 3. entries whose key the seed no longer lists are pruned.
//!
//! Skills follow the same policy keyed by `(category, title)`. Sections that
//! the seed does not name are left alone.

use std::collections::HashSet;
use std::hash::Hash;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::resume::canonical::{CanonicalRecord, CanonicalSection, CanonicalSkill, SeedDocument};
use crate::resume::model::{Entry, Section, Skill};
use crate::resume::store::ResumeStore;

/// Staged changes for one section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionPlan {
    /// `None` when the section does not exist yet and must be created.
    pub section_id: Option<i64>,
    pub title: String,
    pub display_order: i32,
    /// Existing section whose `display_order` changed.
    pub reorder: bool,
    pub inserts: Vec<Entry>,
    /// Entries to overwrite in place. Their bullets are replaced wholesale.
    pub updates: Vec<Entry>,
    pub deletes: Vec<i64>,
    pub unchanged: usize,
    pub pruned: usize,
    pub deduplicated: usize,
}

impl SectionPlan {
    pub fn is_noop(&self) -> bool {
        self.section_id.is_some()
            && !self.reorder
            && self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillPlan {
    pub inserts: Vec<Skill>,
    pub updates: Vec<Skill>,
    pub deletes: Vec<i64>,
    pub unchanged: usize,
    pub pruned: usize,
    pub deduplicated: usize,
}

impl SkillPlan {
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub sections: Vec<SectionPlan>,
    pub skills: SkillPlan,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(SectionPlan::is_noop) && self.skills.is_noop()
    }

    pub fn report(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for s in &self.sections {
            if s.section_id.is_none() {
                report.sections_created += 1;
            }
            report.entries_inserted += s.inserts.len();
            report.entries_updated += s.updates.len();
            report.entries_unchanged += s.unchanged;
            report.entries_pruned += s.pruned;
            report.entries_deduplicated += s.deduplicated;
        }
        report.skills_inserted = self.skills.inserts.len();
        report.skills_updated = self.skills.updates.len();
        report.skills_unchanged = self.skills.unchanged;
        report.skills_pruned = self.skills.pruned;
        report.skills_deduplicated = self.skills.deduplicated;
        report
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub sections_created: usize,
    pub entries_inserted: usize,
    pub entries_updated: usize,
    pub entries_unchanged: usize,
    pub entries_pruned: usize,
    pub entries_deduplicated: usize,
    pub skills_inserted: usize,
    pub skills_updated: usize,
    pub skills_unchanged: usize,
    pub skills_pruned: usize,
    pub skills_deduplicated: usize,
    /// False when the store already matched and nothing was written.
    pub committed: bool,
}

/// Loads the store, plans against `seed` and commits the plan atomically.
pub async fn run_reconciliation(
    store: &dyn ResumeStore,
    seed: &SeedDocument,
) -> Result<ReconcileReport, AppError> {
    seed.validate()?;

    let snapshot = store.load_snapshot().await?;
    let plan = plan_reconciliation(snapshot.sections, snapshot.skills, seed);
    let mut report = plan.report();

    if plan.is_empty() {
        info!("Resume data already matches seed v{}", seed.version);
        return Ok(report);
    }

    store.apply(&plan).await?;
    report.committed = true;

    info!(
        "Reconciled resume data to seed v{}: {} sections created, entries +{} ~{} -{} (dedup {}), skills +{} ~{} -{}",
        seed.version,
        report.sections_created,
        report.entries_inserted,
        report.entries_updated,
        report.entries_pruned,
        report.entries_deduplicated,
        report.skills_inserted,
        report.skills_updated,
        report.skills_pruned + report.skills_deduplicated,
    );
    Ok(report)
}

/// Plans every section named by the seed, plus the skill list.
pub fn plan_reconciliation(
    mut existing: Vec<Section>,
    mut skills: Vec<Skill>,
    seed: &SeedDocument,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for canonical in &seed.sections {
        let mut section = take_section(&mut existing, &canonical.title)
            .unwrap_or_else(|| Section::new(canonical.title.clone(), canonical.display_order));
        let section_plan = reconcile_section(&mut section, canonical);
        debug!(
            "Section '{}': +{} ~{} -{}",
            section_plan.title,
            section_plan.inserts.len(),
            section_plan.updates.len(),
            section_plan.deletes.len()
        );
        plan.sections.push(section_plan);
    }

    plan.skills = reconcile_skills(&mut skills, &seed.skills);
    plan
}

/// Removes and returns the stored section titled `title`. Titles are unique by
/// convention only, so the lowest id wins if several match.
fn take_section(existing: &mut Vec<Section>, title: &str) -> Option<Section> {
    let idx = existing
        .iter()
        .enumerate()
        .filter(|(_, s)| s.title == title)
        .min_by_key(|(_, s)| (s.id.is_none(), s.id))
        .map(|(i, _)| i)?;
    Some(existing.swap_remove(idx))
}

/// Stages the changes that make `section` match `canonical`.
pub fn reconcile_section(section: &mut Section, canonical: &CanonicalSection) -> SectionPlan {
    let mut plan = SectionPlan {
        section_id: section.id,
        title: section.title.clone(),
        display_order: canonical.display_order,
        reorder: section.id.is_some() && section.display_order != canonical.display_order,
        ..SectionPlan::default()
    };
    section.display_order = canonical.display_order;

    let duplicates = dedupe_by_key(&mut section.entries, Entry::natural_key, |e| e.id);
    plan.deduplicated = duplicates.len();
    plan.deletes.extend(duplicates);

    for record in &canonical.records {
        let key = record.natural_key();
        match section.entries.iter_mut().find(|e| e.natural_key() == key) {
            Some(entry) => {
                if !overwrite_entry(entry, record) {
                    plan.unchanged += 1;
                } else if entry.id.is_some() {
                    plan.updates.push(entry.clone());
                }
            }
            None => {
                let entry = record.to_entry();
                plan.inserts.push(entry.clone());
                section.entries.push(entry);
            }
        }
    }

    let allowed = canonical.keys();
    let pruned = prune_by_key(&mut section.entries, |e| allowed.contains(&e.natural_key()), |e| e.id);
    plan.pruned = pruned.len();
    plan.deletes.extend(pruned);

    plan
}

/// Copies the mutable fields of `record` onto `entry` and replaces its
/// bullets. Returns false when `entry` already matched.
fn overwrite_entry(entry: &mut Entry, record: &CanonicalRecord) -> bool {
    let bullets = record.bullet_points();
    let matches = entry.title == record.title
        && entry.location == record.location
        && entry.end_date == record.end_date
        && entry.description == record.description
        && entry.tech_stack == record.tech_stack
        && entry.bullet_points == bullets;
    if matches {
        return false;
    }

    entry.title = record.title.clone();
    entry.location = record.location.clone();
    entry.end_date = record.end_date;
    entry.description = record.description.clone();
    entry.tech_stack = record.tech_stack.clone();
    entry.bullet_points.clear();
    entry.bullet_points.extend(bullets);
    true
}

/// Stages the changes that make `skills` match `canonical`.
pub fn reconcile_skills(skills: &mut Vec<Skill>, canonical: &[CanonicalSkill]) -> SkillPlan {
    let mut plan = SkillPlan::default();

    let duplicates = dedupe_by_key(skills, Skill::key, |s| s.id);
    plan.deduplicated = duplicates.len();
    plan.deletes.extend(duplicates);

    for wanted in canonical {
        let target = wanted.to_skill();
        let key = target.key();
        match skills.iter_mut().find(|s| s.key() == key) {
            Some(skill) => {
                let changed = skill.description != target.description
                    || skill.proficiency_level != target.proficiency_level
                    || skill.years_experience != target.years_experience;
                if !changed {
                    plan.unchanged += 1;
                    continue;
                }
                skill.description = target.description;
                skill.proficiency_level = target.proficiency_level;
                skill.years_experience = target.years_experience;
                if skill.id.is_some() {
                    plan.updates.push(skill.clone());
                }
            }
            None => {
                plan.inserts.push(target.clone());
                skills.push(target);
            }
        }
    }

    let allowed: HashSet<(String, String)> =
        canonical.iter().map(|s| (s.category.clone(), s.title.clone())).collect();
    let pruned = prune_by_key(skills, |s| allowed.contains(&s.key()), |s| s.id);
    plan.pruned = pruned.len();
    plan.deletes.extend(pruned);

    plan
}

/// Keeps the lowest-id item per key and removes the rest, returning the
/// removed ids. Unsaved items (`None`) rank after saved ones.
fn dedupe_by_key<T, K, FK, FI>(items: &mut Vec<T>, key: FK, id: FI) -> Vec<i64>
where
    K: Eq + Hash,
    FK: Fn(&T) -> K,
    FI: Fn(&T) -> Option<i64>,
{
    let mut by_id: Vec<usize> = (0..items.len()).collect();
    by_id.sort_by_key(|&i| {
        let item_id = id(&items[i]);
        (item_id.is_none(), item_id)
    });

    let mut seen = HashSet::new();
    let mut duplicate = vec![false; items.len()];
    for i in by_id {
        if !seen.insert(key(&items[i])) {
            duplicate[i] = true;
        }
    }

    let mut removed = Vec::new();
    let mut idx = 0;
    items.retain(|item| {
        let dup = duplicate[idx];
        idx += 1;
        if dup {
            removed.extend(id(item));
        }
        !dup
    });
    removed
}

/// Removes items failing `keep`, returning the ids of removed saved items.
fn prune_by_key<T>(
    items: &mut Vec<T>,
    keep: impl Fn(&T) -> bool,
    id: impl Fn(&T) -> Option<i64>,
) -> Vec<i64> {
    let mut removed = Vec::new();
    items.retain(|item| {
        let kept = keep(item);
        if !kept {
            removed.extend(id(item));
        }
        kept
    });
    removed
}
