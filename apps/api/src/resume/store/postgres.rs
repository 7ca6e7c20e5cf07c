use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::resume::{BulletPointRow, ResumeItemRow, SectionRow};
use crate::resume::model::{BulletPoint, Entry, ItemKind, ResumeItem, Section, Skill};
use crate::resume::reconcile::ReconcilePlan;
use crate::resume::store::{ResumeSnapshot, ResumeStore, StoreCounts};

const ITEM_COLUMNS: &str = "id, kind, section_id, title, description, organization, location, \
     start_date, end_date, tech_stack, proficiency_level, years_experience, category";

#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn load_sections(&self) -> Result<Vec<Section>, AppError> {
        let mut tx = begin_snapshot(&self.pool).await?;
        let sections = read_sections(&mut tx).await?;
        tx.commit().await?;
        Ok(sections)
    }

    async fn load_skills(&self) -> Result<Vec<Skill>, AppError> {
        let mut conn = self.pool.acquire().await?;
        read_skills(&mut conn).await
    }

    async fn load_snapshot(&self) -> Result<ResumeSnapshot, AppError> {
        let mut tx = begin_snapshot(&self.pool).await?;
        let sections = read_sections(&mut tx).await?;
        let skills = read_skills(&mut tx).await?;
        tx.commit().await?;
        Ok(ResumeSnapshot { sections, skills })
    }

    async fn apply(&self, plan: &ReconcilePlan) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for section in &plan.sections {
            let section_id = match section.section_id {
                Some(id) => {
                    if section.reorder {
                        sqlx::query("UPDATE resume_sections SET display_order = $1 WHERE id = $2")
                            .bind(section.display_order)
                            .bind(id)
                            .execute(&mut *tx)
                            .await?;
                    }
                    id
                }
                None => {
                    let id: i64 = sqlx::query_scalar(
                        "INSERT INTO resume_sections (section_title, display_order) VALUES ($1, $2) RETURNING id",
                    )
                    .bind(&section.title)
                    .bind(section.display_order)
                    .fetch_one(&mut *tx)
                    .await?;
                    info!("Created resume section '{}' ({id})", section.title);
                    id
                }
            };

            if !section.deletes.is_empty() {
                sqlx::query("DELETE FROM resume_items WHERE kind = 'entry' AND id = ANY($1)")
                    .bind(&section.deletes)
                    .execute(&mut *tx)
                    .await?;
            }
            for entry in &section.updates {
                update_entry(&mut tx, entry).await?;
            }
            for entry in &section.inserts {
                insert_entry(&mut tx, section_id, entry).await?;
            }
        }

        let skills = &plan.skills;
        if !skills.deletes.is_empty() {
            sqlx::query("DELETE FROM resume_items WHERE kind = 'skill' AND id = ANY($1)")
                .bind(&skills.deletes)
                .execute(&mut *tx)
                .await?;
        }
        for skill in &skills.updates {
            let Some(id) = skill.id else {
                return Err(anyhow!("skill '{}' staged for update without an id", skill.title).into());
            };
            sqlx::query(
                "UPDATE resume_items SET description = $1, proficiency_level = $2, years_experience = $3 \
                 WHERE id = $4 AND kind = 'skill'",
            )
            .bind(&skill.description)
            .bind(i16::from(skill.proficiency_level))
            .bind(years_column(skill.years_experience))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        for skill in &skills.inserts {
            sqlx::query(
                "INSERT INTO resume_items (kind, title, description, proficiency_level, years_experience, category) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(ItemKind::Skill.as_str())
            .bind(&skill.title)
            .bind(&skill.description)
            .bind(i16::from(skill.proficiency_level))
            .bind(years_column(skill.years_experience))
            .bind(&skill.category)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts, AppError> {
        let (items, sections, entries): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM resume_items),
                (SELECT COUNT(*) FROM resume_sections),
                (SELECT COUNT(*) FROM resume_items WHERE kind = 'entry')
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreCounts {
            items,
            sections,
            entries,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Read-only transaction whose statements all see one snapshot.
async fn begin_snapshot(pool: &PgPool) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

async fn read_sections(conn: &mut PgConnection) -> Result<Vec<Section>, AppError> {
    let sections: Vec<SectionRow> =
        sqlx::query_as("SELECT id, section_title, display_order FROM resume_sections")
            .fetch_all(&mut *conn)
            .await?;
    let items: Vec<ResumeItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM resume_items WHERE kind = 'entry' ORDER BY id"
    ))
    .fetch_all(&mut *conn)
    .await?;
    let bullets: Vec<BulletPointRow> = sqlx::query_as(
        "SELECT id, entry_id, text, sort_order FROM resume_bullet_points ORDER BY entry_id, sort_order, id",
    )
    .fetch_all(&mut *conn)
    .await?;

    assemble_sections(sections, items, bullets)
}

async fn read_skills(conn: &mut PgConnection) -> Result<Vec<Skill>, AppError> {
    let rows: Vec<ResumeItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM resume_items WHERE kind = 'skill' ORDER BY id"
    ))
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<Skill, AppError> {
            match ResumeItem::try_from(row)? {
                ResumeItem::Skill(skill) => Ok(skill),
                other => Err(anyhow!("expected a skill, decoded {:?}", other.kind()).into()),
            }
        })
        .collect()
}

async fn update_entry(conn: &mut PgConnection, entry: &Entry) -> Result<(), AppError> {
    let Some(id) = entry.id else {
        return Err(anyhow!("entry '{}' staged for update without an id", entry.title).into());
    };

    sqlx::query(
        r#"
        UPDATE resume_items
        SET title = $1, location = $2, end_date = $3, description = $4, tech_stack = $5
        WHERE id = $6 AND kind = 'entry'
        "#,
    )
    .bind(&entry.title)
    .bind(&entry.location)
    .bind(entry.end_date)
    .bind(&entry.description)
    .bind(&entry.tech_stack)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM resume_bullet_points WHERE entry_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    insert_bullets(conn, id, &entry.bullet_points).await
}

async fn insert_entry(conn: &mut PgConnection, section_id: i64, entry: &Entry) -> Result<(), AppError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO resume_items
            (kind, section_id, title, organization, location, start_date, end_date, description, tech_stack)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(ItemKind::Entry.as_str())
    .bind(section_id)
    .bind(&entry.title)
    .bind(&entry.organization)
    .bind(&entry.location)
    .bind(entry.start_date)
    .bind(entry.end_date)
    .bind(&entry.description)
    .bind(&entry.tech_stack)
    .fetch_one(&mut *conn)
    .await?;

    insert_bullets(conn, id, &entry.bullet_points).await
}

async fn insert_bullets(
    conn: &mut PgConnection,
    entry_id: i64,
    bullets: &[BulletPoint],
) -> Result<(), AppError> {
    for bullet in bullets {
        sqlx::query("INSERT INTO resume_bullet_points (entry_id, text, sort_order) VALUES ($1, $2, $3)")
            .bind(entry_id)
            .bind(&bullet.text)
            .bind(bullet.order)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

fn years_column(years: u16) -> i16 {
    i16::try_from(years).unwrap_or(i16::MAX)
}

/// Stitches flat rows back into the section → entry → bullet graph.
fn assemble_sections(
    sections: Vec<SectionRow>,
    items: Vec<ResumeItemRow>,
    bullets: Vec<BulletPointRow>,
) -> Result<Vec<Section>, AppError> {
    let mut bullets_by_entry: HashMap<i64, Vec<BulletPoint>> = HashMap::new();
    for row in bullets {
        bullets_by_entry.entry(row.entry_id).or_default().push(BulletPoint {
            text: row.text,
            order: row.sort_order,
        });
    }

    let mut entries_by_section: HashMap<i64, Vec<Entry>> = HashMap::new();
    for row in items {
        let id = row.id;
        let Some(section_id) = row.section_id else {
            warn!("Entry {id} has no section; skipping");
            continue;
        };
        let ResumeItem::Entry(mut entry) = ResumeItem::try_from(row)? else {
            return Err(anyhow!("item {id} did not decode as an entry").into());
        };
        entry.bullet_points = bullets_by_entry.remove(&id).unwrap_or_default();
        entries_by_section.entry(section_id).or_default().push(entry);
    }

    Ok(sections
        .into_iter()
        .map(|row| Section {
            id: Some(row.id),
            entries: entries_by_section.remove(&row.id).unwrap_or_default(),
            title: row.section_title,
            display_order: row.display_order,
        })
        .collect())
}
