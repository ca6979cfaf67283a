//! Cohort and cohort membership database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{now, Database, DbResult};
use crate::models::Cohort;

fn map_cohort(row: &Row<'_>) -> rusqlite::Result<Cohort> {
    Ok(Cohort {
        id: row.get(0)?,
        study_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        criteria: row.get(4)?,
        planned_animal_count: row.get(5)?,
        animal_ids: Vec::new(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    /// Insert a new cohort. Membership rows are written by `add_cohort_animal`.
    pub fn insert_cohort(&self, cohort: &Cohort) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO cohorts (
                id, study_id, name, description, criteria,
                planned_animal_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                cohort.id,
                cohort.study_id,
                cohort.name,
                cohort.description,
                cohort.criteria,
                cohort.planned_animal_count,
                cohort.created_at,
                cohort.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update cohort metadata (not membership).
    pub fn update_cohort(&self, cohort: &Cohort) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE cohorts SET
                name = ?2,
                description = ?3,
                criteria = ?4,
                planned_animal_count = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                cohort.id,
                cohort.name,
                cohort.description,
                cohort.criteria,
                cohort.planned_animal_count,
                cohort.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a cohort with its member animal ids.
    pub fn get_cohort(&self, id: &str) -> DbResult<Option<Cohort>> {
        let cohort = self
            .conn
            .query_row(
                r#"
                SELECT id, study_id, name, description, criteria,
                       planned_animal_count, created_at, updated_at
                FROM cohorts
                WHERE id = ?
                "#,
                [id],
                map_cohort,
            )
            .optional()?;

        match cohort {
            Some(mut cohort) => {
                cohort.animal_ids = self.list_cohort_animal_ids(&cohort.id)?;
                Ok(Some(cohort))
            }
            None => Ok(None),
        }
    }

    /// List cohorts of a study in insertion order.
    pub fn list_cohorts_for_study(&self, study_id: &str) -> DbResult<Vec<Cohort>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, study_id, name, description, criteria,
                   planned_animal_count, created_at, updated_at
            FROM cohorts
            WHERE study_id = ?
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map([study_id], map_cohort)?;
        let mut cohorts = Vec::new();
        for row in rows {
            let mut cohort = row?;
            cohort.animal_ids = self.list_cohort_animal_ids(&cohort.id)?;
            cohorts.push(cohort);
        }
        Ok(cohorts)
    }

    /// Check that a cohort exists and belongs to the given study.
    pub fn cohort_in_study(&self, cohort_id: &str, study_id: &str) -> DbResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM cohorts WHERE id = ?1 AND study_id = ?2",
                [cohort_id, study_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Member animal ids of a cohort.
    pub fn list_cohort_animal_ids(&self, cohort_id: &str) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT animal_id FROM cohort_animals WHERE cohort_id = ? ORDER BY rowid")?;
        let rows = stmt.query_map([cohort_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Number of member animals; zero for an unknown cohort.
    pub fn count_cohort_animals(&self, cohort_id: &str) -> DbResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM cohort_animals WHERE cohort_id = ?",
            [cohort_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Atomic set-add. Returns false if the animal was already a member.
    pub fn add_cohort_animal(&self, cohort_id: &str, animal_id: &str) -> DbResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let timestamp = now();

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO cohort_animals (cohort_id, animal_id, assigned_at) VALUES (?1, ?2, ?3)",
            params![cohort_id, animal_id, timestamp],
        )?;
        if inserted > 0 {
            tx.execute(
                "UPDATE cohorts SET updated_at = ?1 WHERE id = ?2",
                params![timestamp, cohort_id],
            )?;
        }

        tx.commit()?;
        Ok(inserted > 0)
    }

    /// Atomic set-remove. Returns false if the animal was not a member.
    pub fn remove_cohort_animal(&self, cohort_id: &str, animal_id: &str) -> DbResult<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let removed = tx.execute(
            "DELETE FROM cohort_animals WHERE cohort_id = ?1 AND animal_id = ?2",
            [cohort_id, animal_id],
        )?;
        tx.execute(
            "UPDATE cohorts SET updated_at = ?1 WHERE id = ?2",
            params![now(), cohort_id],
        )?;

        tx.commit()?;
        Ok(removed > 0)
    }

    /// Delete a cohort only if it has no members. Returns false otherwise.
    pub fn delete_cohort_if_empty(&self, cohort_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            DELETE FROM cohorts
            WHERE id = ?1
            AND NOT EXISTS (SELECT 1 FROM cohort_animals WHERE cohort_id = ?1)
            "#,
            [cohort_id],
        )?;
        Ok(rows_affected > 0)
    }
}
