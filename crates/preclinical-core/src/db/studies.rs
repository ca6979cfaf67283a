//! Study database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::Study;

fn map_study(row: &Row<'_>) -> rusqlite::Result<Study> {
    Ok(Study {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        principal_investigator: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Database {
    /// Insert a new study.
    pub fn insert_study(&self, study: &Study) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO studies (
                id, name, description, start_date, end_date,
                principal_investigator, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                study.id,
                study.name,
                study.description,
                study.start_date,
                study.end_date,
                study.principal_investigator,
                study.status,
                study.created_at,
                study.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a study by ID.
    pub fn get_study(&self, id: &str) -> DbResult<Option<Study>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, description, start_date, end_date,
                       principal_investigator, status, created_at, updated_at
                FROM studies
                WHERE id = ?
                "#,
                [id],
                map_study,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Check that a study exists.
    pub fn study_exists(&self, id: &str) -> DbResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM studies WHERE id = ?", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// List all studies in insertion order.
    pub fn list_studies(&self) -> DbResult<Vec<Study>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, description, start_date, end_date,
                   principal_investigator, status, created_at, updated_at
            FROM studies
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map([], map_study)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewStudy;

    #[test]
    fn test_insert_get_list() {
        let db = Database::open_in_memory().unwrap();

        let mut def = NewStudy::new("28-day tox", "Dr. Okafor");
        def.start_date = Some("2024-02-01".into());
        let study = Study::new(def);
        db.insert_study(&study).unwrap();

        let other = Study::new(NewStudy::new("PK bridging", "Dr. Okafor"));
        db.insert_study(&other).unwrap();

        let retrieved = db.get_study(&study.id).unwrap().unwrap();
        assert_eq!(retrieved, study);
        assert!(db.get_study("missing").unwrap().is_none());

        let all = db.list_studies().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, study.id);
    }
}
