//! Study procedure snapshot database operations (insert-only).

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::StudyProcedure;

impl Database {
    /// Insert a sealed snapshot. Rows are never updated afterwards.
    pub fn insert_study_procedure(&self, procedure: &StudyProcedure) -> DbResult<()> {
        let input_fields_json = serde_json::to_string(&procedure.input_fields)?;

        self.conn.execute(
            r#"
            INSERT INTO study_procedures (
                id, study_id, master_procedure_id, name, category, description,
                currency, input_fields, default_cost, study_specific_cost,
                snapshot_digest, imported_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                procedure.id,
                procedure.study_id,
                procedure.master_procedure_id,
                procedure.name,
                procedure.category.as_str(),
                procedure.description,
                procedure.currency,
                input_fields_json,
                procedure.default_cost,
                procedure.study_specific_cost,
                procedure.snapshot_digest,
                procedure.imported_at,
            ],
        )?;
        Ok(())
    }

    /// Get a study procedure by ID.
    pub fn get_study_procedure(&self, id: &str) -> DbResult<Option<StudyProcedure>> {
        self.conn
            .query_row(
                r#"
                SELECT id, study_id, master_procedure_id, name, category, description,
                       currency, input_fields, default_cost, study_specific_cost,
                       snapshot_digest, imported_at
                FROM study_procedures
                WHERE id = ?
                "#,
                [id],
                StudyProcedureRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List procedures imported into a study, in import order.
    pub fn list_study_procedures(&self, study_id: &str) -> DbResult<Vec<StudyProcedure>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, study_id, master_procedure_id, name, category, description,
                   currency, input_fields, default_cost, study_specific_cost,
                   snapshot_digest, imported_at
            FROM study_procedures
            WHERE study_id = ?
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map([study_id], StudyProcedureRow::from_row)?;

        let mut procedures = Vec::new();
        for row in rows {
            procedures.push(row?.try_into()?);
        }
        Ok(procedures)
    }
}

/// Intermediate row struct for database mapping.
struct StudyProcedureRow {
    id: String,
    study_id: String,
    master_procedure_id: String,
    name: String,
    category: String,
    description: String,
    currency: String,
    input_fields: String,
    default_cost: f64,
    study_specific_cost: Option<f64>,
    snapshot_digest: String,
    imported_at: String,
}

impl StudyProcedureRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            study_id: row.get(1)?,
            master_procedure_id: row.get(2)?,
            name: row.get(3)?,
            category: row.get(4)?,
            description: row.get(5)?,
            currency: row.get(6)?,
            input_fields: row.get(7)?,
            default_cost: row.get(8)?,
            study_specific_cost: row.get(9)?,
            snapshot_digest: row.get(10)?,
            imported_at: row.get(11)?,
        })
    }
}

impl TryFrom<StudyProcedureRow> for StudyProcedure {
    type Error = DbError;

    fn try_from(row: StudyProcedureRow) -> Result<Self, Self::Error> {
        Ok(StudyProcedure {
            id: row.id,
            study_id: row.study_id,
            master_procedure_id: row.master_procedure_id,
            name: row.name,
            category: row
                .category
                .parse()
                .map_err(|e: crate::models::UnknownVariant| DbError::Constraint(e.to_string()))?,
            description: row.description,
            currency: row.currency,
            input_fields: serde_json::from_str(&row.input_fields)?,
            default_cost: row.default_cost,
            study_specific_cost: row.study_specific_cost,
            snapshot_digest: row.snapshot_digest,
            imported_at: row.imported_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MasterProcedure, NewMasterProcedure, NewStudy, ProcedureCategory, Study};

    fn setup_db() -> (Database, Study, MasterProcedure) {
        let db = Database::open_in_memory().unwrap();
        let study = Study::new(NewStudy::new("Tox", "Dr. Ito"));
        db.insert_study(&study).unwrap();
        let master = MasterProcedure::new(NewMasterProcedure::new(
            "Body weight",
            ProcedureCategory::InLifeMeasurement,
            4.0,
        ));
        db.insert_master_procedure(&master).unwrap();
        (db, study, master)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, study, master) = setup_db();
        let mut snapshot = StudyProcedure::snapshot_of(&master, &study.id, Some(3.5));
        snapshot.snapshot_digest = "digest".into();
        db.insert_study_procedure(&snapshot).unwrap();

        let retrieved = db.get_study_procedure(&snapshot.id).unwrap().unwrap();
        assert_eq!(retrieved, snapshot);
        assert_eq!(retrieved.study_specific_cost, Some(3.5));
    }

    #[test]
    fn test_list_by_study() {
        let (db, study, master) = setup_db();
        let other = Study::new(NewStudy::new("PK", "Dr. Ito"));
        db.insert_study(&other).unwrap();

        for study_id in [&study.id, &study.id, &other.id] {
            let mut snapshot = StudyProcedure::snapshot_of(&master, study_id, None);
            snapshot.snapshot_digest = "digest".into();
            db.insert_study_procedure(&snapshot).unwrap();
        }

        assert_eq!(db.list_study_procedures(&study.id).unwrap().len(), 2);
        assert_eq!(db.list_study_procedures(&other.id).unwrap().len(), 1);
    }
}
