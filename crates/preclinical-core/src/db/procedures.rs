//! Master procedure library database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{now, Database, DbError, DbResult};
use crate::models::MasterProcedure;

const COLUMNS: &str = "id, name, category, description, default_cost, currency, parent_id,
                       input_fields, is_active, created_at, updated_at";

impl Database {
    /// Insert a new master procedure.
    pub fn insert_master_procedure(&self, procedure: &MasterProcedure) -> DbResult<()> {
        let input_fields_json = serde_json::to_string(&procedure.input_fields)?;

        self.conn.execute(
            r#"
            INSERT INTO master_procedures (
                id, name, category, description, default_cost, currency,
                parent_id, input_fields, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                procedure.id,
                procedure.name,
                procedure.category.as_str(),
                procedure.description,
                procedure.default_cost,
                procedure.currency,
                procedure.parent_id,
                input_fields_json,
                procedure.is_active,
                procedure.created_at,
                procedure.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Write back every mutable field of an existing procedure.
    pub fn update_master_procedure(&self, procedure: &MasterProcedure) -> DbResult<bool> {
        let input_fields_json = serde_json::to_string(&procedure.input_fields)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE master_procedures SET
                name = ?2,
                category = ?3,
                description = ?4,
                default_cost = ?5,
                currency = ?6,
                parent_id = ?7,
                input_fields = ?8,
                is_active = ?9,
                updated_at = ?10
            WHERE id = ?1
            "#,
            params![
                procedure.id,
                procedure.name,
                procedure.category.as_str(),
                procedure.description,
                procedure.default_cost,
                procedure.currency,
                procedure.parent_id,
                input_fields_json,
                procedure.is_active,
                procedure.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a master procedure by ID.
    pub fn get_master_procedure(&self, id: &str) -> DbResult<Option<MasterProcedure>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM master_procedures WHERE id = ?", COLUMNS),
                [id],
                MasterProcedureRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List master procedures in insertion order.
    pub fn list_master_procedures(&self, active_only: bool) -> DbResult<Vec<MasterProcedure>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM master_procedures WHERE is_active = 1 ORDER BY rowid",
                COLUMNS
            )
        } else {
            format!("SELECT {} FROM master_procedures ORDER BY rowid", COLUMNS)
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], MasterProcedureRow::from_row)?;

        let mut procedures = Vec::new();
        for row in rows {
            procedures.push(row?.try_into()?);
        }
        Ok(procedures)
    }

    /// Search active procedures using FTS5 (BM25 ranking).
    pub fn search_master_procedures(&self, query: &str, limit: usize) -> DbResult<Vec<MasterProcedure>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.name, p.category, p.description, p.default_cost, p.currency,
                   p.parent_id, p.input_fields, p.is_active, p.created_at, p.updated_at,
                   bm25(master_procedures_fts) as rank
            FROM master_procedures p
            JOIN master_procedures_fts fts ON p.rowid = fts.rowid
            WHERE master_procedures_fts MATCH ?
            AND p.is_active = 1
            ORDER BY rank
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(params![escaped_query, limit as i64], MasterProcedureRow::from_row)?;

        let mut procedures = Vec::new();
        for row in rows {
            procedures.push(row?.try_into()?);
        }
        Ok(procedures)
    }

    /// Set the active flag (archive/unarchive). Returns false if the id is unknown.
    pub fn set_master_procedure_active(&self, id: &str, active: bool) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE master_procedures SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, now(), id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct MasterProcedureRow {
    id: String,
    name: String,
    category: String,
    description: String,
    default_cost: f64,
    currency: String,
    parent_id: Option<String>,
    input_fields: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl MasterProcedureRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            default_cost: row.get(4)?,
            currency: row.get(5)?,
            parent_id: row.get(6)?,
            input_fields: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl TryFrom<MasterProcedureRow> for MasterProcedure {
    type Error = DbError;

    fn try_from(row: MasterProcedureRow) -> Result<Self, Self::Error> {
        Ok(MasterProcedure {
            id: row.id,
            name: row.name,
            category: row
                .category
                .parse()
                .map_err(|e: crate::models::UnknownVariant| DbError::Constraint(e.to_string()))?,
            description: row.description,
            default_cost: row.default_cost,
            currency: row.currency,
            parent_id: row.parent_id,
            input_fields: serde_json::from_str(&row.input_fields)?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Quote each word as an FTS5 prefix phrase so operators like `AND` match as text.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("\"{}\"*", word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InputFieldDraft, InputFieldType, MasterProcedureUpdate, NewMasterProcedure, ProcedureCategory,
    };

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_procedure(name: &str, cost: f64) -> MasterProcedure {
        let mut def = NewMasterProcedure::new(name, ProcedureCategory::SampleCollection, cost);
        def.description = format!("{} description", name);
        let mut field = InputFieldDraft::new("site", "Collection site", InputFieldType::Dropdown);
        field.options = Some(vec!["tail".into(), "saphenous".into()]);
        def.input_fields.push(field);
        MasterProcedure::new(def)
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let procedure = make_procedure("Blood collection", 20.0);
        db.insert_master_procedure(&procedure).unwrap();

        let retrieved = db.get_master_procedure(&procedure.id).unwrap().unwrap();
        assert_eq!(retrieved, procedure);
        assert_eq!(
            retrieved.input_fields[0].options,
            Some(vec!["tail".to_string(), "saphenous".to_string()])
        );
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_master_procedure("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_writes_back() {
        let db = setup_db();
        let mut procedure = make_procedure("Blood collection", 20.0);
        db.insert_master_procedure(&procedure).unwrap();

        procedure.apply(MasterProcedureUpdate {
            category: Some(ProcedureCategory::Bioanalysis),
            default_cost: Some(42.0),
            ..Default::default()
        });
        assert!(db.update_master_procedure(&procedure).unwrap());

        let retrieved = db.get_master_procedure(&procedure.id).unwrap().unwrap();
        assert_eq!(retrieved.category, ProcedureCategory::Bioanalysis);
        assert_eq!(retrieved.default_cost, 42.0);
    }

    #[test]
    fn test_list_insertion_order_and_filter() {
        let db = setup_db();
        let first = make_procedure("Zeta weighing", 5.0);
        let second = make_procedure("Alpha necropsy", 150.0);
        db.insert_master_procedure(&first).unwrap();
        db.insert_master_procedure(&second).unwrap();

        db.set_master_procedure_active(&first.id, false).unwrap();

        let all = db.list_master_procedures(false).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);
        assert_eq!(all[1].id, second.id);

        let active = db.list_master_procedures(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    #[test]
    fn test_search_skips_archived() {
        let db = setup_db();
        let blood = make_procedure("Blood collection", 20.0);
        let urine = make_procedure("Urine collection", 15.0);
        db.insert_master_procedure(&blood).unwrap();
        db.insert_master_procedure(&urine).unwrap();

        let results = db.search_master_procedures("collect", 10).unwrap();
        assert_eq!(results.len(), 2);

        db.set_master_procedure_active(&urine.id, false).unwrap();
        let results = db.search_master_procedures("urine", 10).unwrap();
        assert!(results.is_empty());

        let results = db.search_master_procedures("blo", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, blood.id);
    }

    #[test]
    fn test_search_ignores_operators() {
        let db = setup_db();
        db.insert_master_procedure(&make_procedure("Blood collection", 20.0))
            .unwrap();

        assert!(db.search_master_procedures("\"*()", 10).unwrap().is_empty());
        assert_eq!(escape_fts_query("blood OR\"x"), "\"blood\"* \"ORx\"*");
    }

    #[test]
    fn test_search_treats_keywords_as_text() {
        let db = setup_db();
        let mut def = NewMasterProcedure::new(
            "Blood AND urine panel",
            ProcedureCategory::Bioanalysis,
            40.0,
        );
        def.description = "NOT fasted, OR under isoflurane".into();
        let panel = MasterProcedure::new(def);
        db.insert_master_procedure(&panel).unwrap();

        for query in ["AND", "blood AND", "OR urine", "NOT", "urine NOT"] {
            let results = db.search_master_procedures(query, 10).unwrap();
            assert_eq!(results.len(), 1, "query {}", query);
            assert_eq!(results[0].id, panel.id);
        }
        assert!(db.search_master_procedures("AND saline", 10).unwrap().is_empty());
    }

    #[test]
    fn test_set_active_unknown_id() {
        let db = setup_db();
        assert!(!db.set_master_procedure_active("missing", false).unwrap());
    }
}
