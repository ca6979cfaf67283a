//! SQLite schema definition.

/// Complete database schema for the study costing core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Master Procedure Library (mutable, soft delete)
-- ============================================================================

CREATE TABLE IF NOT EXISTS master_procedures (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    default_cost REAL NOT NULL CHECK (default_cost >= 0),
    currency TEXT NOT NULL DEFAULT 'USD',
    parent_id TEXT,                               -- informational only
    input_fields TEXT NOT NULL DEFAULT '[]',      -- JSON array of InputField
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- FTS5 virtual table for library search
CREATE VIRTUAL TABLE IF NOT EXISTS master_procedures_fts USING fts5(
    name,
    description,
    content='master_procedures',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS master_procedures_ai AFTER INSERT ON master_procedures BEGIN
    INSERT INTO master_procedures_fts(rowid, name, description)
    VALUES (new.rowid, new.name, new.description);
END;

CREATE TRIGGER IF NOT EXISTS master_procedures_ad AFTER DELETE ON master_procedures BEGIN
    INSERT INTO master_procedures_fts(master_procedures_fts, rowid, name, description)
    VALUES ('delete', old.rowid, old.name, old.description);
END;

CREATE TRIGGER IF NOT EXISTS master_procedures_au AFTER UPDATE ON master_procedures BEGIN
    INSERT INTO master_procedures_fts(master_procedures_fts, rowid, name, description)
    VALUES ('delete', old.rowid, old.name, old.description);
    INSERT INTO master_procedures_fts(rowid, name, description)
    VALUES (new.rowid, new.name, new.description);
END;

CREATE INDEX IF NOT EXISTS idx_master_procedures_active ON master_procedures(is_active);

-- ============================================================================
-- Animals
-- ============================================================================

CREATE TABLE IF NOT EXISTS animals (
    id TEXT PRIMARY KEY,
    animal_id TEXT NOT NULL,                      -- external tag, not unique
    species TEXT NOT NULL,
    strain TEXT,
    sex TEXT NOT NULL,
    birth_date TEXT,
    weight REAL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_animals_animal_id ON animals(animal_id);

-- ============================================================================
-- Studies and Cohorts
-- ============================================================================

CREATE TABLE IF NOT EXISTS studies (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    start_date TEXT,
    end_date TEXT,
    principal_investigator TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Planning',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cohorts (
    id TEXT PRIMARY KEY,
    study_id TEXT NOT NULL REFERENCES studies(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    criteria TEXT,
    planned_animal_count INTEGER NOT NULL DEFAULT 0 CHECK (planned_animal_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cohorts_study ON cohorts(study_id);

-- Cohort membership: the composite key makes set-add atomic
CREATE TABLE IF NOT EXISTS cohort_animals (
    cohort_id TEXT NOT NULL REFERENCES cohorts(id),
    animal_id TEXT NOT NULL REFERENCES animals(id),
    assigned_at TEXT NOT NULL,
    PRIMARY KEY (cohort_id, animal_id)
);

CREATE INDEX IF NOT EXISTS idx_cohort_animals_animal ON cohort_animals(animal_id);

-- ============================================================================
-- Study Procedures (snapshots - immutable after import)
-- ============================================================================

CREATE TABLE IF NOT EXISTS study_procedures (
    id TEXT PRIMARY KEY,
    study_id TEXT NOT NULL REFERENCES studies(id),
    master_procedure_id TEXT NOT NULL,            -- provenance, not a live reference
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    currency TEXT NOT NULL,
    input_fields TEXT NOT NULL DEFAULT '[]',      -- JSON array of InputField
    default_cost REAL NOT NULL,
    study_specific_cost REAL,
    snapshot_digest TEXT NOT NULL,
    imported_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_study_procedures_study ON study_procedures(study_id);

CREATE TRIGGER IF NOT EXISTS study_procedures_immutable BEFORE UPDATE ON study_procedures
BEGIN
    SELECT RAISE(ABORT, 'Study procedure snapshots are immutable');
END;

-- ============================================================================
-- Visits and Visit Procedures
-- ============================================================================

CREATE TABLE IF NOT EXISTS visits (
    id TEXT PRIMARY KEY,
    study_id TEXT NOT NULL REFERENCES studies(id),
    name TEXT NOT NULL,
    label TEXT NOT NULL,
    description TEXT,
    planned_timepoint TEXT NOT NULL,
    planned_date TEXT,
    actual_date TEXT,
    cohort_ids TEXT NOT NULL DEFAULT '[]',        -- JSON array of cohort ids
    status TEXT NOT NULL DEFAULT 'Scheduled'
        CHECK (status IN ('Scheduled', 'Upcoming', 'In Progress', 'Completed', 'Missed', 'Skipped')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_visits_study ON visits(study_id);

CREATE TABLE IF NOT EXISTS visit_procedures (
    id TEXT PRIMARY KEY,
    visit_id TEXT NOT NULL REFERENCES visits(id),
    study_procedure_id TEXT NOT NULL REFERENCES study_procedures(id),
    sequence_order INTEGER,
    assigned_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_visit_procedures_visit ON visit_procedures(visit_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_fts_trigger() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO master_procedures (id, name, category, description, default_cost, created_at, updated_at)
             VALUES ('p1', 'Blood collection', 'Sample Collection', 'Tail vein bleed', 20.0, 'now', 'now')",
            [],
        )
        .unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM master_procedures_fts WHERE master_procedures_fts MATCH 'tail'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_negative_cost_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO master_procedures (id, name, category, default_cost, created_at, updated_at)
             VALUES ('p1', 'Bad', 'Observation', -1.0, 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_study_procedure_update_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO studies (id, name, principal_investigator, created_at, updated_at)
             VALUES ('s1', 'Study', 'PI', 'now', 'now')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO study_procedures (id, study_id, master_procedure_id, name, category, currency,
                                           default_cost, snapshot_digest, imported_at)
             VALUES ('sp1', 's1', 'p1', 'Blood', 'Sample Collection', 'USD', 10.0, 'abc', 'now')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE study_procedures SET name = 'Changed' WHERE id = 'sp1'", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_membership_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute_batch(
            "INSERT INTO studies (id, name, principal_investigator, created_at, updated_at)
                 VALUES ('s1', 'Study', 'PI', 'now', 'now');
             INSERT INTO cohorts (id, study_id, name, created_at, updated_at)
                 VALUES ('c1', 's1', 'Cohort', 'now', 'now');
             INSERT INTO animals (id, animal_id, species, sex, created_at)
                 VALUES ('a1', 'RAT001', 'Rat', 'Male', 'now');
             INSERT INTO cohort_animals (cohort_id, animal_id, assigned_at) VALUES ('c1', 'a1', 'now');",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO cohort_animals (cohort_id, animal_id, assigned_at) VALUES ('c1', 'a1', 'now')",
            [],
        );
        assert!(result.is_err());
    }
}
