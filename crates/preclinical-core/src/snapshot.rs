//! Procedure import: sealing library procedures into study snapshots.
//!
//! A snapshot is a value copy taken at import time. Later edits or archival
//! of the master procedure never reach it, and the store rejects updates to
//! snapshot rows. Each snapshot carries a SHA-256 digest over its frozen
//! fields so drift can be detected after the fact.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::db::{Database, DbError};
use crate::error::{require_cost, CoreError, CoreResult};
use crate::models::{InputField, ProcedureCategory, StudyProcedure};

/// Imports master procedures into studies.
pub struct ProcedureImporter<'a> {
    db: &'a Database,
}

impl<'a> ProcedureImporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Copy a master procedure into a study, optionally overriding its cost.
    ///
    /// Archived procedures remain importable.
    pub fn import(
        &self,
        study_id: &str,
        master_procedure_id: &str,
        cost_override: Option<f64>,
    ) -> CoreResult<StudyProcedure> {
        if !self.db.study_exists(study_id)? {
            return Err(CoreError::not_found("Study", study_id));
        }
        let master = self
            .db
            .get_master_procedure(master_procedure_id)?
            .ok_or_else(|| CoreError::not_found("Master procedure", master_procedure_id))?;
        if let Some(cost) = cost_override {
            require_cost("study_specific_cost", cost)?;
        }

        let mut snapshot = StudyProcedure::snapshot_of(&master, study_id, cost_override);
        snapshot.snapshot_digest = snapshot_digest(&snapshot).map_err(DbError::from)?;
        self.db.insert_study_procedure(&snapshot)?;

        tracing::info!(
            study_id,
            master_procedure_id,
            study_procedure_id = %snapshot.id,
            unit_cost = snapshot.unit_cost(),
            "procedure imported into study"
        );
        Ok(snapshot)
    }

    /// Snapshots of a study in import order. Unknown studies yield an empty list.
    pub fn list(&self, study_id: &str) -> CoreResult<Vec<StudyProcedure>> {
        Ok(self.db.list_study_procedures(study_id)?)
    }

    pub fn get(&self, id: &str) -> CoreResult<StudyProcedure> {
        self.db
            .get_study_procedure(id)?
            .ok_or_else(|| CoreError::not_found("Study procedure", id))
    }

    /// Recompute the digest and compare it with the stored one.
    pub fn verify(&self, id: &str) -> CoreResult<bool> {
        let snapshot = self.get(id)?;
        let expected = snapshot_digest(&snapshot).map_err(DbError::from)?;
        let intact = expected == snapshot.snapshot_digest;
        if !intact {
            tracing::warn!(study_procedure_id = %id, "snapshot digest mismatch");
        }
        Ok(intact)
    }
}

/// Frozen fields, serialized in declaration order.
#[derive(Serialize)]
struct FrozenFields<'a> {
    master_procedure_id: &'a str,
    name: &'a str,
    category: ProcedureCategory,
    description: &'a str,
    currency: &'a str,
    input_fields: &'a [InputField],
    default_cost: f64,
    study_specific_cost: Option<f64>,
}

/// Hex SHA-256 over the canonical JSON of a snapshot's frozen fields.
pub fn snapshot_digest(snapshot: &StudyProcedure) -> Result<String, serde_json::Error> {
    let frozen = FrozenFields {
        master_procedure_id: &snapshot.master_procedure_id,
        name: &snapshot.name,
        category: snapshot.category,
        description: &snapshot.description,
        currency: &snapshot.currency,
        input_fields: &snapshot.input_fields,
        default_cost: snapshot.default_cost,
        study_specific_cost: snapshot.study_specific_cost,
    };
    let json = serde_json::to_vec(&frozen)?;

    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}
