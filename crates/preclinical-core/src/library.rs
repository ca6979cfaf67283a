//! Master procedure library: the shared, editable catalog.
//!
//! Records are never removed. Archival clears `is_active`, which hides a
//! procedure from default listings and search but keeps it importable.

use crate::db::Database;
use crate::error::{require_cost, require_non_empty, CoreError, CoreResult};
use crate::models::{InputFieldDraft, MasterProcedure, MasterProcedureUpdate, NewMasterProcedure};

/// Library operations over a database.
pub struct MasterLibrary<'a> {
    db: &'a Database,
}

impl<'a> MasterLibrary<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Validate and store a new procedure.
    pub fn create(&self, def: NewMasterProcedure) -> CoreResult<MasterProcedure> {
        require_non_empty("name", &def.name)?;
        require_cost("default_cost", def.default_cost)?;
        require_non_empty("currency", &def.currency)?;
        validate_input_fields(&def.input_fields)?;

        let procedure = MasterProcedure::new(def);
        self.db.insert_master_procedure(&procedure)?;

        tracing::info!(
            procedure_id = %procedure.id,
            name = %procedure.name,
            category = %procedure.category,
            "master procedure created"
        );
        Ok(procedure)
    }

    /// All procedures in insertion order, optionally only active ones.
    pub fn list(&self, active_only: bool) -> CoreResult<Vec<MasterProcedure>> {
        Ok(self.db.list_master_procedures(active_only)?)
    }

    pub fn get(&self, id: &str) -> CoreResult<MasterProcedure> {
        self.db
            .get_master_procedure(id)?
            .ok_or_else(|| CoreError::not_found("Master procedure", id))
    }

    /// Merge-patch: only fields present in `patch` change.
    pub fn update(&self, id: &str, patch: MasterProcedureUpdate) -> CoreResult<MasterProcedure> {
        if let Some(name) = &patch.name {
            require_non_empty("name", name)?;
        }
        if let Some(cost) = patch.default_cost {
            require_cost("default_cost", cost)?;
        }
        if let Some(currency) = &patch.currency {
            require_non_empty("currency", currency)?;
        }
        if let Some(fields) = &patch.input_fields {
            validate_input_fields(fields)?;
        }

        let mut procedure = self.get(id)?;
        procedure.apply(patch);

        if !self.db.update_master_procedure(&procedure)? {
            return Err(CoreError::not_found("Master procedure", id));
        }

        tracing::info!(procedure_id = %id, "master procedure updated");
        Ok(procedure)
    }

    /// Soft delete. Archiving an archived procedure succeeds.
    pub fn archive(&self, id: &str) -> CoreResult<()> {
        if !self.db.set_master_procedure_active(id, false)? {
            return Err(CoreError::not_found("Master procedure", id));
        }
        tracing::info!(procedure_id = %id, "master procedure archived");
        Ok(())
    }

    /// Prefix search over name and description of active procedures.
    pub fn search(&self, query: &str, limit: usize) -> CoreResult<Vec<MasterProcedure>> {
        let results = self.db.search_master_procedures(query, limit)?;
        tracing::debug!(query, hits = results.len(), "master procedure search");
        Ok(results)
    }
}

fn validate_input_fields(fields: &[InputFieldDraft]) -> CoreResult<()> {
    for (index, field) in fields.iter().enumerate() {
        require_non_empty(&format!("input_fields[{}].name", index), &field.name)?;
        require_non_empty(&format!("input_fields[{}].label", index), &field.label)?;
        // Presence only; an empty option list is accepted.
        if field.field_type.requires_options() && field.options.is_none() {
            return Err(CoreError::validation(
                format!("input_fields[{}].options", index),
                format!("required for {} fields", field.field_type.as_str()),
            ));
        }
    }
    Ok(())
}
