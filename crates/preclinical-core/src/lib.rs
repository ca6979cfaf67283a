//! Preclinical Costing Core Library
//!
//! Study structure, procedure snapshots and cost aggregation for preclinical
//! (animal) studies, backed by SQLite.
//!
//! # Architecture
//!
//! ```text
//!        Master Procedure Library (editable, archivable)
//!                         │
//!                  import (value copy)
//!                         │
//!             ┌───────────▼───────────┐
//!             │   Study Procedure     │
//!             │  frozen + digest      │
//!             └───────────┬───────────┘
//!                         │ assign
//!   Study ── Cohorts ── Visits ── Visit Procedures
//!              │                        │
//!           Animals                     │
//!              │                        │
//!              └──────────┬─────────────┘
//!                         ▼
//!                   Cost Engine
//!          unit cost × animals, per visit / study
//!                         │
//!                  JSON / CSV report
//! ```
//!
//! # Core Principle
//!
//! **Costs read snapshots, never the library.** Editing or archiving a master
//! procedure after import never changes a study's cost.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer with FTS5 search
//! - [`models`]: Domain types (MasterProcedure, StudyProcedure, Cohort, Visit, etc.)
//! - [`library`]: Master procedure library
//! - [`registry`]: Studies, animals and cohort membership
//! - [`snapshot`]: Procedure import and snapshot digests
//! - [`scheduler`]: Visits and visit-procedure assignment
//! - [`cost`]: Visit and study cost aggregation, report export
//! - [`config`]: TOML configuration with environment overrides
//! - [`ffi`]: FFI-safe records

pub mod config;
pub mod cost;
pub mod db;
pub mod error;
pub mod ffi;
pub mod library;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod snapshot;

// Re-export commonly used types
pub use config::{load_config, CoreConfig, SchedulingPolicy};
pub use cost::{CostEngine, StudyCost, VisitCost, VisitCostEntry, VisitCostLine};
pub use db::Database;
pub use error::{CoreError, CoreResult};
pub use library::MasterLibrary;
pub use models::{
    Animal, Cohort, InputField, InputFieldType, MasterProcedure, ProcedureCategory, Study,
    StudyProcedure, Visit, VisitProcedure, VisitStatus,
};
pub use registry::Registry;
pub use scheduler::VisitScheduler;
pub use snapshot::{snapshot_digest, ProcedureImporter};

use ffi::*;

/// Currency assigned to new master procedures when none is given.
pub const DEFAULT_CURRENCY: &str = "USD";

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::path::Path;
use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PreclinicalError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<CoreError> for PreclinicalError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound { .. } => PreclinicalError::NotFound(e.to_string()),
            CoreError::Conflict(message) => PreclinicalError::Conflict(message),
            CoreError::Validation { .. } => PreclinicalError::InvalidInput(e.to_string()),
            CoreError::Database(db) => db.into(),
        }
    }
}

impl From<db::DbError> for PreclinicalError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::Json(e) => e.into(),
            other => PreclinicalError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PreclinicalError {
    fn from(e: serde_json::Error) -> Self {
        PreclinicalError::SerializationError(e.to_string())
    }
}

impl From<models::UnknownVariant> for PreclinicalError {
    fn from(e: models::UnknownVariant) -> Self {
        PreclinicalError::InvalidInput(e.to_string())
    }
}

impl From<config::ConfigError> for PreclinicalError {
    fn from(e: config::ConfigError) -> Self {
        PreclinicalError::InvalidInput(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PreclinicalError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PreclinicalError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<PreclinicalCore>, PreclinicalError> {
    let db = Database::open(&path)?;
    Ok(PreclinicalCore::wrap(db, SchedulingPolicy::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<PreclinicalCore>, PreclinicalError> {
    let db = Database::open_in_memory()?;
    Ok(PreclinicalCore::wrap(db, SchedulingPolicy::default()))
}

/// Open the database and scheduling policy described by configuration.
///
/// Without a path, `PRECLINICAL_CONFIG_PATH` and then built-in defaults apply.
#[uniffi::export]
pub fn open_database_with_config(
    config_path: Option<String>,
) -> Result<Arc<PreclinicalCore>, PreclinicalError> {
    let config = load_config(config_path.as_deref().map(Path::new))?;
    let db = Database::from_config(&config.database)?;
    Ok(PreclinicalCore::wrap(db, config.scheduling))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PreclinicalCore {
    db: Arc<Mutex<Database>>,
    policy: SchedulingPolicy,
}

impl PreclinicalCore {
    fn wrap(db: Database, policy: SchedulingPolicy) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            policy,
        })
    }
}

#[uniffi::export]
impl PreclinicalCore {
    // =========================================================================
    // Master Procedure Library
    // =========================================================================

    pub fn create_master_procedure(
        &self,
        def: FfiNewMasterProcedure,
    ) -> Result<FfiMasterProcedure, PreclinicalError> {
        let def: models::NewMasterProcedure = def.try_into()?;
        let db = self.db.lock()?;
        Ok(MasterLibrary::new(&db).create(def)?.into())
    }

    pub fn list_master_procedures(
        &self,
        active_only: bool,
    ) -> Result<Vec<FfiMasterProcedure>, PreclinicalError> {
        let db = self.db.lock()?;
        let procedures = MasterLibrary::new(&db).list(active_only)?;
        Ok(procedures.into_iter().map(Into::into).collect())
    }

    pub fn get_master_procedure(&self, id: String) -> Result<FfiMasterProcedure, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(MasterLibrary::new(&db).get(&id)?.into())
    }

    pub fn update_master_procedure(
        &self,
        id: String,
        patch: FfiMasterProcedureUpdate,
    ) -> Result<FfiMasterProcedure, PreclinicalError> {
        let patch: models::MasterProcedureUpdate = patch.try_into()?;
        let db = self.db.lock()?;
        Ok(MasterLibrary::new(&db).update(&id, patch)?.into())
    }

    /// Soft delete; the procedure stays importable.
    pub fn archive_master_procedure(&self, id: String) -> Result<(), PreclinicalError> {
        let db = self.db.lock()?;
        MasterLibrary::new(&db).archive(&id)?;
        Ok(())
    }

    /// Search active procedures by name/description.
    pub fn search_master_procedures(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiMasterProcedure>, PreclinicalError> {
        let db = self.db.lock()?;
        let procedures = MasterLibrary::new(&db).search(&query, limit as usize)?;
        Ok(procedures.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Studies and Animals
    // =========================================================================

    pub fn create_study(&self, def: FfiNewStudy) -> Result<FfiStudy, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).create_study(def.into())?.into())
    }

    pub fn list_studies(&self) -> Result<Vec<FfiStudy>, PreclinicalError> {
        let db = self.db.lock()?;
        let studies = Registry::new(&db).list_studies()?;
        Ok(studies.into_iter().map(Into::into).collect())
    }

    pub fn get_study(&self, id: String) -> Result<FfiStudy, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).get_study(&id)?.into())
    }

    pub fn create_animal(&self, def: FfiNewAnimal) -> Result<FfiAnimal, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).create_animal(def.into())?.into())
    }

    pub fn list_animals(&self, active_only: bool) -> Result<Vec<FfiAnimal>, PreclinicalError> {
        let db = self.db.lock()?;
        let animals = Registry::new(&db).list_animals(active_only)?;
        Ok(animals.into_iter().map(Into::into).collect())
    }

    pub fn get_animal(&self, id: String) -> Result<FfiAnimal, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).get_animal(&id)?.into())
    }

    /// Animals with the given external tag.
    pub fn find_animals_by_tag(&self, tag: String) -> Result<Vec<FfiAnimal>, PreclinicalError> {
        let db = self.db.lock()?;
        let animals = Registry::new(&db).find_animals_by_tag(&tag)?;
        Ok(animals.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Cohorts
    // =========================================================================

    pub fn create_cohort(&self, def: FfiNewCohort) -> Result<FfiCohort, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).create_cohort(def.into())?.into())
    }

    pub fn list_cohorts(&self, study_id: String) -> Result<Vec<FfiCohort>, PreclinicalError> {
        let db = self.db.lock()?;
        let cohorts = Registry::new(&db).list_cohorts(&study_id)?;
        Ok(cohorts.into_iter().map(Into::into).collect())
    }

    pub fn get_cohort(&self, id: String) -> Result<FfiCohort, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).get_cohort(&id)?.into())
    }

    pub fn update_cohort(
        &self,
        id: String,
        patch: FfiCohortUpdate,
    ) -> Result<FfiCohort, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).update_cohort(&id, patch.into())?.into())
    }

    /// Delete an empty cohort.
    pub fn delete_cohort(&self, id: String) -> Result<(), PreclinicalError> {
        let db = self.db.lock()?;
        Registry::new(&db).delete_cohort(&id)?;
        Ok(())
    }

    pub fn assign_animal_to_cohort(
        &self,
        cohort_id: String,
        animal_id: String,
    ) -> Result<FfiCohort, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).assign_animal(&cohort_id, &animal_id)?.into())
    }

    pub fn remove_animal_from_cohort(
        &self,
        cohort_id: String,
        animal_id: String,
    ) -> Result<FfiCohort, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(Registry::new(&db).remove_animal(&cohort_id, &animal_id)?.into())
    }

    // =========================================================================
    // Study Procedures
    // =========================================================================

    /// Snapshot a master procedure into a study.
    pub fn import_procedure(
        &self,
        study_id: String,
        master_procedure_id: String,
        cost_override: Option<f64>,
    ) -> Result<FfiStudyProcedure, PreclinicalError> {
        let db = self.db.lock()?;
        let snapshot =
            ProcedureImporter::new(&db).import(&study_id, &master_procedure_id, cost_override)?;
        Ok(snapshot.into())
    }

    pub fn list_study_procedures(
        &self,
        study_id: String,
    ) -> Result<Vec<FfiStudyProcedure>, PreclinicalError> {
        let db = self.db.lock()?;
        let procedures = ProcedureImporter::new(&db).list(&study_id)?;
        Ok(procedures.into_iter().map(Into::into).collect())
    }

    pub fn get_study_procedure(&self, id: String) -> Result<FfiStudyProcedure, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(ProcedureImporter::new(&db).get(&id)?.into())
    }

    /// True if the stored snapshot still matches its digest.
    pub fn verify_study_procedure(&self, id: String) -> Result<bool, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(ProcedureImporter::new(&db).verify(&id)?)
    }

    // =========================================================================
    // Visits
    // =========================================================================

    pub fn create_visit(&self, def: FfiNewVisit) -> Result<FfiVisit, PreclinicalError> {
        let db = self.db.lock()?;
        let scheduler = VisitScheduler::with_policy(&db, self.policy);
        Ok(scheduler.create_visit(def.into())?.into())
    }

    pub fn list_visits(&self, study_id: String) -> Result<Vec<FfiVisit>, PreclinicalError> {
        let db = self.db.lock()?;
        let visits = VisitScheduler::with_policy(&db, self.policy).list_visits(&study_id)?;
        Ok(visits.into_iter().map(Into::into).collect())
    }

    pub fn get_visit(&self, id: String) -> Result<FfiVisit, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(VisitScheduler::with_policy(&db, self.policy).get_visit(&id)?.into())
    }

    pub fn update_visit(
        &self,
        id: String,
        patch: FfiVisitUpdate,
    ) -> Result<FfiVisit, PreclinicalError> {
        let patch: models::VisitUpdate = patch.try_into()?;
        let db = self.db.lock()?;
        let scheduler = VisitScheduler::with_policy(&db, self.policy);
        Ok(scheduler.update_visit(&id, patch)?.into())
    }

    pub fn assign_procedure_to_visit(
        &self,
        visit_id: String,
        study_procedure_id: String,
        sequence_order: Option<u32>,
    ) -> Result<FfiVisitProcedure, PreclinicalError> {
        let db = self.db.lock()?;
        let scheduler = VisitScheduler::with_policy(&db, self.policy);
        let assignment =
            scheduler.assign_procedure(&visit_id, &study_procedure_id, sequence_order)?;
        Ok(assignment.into())
    }

    pub fn list_visit_procedures(
        &self,
        visit_id: String,
    ) -> Result<Vec<FfiVisitProcedure>, PreclinicalError> {
        let db = self.db.lock()?;
        let assignments =
            VisitScheduler::with_policy(&db, self.policy).list_visit_procedures(&visit_id)?;
        Ok(assignments.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Cost Operations
    // =========================================================================

    pub fn visit_cost(&self, visit_id: String) -> Result<FfiVisitCost, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(CostEngine::new(&db).visit_cost(&visit_id)?.into())
    }

    pub fn visit_cost_lines(
        &self,
        visit_id: String,
    ) -> Result<Vec<FfiVisitCostLine>, PreclinicalError> {
        let db = self.db.lock()?;
        let lines = CostEngine::new(&db).visit_cost_lines(&visit_id)?;
        Ok(lines.into_iter().map(Into::into).collect())
    }

    pub fn study_cost(&self, study_id: String) -> Result<FfiStudyCost, PreclinicalError> {
        let db = self.db.lock()?;
        Ok(CostEngine::new(&db).study_cost(&study_id)?.into())
    }

    /// Export a study cost report as JSON.
    pub fn export_study_cost_json(&self, study_id: String) -> Result<String, PreclinicalError> {
        let db = self.db.lock()?;
        let report = CostEngine::new(&db).study_cost(&study_id)?;
        Ok(report.to_json()?)
    }

    /// Export a study cost report as CSV.
    pub fn export_study_cost_csv(&self, study_id: String) -> Result<String, PreclinicalError> {
        let db = self.db.lock()?;
        let report = CostEngine::new(&db).study_cost(&study_id)?;
        Ok(report.to_csv())
    }
}
