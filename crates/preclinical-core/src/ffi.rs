//! FFI-safe records and their conversions.
//!
//! Enums cross the boundary as their display labels and are parsed on the
//! way in; an unknown label is `InvalidInput`.

use std::collections::HashMap;

use crate::cost::{StudyCost, VisitCost, VisitCostEntry, VisitCostLine};
use crate::models::{
    Animal, Cohort, CohortUpdate, InputField, InputFieldDraft, MasterProcedure,
    MasterProcedureUpdate, NewAnimal, NewCohort, NewMasterProcedure, NewStudy, NewVisit, Study,
    StudyProcedure, Visit, VisitProcedure, VisitUpdate,
};
use crate::PreclinicalError;

// =========================================================================
// Master procedures
// =========================================================================

/// FFI-safe input field.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInputField {
    pub id: String,
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub is_mandatory: bool,
    pub units: Option<String>,
    pub validation_rules: Option<HashMap<String, String>>,
    pub options: Option<Vec<String>>,
}

impl From<InputField> for FfiInputField {
    fn from(field: InputField) -> Self {
        Self {
            id: field.id,
            name: field.name,
            label: field.label,
            field_type: field.field_type.as_str().to_string(),
            is_mandatory: field.is_mandatory,
            units: field.units,
            validation_rules: field.validation_rules.map(|rules| rules.into_iter().collect()),
            options: field.options,
        }
    }
}

/// FFI-safe input field definition (no id yet).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInputFieldDraft {
    pub name: String,
    pub label: String,
    pub field_type: String,
    pub is_mandatory: bool,
    pub units: Option<String>,
    pub validation_rules: Option<HashMap<String, String>>,
    pub options: Option<Vec<String>>,
}

impl TryFrom<FfiInputFieldDraft> for InputFieldDraft {
    type Error = PreclinicalError;

    fn try_from(draft: FfiInputFieldDraft) -> Result<Self, Self::Error> {
        Ok(InputFieldDraft {
            name: draft.name,
            label: draft.label,
            field_type: draft.field_type.parse()?,
            is_mandatory: draft.is_mandatory,
            units: draft.units,
            validation_rules: draft.validation_rules.map(|rules| rules.into_iter().collect()),
            options: draft.options,
        })
    }
}

fn parse_drafts(drafts: Vec<FfiInputFieldDraft>) -> Result<Vec<InputFieldDraft>, PreclinicalError> {
    drafts.into_iter().map(TryInto::try_into).collect()
}

/// FFI-safe master procedure.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMasterProcedure {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub default_cost: f64,
    pub currency: String,
    pub parent_id: Option<String>,
    pub input_fields: Vec<FfiInputField>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<MasterProcedure> for FfiMasterProcedure {
    fn from(procedure: MasterProcedure) -> Self {
        Self {
            id: procedure.id,
            name: procedure.name,
            category: procedure.category.as_str().to_string(),
            description: procedure.description,
            default_cost: procedure.default_cost,
            currency: procedure.currency,
            parent_id: procedure.parent_id,
            input_fields: procedure.input_fields.into_iter().map(Into::into).collect(),
            is_active: procedure.is_active,
            created_at: procedure.created_at,
            updated_at: procedure.updated_at,
        }
    }
}

/// FFI-safe create payload. A missing currency defaults to USD.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewMasterProcedure {
    pub name: String,
    pub category: String,
    pub description: String,
    pub default_cost: f64,
    pub currency: Option<String>,
    pub parent_id: Option<String>,
    pub input_fields: Vec<FfiInputFieldDraft>,
}

impl TryFrom<FfiNewMasterProcedure> for NewMasterProcedure {
    type Error = PreclinicalError;

    fn try_from(def: FfiNewMasterProcedure) -> Result<Self, Self::Error> {
        Ok(NewMasterProcedure {
            name: def.name,
            category: def.category.parse()?,
            description: def.description,
            default_cost: def.default_cost,
            currency: def
                .currency
                .unwrap_or_else(|| crate::DEFAULT_CURRENCY.to_string()),
            parent_id: def.parent_id,
            input_fields: parse_drafts(def.input_fields)?,
        })
    }
}

/// FFI-safe merge-patch.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiMasterProcedureUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub default_cost: Option<f64>,
    pub currency: Option<String>,
    pub input_fields: Option<Vec<FfiInputFieldDraft>>,
    pub is_active: Option<bool>,
}

impl TryFrom<FfiMasterProcedureUpdate> for MasterProcedureUpdate {
    type Error = PreclinicalError;

    fn try_from(patch: FfiMasterProcedureUpdate) -> Result<Self, Self::Error> {
        Ok(MasterProcedureUpdate {
            name: patch.name,
            category: patch.category.map(|c| c.parse()).transpose()?,
            description: patch.description,
            default_cost: patch.default_cost,
            currency: patch.currency,
            input_fields: patch.input_fields.map(parse_drafts).transpose()?,
            is_active: patch.is_active,
        })
    }
}

// =========================================================================
// Studies, animals, cohorts
// =========================================================================

/// FFI-safe study.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStudy {
    pub id: String,
    pub name: String,
    pub description: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub principal_investigator: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Study> for FfiStudy {
    fn from(study: Study) -> Self {
        Self {
            id: study.id,
            name: study.name,
            description: study.description,
            start_date: study.start_date,
            end_date: study.end_date,
            principal_investigator: study.principal_investigator,
            status: study.status,
            created_at: study.created_at,
            updated_at: study.updated_at,
        }
    }
}

/// FFI-safe study create payload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewStudy {
    pub name: String,
    pub description: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub principal_investigator: String,
    pub status: Option<String>,
}

impl From<FfiNewStudy> for NewStudy {
    fn from(def: FfiNewStudy) -> Self {
        NewStudy {
            name: def.name,
            description: def.description,
            start_date: def.start_date,
            end_date: def.end_date,
            principal_investigator: def.principal_investigator,
            status: def.status,
        }
    }
}

/// FFI-safe animal.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAnimal {
    pub id: String,
    pub animal_id: String,
    pub species: String,
    pub strain: Option<String>,
    pub sex: String,
    pub birth_date: Option<String>,
    pub weight: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
}

impl From<Animal> for FfiAnimal {
    fn from(animal: Animal) -> Self {
        Self {
            id: animal.id,
            animal_id: animal.animal_id,
            species: animal.species,
            strain: animal.strain,
            sex: animal.sex,
            birth_date: animal.birth_date,
            weight: animal.weight,
            is_active: animal.is_active,
            created_at: animal.created_at,
        }
    }
}

/// FFI-safe animal registration payload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewAnimal {
    pub animal_id: String,
    pub species: String,
    pub strain: Option<String>,
    pub sex: String,
    pub birth_date: Option<String>,
    pub weight: Option<f64>,
}

impl From<FfiNewAnimal> for NewAnimal {
    fn from(def: FfiNewAnimal) -> Self {
        NewAnimal {
            animal_id: def.animal_id,
            species: def.species,
            strain: def.strain,
            sex: def.sex,
            birth_date: def.birth_date,
            weight: def.weight,
        }
    }
}

/// FFI-safe cohort.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCohort {
    pub id: String,
    pub study_id: String,
    pub name: String,
    pub description: String,
    pub criteria: Option<String>,
    pub planned_animal_count: u32,
    pub animal_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Cohort> for FfiCohort {
    fn from(cohort: Cohort) -> Self {
        Self {
            id: cohort.id,
            study_id: cohort.study_id,
            name: cohort.name,
            description: cohort.description,
            criteria: cohort.criteria,
            planned_animal_count: cohort.planned_animal_count,
            animal_ids: cohort.animal_ids,
            created_at: cohort.created_at,
            updated_at: cohort.updated_at,
        }
    }
}

/// FFI-safe cohort create payload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewCohort {
    pub study_id: String,
    pub name: String,
    pub description: String,
    pub criteria: Option<String>,
    pub planned_animal_count: u32,
}

impl From<FfiNewCohort> for NewCohort {
    fn from(def: FfiNewCohort) -> Self {
        NewCohort {
            study_id: def.study_id,
            name: def.name,
            description: def.description,
            criteria: def.criteria,
            planned_animal_count: def.planned_animal_count,
        }
    }
}

#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiCohortUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub criteria: Option<String>,
    pub planned_animal_count: Option<u32>,
}

impl From<FfiCohortUpdate> for CohortUpdate {
    fn from(patch: FfiCohortUpdate) -> Self {
        CohortUpdate {
            name: patch.name,
            description: patch.description,
            criteria: patch.criteria,
            planned_animal_count: patch.planned_animal_count,
        }
    }
}

// =========================================================================
// Snapshots and visits
// =========================================================================

/// FFI-safe study procedure snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStudyProcedure {
    pub id: String,
    pub study_id: String,
    pub master_procedure_id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub currency: String,
    pub input_fields: Vec<FfiInputField>,
    pub default_cost: f64,
    pub study_specific_cost: Option<f64>,
    pub unit_cost: f64,
    pub snapshot_digest: String,
    pub imported_at: String,
}

impl From<StudyProcedure> for FfiStudyProcedure {
    fn from(procedure: StudyProcedure) -> Self {
        let unit_cost = procedure.unit_cost();
        Self {
            id: procedure.id,
            study_id: procedure.study_id,
            master_procedure_id: procedure.master_procedure_id,
            name: procedure.name,
            category: procedure.category.as_str().to_string(),
            description: procedure.description,
            currency: procedure.currency,
            input_fields: procedure.input_fields.into_iter().map(Into::into).collect(),
            default_cost: procedure.default_cost,
            study_specific_cost: procedure.study_specific_cost,
            unit_cost,
            snapshot_digest: procedure.snapshot_digest,
            imported_at: procedure.imported_at,
        }
    }
}

/// FFI-safe visit.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisit {
    pub id: String,
    pub study_id: String,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub planned_timepoint: String,
    pub planned_date: Option<String>,
    pub actual_date: Option<String>,
    pub cohort_ids: Vec<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Visit> for FfiVisit {
    fn from(visit: Visit) -> Self {
        Self {
            id: visit.id,
            study_id: visit.study_id,
            name: visit.name,
            label: visit.label,
            description: visit.description,
            planned_timepoint: visit.planned_timepoint,
            planned_date: visit.planned_date,
            actual_date: visit.actual_date,
            cohort_ids: visit.cohort_ids,
            status: visit.status.as_str().to_string(),
            created_at: visit.created_at,
            updated_at: visit.updated_at,
        }
    }
}

/// FFI-safe visit create payload. A missing label defaults to the name.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewVisit {
    pub study_id: String,
    pub name: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub planned_timepoint: String,
    pub planned_date: Option<String>,
    pub cohort_ids: Vec<String>,
}

impl From<FfiNewVisit> for NewVisit {
    fn from(def: FfiNewVisit) -> Self {
        let mut visit = NewVisit::new(def.study_id, def.name, def.planned_timepoint, def.cohort_ids);
        if let Some(label) = def.label {
            visit.label = label;
        }
        visit.description = def.description;
        visit.planned_date = def.planned_date;
        visit
    }
}

#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiVisitUpdate {
    pub name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub planned_timepoint: Option<String>,
    pub planned_date: Option<String>,
    pub actual_date: Option<String>,
    pub cohort_ids: Option<Vec<String>>,
    pub status: Option<String>,
}

impl TryFrom<FfiVisitUpdate> for VisitUpdate {
    type Error = PreclinicalError;

    fn try_from(patch: FfiVisitUpdate) -> Result<Self, Self::Error> {
        Ok(VisitUpdate {
            name: patch.name,
            label: patch.label,
            description: patch.description,
            planned_timepoint: patch.planned_timepoint,
            planned_date: patch.planned_date,
            actual_date: patch.actual_date,
            cohort_ids: patch.cohort_ids,
            status: patch.status.map(|s| s.parse()).transpose()?,
        })
    }
}

/// FFI-safe visit-procedure assignment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitProcedure {
    pub id: String,
    pub visit_id: String,
    pub study_procedure_id: String,
    pub sequence_order: Option<u32>,
    pub assigned_at: String,
}

impl From<VisitProcedure> for FfiVisitProcedure {
    fn from(assignment: VisitProcedure) -> Self {
        Self {
            id: assignment.id,
            visit_id: assignment.visit_id,
            study_procedure_id: assignment.study_procedure_id,
            sequence_order: assignment.sequence_order,
            assigned_at: assignment.assigned_at,
        }
    }
}

// =========================================================================
// Costs
// =========================================================================

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitCost {
    pub visit_id: String,
    pub total_cost: f64,
    pub currency: String,
    pub total_animals: u64,
    pub procedure_count: u64,
}

impl From<VisitCost> for FfiVisitCost {
    fn from(cost: VisitCost) -> Self {
        Self {
            visit_id: cost.visit_id,
            total_cost: cost.total_cost,
            currency: cost.currency,
            total_animals: cost.total_animals,
            procedure_count: cost.procedure_count,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitCostLine {
    pub visit_procedure_id: String,
    pub study_procedure_id: String,
    pub name: Option<String>,
    pub unit_cost: f64,
    pub animals: u64,
    pub line_total: f64,
}

impl From<VisitCostLine> for FfiVisitCostLine {
    fn from(line: VisitCostLine) -> Self {
        Self {
            visit_procedure_id: line.visit_procedure_id,
            study_procedure_id: line.study_procedure_id,
            name: line.name,
            unit_cost: line.unit_cost,
            animals: line.animals,
            line_total: line.line_total,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVisitCostEntry {
    pub visit_id: String,
    pub visit_name: String,
    pub cost: f64,
}

impl From<VisitCostEntry> for FfiVisitCostEntry {
    fn from(entry: VisitCostEntry) -> Self {
        Self {
            visit_id: entry.visit_id,
            visit_name: entry.visit_name,
            cost: entry.cost,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStudyCost {
    pub study_id: String,
    pub total_cost: f64,
    pub currency: String,
    pub visit_costs: Vec<FfiVisitCostEntry>,
}

impl From<StudyCost> for FfiStudyCost {
    fn from(report: StudyCost) -> Self {
        Self {
            study_id: report.study_id,
            total_cost: report.total_cost,
            currency: report.currency,
            visit_costs: report.visit_costs.into_iter().map(Into::into).collect(),
        }
    }
}
