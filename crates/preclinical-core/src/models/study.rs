//! Study and cohort models.

use serde::{Deserialize, Serialize};

/// Default status for new studies.
pub const DEFAULT_STUDY_STATUS: &str = "Planning";

/// Root of the containment hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Study {
    pub id: String,
    pub name: String,
    pub description: String,
    /// ISO date
    pub start_date: Option<String>,
    /// ISO date
    pub end_date: Option<String>,
    pub principal_investigator: String,
    /// Free-form status (e.g., "Planning", "Active")
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for creating a study.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStudy {
    pub name: String,
    pub description: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub principal_investigator: String,
    /// Defaults to "Planning"
    pub status: Option<String>,
}

impl NewStudy {
    pub fn new(name: impl Into<String>, principal_investigator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            start_date: None,
            end_date: None,
            principal_investigator: principal_investigator.into(),
            status: None,
        }
    }
}

impl Study {
    pub fn new(def: NewStudy) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: def.name,
            description: def.description,
            start_date: def.start_date,
            end_date: def.end_date,
            principal_investigator: def.principal_investigator,
            status: def.status.unwrap_or_else(|| DEFAULT_STUDY_STATUS.to_string()),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A named group of animals within one study.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cohort {
    pub id: String,
    pub study_id: String,
    pub name: String,
    pub description: String,
    pub criteria: Option<String>,
    /// Target size, informational only
    pub planned_animal_count: u32,
    /// Member animal ids (set semantics)
    pub animal_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for creating a cohort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCohort {
    pub study_id: String,
    pub name: String,
    pub description: String,
    pub criteria: Option<String>,
    pub planned_animal_count: u32,
}

impl NewCohort {
    pub fn new(study_id: impl Into<String>, name: impl Into<String>, planned_animal_count: u32) -> Self {
        Self {
            study_id: study_id.into(),
            name: name.into(),
            description: String::new(),
            criteria: None,
            planned_animal_count,
        }
    }
}

/// Merge-patch for a cohort. Membership is changed through assign/remove only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CohortUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub criteria: Option<String>,
    pub planned_animal_count: Option<u32>,
}

impl Cohort {
    pub fn new(def: NewCohort) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            study_id: def.study_id,
            name: def.name,
            description: def.description,
            criteria: def.criteria,
            planned_animal_count: def.planned_animal_count,
            animal_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: CohortUpdate) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(criteria) = patch.criteria {
            self.criteria = Some(criteria);
        }
        if let Some(count) = patch.planned_animal_count {
            self.planned_animal_count = count;
        }
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn animal_count(&self) -> usize {
        self.animal_ids.len()
    }

    pub fn contains(&self, animal_id: &str) -> bool {
        self.animal_ids.iter().any(|id| id == animal_id)
    }
}
