//! Visit schedule models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Visit lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum VisitStatus {
    #[default]
    Scheduled,
    Upcoming,
    InProgress,
    Completed,
    Missed,
    Skipped,
}

impl VisitStatus {
    pub const ALL: [VisitStatus; 6] = [
        VisitStatus::Scheduled,
        VisitStatus::Upcoming,
        VisitStatus::InProgress,
        VisitStatus::Completed,
        VisitStatus::Missed,
        VisitStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "Scheduled",
            VisitStatus::Upcoming => "Upcoming",
            VisitStatus::InProgress => "In Progress",
            VisitStatus::Completed => "Completed",
            VisitStatus::Missed => "Missed",
            VisitStatus::Skipped => "Skipped",
        }
    }

    /// Conventionally terminal. Not guarded unless strict transitions are on.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VisitStatus::Completed | VisitStatus::Missed | VisitStatus::Skipped
        )
    }

    /// Strict transition rule: a terminal status can only be re-set to itself.
    pub fn can_transition_to(&self, next: VisitStatus) -> bool {
        !self.is_terminal() || *self == next
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitStatus {
    type Err = UnknownVariant;

    /// Accepts the display label or the variant name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VisitStatus::ALL
            .into_iter()
            .find(|v| v.as_str() == s || format!("{:?}", v) == s)
            .ok_or_else(|| UnknownVariant::new("visit status", s))
    }
}

/// A scheduled study event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub id: String,
    pub study_id: String,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    /// Free-form timepoint (e.g., "Day 7 ± 1")
    pub planned_timepoint: String,
    pub planned_date: Option<String>,
    pub actual_date: Option<String>,
    /// Cohorts of the same study
    pub cohort_ids: Vec<String>,
    pub status: VisitStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for scheduling a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewVisit {
    pub study_id: String,
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub planned_timepoint: String,
    pub planned_date: Option<String>,
    pub cohort_ids: Vec<String>,
}

impl NewVisit {
    pub fn new(
        study_id: impl Into<String>,
        name: impl Into<String>,
        planned_timepoint: impl Into<String>,
        cohort_ids: Vec<String>,
    ) -> Self {
        let name = name.into();
        Self {
            study_id: study_id.into(),
            label: name.clone(),
            name,
            description: None,
            planned_timepoint: planned_timepoint.into(),
            planned_date: None,
            cohort_ids,
        }
    }
}

/// Merge-patch for a visit. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisitUpdate {
    pub name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub planned_timepoint: Option<String>,
    pub planned_date: Option<String>,
    pub actual_date: Option<String>,
    pub cohort_ids: Option<Vec<String>>,
    pub status: Option<VisitStatus>,
}

impl Visit {
    pub fn new(def: NewVisit) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            study_id: def.study_id,
            name: def.name,
            label: def.label,
            description: def.description,
            planned_timepoint: def.planned_timepoint,
            planned_date: def.planned_date,
            actual_date: None,
            cohort_ids: def.cohort_ids,
            status: VisitStatus::Scheduled,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: VisitUpdate) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(timepoint) = patch.planned_timepoint {
            self.planned_timepoint = timepoint;
        }
        if let Some(date) = patch.planned_date {
            self.planned_date = Some(date);
        }
        if let Some(date) = patch.actual_date {
            self.actual_date = Some(date);
        }
        if let Some(cohort_ids) = patch.cohort_ids {
            self.cohort_ids = cohort_ids;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Assignment of a study procedure to a visit. Duplicates are allowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitProcedure {
    pub id: String,
    pub visit_id: String,
    pub study_procedure_id: String,
    pub sequence_order: Option<u32>,
    pub assigned_at: String,
}

impl VisitProcedure {
    pub fn new(visit_id: &str, study_procedure_id: &str, sequence_order: Option<u32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            visit_id: visit_id.to_string(),
            study_procedure_id: study_procedure_id.to_string(),
            sequence_order,
            assigned_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!("In Progress".parse::<VisitStatus>().unwrap(), VisitStatus::InProgress);
        assert_eq!("InProgress".parse::<VisitStatus>().unwrap(), VisitStatus::InProgress);
        assert_eq!(VisitStatus::Missed.to_string(), "Missed");
        assert!("Cancelled".parse::<VisitStatus>().is_err());
    }

    #[test]
    fn test_strict_transitions() {
        assert!(VisitStatus::Scheduled.can_transition_to(VisitStatus::Completed));
        assert!(VisitStatus::InProgress.can_transition_to(VisitStatus::Scheduled));
        assert!(VisitStatus::Completed.can_transition_to(VisitStatus::Completed));
        assert!(!VisitStatus::Completed.can_transition_to(VisitStatus::InProgress));
        assert!(!VisitStatus::Skipped.can_transition_to(VisitStatus::Scheduled));
    }

    #[test]
    fn test_new_visit_is_scheduled() {
        let visit = Visit::new(NewVisit::new("study-1", "Day 7", "Day 7 ± 1", vec!["c1".into()]));
        assert_eq!(visit.status, VisitStatus::Scheduled);
        assert_eq!(visit.label, "Day 7");
        assert!(visit.actual_date.is_none());
    }

    #[test]
    fn test_visit_patch_keeps_omitted_fields() {
        let mut visit = Visit::new(NewVisit::new("study-1", "Day 7", "Day 7", vec!["c1".into()]));
        visit.apply(VisitUpdate {
            status: Some(VisitStatus::Completed),
            actual_date: Some("2024-03-08".into()),
            ..Default::default()
        });

        assert_eq!(visit.status, VisitStatus::Completed);
        assert_eq!(visit.actual_date.as_deref(), Some("2024-03-08"));
        assert_eq!(visit.cohort_ids, vec!["c1".to_string()]);
        assert_eq!(visit.planned_timepoint, "Day 7");
    }
}
