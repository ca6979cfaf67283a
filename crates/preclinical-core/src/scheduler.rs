//! Visit scheduling and procedure assignment.

use std::collections::HashSet;

use crate::config::SchedulingPolicy;
use crate::db::Database;
use crate::error::{require_date, require_non_empty, CoreError, CoreResult};
use crate::models::{NewVisit, Visit, VisitProcedure, VisitUpdate};

/// Schedules visits within a study and attaches study procedures to them.
pub struct VisitScheduler<'a> {
    db: &'a Database,
    policy: SchedulingPolicy,
}

impl<'a> VisitScheduler<'a> {
    /// Scheduler with the default policy.
    pub fn new(db: &'a Database) -> Self {
        Self::with_policy(db, SchedulingPolicy::default())
    }

    pub fn with_policy(db: &'a Database, policy: SchedulingPolicy) -> Self {
        Self { db, policy }
    }

    /// Create a visit in `Scheduled` status.
    pub fn create_visit(&self, def: NewVisit) -> CoreResult<Visit> {
        if !self.db.study_exists(&def.study_id)? {
            return Err(CoreError::not_found("Study", def.study_id.as_str()));
        }
        self.check_cohorts(&def.study_id, &def.cohort_ids)?;
        require_non_empty("name", &def.name)?;
        require_non_empty("label", &def.label)?;
        require_non_empty("planned_timepoint", &def.planned_timepoint)?;
        require_date("planned_date", def.planned_date.as_deref())?;

        let visit = Visit::new(def);
        self.db.insert_visit(&visit)?;
        tracing::info!(
            visit_id = %visit.id,
            study_id = %visit.study_id,
            cohorts = visit.cohort_ids.len(),
            "visit scheduled"
        );
        Ok(visit)
    }

    pub fn get_visit(&self, id: &str) -> CoreResult<Visit> {
        self.db
            .get_visit(id)?
            .ok_or_else(|| CoreError::not_found("Visit", id))
    }

    pub fn list_visits(&self, study_id: &str) -> CoreResult<Vec<Visit>> {
        Ok(self.db.list_visits_for_study(study_id)?)
    }

    /// Merge-patch. Status changes are free unless strict transitions are on.
    pub fn update_visit(&self, id: &str, patch: VisitUpdate) -> CoreResult<Visit> {
        let mut visit = self.get_visit(id)?;

        if let Some(cohort_ids) = &patch.cohort_ids {
            self.check_cohorts(&visit.study_id, cohort_ids)?;
        }
        for (field, value) in [
            ("name", &patch.name),
            ("label", &patch.label),
            ("planned_timepoint", &patch.planned_timepoint),
        ] {
            if let Some(value) = value {
                require_non_empty(field, value)?;
            }
        }
        require_date("planned_date", patch.planned_date.as_deref())?;
        require_date("actual_date", patch.actual_date.as_deref())?;

        if let Some(next) = patch.status {
            if self.policy.strict_status_transitions && !visit.status.can_transition_to(next) {
                return Err(CoreError::Conflict(format!(
                    "visit {} is {} and cannot move to {}",
                    id, visit.status, next
                )));
            }
        }

        let previous = visit.status;
        visit.apply(patch);
        if !self.db.update_visit(&visit)? {
            return Err(CoreError::not_found("Visit", id));
        }

        if previous != visit.status {
            tracing::info!(visit_id = %id, from = %previous, to = %visit.status, "visit status changed");
        } else {
            tracing::info!(visit_id = %id, "visit updated");
        }
        Ok(visit)
    }

    /// Attach a study procedure to a visit. Repeated assignments are kept.
    pub fn assign_procedure(
        &self,
        visit_id: &str,
        study_procedure_id: &str,
        sequence_order: Option<u32>,
    ) -> CoreResult<VisitProcedure> {
        let visit = self.get_visit(visit_id)?;
        let procedure = self
            .db
            .get_study_procedure(study_procedure_id)?
            .ok_or_else(|| CoreError::not_found("Study procedure", study_procedure_id))?;

        if self.policy.enforce_procedure_study && procedure.study_id != visit.study_id {
            return Err(CoreError::not_found(
                "Study procedure",
                format!("{} in study {}", study_procedure_id, visit.study_id),
            ));
        }

        let assignment = VisitProcedure::new(visit_id, study_procedure_id, sequence_order);
        self.db.insert_visit_procedure(&assignment)?;
        tracing::info!(
            visit_id,
            study_procedure_id,
            visit_procedure_id = %assignment.id,
            "procedure assigned to visit"
        );
        Ok(assignment)
    }

    /// Assignments ordered by sequence (unsequenced last), then assignment order.
    pub fn list_visit_procedures(&self, visit_id: &str) -> CoreResult<Vec<VisitProcedure>> {
        Ok(self.db.list_visit_procedures(visit_id)?)
    }

    /// Every id must name a cohort of `study_id`, each at most once.
    fn check_cohorts(&self, study_id: &str, cohort_ids: &[String]) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for cohort_id in cohort_ids {
            if !self.db.cohort_in_study(cohort_id, study_id)? {
                return Err(CoreError::not_found(
                    "Cohort",
                    format!("{} in study {}", cohort_id, study_id),
                ));
            }
            if !seen.insert(cohort_id.as_str()) {
                return Err(CoreError::validation(
                    "cohort_ids",
                    format!("duplicate cohort id {}", cohort_id),
                ));
            }
        }
        Ok(())
    }
}
