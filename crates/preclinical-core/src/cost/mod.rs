//! Cost aggregation over visits and studies.
//!
//! A visit costs the sum, over its procedure assignments, of the snapshot
//! unit cost times the number of animals in the visit's cohorts. Costs only
//! ever read study snapshots, never the master library.
//!
//! ```text
//! visit_cost = Σ_assignments unit_cost(snapshot) × Σ_cohorts |members|
//! study_cost = Σ_visits visit_cost
//! ```

mod report;

use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::models::Visit;

/// Currency stamped on every cost report, whatever the procedure currency.
pub const REPORT_CURRENCY: &str = "USD";

/// Cost of a single visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitCost {
    pub visit_id: String,
    pub total_cost: f64,
    pub currency: String,
    /// Members summed over cohorts, not deduplicated
    pub total_animals: u64,
    /// Number of assignments, resolvable or not
    pub procedure_count: u64,
}

/// One line of a study report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitCostEntry {
    pub visit_id: String,
    pub visit_name: String,
    pub cost: f64,
}

/// Cost of a whole study.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyCost {
    pub study_id: String,
    pub total_cost: f64,
    pub currency: String,
    pub visit_costs: Vec<VisitCostEntry>,
}

/// A single assignment's contribution to a visit cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitCostLine {
    pub visit_procedure_id: String,
    pub study_procedure_id: String,
    /// None when the snapshot no longer resolves
    pub name: Option<String>,
    pub unit_cost: f64,
    pub animals: u64,
    pub line_total: f64,
}

/// Computes visit and study costs.
pub struct CostEngine<'a> {
    db: &'a Database,
}

impl<'a> CostEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Total cost of a visit.
    pub fn visit_cost(&self, visit_id: &str) -> CoreResult<VisitCost> {
        let visit = self.load_visit(visit_id)?;
        let total_animals = self.count_animals(&visit)?;
        let lines = self.lines_for(&visit, total_animals)?;

        let cost = VisitCost {
            visit_id: visit.id,
            total_cost: lines.iter().map(|line| line.line_total).sum(),
            currency: REPORT_CURRENCY.to_string(),
            total_animals,
            procedure_count: lines.len() as u64,
        };
        tracing::debug!(
            visit_id = %cost.visit_id,
            total_cost = cost.total_cost,
            total_animals = cost.total_animals,
            procedure_count = cost.procedure_count,
            "visit cost computed"
        );
        Ok(cost)
    }

    /// Per-assignment breakdown of a visit cost, in assignment listing order.
    pub fn visit_cost_lines(&self, visit_id: &str) -> CoreResult<Vec<VisitCostLine>> {
        let visit = self.load_visit(visit_id)?;
        let total_animals = self.count_animals(&visit)?;
        self.lines_for(&visit, total_animals)
    }

    /// Total cost of every visit in a study.
    ///
    /// Visits that disappear mid-aggregation are skipped. An unknown study
    /// yields an empty report.
    pub fn study_cost(&self, study_id: &str) -> CoreResult<StudyCost> {
        let visits = self.db.list_visits_for_study(study_id)?;

        let mut visit_costs = Vec::with_capacity(visits.len());
        for visit in visits {
            match self.visit_cost(&visit.id) {
                Ok(cost) => visit_costs.push(VisitCostEntry {
                    visit_id: cost.visit_id,
                    visit_name: visit.name,
                    cost: cost.total_cost,
                }),
                Err(e) if e.is_not_found() => {
                    tracing::warn!(study_id, visit_id = %visit.id, error = %e, "skipping visit");
                }
                Err(e) => return Err(e),
            }
        }

        let report = StudyCost {
            study_id: study_id.to_string(),
            total_cost: visit_costs.iter().map(|entry| entry.cost).sum(),
            currency: REPORT_CURRENCY.to_string(),
            visit_costs,
        };
        tracing::debug!(
            study_id,
            total_cost = report.total_cost,
            visits = report.visit_costs.len(),
            "study cost computed"
        );
        Ok(report)
    }

    fn load_visit(&self, visit_id: &str) -> CoreResult<Visit> {
        self.db
            .get_visit(visit_id)?
            .ok_or_else(|| CoreError::not_found("Visit", visit_id))
    }

    /// Unresolvable cohorts count as empty.
    fn count_animals(&self, visit: &Visit) -> CoreResult<u64> {
        let mut total = 0u64;
        for cohort_id in &visit.cohort_ids {
            total += self.db.count_cohort_animals(cohort_id)? as u64;
        }
        Ok(total)
    }

    fn lines_for(&self, visit: &Visit, animals: u64) -> CoreResult<Vec<VisitCostLine>> {
        let assignments = self.db.list_visit_procedures(&visit.id)?;

        let mut lines = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let snapshot = self.db.get_study_procedure(&assignment.study_procedure_id)?;
            let unit_cost = snapshot.as_ref().map_or(0.0, |s| s.unit_cost());
            if snapshot.is_none() {
                tracing::warn!(
                    visit_id = %visit.id,
                    study_procedure_id = %assignment.study_procedure_id,
                    "assigned study procedure not found; costed at 0"
                );
            }
            lines.push(VisitCostLine {
                visit_procedure_id: assignment.id,
                study_procedure_id: assignment.study_procedure_id,
                name: snapshot.map(|s| s.name),
                unit_cost,
                animals,
                line_total: unit_cost * animals as f64,
            });
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Animal, Cohort, MasterProcedure, NewAnimal, NewCohort, NewMasterProcedure, NewStudy,
        NewVisit, ProcedureCategory, Study, StudyProcedure, VisitProcedure,
    };

    fn cohort_with(db: &Database, study_id: &str, name: &str, size: usize) -> Cohort {
        let cohort = Cohort::new(NewCohort::new(study_id, name, size as u32));
        db.insert_cohort(&cohort).unwrap();
        for i in 0..size {
            let animal = Animal::new(NewAnimal::new(format!("{}-{}", name, i), "Rat", "Male"));
            db.insert_animal(&animal).unwrap();
            db.add_cohort_animal(&cohort.id, &animal.id).unwrap();
        }
        cohort
    }

    fn snapshot(db: &Database, study_id: &str, cost: f64, cost_override: Option<f64>) -> StudyProcedure {
        let master = MasterProcedure::new(NewMasterProcedure::new(
            "Blood draw",
            ProcedureCategory::SampleCollection,
            cost,
        ));
        db.insert_master_procedure(&master).unwrap();
        let mut snapshot = StudyProcedure::snapshot_of(&master, study_id, cost_override);
        snapshot.snapshot_digest = "digest".into();
        db.insert_study_procedure(&snapshot).unwrap();
        snapshot
    }

    fn visit(db: &Database, study_id: &str, name: &str, cohorts: &[&Cohort]) -> Visit {
        let ids = cohorts.iter().map(|c| c.id.clone()).collect();
        let visit = Visit::new(NewVisit::new(study_id, name, name, ids));
        db.insert_visit(&visit).unwrap();
        visit
    }

    fn assign(db: &Database, visit: &Visit, procedure_id: &str) {
        db.insert_visit_procedure(&VisitProcedure::new(&visit.id, procedure_id, None))
            .unwrap();
    }

    fn setup() -> (Database, Study) {
        let db = Database::open_in_memory().unwrap();
        let study = Study::new(NewStudy::new("Tox", "Dr. Ito"));
        db.insert_study(&study).unwrap();
        (db, study)
    }

    #[test]
    fn test_visit_cost() {
        let (db, study) = setup();
        let a = cohort_with(&db, &study.id, "A", 3);
        let b = cohort_with(&db, &study.id, "B", 2);
        let day1 = visit(&db, &study.id, "Day 1", &[&a, &b]);
        assign(&db, &day1, &snapshot(&db, &study.id, 10.0, None).id);
        assign(&db, &day1, &snapshot(&db, &study.id, 15.0, None).id);

        let cost = CostEngine::new(&db).visit_cost(&day1.id).unwrap();
        assert_eq!(cost.total_cost, 125.0);
        assert_eq!(cost.total_animals, 5);
        assert_eq!(cost.procedure_count, 2);
        assert_eq!(cost.currency, "USD");
    }

    #[test]
    fn test_override_precedence() {
        let (db, study) = setup();
        let a = cohort_with(&db, &study.id, "A", 2);
        let day1 = visit(&db, &study.id, "Day 1", &[&a]);
        assign(&db, &day1, &snapshot(&db, &study.id, 10.0, Some(4.0)).id);
        assign(&db, &day1, &snapshot(&db, &study.id, 10.0, Some(0.0)).id);

        let cost = CostEngine::new(&db).visit_cost(&day1.id).unwrap();
        assert_eq!(cost.total_cost, 8.0);
    }

    #[test]
    fn test_unresolvable_inputs_contribute_zero() {
        let (db, study) = setup();
        let a = cohort_with(&db, &study.id, "A", 2);
        let mut day1 = visit(&db, &study.id, "Day 1", &[&a]);
        day1.cohort_ids.push("gone".into());
        db.update_visit(&day1).unwrap();

        assign(&db, &day1, &snapshot(&db, &study.id, 10.0, None).id);
        db.conn().execute_batch("PRAGMA foreign_keys = OFF").unwrap();
        assign(&db, &day1, "gone");

        let engine = CostEngine::new(&db);
        let cost = engine.visit_cost(&day1.id).unwrap();
        assert_eq!(cost.total_animals, 2);
        assert_eq!(cost.procedure_count, 2);
        assert_eq!(cost.total_cost, 20.0);

        let lines = engine.visit_cost_lines(&day1.id).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].name.as_deref(), Some("Blood draw"));
        assert_eq!(lines[1].name, None);
        assert_eq!(lines[1].line_total, 0.0);
    }

    #[test]
    fn test_animals_not_deduplicated_across_cohorts() {
        let (db, study) = setup();
        let a = cohort_with(&db, &study.id, "A", 1);
        let b = Cohort::new(NewCohort::new(&study.id, "B", 1));
        db.insert_cohort(&b).unwrap();
        let shared = db.list_cohort_animal_ids(&a.id).unwrap().remove(0);
        db.add_cohort_animal(&b.id, &shared).unwrap();

        let day1 = visit(&db, &study.id, "Day 1", &[&a, &b]);
        assign(&db, &day1, &snapshot(&db, &study.id, 10.0, None).id);

        let cost = CostEngine::new(&db).visit_cost(&day1.id).unwrap();
        assert_eq!(cost.total_animals, 2);
        assert_eq!(cost.total_cost, 20.0);
    }

    #[test]
    fn test_visit_cost_missing_visit() {
        let (db, _) = setup();
        assert!(CostEngine::new(&db).visit_cost("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_study_cost_sums_visits() {
        let (db, study) = setup();
        let a = cohort_with(&db, &study.id, "A", 3);
        let b = cohort_with(&db, &study.id, "B", 2);
        let ten = snapshot(&db, &study.id, 10.0, None);
        let fifteen = snapshot(&db, &study.id, 15.0, None);

        let day1 = visit(&db, &study.id, "Day 1", &[&a, &b]);
        assign(&db, &day1, &ten.id);
        assign(&db, &day1, &fifteen.id);
        let day7 = visit(&db, &study.id, "Day 7", &[&b]);
        assign(&db, &day7, &ten.id);
        assign(&db, &day7, &ten.id);

        let report = CostEngine::new(&db).study_cost(&study.id).unwrap();
        assert_eq!(report.total_cost, 165.0);
        assert_eq!(report.currency, "USD");
        assert_eq!(
            report.visit_costs,
            vec![
                VisitCostEntry {
                    visit_id: day1.id.clone(),
                    visit_name: "Day 1".into(),
                    cost: 125.0,
                },
                VisitCostEntry {
                    visit_id: day7.id.clone(),
                    visit_name: "Day 7".into(),
                    cost: 40.0,
                },
            ]
        );
    }

    #[test]
    fn test_study_cost_unknown_study_is_empty() {
        let (db, _) = setup();
        let report = CostEngine::new(&db).study_cost("missing").unwrap();
        assert_eq!(report.total_cost, 0.0);
        assert!(report.visit_costs.is_empty());
    }
}
