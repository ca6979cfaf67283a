//! Studies, animals and cohorts.

use crate::db::Database;
use crate::error::{require_date, require_non_empty, CoreError, CoreResult};
use crate::models::{Animal, Cohort, CohortUpdate, NewAnimal, NewCohort, NewStudy, Study};

/// Registry of studies, the shared animal pool, and cohort membership.
pub struct Registry<'a> {
    db: &'a Database,
}

impl<'a> Registry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    // =========================================================================
    // Studies
    // =========================================================================

    pub fn create_study(&self, def: NewStudy) -> CoreResult<Study> {
        require_non_empty("name", &def.name)?;
        require_non_empty("principal_investigator", &def.principal_investigator)?;
        let start = require_date("start_date", def.start_date.as_deref())?;
        let end = require_date("end_date", def.end_date.as_deref())?;
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(CoreError::validation(
                    "end_date",
                    format!("{} is before start_date {}", end, start),
                ));
            }
        }
        if let Some(status) = &def.status {
            require_non_empty("status", status)?;
        }

        let study = Study::new(def);
        self.db.insert_study(&study)?;
        tracing::info!(study_id = %study.id, name = %study.name, "study created");
        Ok(study)
    }

    pub fn list_studies(&self) -> CoreResult<Vec<Study>> {
        Ok(self.db.list_studies()?)
    }

    pub fn get_study(&self, id: &str) -> CoreResult<Study> {
        self.db
            .get_study(id)?
            .ok_or_else(|| CoreError::not_found("Study", id))
    }

    // =========================================================================
    // Animals
    // =========================================================================

    pub fn create_animal(&self, def: NewAnimal) -> CoreResult<Animal> {
        require_non_empty("animal_id", &def.animal_id)?;
        require_non_empty("species", &def.species)?;
        require_non_empty("sex", &def.sex)?;
        require_date("birth_date", def.birth_date.as_deref())?;
        if let Some(weight) = def.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(CoreError::validation(
                    "weight",
                    format!("must be a finite number >= 0, got {}", weight),
                ));
            }
        }

        let animal = Animal::new(def);
        self.db.insert_animal(&animal)?;
        tracing::info!(animal_id = %animal.id, tag = %animal.animal_id, "animal registered");
        Ok(animal)
    }

    pub fn list_animals(&self, active_only: bool) -> CoreResult<Vec<Animal>> {
        Ok(self.db.list_animals(active_only)?)
    }

    pub fn get_animal(&self, id: &str) -> CoreResult<Animal> {
        self.db
            .get_animal(id)?
            .ok_or_else(|| CoreError::not_found("Animal", id))
    }

    /// Animals carrying an external tag. Tags are not unique.
    pub fn find_animals_by_tag(&self, tag: &str) -> CoreResult<Vec<Animal>> {
        Ok(self.db.find_animals_by_tag(tag)?)
    }

    // =========================================================================
    // Cohorts
    // =========================================================================

    pub fn create_cohort(&self, def: NewCohort) -> CoreResult<Cohort> {
        if !self.db.study_exists(&def.study_id)? {
            return Err(CoreError::not_found("Study", def.study_id.as_str()));
        }
        require_non_empty("name", &def.name)?;

        let cohort = Cohort::new(def);
        self.db.insert_cohort(&cohort)?;
        tracing::info!(
            cohort_id = %cohort.id,
            study_id = %cohort.study_id,
            name = %cohort.name,
            "cohort created"
        );
        Ok(cohort)
    }

    pub fn list_cohorts(&self, study_id: &str) -> CoreResult<Vec<Cohort>> {
        Ok(self.db.list_cohorts_for_study(study_id)?)
    }

    pub fn get_cohort(&self, id: &str) -> CoreResult<Cohort> {
        self.db
            .get_cohort(id)?
            .ok_or_else(|| CoreError::not_found("Cohort", id))
    }

    /// Merge-patch of cohort metadata. Membership changes go through
    /// `assign_animal` / `remove_animal`.
    pub fn update_cohort(&self, id: &str, patch: CohortUpdate) -> CoreResult<Cohort> {
        if let Some(name) = &patch.name {
            require_non_empty("name", name)?;
        }

        let mut cohort = self.get_cohort(id)?;
        cohort.apply(patch);
        if !self.db.update_cohort(&cohort)? {
            return Err(CoreError::not_found("Cohort", id));
        }

        tracing::info!(cohort_id = %id, "cohort updated");
        Ok(cohort)
    }

    /// Add an animal to a cohort. A second assignment is a `Conflict`.
    pub fn assign_animal(&self, cohort_id: &str, animal_id: &str) -> CoreResult<Cohort> {
        self.get_cohort(cohort_id)?;
        if !self.db.animal_exists(animal_id)? {
            return Err(CoreError::not_found("Animal", animal_id));
        }

        if !self.db.add_cohort_animal(cohort_id, animal_id)? {
            return Err(CoreError::Conflict(format!(
                "animal {} already assigned to cohort {}",
                animal_id, cohort_id
            )));
        }

        tracing::info!(cohort_id, animal_id, "animal assigned to cohort");
        self.get_cohort(cohort_id)
    }

    /// Remove an animal from a cohort. Removing a non-member is a no-op.
    pub fn remove_animal(&self, cohort_id: &str, animal_id: &str) -> CoreResult<Cohort> {
        let cohort = self.get_cohort(cohort_id)?;
        if !cohort.contains(animal_id) {
            tracing::debug!(cohort_id, animal_id, "animal was not a cohort member");
            return Ok(cohort);
        }

        if self.db.remove_cohort_animal(cohort_id, animal_id)? {
            tracing::info!(cohort_id, animal_id, "animal removed from cohort");
        }
        self.get_cohort(cohort_id)
    }

    /// Physically delete an empty cohort.
    pub fn delete_cohort(&self, cohort_id: &str) -> CoreResult<()> {
        self.get_cohort(cohort_id)?;

        if !self.db.delete_cohort_if_empty(cohort_id)? {
            return Err(CoreError::Conflict(
                "cannot delete cohort with assigned animals".into(),
            ));
        }

        tracing::info!(cohort_id, "cohort deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, Study) {
        let db = Database::open_in_memory().unwrap();
        let study = Registry::new(&db)
            .create_study(NewStudy::new("28-day tox", "Dr. Ito"))
            .unwrap();
        (db, study)
    }

    #[test]
    fn test_study_validation() {
        let db = Database::open_in_memory().unwrap();
        let registry = Registry::new(&db);

        let err = registry.create_study(NewStudy::new("", "Dr. Ito")).unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "name"));

        let mut def = NewStudy::new("PK", "Dr. Ito");
        def.start_date = Some("2024-03-01".into());
        def.end_date = Some("2024-02-01".into());
        let err = registry.create_study(def).unwrap_err();
        assert!(matches!(err, CoreError::Validation { ref field, .. } if field == "end_date"));

        let mut def = NewStudy::new("PK", "Dr. Ito");
        def.start_date = Some("March 1st".into());
        assert!(registry.create_study(def).is_err());

        assert!(registry.list_studies().unwrap().is_empty());
    }

    #[test]
    fn test_study_roundtrip() {
        let (db, study) = setup();
        let registry = Registry::new(&db);

        assert_eq!(registry.get_study(&study.id).unwrap(), study);
        assert_eq!(registry.list_studies().unwrap().len(), 1);
        assert!(registry.get_study("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_animal_validation_and_lookup() {
        let (db, _) = setup();
        let registry = Registry::new(&db);

        let mut def = NewAnimal::new("RAT001", "Rat", "Male");
        def.weight = Some(-1.0);
        assert!(registry.create_animal(def).is_err());

        let first = registry.create_animal(NewAnimal::new("RAT001", "Rat", "Male")).unwrap();
        let second = registry.create_animal(NewAnimal::new("RAT001", "Rat", "Female")).unwrap();
        registry.create_animal(NewAnimal::new("RAT002", "Rat", "Male")).unwrap();

        assert_eq!(registry.get_animal(&first.id).unwrap(), first);
        let tagged = registry.find_animals_by_tag("RAT001").unwrap();
        assert_eq!(tagged.len(), 2);
        assert_eq!(tagged[1].id, second.id);
        assert_eq!(registry.list_animals(true).unwrap().len(), 3);
    }

    #[test]
    fn test_create_cohort_requires_study() {
        let db = Database::open_in_memory().unwrap();
        let err = Registry::new(&db)
            .create_cohort(NewCohort::new("missing", "Vehicle", 5))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "Study", .. }));
    }

    #[test]
    fn test_assign_animal_twice_conflicts() {
        let (db, study) = setup();
        let registry = Registry::new(&db);
        let cohort = registry.create_cohort(NewCohort::new(&study.id, "Vehicle", 5)).unwrap();
        let animal = registry.create_animal(NewAnimal::new("RAT001", "Rat", "Male")).unwrap();

        let updated = registry.assign_animal(&cohort.id, &animal.id).unwrap();
        assert_eq!(updated.animal_ids, vec![animal.id.clone()]);

        let err = registry.assign_animal(&cohort.id, &animal.id).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(registry.get_cohort(&cohort.id).unwrap().animal_count(), 1);
    }

    #[test]
    fn test_assign_checks_cohort_before_animal() {
        let (db, study) = setup();
        let registry = Registry::new(&db);

        let err = registry.assign_animal("missing-cohort", "missing-animal").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "Cohort", .. }));

        let cohort = registry.create_cohort(NewCohort::new(&study.id, "Vehicle", 5)).unwrap();
        let err = registry.assign_animal(&cohort.id, "missing-animal").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "Animal", .. }));
    }

    #[test]
    fn test_remove_animal() {
        let (db, study) = setup();
        let registry = Registry::new(&db);
        let cohort = registry.create_cohort(NewCohort::new(&study.id, "Vehicle", 5)).unwrap();
        let animal = registry.create_animal(NewAnimal::new("RAT001", "Rat", "Male")).unwrap();

        // Non-member removal is silent and leaves the cohort untouched.
        let unchanged = registry.remove_animal(&cohort.id, &animal.id).unwrap();
        assert_eq!(unchanged, cohort);

        registry.assign_animal(&cohort.id, &animal.id).unwrap();
        let updated = registry.remove_animal(&cohort.id, &animal.id).unwrap();
        assert!(!updated.contains(&animal.id));

        assert!(registry.remove_animal("missing", &animal.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_cohort_guard() {
        let (db, study) = setup();
        let registry = Registry::new(&db);
        let cohort = registry.create_cohort(NewCohort::new(&study.id, "Vehicle", 5)).unwrap();
        let animal = registry.create_animal(NewAnimal::new("RAT001", "Rat", "Male")).unwrap();
        registry.assign_animal(&cohort.id, &animal.id).unwrap();

        let err = registry.delete_cohort(&cohort.id).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: cannot delete cohort with assigned animals"
        );

        registry.remove_animal(&cohort.id, &animal.id).unwrap();
        registry.delete_cohort(&cohort.id).unwrap();
        assert!(registry.get_cohort(&cohort.id).unwrap_err().is_not_found());
        assert!(registry.delete_cohort(&cohort.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_cohort_merge_patch() {
        let (db, study) = setup();
        let registry = Registry::new(&db);
        let cohort = registry.create_cohort(NewCohort::new(&study.id, "Vehicle", 5)).unwrap();

        let updated = registry
            .update_cohort(
                &cohort.id,
                CohortUpdate {
                    planned_animal_count: Some(8),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Vehicle");
        assert_eq!(updated.planned_animal_count, 8);
        assert_eq!(registry.get_cohort(&cohort.id).unwrap().planned_animal_count, 8);

        let err = registry
            .update_cohort(
                &cohort.id,
                CohortUpdate {
                    name: Some("  ".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
