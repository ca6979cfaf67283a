//! Animal models.

use serde::{Deserialize, Serialize};

/// An animal in the shared pool, reusable across cohorts and studies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Animal {
    /// Internal UUID
    pub id: String,
    /// External tag or mnemonic (e.g., "RAT001"), not unique
    pub animal_id: String,
    pub species: String,
    pub strain: Option<String>,
    pub sex: String,
    /// ISO date
    pub birth_date: Option<String>,
    pub weight: Option<f64>,
    pub is_active: bool,
    pub created_at: String,
}

/// Payload for registering an animal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAnimal {
    pub animal_id: String,
    pub species: String,
    pub strain: Option<String>,
    pub sex: String,
    pub birth_date: Option<String>,
    pub weight: Option<f64>,
}

impl NewAnimal {
    pub fn new(animal_id: impl Into<String>, species: impl Into<String>, sex: impl Into<String>) -> Self {
        Self {
            animal_id: animal_id.into(),
            species: species.into(),
            strain: None,
            sex: sex.into(),
            birth_date: None,
            weight: None,
        }
    }
}

impl Animal {
    pub fn new(def: NewAnimal) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            animal_id: def.animal_id,
            species: def.species,
            strain: def.strain,
            sex: def.sex,
            birth_date: def.birth_date,
            weight: def.weight,
            is_active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_animal() {
        let mut def = NewAnimal::new("RAT001", "Rat", "Male");
        def.strain = Some("Wistar".into());
        let animal = Animal::new(def);

        assert_eq!(animal.animal_id, "RAT001");
        assert_eq!(animal.strain.as_deref(), Some("Wistar"));
        assert!(animal.is_active);
        assert_eq!(animal.id.len(), 36);
    }
}
