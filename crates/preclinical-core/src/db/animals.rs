//! Animal database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::Animal;

fn map_animal(row: &Row<'_>) -> rusqlite::Result<Animal> {
    Ok(Animal {
        id: row.get(0)?,
        animal_id: row.get(1)?,
        species: row.get(2)?,
        strain: row.get(3)?,
        sex: row.get(4)?,
        birth_date: row.get(5)?,
        weight: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl Database {
    /// Insert a new animal.
    pub fn insert_animal(&self, animal: &Animal) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO animals (
                id, animal_id, species, strain, sex, birth_date,
                weight, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                animal.id,
                animal.animal_id,
                animal.species,
                animal.strain,
                animal.sex,
                animal.birth_date,
                animal.weight,
                animal.is_active,
                animal.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get an animal by internal ID.
    pub fn get_animal(&self, id: &str) -> DbResult<Option<Animal>> {
        self.conn
            .query_row(
                r#"
                SELECT id, animal_id, species, strain, sex, birth_date,
                       weight, is_active, created_at
                FROM animals
                WHERE id = ?
                "#,
                [id],
                map_animal,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Check that an animal exists.
    pub fn animal_exists(&self, id: &str) -> DbResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM animals WHERE id = ?", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Find animals by external tag.
    pub fn find_animals_by_tag(&self, animal_id: &str) -> DbResult<Vec<Animal>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, animal_id, species, strain, sex, birth_date,
                   weight, is_active, created_at
            FROM animals
            WHERE animal_id = ?
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map([animal_id], map_animal)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List animals in insertion order.
    pub fn list_animals(&self, active_only: bool) -> DbResult<Vec<Animal>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, animal_id, species, strain, sex, birth_date,
                   weight, is_active, created_at
            FROM animals
            WHERE (?1 = 0 OR is_active = 1)
            ORDER BY rowid
            "#,
        )?;

        let rows = stmt.query_map(params![active_only], map_animal)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAnimal;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut def = NewAnimal::new("RAT001", "Rat", "Male");
        def.strain = Some("Sprague-Dawley".into());
        def.weight = Some(250.5);
        def.birth_date = Some("2024-01-10".into());
        let animal = Animal::new(def);
        db.insert_animal(&animal).unwrap();

        let retrieved = db.get_animal(&animal.id).unwrap().unwrap();
        assert_eq!(retrieved, animal);
        assert!(db.animal_exists(&animal.id).unwrap());
        assert!(!db.animal_exists("missing").unwrap());
    }

    #[test]
    fn test_find_by_tag_allows_duplicates() {
        let db = setup_db();

        let first = Animal::new(NewAnimal::new("RAT001", "Rat", "Male"));
        let second = Animal::new(NewAnimal::new("RAT001", "Rat", "Female"));
        let other = Animal::new(NewAnimal::new("MUS007", "Mouse", "Female"));
        db.insert_animal(&first).unwrap();
        db.insert_animal(&second).unwrap();
        db.insert_animal(&other).unwrap();

        let found = db.find_animals_by_tag("RAT001").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, first.id);
        assert_eq!(found[1].id, second.id);
    }

    #[test]
    fn test_list_active_filter() {
        let db = setup_db();

        let active = Animal::new(NewAnimal::new("RAT001", "Rat", "Male"));
        let mut retired = Animal::new(NewAnimal::new("RAT002", "Rat", "Male"));
        retired.is_active = false;
        db.insert_animal(&active).unwrap();
        db.insert_animal(&retired).unwrap();

        assert_eq!(db.list_animals(true).unwrap().len(), 1);
        assert_eq!(db.list_animals(false).unwrap().len(), 2);
    }
}
