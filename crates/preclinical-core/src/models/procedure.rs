//! Master procedure library and study procedure snapshot models.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UnknownVariant;

/// Procedure category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProcedureCategory {
    SampleCollection,
    InLifeMeasurement,
    TerminalProcedure,
    Bioanalysis,
    Observation,
}

impl ProcedureCategory {
    pub const ALL: [ProcedureCategory; 5] = [
        ProcedureCategory::SampleCollection,
        ProcedureCategory::InLifeMeasurement,
        ProcedureCategory::TerminalProcedure,
        ProcedureCategory::Bioanalysis,
        ProcedureCategory::Observation,
    ];

    /// Display label, also used as the stored value.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureCategory::SampleCollection => "Sample Collection",
            ProcedureCategory::InLifeMeasurement => "In-life Measurement",
            ProcedureCategory::TerminalProcedure => "Terminal Procedure",
            ProcedureCategory::Bioanalysis => "Bioanalysis",
            ProcedureCategory::Observation => "Observation",
        }
    }
}

impl fmt::Display for ProcedureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcedureCategory {
    type Err = UnknownVariant;

    /// Accepts the display label or the variant name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcedureCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s || format!("{:?}", c) == s)
            .ok_or_else(|| UnknownVariant::new("procedure category", s))
    }
}

/// Data-entry field type for a procedure input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InputFieldType {
    String,
    TextArea,
    Number,
    Integer,
    Radio,
    Checkbox,
    Date,
    Time,
    Dropdown,
}

impl InputFieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFieldType::String => "string",
            InputFieldType::TextArea => "text_area",
            InputFieldType::Number => "number",
            InputFieldType::Integer => "integer",
            InputFieldType::Radio => "radio",
            InputFieldType::Checkbox => "checkbox",
            InputFieldType::Date => "date",
            InputFieldType::Time => "time",
            InputFieldType::Dropdown => "dropdown",
        }
    }

    /// Choice types carry an `options` list.
    pub fn requires_options(&self) -> bool {
        matches!(
            self,
            InputFieldType::Radio | InputFieldType::Checkbox | InputFieldType::Dropdown
        )
    }
}

impl FromStr for InputFieldType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(InputFieldType::String),
            "text_area" => Ok(InputFieldType::TextArea),
            "number" => Ok(InputFieldType::Number),
            "integer" => Ok(InputFieldType::Integer),
            "radio" => Ok(InputFieldType::Radio),
            "checkbox" => Ok(InputFieldType::Checkbox),
            "date" => Ok(InputFieldType::Date),
            "time" => Ok(InputFieldType::Time),
            "dropdown" => Ok(InputFieldType::Dropdown),
            _ => Err(UnknownVariant::new("input field type", s)),
        }
    }
}

/// A data-entry field captured when a procedure is performed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputField {
    pub id: String,
    /// Machine name
    pub name: String,
    /// Human label
    pub label: String,
    pub field_type: InputFieldType,
    pub is_mandatory: bool,
    pub units: Option<String>,
    /// Opaque validation hints (ordered for stable hashing)
    pub validation_rules: Option<BTreeMap<String, String>>,
    /// Choices for radio/checkbox/dropdown
    pub options: Option<Vec<String>>,
}

/// Input field definition before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputFieldDraft {
    pub name: String,
    pub label: String,
    pub field_type: InputFieldType,
    pub is_mandatory: bool,
    pub units: Option<String>,
    pub validation_rules: Option<BTreeMap<String, String>>,
    pub options: Option<Vec<String>>,
}

impl InputFieldDraft {
    pub fn new(name: impl Into<String>, label: impl Into<String>, field_type: InputFieldType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            field_type,
            is_mandatory: false,
            units: None,
            validation_rules: None,
            options: None,
        }
    }

    /// Assign a fresh id.
    pub fn into_field(self) -> InputField {
        InputField {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            label: self.label,
            field_type: self.field_type,
            is_mandatory: self.is_mandatory,
            units: self.units,
            validation_rules: self.validation_rules,
            options: self.options,
        }
    }
}

/// Canonical, mutable procedure definition in the shared library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterProcedure {
    pub id: String,
    pub name: String,
    pub category: ProcedureCategory,
    pub description: String,
    /// Default cost per animal
    pub default_cost: f64,
    pub currency: String,
    /// Informational parent link, not enforced as a tree
    pub parent_id: Option<String>,
    pub input_fields: Vec<InputField>,
    /// False once archived
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for creating a master procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMasterProcedure {
    pub name: String,
    pub category: ProcedureCategory,
    pub description: String,
    pub default_cost: f64,
    pub currency: String,
    pub parent_id: Option<String>,
    pub input_fields: Vec<InputFieldDraft>,
}

impl NewMasterProcedure {
    pub fn new(name: impl Into<String>, category: ProcedureCategory, default_cost: f64) -> Self {
        Self {
            name: name.into(),
            category,
            description: String::new(),
            default_cost,
            currency: crate::DEFAULT_CURRENCY.to_string(),
            parent_id: None,
            input_fields: Vec::new(),
        }
    }
}

/// Merge-patch for a master procedure. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MasterProcedureUpdate {
    pub name: Option<String>,
    pub category: Option<ProcedureCategory>,
    pub description: Option<String>,
    pub default_cost: Option<f64>,
    pub currency: Option<String>,
    /// Replaces the whole list when present
    pub input_fields: Option<Vec<InputFieldDraft>>,
    pub is_active: Option<bool>,
}

impl MasterProcedure {
    /// Create a new active procedure from a validated definition.
    pub fn new(def: NewMasterProcedure) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: def.name,
            category: def.category,
            description: def.description,
            default_cost: def.default_cost,
            currency: def.currency,
            parent_id: def.parent_id,
            input_fields: def.input_fields.into_iter().map(InputFieldDraft::into_field).collect(),
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Apply a merge-patch in place and bump `updated_at`.
    pub fn apply(&mut self, patch: MasterProcedureUpdate) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(cost) = patch.default_cost {
            self.default_cost = cost;
        }
        if let Some(currency) = patch.currency {
            self.currency = currency;
        }
        if let Some(fields) = patch.input_fields {
            self.input_fields = fields.into_iter().map(InputFieldDraft::into_field).collect();
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Immutable, study-scoped copy of a master procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudyProcedure {
    pub id: String,
    pub study_id: String,
    /// Provenance only; never dereferenced for cost
    pub master_procedure_id: String,
    pub name: String,
    pub category: ProcedureCategory,
    pub description: String,
    pub currency: String,
    pub input_fields: Vec<InputField>,
    /// Library default cost at import time
    pub default_cost: f64,
    /// Per-study override
    pub study_specific_cost: Option<f64>,
    /// Hex SHA-256 over the frozen fields
    pub snapshot_digest: String,
    pub imported_at: String,
}

impl StudyProcedure {
    /// Deep value copy of `master` into `study_id`.
    ///
    /// The digest is left empty; the importer seals the snapshot.
    pub fn snapshot_of(master: &MasterProcedure, study_id: &str, cost_override: Option<f64>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            study_id: study_id.to_string(),
            master_procedure_id: master.id.clone(),
            name: master.name.clone(),
            category: master.category,
            description: master.description.clone(),
            currency: master.currency.clone(),
            input_fields: master.input_fields.clone(),
            default_cost: master.default_cost,
            study_specific_cost: cost_override,
            snapshot_digest: String::new(),
            imported_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Cost per animal: the override if present, else the frozen default.
    pub fn unit_cost(&self) -> f64 {
        self.study_specific_cost.unwrap_or(self.default_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_master() -> MasterProcedure {
        let mut def = NewMasterProcedure::new("Blood draw", ProcedureCategory::SampleCollection, 25.0);
        def.description = "Tail vein, 200uL".into();
        let mut field = InputFieldDraft::new("volume", "Volume", InputFieldType::Number);
        field.units = Some("uL".into());
        def.input_fields.push(field);
        MasterProcedure::new(def)
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "In-life Measurement".parse::<ProcedureCategory>().unwrap(),
            ProcedureCategory::InLifeMeasurement
        );
        assert_eq!(
            "Bioanalysis".parse::<ProcedureCategory>().unwrap(),
            ProcedureCategory::Bioanalysis
        );
        assert_eq!(
            "TerminalProcedure".parse::<ProcedureCategory>().unwrap(),
            ProcedureCategory::TerminalProcedure
        );
        assert!("Necropsy".parse::<ProcedureCategory>().is_err());
    }

    #[test]
    fn test_field_type_roundtrip_labels() {
        for label in ["string", "text_area", "number", "integer", "radio", "checkbox", "date", "time", "dropdown"] {
            let parsed: InputFieldType = label.parse().unwrap();
            assert_eq!(parsed.as_str(), label);
        }
        assert!(InputFieldType::Dropdown.requires_options());
        assert!(!InputFieldType::Date.requires_options());
    }

    #[test]
    fn test_new_master_procedure_assigns_ids() {
        let master = make_master();
        assert_eq!(master.id.len(), 36);
        assert!(master.is_active);
        assert_eq!(master.currency, "USD");
        assert_eq!(master.input_fields.len(), 1);
        assert_eq!(master.input_fields[0].id.len(), 36);
    }

    #[test]
    fn test_apply_patch_leaves_unset_fields() {
        let mut master = make_master();
        let original_fields = master.input_fields.clone();

        master.apply(MasterProcedureUpdate {
            default_cost: Some(30.0),
            ..Default::default()
        });

        assert_eq!(master.default_cost, 30.0);
        assert_eq!(master.name, "Blood draw");
        assert_eq!(master.input_fields, original_fields);
    }

    #[test]
    fn test_snapshot_is_value_copy() {
        let mut master = make_master();
        let snapshot = StudyProcedure::snapshot_of(&master, "study-1", None);

        master.apply(MasterProcedureUpdate {
            name: Some("Renamed".into()),
            default_cost: Some(99.0),
            input_fields: Some(vec![]),
            ..Default::default()
        });

        assert_eq!(snapshot.name, "Blood draw");
        assert_eq!(snapshot.default_cost, 25.0);
        assert_eq!(snapshot.input_fields.len(), 1);
        assert_eq!(snapshot.master_procedure_id, master.id);
    }

    #[test]
    fn test_unit_cost_override() {
        let master = make_master();
        assert_eq!(StudyProcedure::snapshot_of(&master, "s", None).unit_cost(), 25.0);
        assert_eq!(StudyProcedure::snapshot_of(&master, "s", Some(12.5)).unit_cost(), 12.5);
        assert_eq!(StudyProcedure::snapshot_of(&master, "s", Some(0.0)).unit_cost(), 0.0);
    }
}
