//! JSON and CSV rendering of cost reports.

use super::{StudyCost, VisitCost};

impl StudyCost {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format, one row per visit.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("study_id,visit_id,visit_name,cost,currency\n");

        for entry in &self.visit_costs {
            csv.push_str(&format!(
                "{},{},{},{:.2},{}\n",
                escape_csv(&self.study_id),
                escape_csv(&entry.visit_id),
                escape_csv(&entry.visit_name),
                entry.cost,
                escape_csv(&self.currency),
            ));
        }

        csv
    }
}

impl VisitCost {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Escape a field for CSV output (RFC 4180 quoting).
pub(crate) fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
