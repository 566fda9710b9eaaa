//! Generator label to factor tier mapping.

use super::FactorTable;

/// Factor table bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    /// Case-insensitive category map. Unknown labels have no tier.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "offshore" => Some(Tier::Low),
            "onshore" => Some(Tier::High),
            "gas" | "coal" => Some(Tier::Medium),
            _ => None,
        }
    }
}

/// Factor for a label, or `None` when the label has no tier or the
/// table has no entry for it.
pub fn lookup_factor(label: Option<&str>, table: &FactorTable) -> Option<f64> {
    label.and_then(Tier::from_label).and_then(|tier| table.get(tier))
}

/// Factor for a label, falling back to `0.0`.
pub fn resolve_factor(label: Option<&str>, table: &FactorTable) -> f64 {
    lookup_factor(label, table).unwrap_or(0.0)
}
