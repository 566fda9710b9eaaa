//! Data models for generation reports.
//!
//! This module contains the parsed input records (wind, gas and coal
//! generators with their daily series) and the three derived output
//! sections written back out as a result document.

use std::fmt;

/// Kind of generator record, taken from the element tag in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Wind,
    Gas,
    Coal,
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKind::Wind => write!(f, "Wind"),
            GeneratorKind::Gas => write!(f, "Gas"),
            GeneratorKind::Coal => write!(f, "Coal"),
        }
    }
}

impl GeneratorKind {
    /// Element name that tags records of this kind.
    pub fn element_name(&self) -> &'static str {
        match self {
            GeneratorKind::Wind => "WindGenerator",
            GeneratorKind::Gas => "GasGenerator",
            GeneratorKind::Coal => "CoalGenerator",
        }
    }

    /// Maps an element name back to a generator kind.
    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "WindGenerator" => Some(GeneratorKind::Wind),
            "GasGenerator" => Some(GeneratorKind::Gas),
            "CoalGenerator" => Some(GeneratorKind::Coal),
            _ => None,
        }
    }
}

/// One `Day` entry of a generator's series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayRecord {
    pub date: Option<String>,
    pub energy: Option<f64>,
    pub price: Option<f64>,
}

impl DayRecord {
    /// Monetary value of the day before the factor is applied.
    ///
    /// `None` when either energy or price is missing; such days are
    /// left out of totals.
    pub fn priced_energy(&self) -> Option<f64> {
        match (self.energy, self.price) {
            (Some(energy), Some(price)) => Some(energy * price),
            _ => None,
        }
    }
}

/// A single generator record from the input document.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorRecord {
    pub kind: GeneratorKind,
    /// 1-based position among records of the same kind, in document order.
    pub position: usize,
    pub name: Option<String>,
    /// Wind only: `Offshore` or `Onshore`.
    pub location: Option<String>,
    /// Gas and coal only.
    pub emissions_rating: Option<f64>,
    /// Coal only.
    pub total_heat_input: Option<f64>,
    /// Coal only.
    pub actual_net_generation: Option<f64>,
    pub days: Vec<DayRecord>,
}

impl GeneratorRecord {
    /// Creates an empty record of the given kind.
    pub fn new(kind: GeneratorKind, position: usize) -> Self {
        Self {
            kind,
            position,
            name: None,
            location: None,
            emissions_rating: None,
            total_heat_input: None,
            actual_net_generation: None,
            days: Vec::new(),
        }
    }

    /// Name used as grouping key and display label, if non-empty.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// Label fed to the factor resolver.
    ///
    /// Wind records resolve by location (falling back to the name), gas
    /// and coal records by their kind.
    pub fn factor_label(&self) -> Option<&str> {
        match self.kind {
            GeneratorKind::Wind => self
                .location
                .as_deref()
                .filter(|location| !location.is_empty())
                .or_else(|| self.display_name()),
            GeneratorKind::Gas => Some("Gas"),
            GeneratorKind::Coal => Some("Coal"),
        }
    }

    /// Identifier for diagnostics, usable even when the name is missing.
    pub fn describe(&self) -> String {
        match self.display_name() {
            Some(name) => name.to_string(),
            None => format!("unnamed {} #{}", self.kind.element_name(), self.position),
        }
    }
}

/// Parsed input document, records kept per kind in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    pub wind: Vec<GeneratorRecord>,
    pub gas: Vec<GeneratorRecord>,
    pub coal: Vec<GeneratorRecord>,
}

impl GenerationReport {
    /// Appends a record to the list for its kind.
    pub fn push(&mut self, record: GeneratorRecord) {
        match record.kind {
            GeneratorKind::Wind => self.wind.push(record),
            GeneratorKind::Gas => self.gas.push(record),
            GeneratorKind::Coal => self.coal.push(record),
        }
    }

    /// Number of records already collected for a kind.
    pub fn count_of(&self, kind: GeneratorKind) -> usize {
        match kind {
            GeneratorKind::Wind => self.wind.len(),
            GeneratorKind::Gas => self.gas.len(),
            GeneratorKind::Coal => self.coal.len(),
        }
    }

    /// All records: wind, then gas, then coal.
    pub fn all_generators(&self) -> impl Iterator<Item = &GeneratorRecord> {
        self.wind.iter().chain(&self.gas).chain(&self.coal)
    }

    /// Gas then coal records, the kinds that carry an emissions rating.
    pub fn fossil_generators(&self) -> impl Iterator<Item = &GeneratorRecord> {
        self.gas.iter().chain(&self.coal)
    }

    /// Total record count across kinds.
    pub fn len(&self) -> usize {
        self.wind.len() + self.gas.len() + self.coal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Totals/Generator` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorTotal {
    pub name: String,
    pub total: f64,
}

/// `MaxEmissionGenerators/Day` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxEmissionDay {
    pub name: String,
    pub date: String,
    pub emission: f64,
}

/// `ActualHeatRates/ActualHeatRate` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualHeatRate {
    pub name: String,
    pub heat_rate: f64,
}

/// The derived result document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub totals: Vec<GeneratorTotal>,
    pub max_emission_generators: Vec<MaxEmissionDay>,
    pub actual_heat_rates: Vec<ActualHeatRate>,
}

impl GenerationOutput {
    /// Number of entries across all three sections.
    pub fn entry_count(&self) -> usize {
        self.totals.len() + self.max_emission_generators.len() + self.actual_heat_rates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wind(name: &str, location: Option<&str>) -> GeneratorRecord {
        GeneratorRecord {
            name: Some(name.to_string()),
            location: location.map(String::from),
            ..GeneratorRecord::new(GeneratorKind::Wind, 1)
        }
    }

    #[test]
    fn test_kind_element_names() {
        for kind in [GeneratorKind::Wind, GeneratorKind::Gas, GeneratorKind::Coal] {
            assert_eq!(GeneratorKind::from_element_name(kind.element_name()), Some(kind));
        }
        assert_eq!(GeneratorKind::from_element_name("SolarGenerator"), None);
    }

    #[test]
    fn test_priced_energy_requires_both_fields() {
        let full = DayRecord {
            date: Some("2017-01-01".to_string()),
            energy: Some(10.0),
            price: Some(2.0),
        };
        assert_eq!(full.priced_energy(), Some(20.0));

        let unpriced = DayRecord {
            price: None,
            ..full.clone()
        };
        assert_eq!(unpriced.priced_energy(), None);
    }

    #[test]
    fn test_factor_label() {
        assert_eq!(wind("Wind[Offshore]", Some("Offshore")).factor_label(), Some("Offshore"));
        assert_eq!(wind("Onshore", None).factor_label(), Some("Onshore"));

        let gas = GeneratorRecord {
            name: Some("Gas[1]".to_string()),
            ..GeneratorRecord::new(GeneratorKind::Gas, 1)
        };
        assert_eq!(gas.factor_label(), Some("Gas"));
    }

    #[test]
    fn test_describe_unnamed_record() {
        let record = GeneratorRecord::new(GeneratorKind::Coal, 3);
        assert_eq!(record.describe(), "unnamed CoalGenerator #3");
        assert_eq!(wind("Offshore", None).describe(), "Offshore");
    }

    #[test]
    fn test_union_order() {
        let mut report = GenerationReport::default();
        report.push(GeneratorRecord::new(GeneratorKind::Coal, 1));
        report.push(GeneratorRecord::new(GeneratorKind::Wind, 1));
        report.push(GeneratorRecord::new(GeneratorKind::Gas, 1));

        let kinds: Vec<_> = report.all_generators().map(|g| g.kind).collect();
        assert_eq!(
            kinds,
            vec![GeneratorKind::Wind, GeneratorKind::Gas, GeneratorKind::Coal]
        );
        assert_eq!(report.fossil_generators().count(), 2);
        assert_eq!(report.len(), 3);
    }
}
