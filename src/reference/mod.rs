//! Reference factor data.
//!
//! The reference document is loaded once at startup and shared read-only
//! by every processing task. Its layout is fixed:
//!
//! ```xml
//! <ReferenceData>
//!   <Factors>
//!     <ValueFactor><High/><Medium/><Low/></ValueFactor>
//!     <EmissionsFactor><High/><Medium/><Low/></EmissionsFactor>
//!   </Factors>
//! </ReferenceData>
//! ```

pub mod resolver;

pub use resolver::{lookup_factor, resolve_factor, Tier};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Factors per tier. Missing entries stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct FactorTable {
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Medium")]
    pub medium: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
}

impl FactorTable {
    pub fn get(&self, tier: Tier) -> Option<f64> {
        match tier {
            Tier::Low => self.low,
            Tier::Medium => self.medium,
            Tier::High => self.high,
        }
    }

    fn missing_tiers(&self) -> Vec<Tier> {
        [Tier::Low, Tier::Medium, Tier::High]
            .into_iter()
            .filter(|tier| self.get(*tier).is_none())
            .collect()
    }
}

/// Value and emission factor tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ReferenceFactors {
    #[serde(rename = "ValueFactor", default)]
    pub value_factors: FactorTable,
    #[serde(rename = "EmissionsFactor", default)]
    pub emission_factors: FactorTable,
}

#[derive(Debug, Deserialize)]
struct ReferenceDocument {
    #[serde(rename = "Factors")]
    factors: ReferenceFactors,
}

/// Load reference factors from a file path.
pub fn load_reference_factors(path: &Path) -> Result<ReferenceFactors> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference data: {}", path.display()))?;

    let factors = parse_reference_factors(&content)
        .with_context(|| format!("Failed to parse reference data: {}", path.display()))?;

    debug!("Reference factors: {:?}", factors);
    for (table, name) in [
        (&factors.value_factors, "ValueFactor"),
        (&factors.emission_factors, "EmissionsFactor"),
    ] {
        let missing = table.missing_tiers();
        if !missing.is_empty() {
            warn!("{} has no entry for {:?}; those tiers resolve to 0", name, missing);
        }
    }

    Ok(factors)
}

/// Parse a reference document from a string.
pub fn parse_reference_factors(xml: &str) -> Result<ReferenceFactors> {
    let xml = xml.trim_start_matches('\u{feff}');
    let document: ReferenceDocument = quick_xml::de::from_str(xml)?;
    Ok(document.factors)
}
