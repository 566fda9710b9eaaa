//! Aggregation of generator records into the result sections.
//!
//! The three sections are computed independently over the same parsed
//! report. A problem with one record is recorded as a diagnostic and the
//! record is left out; every other record and section still completes.

use crate::error::{RecordError, Section};
use crate::models::{
    ActualHeatRate, GenerationOutput, GenerationReport, GeneratorKind, GeneratorRecord,
    GeneratorTotal, MaxEmissionDay,
};
use crate::reference::{lookup_factor, resolve_factor, FactorTable, ReferenceFactors};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// How records are grouped for the totals section.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingPolicy {
    /// One group per (name, kind) pair.
    #[default]
    NameAndKind,
    /// One group per name; the first member's kind decides the factor.
    Name,
}

/// Engine settings that change results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub grouping: GroupingPolicy,
    /// Drop records whose label has no factor instead of using 0.
    pub strict_factors: bool,
}

/// Result document plus the per-record diagnostics raised while building it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub output: GenerationOutput,
    pub diagnostics: Vec<RecordError>,
}

impl Aggregation {
    /// Diagnostics that removed an entry from the output.
    pub fn errors(&self) -> impl Iterator<Item = &RecordError> {
        self.diagnostics.iter().filter(|d| !d.is_warning())
    }
}

/// Build all three sections from a parsed report.
pub fn aggregate(
    report: &GenerationReport,
    factors: &ReferenceFactors,
    options: &EngineOptions,
) -> Aggregation {
    let (totals, mut diagnostics) = compute_totals(report, &factors.value_factors, options);

    let (max_emission_generators, emission_diagnostics) =
        compute_max_emissions(report, &factors.emission_factors, options);
    diagnostics.extend(emission_diagnostics);

    let (actual_heat_rates, heat_rate_diagnostics) = compute_heat_rates(report);
    diagnostics.extend(heat_rate_diagnostics);

    Aggregation {
        output: GenerationOutput {
            totals,
            max_emission_generators,
            actual_heat_rates,
        },
        diagnostics,
    }
}

/// Members of one totals group, in discovery order.
struct Group<'a> {
    name: &'a str,
    members: Vec<&'a GeneratorRecord>,
}

/// Group records by name (and kind, depending on policy), keeping the
/// order in which each key is first seen.
fn group_generators<'a>(
    records: impl Iterator<Item = &'a GeneratorRecord>,
    policy: GroupingPolicy,
) -> Vec<Group<'a>> {
    let mut groups: Vec<Group<'a>> = Vec::new();
    let mut index: HashMap<(&'a str, Option<GeneratorKind>), usize> = HashMap::new();

    for record in records {
        let Some(name) = record.display_name() else {
            debug!("Skipping {} in totals: no name", record.describe());
            continue;
        };
        let kind = match policy {
            GroupingPolicy::NameAndKind => Some(record.kind),
            GroupingPolicy::Name => None,
        };

        let slot = *index.entry((name, kind)).or_insert_with(|| {
            groups.push(Group {
                name,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(record);
    }

    groups
}

/// Resolve the factor for a record, recording a diagnostic when the label
/// has no factor. Returns `None` when the record must be dropped.
fn factor_for(
    record: &GeneratorRecord,
    table: &FactorTable,
    section: Section,
    options: &EngineOptions,
    diagnostics: &mut Vec<RecordError>,
) -> Option<f64> {
    let label = record.factor_label();
    if let Some(factor) = lookup_factor(label, table) {
        return Some(factor);
    }

    if options.strict_factors {
        diagnostics.push(RecordError::MalformedRecord {
            section,
            record: record.describe(),
            reason: format!("no factor tier for label {:?}", label),
        });
        None
    } else {
        diagnostics.push(RecordError::UnmappedFactor {
            section,
            record: record.describe(),
            label: label.map(String::from),
        });
        Some(resolve_factor(label, table))
    }
}

/// Totals: one entry per group, summing `energy × price × valueFactor` over
/// every day that has both energy and price.
pub fn compute_totals(
    report: &GenerationReport,
    value_factors: &FactorTable,
    options: &EngineOptions,
) -> (Vec<GeneratorTotal>, Vec<RecordError>) {
    let mut totals = Vec::new();
    let mut diagnostics = Vec::new();

    for group in group_generators(report.all_generators(), options.grouping) {
        let first = group.members[0];
        let Some(factor) = factor_for(
            first,
            value_factors,
            Section::Totals,
            options,
            &mut diagnostics,
        ) else {
            continue;
        };

        let total: f64 = group
            .members
            .iter()
            .flat_map(|record| &record.days)
            .filter_map(|day| day.priced_energy())
            .map(|value| value * factor)
            .sum();

        if !total.is_finite() {
            diagnostics.push(RecordError::Computation {
                section: Section::Totals,
                record: group.name.to_string(),
                reason: format!("total is not finite ({})", total),
            });
            continue;
        }

        totals.push(GeneratorTotal {
            name: group.name.to_string(),
            total,
        });
    }

    (totals, diagnostics)
}

/// Max emissions: for each gas or coal record with an emissions rating,
/// the day with the highest `energy × emissionsRating × emissionFactor`.
/// Ties keep the earliest day.
pub fn compute_max_emissions(
    report: &GenerationReport,
    emission_factors: &FactorTable,
    options: &EngineOptions,
) -> (Vec<MaxEmissionDay>, Vec<RecordError>) {
    let mut entries = Vec::new();
    let mut diagnostics = Vec::new();

    for record in report.fossil_generators() {
        let Some(rating) = record.emissions_rating else {
            continue;
        };
        match max_emission_day(record, rating, emission_factors, options, &mut diagnostics) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(err) => diagnostics.push(err),
        }
    }

    (entries, diagnostics)
}

fn max_emission_day(
    record: &GeneratorRecord,
    rating: f64,
    emission_factors: &FactorTable,
    options: &EngineOptions,
    diagnostics: &mut Vec<RecordError>,
) -> Result<Option<MaxEmissionDay>, RecordError> {
    let section = Section::MaxEmissionGenerators;
    let malformed = |reason: String| RecordError::MalformedRecord {
        section,
        record: record.describe(),
        reason,
    };

    let Some(name) = record.display_name() else {
        return Err(malformed("missing Name".to_string()));
    };
    if record.days.is_empty() {
        return Err(RecordError::Computation {
            section,
            record: record.describe(),
            reason: "no Day entries to select a maximum from".to_string(),
        });
    }
    let Some(factor) = factor_for(record, emission_factors, section, options, diagnostics) else {
        return Ok(None);
    };

    let mut best: Option<(&str, f64)> = None;
    for (i, day) in record.days.iter().enumerate() {
        let date = day
            .date
            .as_deref()
            .ok_or_else(|| malformed(format!("Day {} has no Date", i + 1)))?;
        let energy = day
            .energy
            .ok_or_else(|| malformed(format!("Day {} has no Energy", i + 1)))?;

        let emission = energy * rating * factor;
        if !emission.is_finite() {
            return Err(RecordError::Computation {
                section,
                record: record.describe(),
                reason: format!("emission for {} is not finite", date),
            });
        }

        if best.map_or(true, |(_, current)| emission > current) {
            best = Some((date, emission));
        }
    }

    Ok(best.map(|(date, emission)| MaxEmissionDay {
        name: name.to_string(),
        date: date.to_string(),
        emission,
    }))
}

/// Heat rates: `totalHeatInput / actualNetGeneration` for each coal record
/// that has both values.
pub fn compute_heat_rates(report: &GenerationReport) -> (Vec<ActualHeatRate>, Vec<RecordError>) {
    let mut entries = Vec::new();
    let mut diagnostics = Vec::new();

    for record in &report.coal {
        let (Some(heat_input), Some(net_generation)) =
            (record.total_heat_input, record.actual_net_generation)
        else {
            continue;
        };
        let Some(name) = record.display_name() else {
            diagnostics.push(RecordError::MalformedRecord {
                section: Section::ActualHeatRates,
                record: record.describe(),
                reason: "missing Name".to_string(),
            });
            continue;
        };

        if net_generation == 0.0 {
            diagnostics.push(RecordError::Computation {
                section: Section::ActualHeatRates,
                record: record.describe(),
                reason: "division by zero: ActualNetGeneration is 0".to_string(),
            });
            continue;
        }

        let heat_rate = heat_input / net_generation;
        if !heat_rate.is_finite() {
            diagnostics.push(RecordError::Computation {
                section: Section::ActualHeatRates,
                record: record.describe(),
                reason: format!("heat rate is not finite ({})", heat_rate),
            });
            continue;
        }

        entries.push(ActualHeatRate {
            name: name.to_string(),
            heat_rate,
        });
    }

    (entries, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayRecord;

    fn factors() -> ReferenceFactors {
        ReferenceFactors {
            value_factors: FactorTable {
                low: Some(0.5),
                medium: Some(0.25),
                high: Some(2.0),
            },
            emission_factors: FactorTable {
                low: Some(0.25),
                medium: Some(0.5),
                high: Some(1.0),
            },
        }
    }

    fn day(date: &str, energy: f64, price: Option<f64>) -> DayRecord {
        DayRecord {
            date: Some(date.to_string()),
            energy: Some(energy),
            price,
        }
    }

    fn record(kind: GeneratorKind, name: &str, days: Vec<DayRecord>) -> GeneratorRecord {
        GeneratorRecord {
            name: Some(name.to_string()),
            days,
            ..GeneratorRecord::new(kind, 1)
        }
    }

    fn report_of(records: Vec<GeneratorRecord>) -> GenerationReport {
        let mut report = GenerationReport::default();
        for record in records {
            report.push(record);
        }
        report
    }

    #[test]
    fn test_offshore_total() {
        let report = report_of(vec![record(
            GeneratorKind::Wind,
            "Offshore",
            vec![day("d1", 10.0, Some(2.0)), day("d2", 5.0, Some(3.0))],
        )]);

        let result = aggregate(&report, &factors(), &EngineOptions::default());

        assert_eq!(
            result.output.totals,
            vec![GeneratorTotal {
                name: "Offshore".to_string(),
                total: 17.5,
            }]
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_days_missing_price_are_excluded() {
        let report = report_of(vec![record(
            GeneratorKind::Wind,
            "Onshore",
            vec![day("d1", 10.0, Some(2.0)), day("d2", 100.0, None)],
        )]);

        let (totals, _) = compute_totals(&report, &factors().value_factors, &EngineOptions::default());
        assert_eq!(totals[0].total, 40.0);
    }

    #[test]
    fn test_wind_location_decides_factor() {
        let mut wind = record(GeneratorKind::Wind, "Wind[Offshore]", vec![day("d", 4.0, Some(1.0))]);
        wind.location = Some("Offshore".to_string());
        let report = report_of(vec![wind]);

        let (totals, diagnostics) =
            compute_totals(&report, &factors().value_factors, &EngineOptions::default());
        assert_eq!(totals[0].total, 2.0);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_groups_follow_union_order() {
        let report = report_of(vec![
            record(GeneratorKind::Coal, "Coal[1]", vec![day("d", 1.0, Some(1.0))]),
            record(GeneratorKind::Gas, "Gas[1]", vec![day("d", 1.0, Some(1.0))]),
            record(GeneratorKind::Wind, "Offshore", vec![day("d", 1.0, Some(1.0))]),
            record(GeneratorKind::Gas, "Gas[1]", vec![day("d", 3.0, Some(1.0))]),
        ]);

        let (totals, _) = compute_totals(&report, &factors().value_factors, &EngineOptions::default());
        let names: Vec<_> = totals.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Offshore", "Gas[1]", "Coal[1]"]);
        assert_eq!(totals[1].total, 1.0);
    }

    #[test]
    fn test_grouping_policies_with_shared_name() {
        let report = report_of(vec![
            record(GeneratorKind::Gas, "Plant", vec![day("d", 4.0, Some(1.0))]),
            record(GeneratorKind::Wind, "Plant", vec![day("d", 4.0, Some(1.0))]),
        ]);
        let table = factors().value_factors;

        let by_pair = EngineOptions::default();
        let (totals, diagnostics) = compute_totals(&report, &table, &by_pair);
        assert_eq!(totals.len(), 2);
        // "Plant" is not a wind location, so the wind group resolves to 0.
        assert_eq!(totals[0].total, 0.0);
        assert_eq!(totals[1].total, 1.0);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_warning());

        let legacy = EngineOptions {
            grouping: GroupingPolicy::Name,
            ..EngineOptions::default()
        };
        let (totals, _) = compute_totals(&report, &table, &legacy);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].total, 0.0);
    }

    #[test]
    fn test_unnamed_records_are_not_grouped() {
        let mut unnamed = record(GeneratorKind::Gas, "", vec![day("d", 1.0, Some(1.0))]);
        unnamed.name = None;
        let report = report_of(vec![
            unnamed,
            record(GeneratorKind::Gas, "", vec![day("d", 1.0, Some(1.0))]),
        ]);

        let (totals, diagnostics) =
            compute_totals(&report, &factors().value_factors, &EngineOptions::default());
        assert!(totals.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_strict_factors_drop_unmapped_records() {
        let report = report_of(vec![record(
            GeneratorKind::Wind,
            "Solar",
            vec![day("d", 1.0, Some(1.0))],
        )]);
        let strict = EngineOptions {
            strict_factors: true,
            ..EngineOptions::default()
        };

        let result = aggregate(&report, &factors(), &strict);
        assert!(result.output.totals.is_empty());
        assert!(matches!(
            result.diagnostics[0],
            RecordError::MalformedRecord { section: Section::Totals, .. }
        ));
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn test_max_emission_first_max_wins() {
        let mut gas = record(
            GeneratorKind::Gas,
            "Gas[1]",
            vec![day("d1", 10.0, None), day("d2", 25.0, None), day("d3", 25.0, None)],
        );
        gas.emissions_rating = Some(2.0);
        let report = report_of(vec![gas]);

        let (entries, diagnostics) =
            compute_max_emissions(&report, &factors().emission_factors, &EngineOptions::default());

        assert!(diagnostics.is_empty());
        assert_eq!(
            entries,
            vec![MaxEmissionDay {
                name: "Gas[1]".to_string(),
                date: "d2".to_string(),
                emission: 25.0,
            }]
        );
    }

    #[test]
    fn test_max_emission_skips_records_without_rating() {
        let report = report_of(vec![
            record(GeneratorKind::Gas, "Gas[1]", vec![day("d1", 10.0, None)]),
            record(GeneratorKind::Wind, "Offshore", vec![day("d1", 10.0, None)]),
        ]);

        let (entries, diagnostics) =
            compute_max_emissions(&report, &factors().emission_factors, &EngineOptions::default());
        assert!(entries.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_max_emission_without_days_is_computation_error() {
        let mut coal = record(GeneratorKind::Coal, "Coal[1]", vec![]);
        coal.emissions_rating = Some(0.5);
        let mut gas = record(GeneratorKind::Gas, "Gas[1]", vec![day("d1", 4.0, None)]);
        gas.emissions_rating = Some(1.0);
        let report = report_of(vec![coal, gas]);

        let (entries, diagnostics) =
            compute_max_emissions(&report, &factors().emission_factors, &EngineOptions::default());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].emission, 2.0);
        assert!(matches!(
            diagnostics.as_slice(),
            [RecordError::Computation { section: Section::MaxEmissionGenerators, .. }]
        ));
    }

    #[test]
    fn test_max_emission_day_without_energy_is_malformed() {
        let mut gas = record(GeneratorKind::Gas, "Gas[1]", vec![day("d1", 4.0, None)]);
        gas.days.push(DayRecord {
            date: Some("d2".to_string()),
            energy: None,
            price: Some(1.0),
        });
        gas.emissions_rating = Some(1.0);

        let (entries, diagnostics) = compute_max_emissions(
            &report_of(vec![gas]),
            &factors().emission_factors,
            &EngineOptions::default(),
        );
        assert!(entries.is_empty());
        assert!(diagnostics[0].to_string().contains("Day 2 has no Energy"));
    }

    #[test]
    fn test_heat_rate() {
        let mut coal = record(GeneratorKind::Coal, "Coal[1]", vec![]);
        coal.total_heat_input = Some(11.0);
        coal.actual_net_generation = Some(4.0);
        let report = report_of(vec![coal]);

        let (entries, diagnostics) = compute_heat_rates(&report);
        assert_eq!(entries[0].heat_rate, 2.75);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_heat_rate_division_by_zero() {
        let mut broken = record(GeneratorKind::Coal, "Coal[1]", vec![]);
        broken.total_heat_input = Some(1000.0);
        broken.actual_net_generation = Some(0.0);
        let mut healthy = record(GeneratorKind::Coal, "Coal[2]", vec![]);
        healthy.total_heat_input = Some(10.0);
        healthy.actual_net_generation = Some(5.0);
        let mut partial = record(GeneratorKind::Coal, "Coal[3]", vec![]);
        partial.total_heat_input = Some(10.0);

        let (entries, diagnostics) = compute_heat_rates(&report_of(vec![broken, healthy, partial]));

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Coal[2]");
        assert!(matches!(
            &diagnostics[0],
            RecordError::Computation { record, .. } if record == "Coal[1]"
        ));
    }

    #[test]
    fn test_section_failures_are_isolated() {
        let mut coal = record(GeneratorKind::Coal, "Coal[1]", vec![]);
        coal.emissions_rating = Some(1.0);
        coal.total_heat_input = Some(1.0);
        coal.actual_net_generation = Some(0.0);
        let wind = record(GeneratorKind::Wind, "Onshore", vec![day("d", 1.0, Some(1.0))]);

        let result = aggregate(&report_of(vec![wind, coal]), &factors(), &EngineOptions::default());

        assert_eq!(result.output.totals.len(), 2);
        assert!(result.output.max_emission_generators.is_empty());
        assert!(result.output.actual_heat_rates.is_empty());
        assert_eq!(result.errors().count(), 2);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let mut gas = record(GeneratorKind::Gas, "Gas[1]", vec![day("d1", 3.3, Some(1.1))]);
        gas.emissions_rating = Some(0.038);
        let report = report_of(vec![gas]);

        let first = aggregate(&report, &factors(), &EngineOptions::default());
        let second = aggregate(&report, &factors(), &EngineOptions::default());
        assert_eq!(first, second);
    }
}
