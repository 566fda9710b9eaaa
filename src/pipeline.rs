//! Single-file processing: read, parse, aggregate, render and write.

use crate::analysis::{aggregate, Aggregation, EngineOptions};
use crate::error::{ProcessError, RecordError, Section};
use crate::reference::ReferenceFactors;
use crate::report::{output_path_for, parse_generation_report, render_generation_output, write_output};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A processed input and the result written for it.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub entries: usize,
    pub diagnostics: Vec<RecordError>,
}

/// Read the whole input file as text.
pub fn read_input(path: &Path) -> Result<String, ProcessError> {
    let bytes = std::fs::read(path).map_err(ProcessError::from_read_error)?;
    String::from_utf8(bytes).map_err(|e| {
        // No error length: the bytes ran out in the middle of a character.
        if e.utf8_error().error_len().is_none() {
            ProcessError::Incomplete(format!("document ends inside a character: {}", e))
        } else {
            ProcessError::MalformedInput(format!("input is not UTF-8: {}", e))
        }
    })
}

/// Parse and aggregate one input file. Nothing is written.
pub fn process_file(
    path: &Path,
    factors: &ReferenceFactors,
    options: &EngineOptions,
) -> Result<Aggregation, ProcessError> {
    let content = read_input(path)?;
    let report = parse_generation_report(&content)?;
    if report.is_empty() {
        info!("{} has no generator records", path.display());
    } else {
        debug!(
            "Parsed {}: {} records ({} wind, {} gas, {} coal)",
            path.display(),
            report.len(),
            report.wind.len(),
            report.gas.len(),
            report.coal.len()
        );
    }

    Ok(aggregate(&report, factors, options))
}

/// Process one input file and write its result into `output_dir`.
pub fn process_and_write(
    path: &Path,
    output_dir: &Path,
    factors: &ReferenceFactors,
    options: &EngineOptions,
) -> Result<ProcessedFile, ProcessError> {
    let aggregation = process_file(path, factors, options)?;

    for diagnostic in &aggregation.diagnostics {
        warn!("{}: {}", path.display(), diagnostic);
    }
    let skipped = aggregation.errors().count();
    if skipped > 0 {
        let mut sections: Vec<Section> = aggregation.errors().map(RecordError::section).collect();
        sections.dedup();
        let sections: Vec<String> = sections.iter().map(Section::to_string).collect();
        warn!(
            "{}: {} record(s) left out of {}",
            path.display(),
            skipped,
            sections.join(", ")
        );
    }

    let xml = render_generation_output(&aggregation.output)
        .map_err(|e| ProcessError::Render(e.to_string()))?;
    let output = output_path_for(path, output_dir);
    write_output(&output, &xml)?;

    Ok(ProcessedFile {
        input: path.to_path_buf(),
        output,
        entries: aggregation.output.entry_count(),
        diagnostics: aggregation.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Disposition;
    use crate::reference::FactorTable;

    const INPUT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<GenerationReport>
  <Wind>
    <WindGenerator>
      <Name>Offshore</Name>
      <Generation>
        <Day><Date>2017-01-01</Date><Energy>10</Energy><Price>2</Price></Day>
        <Day><Date>2017-01-02</Date><Energy>5</Energy><Price>3</Price></Day>
      </Generation>
    </WindGenerator>
  </Wind>
  <Coal>
    <CoalGenerator>
      <Name>Coal[1]</Name>
      <Generation>
        <Day><Date>2017-01-01</Date><Energy>8</Energy><Price>1</Price></Day>
      </Generation>
      <TotalHeatInput>1000</TotalHeatInput>
      <ActualNetGeneration>0</ActualNetGeneration>
      <EmissionsRating>0.5</EmissionsRating>
    </CoalGenerator>
  </Coal>
</GenerationReport>
"#;

    fn factors() -> ReferenceFactors {
        ReferenceFactors {
            value_factors: FactorTable {
                low: Some(0.5),
                medium: Some(0.25),
                high: Some(1.0),
            },
            emission_factors: FactorTable {
                low: Some(0.5),
                medium: Some(0.5),
                high: Some(0.5),
            },
        }
    }

    #[test]
    fn test_process_and_write() {
        let input_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("report.xml");
        std::fs::write(&input, INPUT).unwrap();

        let processed =
            process_and_write(&input, output_dir.path(), &factors(), &EngineOptions::default())
                .unwrap();

        assert_eq!(processed.output, output_dir.path().join("report-Result.xml"));
        assert_eq!(processed.entries, 3);
        assert_eq!(processed.diagnostics.len(), 1);

        let xml = std::fs::read_to_string(&processed.output).unwrap();
        assert!(xml.contains("<Name>Offshore</Name>\n      <Total>17.5</Total>"));
        assert!(xml.contains("<Name>Coal[1]</Name>\n      <Total>2</Total>"));
        assert!(xml.contains("<Date>2017-01-01</Date>\n      <Emission>2</Emission>"));
        assert!(xml.contains("<ActualHeatRates/>"));
    }

    #[test]
    fn test_sample_report() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        let factors =
            crate::reference::load_reference_factors(&fixtures.join("ReferenceData.xml")).unwrap();
        let output_dir = tempfile::tempdir().unwrap();

        let processed = process_and_write(
            &fixtures.join("01-Basic.xml"),
            output_dir.path(),
            &factors,
            &EngineOptions::default(),
        )
        .unwrap();

        assert!(processed.diagnostics.is_empty());
        // 4 totals, 2 fossil peaks, 1 coal heat rate
        assert_eq!(processed.entries, 7);

        let xml = std::fs::read_to_string(output_dir.path().join("01-Basic-Result.xml")).unwrap();
        assert!(xml.contains("<Name>Coal[1]</Name>\n      <HeatRate>1</HeatRate>"));
        assert!(xml.contains("<Name>Gas[1]</Name>\n      <Date>2017-01-01T00:00:00+00:00</Date>"));
    }

    #[test]
    fn test_output_is_byte_identical_across_runs() {
        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("report.xml");
        std::fs::write(&input, INPUT).unwrap();

        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let options = EngineOptions::default();
        let first = process_and_write(&input, first_dir.path(), &factors(), &options).unwrap();
        let second = process_and_write(&input, second_dir.path(), &factors(), &options).unwrap();

        assert_eq!(
            std::fs::read(first.output).unwrap(),
            std::fs::read(second.output).unwrap()
        );
    }

    #[test]
    fn test_missing_input_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let err = process_file(
            &dir.path().join("gone.xml"),
            &factors(),
            &EngineOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.disposition(), Disposition::Retryable);
    }

    #[test]
    fn test_half_written_input_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partial.xml");
        std::fs::write(&input, &INPUT[..INPUT.len() / 2]).unwrap();

        let err = process_file(&input, &factors(), &EngineOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessError::Incomplete(_)));
    }

    #[test]
    fn test_input_cut_inside_character_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("partial.xml");
        let text = "<GenerationReport><WindGenerator><Name>Kraftwerk Süd</Name>";
        let cut = text.find('ü').unwrap() + 1;
        std::fs::write(&input, &text.as_bytes()[..cut]).unwrap();

        let err = read_input(&input).unwrap_err();
        assert!(matches!(err, ProcessError::Incomplete(_)));
        assert_eq!(err.disposition(), Disposition::Retryable);
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("binary.xml");
        std::fs::write(&input, [0x3c, 0xff, 0xfe, 0x3e]).unwrap();

        let err = process_file(&input, &factors(), &EngineOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessError::MalformedInput(_)));
        assert_eq!(err.disposition(), Disposition::Fatal);
    }

    #[test]
    fn test_unwritable_output_is_fatal() {
        let input_dir = tempfile::tempdir().unwrap();
        let input = input_dir.path().join("report.xml");
        std::fs::write(&input, INPUT).unwrap();

        let err = process_and_write(
            &input,
            &input_dir.path().join("no-such-folder"),
            &factors(),
            &EngineOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ProcessError::FatalIo { .. }));
    }
}
