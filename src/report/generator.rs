//! Result document generation.
//!
//! This module renders a [`GenerationOutput`] as XML and writes it next to
//! other results in the output folder.

use crate::error::ProcessError;
use crate::models::{ActualHeatRate, GenerationOutput, GeneratorTotal, MaxEmissionDay};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix appended to the input file stem.
pub const RESULT_SUFFIX: &str = "-Result";

/// Extension of result documents.
pub const RESULT_EXTENSION: &str = "xml";

type XmlWriter = Writer<Vec<u8>>;

/// Render the complete result document.
pub fn render_generation_output(output: &GenerationOutput) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("GenerationOutput")))?;

    write_totals_section(&mut writer, &output.totals)?;
    write_max_emission_section(&mut writer, &output.max_emission_generators)?;
    write_heat_rate_section(&mut writer, &output.actual_heat_rates)?;

    writer.write_event(Event::End(BytesEnd::new("GenerationOutput")))?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

/// Generate the `Totals` section.
fn write_totals_section(writer: &mut XmlWriter, totals: &[GeneratorTotal]) -> Result<()> {
    write_section(writer, "Totals", totals, |writer, entry| {
        write_element(writer, "Generator", |writer| {
            write_leaf(writer, "Name", &entry.name)?;
            write_leaf(writer, "Total", &format_number(entry.total))
        })
    })
}

/// Generate the `MaxEmissionGenerators` section.
fn write_max_emission_section(writer: &mut XmlWriter, days: &[MaxEmissionDay]) -> Result<()> {
    write_section(writer, "MaxEmissionGenerators", days, |writer, entry| {
        write_element(writer, "Day", |writer| {
            write_leaf(writer, "Name", &entry.name)?;
            write_leaf(writer, "Date", &entry.date)?;
            write_leaf(writer, "Emission", &format_number(entry.emission))
        })
    })
}

/// Generate the `ActualHeatRates` section.
fn write_heat_rate_section(writer: &mut XmlWriter, rates: &[ActualHeatRate]) -> Result<()> {
    write_section(writer, "ActualHeatRates", rates, |writer, entry| {
        write_element(writer, "ActualHeatRate", |writer| {
            write_leaf(writer, "Name", &entry.name)?;
            write_leaf(writer, "HeatRate", &format_number(entry.heat_rate))
        })
    })
}

/// Write a section element, or an empty element when there are no entries.
fn write_section<T>(
    writer: &mut XmlWriter,
    name: &str,
    entries: &[T],
    mut write_entry: impl FnMut(&mut XmlWriter, &T) -> Result<()>,
) -> Result<()> {
    if entries.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
        return Ok(());
    }

    write_element(writer, name, |writer| {
        for entry in entries {
            write_entry(writer, entry)?;
        }
        Ok(())
    })
}

fn write_element(
    writer: &mut XmlWriter,
    name: &str,
    write_children: impl FnOnce(&mut XmlWriter) -> Result<()>,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    write_children(writer)?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_leaf(writer: &mut XmlWriter, name: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Shortest representation that reads back to the same value.
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// Output path for an input file: `<output_dir>/<stem>-Result.xml`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    output_dir.join(format!("{}{}.{}", stem, RESULT_SUFFIX, RESULT_EXTENSION))
}

/// Whether a file name looks like a result written by this tool.
pub fn is_result_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map_or(false, |stem| stem.ends_with(RESULT_SUFFIX))
}

/// Write a result document through a temporary file in the same folder,
/// so readers never see a half-written result.
pub fn write_output(path: &Path, xml: &str) -> Result<(), ProcessError> {
    let fatal = |source: std::io::Error| ProcessError::FatalIo {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(fatal)?;
    file.write_all(xml.as_bytes()).map_err(fatal)?;
    file.flush().map_err(fatal)?;
    file.persist(path).map_err(|e| fatal(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_output() -> GenerationOutput {
        GenerationOutput {
            totals: vec![GeneratorTotal {
                name: "Wind[Offshore]".to_string(),
                total: 1662.617445705,
            }],
            max_emission_generators: vec![MaxEmissionDay {
                name: "Coal[1]".to_string(),
                date: "2017-01-01T00:00:00+00:00".to_string(),
                emission: 137.175004008,
            }],
            actual_heat_rates: vec![ActualHeatRate {
                name: "Coal & Sons".to_string(),
                heat_rate: 1.0,
            }],
        }
    }

    #[test]
    fn test_render_generation_output() {
        let xml = render_generation_output(&create_test_output()).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert!(xml.contains("<GenerationOutput>"));
        assert!(xml.contains("    <Generator>\n      <Name>Wind[Offshore]</Name>"));
        assert!(xml.contains("<Total>1662.617445705</Total>"));
        assert!(xml.contains("<Date>2017-01-01T00:00:00+00:00</Date>"));
        assert!(xml.contains("<Emission>137.175004008</Emission>"));
        assert!(xml.contains("<Name>Coal &amp; Sons</Name>"));
        assert!(xml.contains("<HeatRate>1</HeatRate>"));
        assert!(xml.trim_end().ends_with("</GenerationOutput>"));
    }

    #[test]
    fn test_render_empty_sections() {
        let xml = render_generation_output(&GenerationOutput::default()).unwrap();

        assert!(xml.contains("<Totals/>"));
        assert!(xml.contains("<MaxEmissionGenerators/>"));
        assert!(xml.contains("<ActualHeatRates/>"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(35.0), "35");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_output_path_for() {
        let path = output_path_for(Path::new("/in/01-Basic.xml"), Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/01-Basic-Result.xml"));
        assert!(is_result_file(&path));
        assert!(!is_result_file(Path::new("/in/01-Basic.xml")));
    }

    #[test]
    fn test_write_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a-Result.xml");

        write_output(&path, "<GenerationOutput/>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<GenerationOutput/>");

        write_output(&path, "<GenerationOutput></GenerationOutput>").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "<GenerationOutput></GenerationOutput>"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_output_to_missing_folder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("a-Result.xml");

        let err = write_output(&path, "<GenerationOutput/>").unwrap_err();
        assert!(matches!(err, ProcessError::FatalIo { .. }));
    }
}
