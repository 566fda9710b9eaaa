//! Generation report reader.
//!
//! Generator records are matched by element name at any depth, so both the
//! grouped layout (`<Wind><WindGenerator>…`) and a flat list of records are
//! accepted. Days are collected from anywhere inside a record.

use crate::error::ProcessError;
use crate::models::{DayRecord, GenerationReport, GeneratorKind, GeneratorRecord};
use quick_xml::errors::SyntaxError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Open element and the text collected directly inside it.
struct Frame {
    name: String,
    text: String,
}

/// Record being filled, with the stack depth of its element.
struct OpenRecord {
    depth: usize,
    record: GeneratorRecord,
}

struct OpenDay {
    depth: usize,
    day: DayRecord,
}

#[derive(Default)]
struct ReportBuilder {
    stack: Vec<Frame>,
    root_seen: bool,
    generator: Option<OpenRecord>,
    day: Option<OpenDay>,
    report: GenerationReport,
}

impl ReportBuilder {
    fn open(&mut self, name: String) -> Result<(), ProcessError> {
        if self.stack.is_empty() {
            if self.root_seen {
                return Err(ProcessError::MalformedInput(format!(
                    "second root element <{}>",
                    name
                )));
            }
            self.root_seen = true;
        }

        self.stack.push(Frame {
            name,
            text: String::new(),
        });
        let depth = self.stack.len();
        let name = self.stack[depth - 1].name.as_str();

        if self.generator.is_none() {
            if let Some(kind) = GeneratorKind::from_element_name(name) {
                let position = self.report.count_of(kind) + 1;
                self.generator = Some(OpenRecord {
                    depth,
                    record: GeneratorRecord::new(kind, position),
                });
            }
        } else if self.day.is_none() && name == "Day" {
            self.day = Some(OpenDay {
                depth,
                day: DayRecord::default(),
            });
        }

        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ProcessError> {
        match self.stack.last_mut() {
            Some(frame) => frame.text.push_str(text),
            None if text.trim().is_empty() => {}
            None => {
                return Err(ProcessError::MalformedInput(
                    "text outside of the root element".to_string(),
                ))
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProcessError> {
        let Some(frame) = self.stack.pop() else {
            return Err(ProcessError::MalformedInput(
                "unexpected closing tag".to_string(),
            ));
        };
        let parent_depth = self.stack.len();

        if let Some(open) = self.day.as_mut() {
            if parent_depth == open.depth {
                assign_day_field(&mut open.day, &frame)?;
                return Ok(());
            }
            if parent_depth + 1 == open.depth {
                if let (Some(open_day), Some(generator)) = (self.day.take(), self.generator.as_mut())
                {
                    generator.record.days.push(open_day.day);
                }
                return Ok(());
            }
        }

        if let Some(open) = self.generator.as_mut() {
            if parent_depth == open.depth {
                assign_record_field(&mut open.record, &frame)?;
            } else if parent_depth + 1 == open.depth {
                if let Some(finished) = self.generator.take() {
                    self.report.push(finished.record);
                }
            }
        }

        Ok(())
    }

    fn finish(self, xml: &str) -> Result<GenerationReport, ProcessError> {
        if let Some(frame) = self.stack.last() {
            return Err(ProcessError::Incomplete(format!(
                "document ends inside <{}>",
                frame.name
            )));
        }
        if !self.root_seen {
            let reason = if xml.trim().is_empty() {
                "file is empty"
            } else {
                "no root element yet"
            };
            return Err(ProcessError::Incomplete(reason.to_string()));
        }
        Ok(self.report)
    }
}

fn assign_record_field(record: &mut GeneratorRecord, frame: &Frame) -> Result<(), ProcessError> {
    // The first occurrence of a field wins; repeats are ignored.
    let value = frame.text.trim();
    match (frame.name.as_str(), record.kind) {
        ("Name", _) if record.name.is_none() => record.name = Some(value.to_string()),
        ("Location", GeneratorKind::Wind) if record.location.is_none() => {
            record.location = Some(value.to_string())
        }
        ("EmissionsRating", GeneratorKind::Gas | GeneratorKind::Coal)
            if record.emissions_rating.is_none() =>
        {
            record.emissions_rating = Some(parse_number(&frame.name, value)?)
        }
        ("TotalHeatInput", GeneratorKind::Coal) if record.total_heat_input.is_none() => {
            record.total_heat_input = Some(parse_number(&frame.name, value)?)
        }
        ("ActualNetGeneration", GeneratorKind::Coal) if record.actual_net_generation.is_none() => {
            record.actual_net_generation = Some(parse_number(&frame.name, value)?)
        }
        _ => {}
    }
    Ok(())
}

fn assign_day_field(day: &mut DayRecord, frame: &Frame) -> Result<(), ProcessError> {
    let value = frame.text.trim();
    match frame.name.as_str() {
        "Date" if day.date.is_none() => day.date = Some(value.to_string()),
        "Energy" if day.energy.is_none() => day.energy = Some(parse_number(&frame.name, value)?),
        "Price" if day.price.is_none() => day.price = Some(parse_number(&frame.name, value)?),
        _ => {}
    }
    Ok(())
}

/// Parse a decimal number written with a dot separator.
fn parse_number(field: &str, value: &str) -> Result<f64, ProcessError> {
    match value.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(ProcessError::MalformedInput(format!(
            "<{}> is not a number: {:?}",
            field, value
        ))),
    }
}

/// Syntax errors raised when the input stops inside a markup construct.
fn is_truncation(err: &SyntaxError) -> bool {
    matches!(
        err,
        SyntaxError::UnclosedTag
            | SyntaxError::UnclosedComment
            | SyntaxError::UnclosedCData
            | SyntaxError::UnclosedDoctype
            | SyntaxError::UnclosedPIOrXmlDecl
    )
}

fn at_end(reader: &Reader<&[u8]>, xml: &str) -> bool {
    reader.buffer_position() as usize >= xml.len()
}

/// Parse a generation report document.
pub fn parse_generation_report(xml: &str) -> Result<GenerationReport, ProcessError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(xml);
    let mut builder = ReportBuilder::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                builder.open(name)?;
            }
            Ok(Event::Empty(start)) => {
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                builder.open(name)?;
                builder.close()?;
            }
            Ok(Event::End(_)) => builder.close()?,
            Ok(Event::Text(text)) => {
                let text = text.unescape().map_err(|e| {
                    // A reference cut off by the end of the file is still being written.
                    if at_end(&reader, xml) {
                        ProcessError::Incomplete(format!("document ends inside a reference: {}", e))
                    } else {
                        ProcessError::MalformedInput(e.to_string())
                    }
                })?;
                builder.text(&text)?;
            }
            Ok(Event::CData(data)) => builder.text(&String::from_utf8_lossy(&data))?,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(quick_xml::Error::Syntax(err)) if is_truncation(&err) || at_end(&reader, xml) => {
                return Err(ProcessError::Incomplete(format!(
                    "{} at byte {}",
                    err,
                    reader.buffer_position()
                )))
            }
            Err(err) => {
                return Err(ProcessError::MalformedInput(format!(
                    "{} at byte {}",
                    err,
                    reader.buffer_position()
                )))
            }
        }
    }

    builder.finish(xml)
}
