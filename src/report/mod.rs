//! Report document handling.

pub mod generator;
pub mod parser;

pub use generator::{output_path_for, render_generation_output, write_output};
pub use parser::parse_generation_report;
