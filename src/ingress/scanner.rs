//! Input folder scanning.
//!
//! Decides which paths count as generation reports and finds the ones
//! already present when the tool starts.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::report::generator::is_result_file;

/// Filter for candidate input files.
#[derive(Debug, Clone)]
pub struct InputFilter {
    /// Extension to accept, without the dot (compared case-insensitively).
    pub extension: String,
    /// Skip `*-Result.xml` files; set when results land in the input folder.
    pub skip_results: bool,
}

impl InputFilter {
    pub fn new(extension: &str, input_dir: &Path, output_dir: &Path) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            skip_results: same_folder(input_dir, output_dir),
        }
    }

    /// Check if a path should be processed.
    pub fn matches(&self, path: &Path) -> bool {
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case(&self.extension));
        if !ext_matches {
            return false;
        }

        // Hidden and temporary files
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with('.') || name.starts_with('~') {
                return false;
            }
        }

        !(self.skip_results && is_result_file(path))
    }
}

fn same_folder(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// List matching files directly inside `dir`, sorted by name.
pub fn scan_existing(dir: &Path, filter: &InputFilter) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("Failed to scan input folder: {}", dir.display()))?;
        let path = entry.path();

        if entry.file_type().is_file() && filter.matches(path) {
            files.push(path.to_path_buf());
        } else {
            debug!("Ignoring {}", path.display());
        }
    }

    Ok(files)
}
