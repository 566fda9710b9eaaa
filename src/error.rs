//! Error types for file processing.
//!
//! `ProcessError` covers a whole file and decides whether the ingress
//! guard retries it. `RecordError` covers a single record inside one
//! output section and never stops the rest of the file.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Whether a failed attempt is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The producer may still be writing the file.
    Retryable,
    /// Repeating the attempt would fail the same way.
    Fatal,
}

/// Failure while reading, aggregating or writing a single input file.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("file is locked or still being written: {0}")]
    TransientAccess(#[source] io::Error),

    #[error("document is incomplete: {0}")]
    Incomplete(String),

    #[error("cannot read input: {0}")]
    UnreadableInput(#[source] io::Error),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("cannot render output document: {0}")]
    Render(String),

    #[error("cannot write output {}: {source}", .path.display())]
    FatalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("processing task aborted: {0}")]
    Aborted(String),
}

impl ProcessError {
    /// Classify an I/O error raised while reading the input file.
    pub fn from_read_error(err: io::Error) -> Self {
        if is_transient_io(&err) {
            ProcessError::TransientAccess(err)
        } else {
            ProcessError::UnreadableInput(err)
        }
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            ProcessError::TransientAccess(_) | ProcessError::Incomplete(_) => {
                Disposition::Retryable
            }
            _ => Disposition::Fatal,
        }
    }
}

/// Read errors that usually mean another process still holds the file.
fn is_transient_io(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    if cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33)) {
        return true;
    }

    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::NotFound
    )
}

/// Output section a record diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Totals,
    MaxEmissionGenerators,
    ActualHeatRates,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Totals => write!(f, "Totals"),
            Section::MaxEmissionGenerators => write!(f, "MaxEmissionGenerators"),
            Section::ActualHeatRates => write!(f, "ActualHeatRates"),
        }
    }
}

/// Problem with one record in one output section.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("{section}: record '{record}' is malformed: {reason}")]
    MalformedRecord {
        section: Section,
        record: String,
        reason: String,
    },

    #[error("{section}: cannot compute record '{record}': {reason}")]
    Computation {
        section: Section,
        record: String,
        reason: String,
    },

    #[error("{section}: no factor for label {label:?} on record '{record}', using 0")]
    UnmappedFactor {
        section: Section,
        record: String,
        label: Option<String>,
    },
}

impl RecordError {
    pub fn section(&self) -> Section {
        match self {
            RecordError::MalformedRecord { section, .. }
            | RecordError::Computation { section, .. }
            | RecordError::UnmappedFactor { section, .. } => *section,
        }
    }

    /// True when the record still produced an entry.
    pub fn is_warning(&self) -> bool {
        matches!(self, RecordError::UnmappedFactor { .. })
    }
}
