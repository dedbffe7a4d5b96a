/*!
 * Error types for the chapsplit application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 *
 * Errors fall in three groups:
 * - Fatal errors that stop a whole run (`AcquisitionError`, `PlanError`,
 *   `OrchestratorError::ExecutorUnavailable`)
 * - Segment-scoped failures that are reported but never abort the run
 *   (`SegmentFailure`)
 * - Collaborator errors (`ExecutorError`, `ProbeError`) that the orchestrator
 *   folds into one of the above
 */

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors raised when parsing a human timecode
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimecodeError {
    /// The text is not a valid `HH:MM:SS[.fff]`, `MM:SS[.fff]` or `SS[.fff]` timecode
    #[error("Invalid timecode '{input}': {reason}")]
    InvalidTimecode {
        /// The rejected input
        input: String,
        /// Why it was rejected
        reason: String,
    },
}

impl TimecodeError {
    pub(crate) fn invalid(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTimecode {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during subtitle processing
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The subtitle file could not be read or written
    #[error("Subtitle file error for {path:?}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The content could not be recognised as a supported caption dialect
    #[error("Unrecognized subtitle format: {0}")]
    UnknownFormat(String),

    /// A timing line could not be parsed
    #[error("Invalid subtitle timestamp at line {line}: {text}")]
    InvalidTimestamp {
        /// 1-based line number
        line: usize,
        /// Offending text
        text: String,
    },
}

/// Errors that can occur while building a segment plan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// A chapter violates `start_s >= 0` and `end_s > start_s`
    #[error("Invalid chapter {index} '{title}': start {start_s}s, end {end_s}s")]
    InvalidChapter {
        index: usize,
        title: String,
        start_s: f64,
        end_s: f64,
    },

    /// The media duration is not a positive finite number
    #[error("Invalid media duration: {0}s")]
    InvalidDuration(f64),

    /// No chapter survived clamping and overlap resolution
    #[error("No chapter left to cut after clamping to the media duration")]
    EmptyPlan,

    /// Two chapters map to the same output name even after disambiguation
    #[error("Duplicate output name '{stem}' for chapters {first_index} and {second_index}")]
    DuplicateOutputName {
        stem: String,
        first_index: usize,
        second_index: usize,
    },
}

/// Errors reported by the external encode executor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    /// The encode tool is missing or unusable
    #[error("Encode tool unavailable: {0}")]
    Unavailable(String),

    /// The encode tool ran and reported a failure
    #[error("Encode failed (exit code {code:?}): {message}")]
    Failed {
        /// Process exit code if any
        code: Option<i32>,
        /// Filtered stderr
        message: String,
    },

    /// The encode did not finish in time
    #[error("Encode timed out after {0}s")]
    Timeout(u64),

    /// The encode finished but produced no file
    #[error("Encode produced no output at {0:?}")]
    MissingOutput(PathBuf),

    /// The run was cancelled while the encode was in flight
    #[error("Encode cancelled")]
    Cancelled,
}

/// Errors reported by the external media probe
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The file to probe does not exist
    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    /// The probe tool failed to run or exited with an error
    #[error("Probe failed: {0}")]
    Failed(String),

    /// The probe output could not be interpreted
    #[error("Unexpected probe output: {0}")]
    InvalidOutput(String),
}

/// Errors raised while acquiring the source media
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// The source does not exist or is not reachable
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The acquisition tool is missing
    #[error("Acquisition tool missing: {0}")]
    ToolMissing(String),

    /// Metadata returned by the source is unusable
    #[error("Invalid source metadata: {0}")]
    InvalidMetadata(String),

    /// A chapter list could not be parsed
    #[error("Invalid chapter list at line {line}: {reason}")]
    InvalidChapterList {
        /// 1-based line number
        line: usize,
        /// Why the line was rejected
        reason: String,
    },

    /// Probing the local media failed
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Filesystem error while fetching
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

/// Segment-scoped failure kinds, recorded in the run report
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentFailure {
    /// Every attempt failed in the executor
    #[error("encode failed after {attempts} attempt(s): {last_error}")]
    SegmentEncodeFailed {
        attempts: u32,
        last_error: String,
    },

    /// Every attempt produced an output of the wrong length
    #[error("duration mismatch after {attempts} attempt(s): expected {expected_s:.3}s, got {actual_s:.3}s")]
    DurationMismatch {
        attempts: u32,
        expected_s: f64,
        actual_s: f64,
    },

    /// The configured crop leaves a frame smaller than the allowed minimum
    #[error("crop too aggressive: {width}x{height} is below the {min_width}x{min_height} minimum")]
    CropTooAggressive {
        width: i64,
        height: i64,
        min_width: u32,
        min_height: u32,
    },
}

/// Fatal errors raised by the encode orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The encode tool is missing, or the requested hardware path is unusable without fallback
    #[error("Executor unavailable: {0}")]
    ExecutorUnavailable(String),

    /// The output directory could not be prepared
    #[error("Output directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error acquiring the source
    #[error("Acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Error building the plan
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Fatal error from the orchestrator
    #[error("Encode error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
