use std::error::Error as StdError;
use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Frames kept in an [`ExceptionSummary`] stack trace.
const MAX_STACK_FRAMES: usize = 16;

pub type Result<T> = std::result::Result<T, DemoError>;

/// Library error kept as the cause of a backend failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Why a compiled source could not be reduced to a single deployable artifact.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("compiling {source_name} produced no deployable contract")]
    NoArtifact { source_name: String },

    #[error(
        "compiling {source_name} produced {} deployable contracts ({}), expected exactly one",
        .names.len(),
        .names.join(", ")
    )]
    MultipleArtifacts {
        source_name: String,
        names: Vec<String>,
    },
}

/// Top-level error type shared by every demo operation.
#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Network configuration error: {0}")]
    Config(String),

    #[error("{operation} failed: {message}")]
    Backend {
        operation: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{operation} gave up after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    #[error(transparent)]
    Compilation(#[from] ArtifactError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Broad classification matching the failure kinds callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Bad combination or type of inputs; nothing was attempted.
    InvalidArgument,
    /// A wallet, client, compiler or faucet call failed.
    BackendFailure,
    /// A registry file, registry entry or contract source is missing.
    NotFound,
    /// Invalid network or demo configuration.
    Configuration,
}

impl DemoError {
    /// Shorthand for a backend failure in `operation` with no underlying
    /// error.
    pub fn backend(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.to_string(),
            source: None,
        }
    }

    /// Backend failure in `operation` caused by `source`. `context` names the
    /// step that failed; the cause stays reachable through `Error::source`.
    pub fn backend_from(
        operation: impl Into<String>,
        context: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Backend { .. }
            | Self::Timeout { .. }
            | Self::Compilation(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorCategory::BackendFailure,
        }
    }

    /// Validation failures are reported to the caller as-is and never logged
    /// as exception summaries.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns a short message suitable for script output.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidArgument(msg) => msg.clone(),
            Self::Config(msg) => format!("Network configuration issue: {msg}"),
            Self::Backend { operation, .. } => {
                format!("{operation} failed. See the log for details.")
            }
            Self::NotFound(msg) => msg.clone(),
            Self::Timeout { operation, .. } => format!("{operation} did not complete in time."),
            Self::Compilation(err) => err.to_string(),
            Self::Io(_) | Self::Json(_) => "File error. See the log for details.".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Exception summaries
// ---------------------------------------------------------------------------

/// Structured snapshot of a failure, built at the moment it is caught.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionSummary {
    pub function_name: String,
    pub file: String,
    pub line_number: u32,
    pub message: String,
    /// Error source chain, outermost first.
    pub stack_trace: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

impl ExceptionSummary {
    /// Summarize `err`. The file and line are those of the caller.
    #[track_caller]
    pub fn capture(function_name: &str, err: &(dyn StdError + 'static)) -> Self {
        let location = Location::caller();

        let mut stack_trace = Vec::new();
        let mut current: Option<&(dyn StdError + 'static)> = Some(err);
        while let Some(frame) = current {
            if stack_trace.len() == MAX_STACK_FRAMES {
                break;
            }
            stack_trace.push(frame.to_string());
            current = frame.source();
        }

        Self {
            function_name: function_name.to_string(),
            file: location
                .file()
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .to_string(),
            line_number: location.line(),
            message: err.to_string(),
            stack_trace,
            occurred_at: Utc::now(),
        }
    }
}

/// Write a summary to the log sink as pretty JSON.
pub fn log_error(summary: &ExceptionSummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => error!(
            function = %summary.function_name,
            line = summary.line_number,
            "An error occurred in the codebase:\n{json}"
        ),
        Err(e) => error!(
            function = %summary.function_name,
            message = %summary.message,
            "An error occurred in the codebase (summary not serializable: {e})"
        ),
    }
}

/// Summarize and log `err` in one step, returning the summary.
#[track_caller]
pub fn report_error(function_name: &str, err: &(dyn StdError + 'static)) -> ExceptionSummary {
    let summary = ExceptionSummary::capture(function_name, err);
    log_error(&summary);
    summary
}

/// Boundary helper for public operations: backend and runtime failures are
/// summarized and logged, then handed back unchanged.
pub trait LogOnError<T> {
    fn log_on_error(self, function_name: &str) -> Result<T>;
}

impl<T> LogOnError<T> for Result<T> {
    #[track_caller]
    fn log_on_error(self, function_name: &str) -> Result<T> {
        if let Err(err) = &self {
            if !err.is_validation() {
                report_error(function_name, err);
            }
        }
        self
    }
}
