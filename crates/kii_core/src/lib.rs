pub mod config;
pub mod error_handler;
pub mod json_file;
pub mod logging;
pub mod paths;

pub use config::{DemoConfig, FundingSettings};
pub use error_handler::{
    ArtifactError, BoxError, DemoError, ErrorCategory, ExceptionSummary, LogOnError, Result,
    log_error, report_error,
};
pub use json_file::{read_json_if_exists, write_json_atomic};
pub use paths::{ROOT_ENV_VAR, ROOT_MARKER, find_root_from, find_root_with, get_root_path};
