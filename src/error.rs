/// CLI error type and exit-code mapping.
///
/// Scripts can tell misconfiguration (10/11) apart from a shutdown attempt
/// that actually failed at runtime (1).
use crate::config::ConfigError;
use crate::executor::ExecutionError;
use crate::report::ReportError;
use crate::sequence::ParseError;
use thiserror::Error;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const RUNTIME_FAILURE: i32 = 1;
    pub const INVALID_USAGE: i32 = 10;
    pub const INVALID_ARGUMENT: i32 = 11;
    /// A second SIGINT/SIGTERM arrived while the first was being honoured.
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error)]
pub enum CliError {
    /// Missing or malformed command-line usage.
    #[error("{0}")]
    Usage(String),

    #[error("invalid shutdown sequence: {0}")]
    Sequence(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("shutdown sequence failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => exit_codes::INVALID_USAGE,
            CliError::Sequence(_) | CliError::Config(_) => exit_codes::INVALID_ARGUMENT,
            CliError::Execution(_) | CliError::Report(_) => exit_codes::RUNTIME_FAILURE,
        }
    }
}
