use std::path::PathBuf;

use thiserror::Error;

/// Exit code for a successful run
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for any error without a more specific code
pub const EXIT_GENERAL: u8 = 1;
/// Exit code when the guard blocks a push
pub const EXIT_GUARD_BLOCK: u8 = 2;
/// Exit code when more than one profile could own a repository
pub const EXIT_AMBIGUOUS: u8 = 3;
/// Exit code when no profile has access to a repository
pub const EXIT_AUTH_FAILURE: u8 = 4;
/// Exit code for configuration problems
pub const EXIT_CONFIG_ERROR: u8 = 5;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error during file I/O operations
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization
    #[error("json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    /// Error while parsing the TOML configuration file
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Error when user input fails.
    #[error("inquire error: {0}")]
    Inquire(#[from] inquire::InquireError),
    /// Error when executing Git commands
    #[error("git command failed: {0}")]
    GitCommand(String),
    /// Malformed or missing configuration
    #[error("config error: {0}")]
    Config(String),
    /// Error during input validation.
    #[error("validation error: {0}")]
    Validation(String),
    /// Error when a profile name is not in the configuration
    #[error("unknown profile: '{0}'")]
    UnknownProfile(String),
    /// More than one profile can push and none was chosen
    #[error("ambiguous profile for {owner_repo}: {} can all push, pass --profile", candidates.join(", "))]
    Ambiguous {
        owner_repo: String,
        candidates: Vec<String>,
    },
    /// No configured profile has push access
    #[error("no profile has push access to {0}")]
    AuthFailure(String),
    /// Guard found error-severity violations
    #[error("guard check failed, push blocked")]
    GuardBlock,
    /// Permission probe failed for reasons unrelated to authorization
    #[error("probe failed for profile '{profile}': {message}")]
    Probe { profile: String, message: String },
    /// An external program could not be run
    #[error("`{program}` failed: {message}")]
    Command { program: String, message: String },
    /// An external program exceeded its time limit
    #[error("`{program}` timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
    /// Error when a repository reference cannot be parsed
    #[error("invalid repository reference: '{0}'")]
    InvalidRepo(String),
    /// Error when a repository has no profile marker
    #[error("{} is not managed by ctx, run 'ctx init' first", .0.display())]
    NotManaged(PathBuf),
}

impl AppError {
    /// Maps the error to the process exit code scripts and hooks branch on
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::GuardBlock => EXIT_GUARD_BLOCK,
            AppError::Ambiguous { .. } => EXIT_AMBIGUOUS,
            AppError::AuthFailure(_) => EXIT_AUTH_FAILURE,
            AppError::Config(_)
            | AppError::Toml(_)
            | AppError::Validation(_)
            | AppError::UnknownProfile(_) => EXIT_CONFIG_ERROR,
            _ => EXIT_GENERAL,
        }
    }
}
