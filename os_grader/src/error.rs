use std::path::PathBuf;
use thiserror::Error;

/// Set-up failures. These are the only errors that stop a grading run; anything that goes
/// wrong while a case executes is folded into the score instead.
#[derive(Debug, Error)]
pub enum GraderError {
    #[error("unable to read the test suite '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML test suite: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON test suite: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid memcheck command: {0}")]
    InvalidMemcheckCommand(&'static str),
    #[error("unable to prepare the diagnostic log: {0}")]
    DiagnosticLog(#[source] std::io::Error),
}
