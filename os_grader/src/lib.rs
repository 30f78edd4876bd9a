mod config;
mod error;
pub mod grader;
mod input;
pub mod report;
#[cfg(test)]
mod utils;

pub use config::{TestCaseGroup, TestSuite};
pub use error::GraderError;
pub use grader::GradeOutcome;
pub use grader::runner::{Invocation, MemcheckWrapper, ProcessRunner};
pub use grader::targets::{SchedulerPlan, ShellSuite, Target};
pub use input::TargetProgram;
pub use report::ReportEmitter;

use serde::Deserialize;
use serde::Serialize;
use std::str::FromStr;

/// How chatty the grader is on its log output. The report itself is never affected.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LoggingMode {
    Silent,
    #[default]
    Normal,
    Verbose,
}

impl LoggingMode {
    pub fn level_filter(self) -> log::LevelFilter {
        match self {
            LoggingMode::Silent => log::LevelFilter::Off,
            LoggingMode::Normal => log::LevelFilter::Info,
            LoggingMode::Verbose => log::LevelFilter::Debug,
        }
    }
}

impl FromStr for LoggingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silent" => Ok(LoggingMode::Silent),
            "normal" => Ok(LoggingMode::Normal),
            "verbose" => Ok(LoggingMode::Verbose),
            other => Err(format!(
                "unknown logging mode '{other}' (expected silent, normal or verbose)"
            )),
        }
    }
}
