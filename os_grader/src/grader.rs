pub mod comparator;
pub mod diagnostics;
pub mod runner;
pub mod score;
pub mod targets;

use score::{SchedulerGrade, SuiteGrade};

/// Result of grading one target. Computed once at the end of a run.
#[derive(Debug, PartialEq, Clone)]
pub enum GradeOutcome {
    Suite(SuiteGrade),
    Scheduler(SchedulerGrade),
}

impl GradeOutcome {
    /// The value reported on the final `GRADE:{..}` line.
    pub fn total(&self) -> f64 {
        match self {
            GradeOutcome::Suite(grade) => grade.total(),
            GradeOutcome::Scheduler(grade) => grade.subgrade(),
        }
    }
}
