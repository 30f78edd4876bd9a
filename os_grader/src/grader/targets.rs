mod scheduler;
mod shell;

use crate::grader::GradeOutcome;

pub use scheduler::SchedulerPlan;
pub use shell::ShellSuite;

/// The kinds of program this grader knows how to assess. Each one owns its scoring rules.
#[derive(Debug)]
pub enum Target {
    /// Interactive, line-oriented target (a command-line shell) checked against a suite.
    Shell(ShellSuite),
    /// Scheduler graded on its unit checks and on full workload runs.
    Scheduler(SchedulerPlan),
}

impl Target {
    /// Runs every case strictly in order. Each invocation reuses the runner's diagnostic
    /// log, so cases must never overlap.
    pub fn grade(&mut self) -> GradeOutcome {
        match self {
            Target::Shell(suite) => GradeOutcome::Suite(suite.run()),
            Target::Scheduler(plan) => GradeOutcome::Scheduler(plan.run()),
        }
    }
}
