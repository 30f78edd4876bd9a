use crate::config::TestSuite;
use crate::grader::comparator::outputs_match;
use crate::grader::diagnostics::{Deduction, DiagnosticTranscript};
use crate::grader::runner::{Invocation, ProcessRunner};
use crate::grader::score::{GroupGrade, GroupTally, SuiteGrade};
use log::{info, warn};
use std::time::Duration;

pub const DEFAULT_CASE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct ShellSuite {
    suite: TestSuite,
    runner: ProcessRunner,
    case_timeout: Duration,
}

impl ShellSuite {
    pub fn new(suite: TestSuite, runner: ProcessRunner) -> Self {
        Self {
            suite,
            runner,
            case_timeout: DEFAULT_CASE_TIMEOUT,
        }
    }

    pub fn with_case_timeout(mut self, case_timeout: Duration) -> Self {
        self.case_timeout = case_timeout;
        self
    }

    pub fn run(&mut self) -> SuiteGrade {
        let mut transcript = self
            .runner
            .has_memcheck()
            .then(DiagnosticTranscript::default);
        let mut grades = Vec::with_capacity(self.suite.groups().len());

        for group in self.suite.groups() {
            info!("📂 Grading group '{}' ({} cases)", group.name(), group.len());
            if group.is_empty() {
                warn!("⚠️  Group '{}' has no cases, skipping it", group.name());
            }
            let mut tally = GroupTally::default();
            for (input, expected) in group.cases() {
                let execution = self
                    .runner
                    .run(&Invocation::shell_script(input, self.case_timeout));
                if let Some(transcript) = transcript.as_mut() {
                    transcript.record(execution.diagnostics.as_deref());
                }
                let passed = outputs_match(&execution.output, expected);
                if passed {
                    info!("✅ Case passed");
                } else {
                    info!("❌ Case not passed");
                }
                tally.record(passed);
            }
            info!(
                "Group '{}': {}/{} cases passed",
                group.name(),
                tally.passed,
                tally.total
            );
            grades.push(GroupGrade::new(
                group.name().to_string(),
                group.weight(),
                tally,
            ));
        }

        let deduction = transcript.map_or(Deduction::Disabled, |t| t.deduction());
        SuiteGrade::aggregate(grades, deduction)
    }
}
