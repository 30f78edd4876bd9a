use crate::grader::runner::{Execution, ExecutionStatus, Invocation, ProcessRunner};
use crate::grader::score::{RunOutcome, SchedulerGrade, SelfReportedScore, UnitCheckOutcome};
use crate::input::TargetProgram;
use crate::report::{SELF_REPORTED_MARKER, extract_marked_score};
use log::{info, warn};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_UNIT_TESTS_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_QUICK_RUN_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_FULL_RUN_TIMEOUT: Duration = Duration::from_secs(300);

static CHECK_SUMMARY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Checks: (\d+), Failures: (\d+), Errors: (\d+)").expect("valid summary pattern")
});

/// Reads a `Checks: N, Failures: F, Errors: E` summary.
fn parse_check_summary(output: &str) -> Option<UnitCheckOutcome> {
    let captures = CHECK_SUMMARY_PATTERN.captures(output)?;
    let checks: u32 = captures[1].parse().ok()?;
    let failures: u32 = captures[2].parse().ok()?;
    let errors: u32 = captures[3].parse().ok()?;
    Some(UnitCheckOutcome::Counted {
        passed: checks.saturating_sub(failures.saturating_add(errors)),
        checks,
    })
}

/// The three stages a scheduler goes through, always in this order: its ready-queue unit
/// tests, a quick workload, then the full grading workload.
#[derive(Debug)]
pub struct SchedulerPlan {
    unit_tests: ProcessRunner,
    scheduler: ProcessRunner,
    quick_workload: String,
    full_workload: String,
    unit_tests_timeout: Duration,
    quick_run_timeout: Duration,
    full_run_timeout: Duration,
}

impl SchedulerPlan {
    pub fn new(
        unit_tests: TargetProgram,
        scheduler: TargetProgram,
        quick_workload: String,
        full_workload: String,
    ) -> Self {
        Self {
            unit_tests: ProcessRunner::new(unit_tests),
            scheduler: ProcessRunner::new(scheduler),
            quick_workload,
            full_workload,
            unit_tests_timeout: DEFAULT_UNIT_TESTS_TIMEOUT,
            quick_run_timeout: DEFAULT_QUICK_RUN_TIMEOUT,
            full_run_timeout: DEFAULT_FULL_RUN_TIMEOUT,
        }
    }

    pub fn with_timeouts(
        mut self,
        unit_tests: Duration,
        quick_run: Duration,
        full_run: Duration,
    ) -> Self {
        self.unit_tests_timeout = unit_tests;
        self.quick_run_timeout = quick_run;
        self.full_run_timeout = full_run;
        self
    }

    pub fn run(&mut self) -> SchedulerGrade {
        let unit_checks = self.run_unit_tests();
        let quick_run = self.run_quick_workload();
        let full_run = self.run_full_workload();
        SchedulerGrade::aggregate(unit_checks, quick_run, full_run)
    }

    fn run_unit_tests(&mut self) -> UnitCheckOutcome {
        info!("🧪 Running the ready queue unit tests");
        let execution = self
            .unit_tests
            .run(&Invocation::new(self.unit_tests_timeout));
        if execution.status == ExecutionStatus::TimedOut {
            return UnitCheckOutcome::TimedOut;
        }
        parse_check_summary(&execution.output).unwrap_or_else(|| {
            warn!("⚠️  No check summary in the unit test output");
            UnitCheckOutcome::Unparsable
        })
    }

    fn run_quick_workload(&mut self) -> RunOutcome {
        info!("🏃 Running the scheduler on '{}'", self.quick_workload);
        let execution = self.scheduler.run(
            &Invocation::new(self.quick_run_timeout).with_arg(self.quick_workload.as_str()),
        );
        let Execution { output, status, .. } = execution;
        match status {
            ExecutionStatus::Success => RunOutcome::Passed,
            ExecutionStatus::TimedOut => RunOutcome::TimedOut,
            _ => RunOutcome::Failed(output),
        }
    }

    fn run_full_workload(&mut self) -> SelfReportedScore {
        info!("🏋️ Running the scheduler on '{}'", self.full_workload);
        let execution = self.scheduler.run(
            &Invocation::new(self.full_run_timeout).with_arg(self.full_workload.as_str()),
        );
        let Execution { output, status, .. } = execution;
        match status {
            ExecutionStatus::Success => match extract_marked_score(&output, SELF_REPORTED_MARKER) {
                Some(score) => SelfReportedScore::Reported(score),
                None => {
                    warn!("⚠️  The scheduler did not report a score");
                    SelfReportedScore::MissingMarker(output)
                }
            },
            ExecutionStatus::TimedOut => SelfReportedScore::TimedOut,
            _ => SelfReportedScore::Failed(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    const FAST: Duration = Duration::from_secs(5);

    fn plan(unit_tests: &str, scheduler: &str) -> SchedulerPlan {
        SchedulerPlan::new(
            TargetProgram::new(utils::create_script(unit_tests)),
            TargetProgram::new(utils::create_script(scheduler)),
            "test_quick.csv".to_string(),
            "test_grader.csv".to_string(),
        )
        .with_timeouts(FAST, FAST, FAST)
    }

    #[test]
    fn should_parse_check_summaries() {
        assert_eq!(
            parse_check_summary(
                "Running suite(s): ready_queue\n75%: Checks: 8, Failures: 2, Errors: 0\n"
            ),
            Some(UnitCheckOutcome::Counted {
                passed: 6,
                checks: 8
            })
        );
        assert_eq!(
            parse_check_summary("Checks: 8, Failures: 5, Errors: 7"),
            Some(UnitCheckOutcome::Counted {
                passed: 0,
                checks: 8
            })
        );
        assert_eq!(parse_check_summary("Segmentation fault"), None);
    }

    #[test_log::test]
    fn should_grade_a_working_scheduler() {
        let mut plan = plan(
            "#!/bin/sh\necho '100%: Checks: 8, Failures: 0, Errors: 0'\n",
            "#!/bin/sh\n[ \"$1\" = test_grader.csv ] && echo 'Score: 123.5'\nexit 0\n",
        );
        let grade = plan.run();
        assert_eq!(
            grade.unit_checks(),
            &UnitCheckOutcome::Counted {
                passed: 8,
                checks: 8
            }
        );
        assert_eq!(grade.quick_run(), &RunOutcome::Passed);
        assert_eq!(grade.full_run(), &SelfReportedScore::Reported(123.5));
        assert_eq!(grade.subgrade(), 50.0);
    }

    #[test_log::test]
    fn should_echo_the_output_of_a_failed_run() {
        let mut plan = plan(
            "#!/bin/sh\necho 'Checks: 8, Failures: 1, Errors: 1'\nexit 1\n",
            "#!/bin/sh\necho 'could not open' \"$1\" >&2\nexit 2\n",
        );
        let grade = plan.run();
        assert_eq!(grade.unit_checks().passed(), 6);
        assert_eq!(
            grade.quick_run(),
            &RunOutcome::Failed("could not open test_quick.csv\n".to_string())
        );
        assert_eq!(
            grade.full_run(),
            &SelfReportedScore::Failed("could not open test_grader.csv\n".to_string())
        );
        assert_eq!(grade.subgrade(), 22.5);
    }

    #[test_log::test]
    fn should_use_the_sentinel_without_a_reported_score() {
        let mut plan = plan("#!/bin/sh\nexit 0\n", "#!/bin/sh\necho done\n");
        let grade = plan.run();
        assert_eq!(grade.unit_checks(), &UnitCheckOutcome::Unparsable);
        assert_eq!(
            grade.full_run(),
            &SelfReportedScore::MissingMarker("done\n".to_string())
        );
        assert_eq!(grade.full_run().value(), crate::report::SENTINEL_SCORE);
        assert_eq!(grade.subgrade(), 20.0);
    }

    #[test_log::test]
    fn should_survive_timeouts_and_missing_programs() {
        let mut plan = SchedulerPlan::new(
            TargetProgram::new(utils::create_script("#!/bin/sh\nexec sleep 30\n")),
            TargetProgram::new("./____missing_scheduler"),
            "test_quick.csv".to_string(),
            "test_grader.csv".to_string(),
        )
        .with_timeouts(Duration::from_millis(200), FAST, FAST);
        let grade = plan.run();
        assert_eq!(grade.unit_checks(), &UnitCheckOutcome::TimedOut);
        assert!(matches!(grade.quick_run(), RunOutcome::Failed(_)));
        assert!(matches!(grade.full_run(), SelfReportedScore::Failed(_)));
        assert_eq!(grade.subgrade(), 0.0);
    }
}
