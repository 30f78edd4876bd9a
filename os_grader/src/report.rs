//! Report emitter. Prints a result in the fixed text format read by the upstream grading
//! pipeline, which only relies on the final `GRADE:{<value>}` line.

use crate::grader::GradeOutcome;
use crate::grader::score::{
    RunOutcome, SchedulerGrade, SelfReportedScore, SuiteGrade, UNIT_CHECK_COUNT,
    UnitCheckOutcome,
};
use regex::Regex;
use std::io::{self, Write};

pub const GRADE_MARKER: &str = "GRADE:";
/// Marker a scored process prints in front of its own score.
pub const SELF_REPORTED_MARKER: &str = "Score:";
/// Reported in place of a score that could not be determined.
pub const SENTINEL_SCORE: f64 = 999.0;

/// Finds `<marker>` followed by a number anywhere in `text`.
pub fn extract_marked_score(text: &str, marker: &str) -> Option<f64> {
    let pattern = Regex::new(&format!(r"{}\s*([\d.]+)", regex::escape(marker))).ok()?;
    let captures = pattern.captures(text)?;
    captures.get(1)?.as_str().parse().ok()
}

/// `GRADE:{<total>}`
pub fn grade_line(total: f64) -> String {
    format!("{GRADE_MARKER}{{{total:?}}}")
}

pub struct ReportEmitter<W: Write> {
    out: W,
}

impl<W: Write> ReportEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn emit(&mut self, outcome: &GradeOutcome) -> io::Result<()> {
        match outcome {
            GradeOutcome::Suite(grade) => self.emit_suite(grade)?,
            GradeOutcome::Scheduler(grade) => self.emit_scheduler(grade)?,
        }
        writeln!(self.out, "{}", grade_line(outcome.total()))?;
        self.out.flush()
    }

    fn emit_suite(&mut self, grade: &SuiteGrade) -> io::Result<()> {
        for g in grade.groups() {
            match g.rate() {
                Some(rate) => writeln!(self.out, "{}: {rate:?}", g.name())?,
                None => writeln!(self.out, "{}: skipped", g.name())?,
            }
        }
        writeln!(
            self.out,
            "Points lost with memcheck: {:?}",
            grade.deduction().fraction()
        )
    }

    fn emit_scheduler(&mut self, grade: &SchedulerGrade) -> io::Result<()> {
        match grade.unit_checks() {
            UnitCheckOutcome::Counted { passed, checks } => {
                writeln!(self.out, "Ready Queue Tests: {passed}/{checks}")?
            }
            UnitCheckOutcome::TimedOut => {
                writeln!(self.out, "Ready Queue Tests: 0/{UNIT_CHECK_COUNT} (timeout)")?
            }
            UnitCheckOutcome::Unparsable => writeln!(
                self.out,
                "Ready Queue Tests: 0/{UNIT_CHECK_COUNT} (no check summary found)"
            )?,
        }

        match grade.quick_run() {
            RunOutcome::Passed => writeln!(self.out, "Scheduler: passed")?,
            RunOutcome::Failed(output) => writeln!(self.out, "Scheduler FAILED: {output}")?,
            RunOutcome::TimedOut => writeln!(self.out, "Scheduler FAILED: timeout")?,
        }

        writeln!(self.out, "Subgrade: {:?}", grade.subgrade())?;

        let full_run = grade.full_run();
        let score = full_run.value();
        match full_run {
            SelfReportedScore::Reported(_) => {
                writeln!(self.out, "Big Scheduler: SUCCESS | Score: {score:?}")
            }
            SelfReportedScore::MissingMarker(output) => {
                writeln!(self.out, "Big Scheduler: {output} | Score: {score:?}")
            }
            SelfReportedScore::Failed(output) => {
                writeln!(self.out, "Big Scheduler FAILED: {output} | Score: {score:?}")
            }
            SelfReportedScore::TimedOut => {
                writeln!(self.out, "Big Scheduler FAILED: timeout | Score: {score:?}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grader::diagnostics::Deduction;
    use crate::grader::score::{GroupGrade, GroupTally};

    fn render(outcome: &GradeOutcome) -> String {
        let mut emitter = ReportEmitter::new(vec![]);
        emitter.emit(outcome).unwrap();
        String::from_utf8(emitter.into_inner()).unwrap()
    }

    #[test]
    fn should_extract_marked_scores() {
        assert_eq!(
            extract_marked_score("ran 300 jobs\nScore: 42.5\n", SELF_REPORTED_MARKER),
            Some(42.5)
        );
        assert_eq!(extract_marked_score("Score:7", SELF_REPORTED_MARKER), Some(7.0));
        assert_eq!(extract_marked_score("GRADE:{0.5}", "GRADE:{"), Some(0.5));
        assert_eq!(extract_marked_score("no score here", SELF_REPORTED_MARKER), None);
        assert_eq!(extract_marked_score("Score: 1.2.3", SELF_REPORTED_MARKER), None);
    }

    #[test]
    fn should_format_the_grade_line() {
        assert_eq!(grade_line(1.0), "GRADE:{1.0}");
        assert_eq!(grade_line(-0.2), "GRADE:{-0.2}");
        assert_eq!(grade_line(0.875), "GRADE:{0.875}");
    }

    #[test]
    fn should_emit_a_suite_report() {
        let grade = SuiteGrade::aggregate(
            vec![
                GroupGrade::new("echo".to_string(), 1.0, GroupTally { passed: 1, total: 2 }),
                GroupGrade::new("pipes".to_string(), 3.0, GroupTally { passed: 4, total: 4 }),
                GroupGrade::new("empty".to_string(), 1.0, GroupTally::default()),
            ],
            Deduction::Disabled,
        );
        assert_eq!(
            render(&GradeOutcome::Suite(grade)),
            "echo: 0.5\npipes: 1.0\nempty: skipped\nPoints lost with memcheck: 0.0\nGRADE:{0.875}\n"
        );
    }

    #[test]
    fn should_emit_a_scheduler_report() {
        let grade = SchedulerGrade::aggregate(
            UnitCheckOutcome::Counted {
                passed: 6,
                checks: 8,
            },
            RunOutcome::Failed("Segmentation fault".to_string()),
            SelfReportedScore::TimedOut,
        );
        assert_eq!(
            render(&GradeOutcome::Scheduler(grade)),
            "Ready Queue Tests: 6/8\n\
             Scheduler FAILED: Segmentation fault\n\
             Subgrade: 22.5\n\
             Big Scheduler FAILED: timeout | Score: 999.0\n\
             GRADE:{22.5}\n"
        );
    }

    #[test]
    fn should_report_the_self_reported_score() {
        let grade = SchedulerGrade::aggregate(
            UnitCheckOutcome::Unparsable,
            RunOutcome::Passed,
            SelfReportedScore::Reported(3.25),
        );
        let report = render(&GradeOutcome::Scheduler(grade));
        assert!(report.contains("Ready Queue Tests: 0/8 (no check summary found)\n"));
        assert!(report.contains("Scheduler: passed\n"));
        assert!(report.contains("Big Scheduler: SUCCESS | Score: 3.25\n"));
        assert!(report.ends_with("GRADE:{20.0}\n"));
    }
}
