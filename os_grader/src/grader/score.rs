//! Score aggregation for both kinds of target.
//!
//! Line-oriented suites are graded as a weighted mean of group pass rates plus the memcheck
//! deduction. The scheduler is graded on fixed points: unit checks, a bonus for a clean run,
//! and a self-reported score kept on the side.

use crate::grader::diagnostics::Deduction;
use crate::report::SENTINEL_SCORE;
use std::ops::AddAssign;

/// Number of ready-queue unit checks the scheduler is graded on.
pub const UNIT_CHECK_COUNT: u32 = 8;
/// Points for the whole unit-check stage, split evenly between checks.
pub const UNIT_CHECK_STAGE_POINTS: f64 = 30.0;
/// Bonus for a scheduler run that exits successfully.
pub const RUN_BONUS_POINTS: f64 = 20.0;

/// Passed cases out of the cases run for one group.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct GroupTally {
    pub passed: u32,
    pub total: u32,
}

impl GroupTally {
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        }
    }

    /// `None` for a group without cases.
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(f64::from(self.passed) / f64::from(self.total))
    }
}

impl AddAssign for GroupTally {
    fn add_assign(&mut self, rhs: Self) {
        self.passed += rhs.passed;
        self.total += rhs.total;
    }
}

/// Divides each weight by their sum. When every weight is zero the weights are taken as
/// equal instead, so the result always sums to 1.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        weights.iter().map(|w| w / sum).collect()
    } else {
        let n = weights.len() as f64;
        weights.iter().map(|_| 1.0 / n).collect()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct GroupGrade {
    name: String,
    weight: f64,
    normalized_weight: f64,
    tally: GroupTally,
}

impl GroupGrade {
    pub fn new(name: String, weight: f64, tally: GroupTally) -> Self {
        Self {
            name,
            weight,
            normalized_weight: 0.0,
            tally,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn normalized_weight(&self) -> f64 {
        self.normalized_weight
    }

    pub fn tally(&self) -> GroupTally {
        self.tally
    }

    /// Pass rate, `None` when the group is skipped for having no cases.
    pub fn rate(&self) -> Option<f64> {
        self.tally.rate()
    }

    pub fn contribution(&self) -> f64 {
        self.rate().map_or(0.0, |r| r * self.normalized_weight)
    }
}

/// Grade of a line-oriented suite. Not bounded to [0, 1]: the deduction may take it below
/// zero.
#[derive(Debug, PartialEq, Clone)]
pub struct SuiteGrade {
    groups: Vec<GroupGrade>,
    deduction: Deduction,
    total: f64,
}

impl SuiteGrade {
    /// Groups without cases are skipped entirely: they take no share of the weight and
    /// add nothing to the total.
    pub fn aggregate(mut groups: Vec<GroupGrade>, deduction: Deduction) -> Self {
        let scored: Vec<usize> = (0..groups.len())
            .filter(|&i| groups[i].tally.total > 0)
            .collect();
        let weights: Vec<f64> = scored.iter().map(|&i| groups[i].weight).collect();
        for (&i, w) in scored.iter().zip(normalize_weights(&weights)) {
            groups[i].normalized_weight = w;
        }

        let mut total = deduction.fraction();
        for g in &groups {
            total += g.contribution();
        }
        Self {
            groups,
            deduction,
            total,
        }
    }

    pub fn groups(&self) -> &[GroupGrade] {
        &self.groups
    }

    pub fn deduction(&self) -> Deduction {
        self.deduction
    }

    pub fn total(&self) -> f64 {
        self.total
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum UnitCheckOutcome {
    Counted { passed: u32, checks: u32 },
    TimedOut,
    /// The test binary ran but no check summary could be found in its output.
    Unparsable,
}

impl UnitCheckOutcome {
    pub fn passed(&self) -> u32 {
        match self {
            UnitCheckOutcome::Counted { passed, .. } => *passed,
            UnitCheckOutcome::TimedOut | UnitCheckOutcome::Unparsable => 0,
        }
    }

    pub fn points(&self) -> f64 {
        UNIT_CHECK_STAGE_POINTS / f64::from(UNIT_CHECK_COUNT) * f64::from(self.passed())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RunOutcome {
    Passed,
    /// Non-zero exit; carries what the scheduler printed.
    Failed(String),
    TimedOut,
}

impl RunOutcome {
    pub fn bonus(&self) -> f64 {
        match self {
            RunOutcome::Passed => RUN_BONUS_POINTS,
            RunOutcome::Failed(_) | RunOutcome::TimedOut => 0.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SelfReportedScore {
    Reported(f64),
    /// Successful run without a parsable score; carries the output.
    MissingMarker(String),
    Failed(String),
    TimedOut,
}

impl SelfReportedScore {
    pub fn value(&self) -> f64 {
        match self {
            SelfReportedScore::Reported(score) => *score,
            _ => SENTINEL_SCORE,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SchedulerGrade {
    unit_checks: UnitCheckOutcome,
    quick_run: RunOutcome,
    full_run: SelfReportedScore,
    subgrade: f64,
}

impl SchedulerGrade {
    pub fn aggregate(
        unit_checks: UnitCheckOutcome,
        quick_run: RunOutcome,
        full_run: SelfReportedScore,
    ) -> Self {
        let subgrade = unit_checks.points() + quick_run.bonus();
        Self {
            unit_checks,
            quick_run,
            full_run,
            subgrade,
        }
    }

    pub fn unit_checks(&self) -> &UnitCheckOutcome {
        &self.unit_checks
    }

    pub fn quick_run(&self) -> &RunOutcome {
        &self.quick_run
    }

    pub fn full_run(&self) -> &SelfReportedScore {
        &self.full_run
    }

    /// The self-reported score is not part of it.
    pub fn subgrade(&self) -> f64 {
        self.subgrade
    }
}
