//! Diagnostic collector: turns memcheck reports into a score deduction.
//!
//! Each signal has its own detector so the matching rules can be exercised on plain text,
//! independently of how the reports were gathered.

use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;

/// Fixed penalty, in points out of 100, once any leak is found.
pub const LEAK_PENALTY_POINTS: u32 = 8;
/// Invalid accesses cost one point each, up to this many.
pub const INVALID_ACCESS_PENALTY_CAP: u32 = 5;
/// Fraction of the grade lost when the reports can't be trusted.
pub const UNVERIFIABLE_PENALTY: f64 = 0.2;
const POINTS_SCALE: f64 = 100.0;

static LEAK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(definitely lost|indirectly lost): [1-9]").expect("valid leak pattern")
});
// Case-insensitive on purpose: valgrind capitalises "Invalid read of size".
static INVALID_READ_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)invalid read of size").expect("valid invalid read pattern")
});
static INVALID_WRITE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)invalid write of size").expect("valid invalid write pattern")
});

pub trait SignalDetector {
    type Signal;

    fn name(&self) -> &'static str;
    fn detect(&self, text: &str) -> Self::Signal;
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct LeakSignal {
    /// Number of non-zero "definitely/indirectly lost" lines.
    pub findings: usize,
}

impl LeakSignal {
    pub fn detected(&self) -> bool {
        self.findings > 0
    }

    /// All or nothing, regardless of how many leaks were found.
    pub fn penalty_points(&self) -> u32 {
        if self.detected() {
            LEAK_PENALTY_POINTS
        } else {
            0
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct InvalidAccessSignal {
    pub reads: usize,
    pub writes: usize,
}

impl InvalidAccessSignal {
    pub fn occurrences(&self) -> usize {
        self.reads + self.writes
    }

    pub fn penalty_points(&self) -> u32 {
        u32::try_from(self.occurrences())
            .unwrap_or(u32::MAX)
            .min(INVALID_ACCESS_PENALTY_CAP)
    }
}

pub struct LeakDetector;

impl SignalDetector for LeakDetector {
    type Signal = LeakSignal;

    fn name(&self) -> &'static str {
        "leak-detector"
    }

    fn detect(&self, text: &str) -> LeakSignal {
        LeakSignal {
            findings: LEAK_PATTERN.find_iter(text).count(),
        }
    }
}

pub struct InvalidAccessDetector;

impl SignalDetector for InvalidAccessDetector {
    type Signal = InvalidAccessSignal;

    fn name(&self) -> &'static str {
        "invalid-access-detector"
    }

    fn detect(&self, text: &str) -> InvalidAccessSignal {
        InvalidAccessSignal {
            reads: INVALID_READ_PATTERN.find_iter(text).count(),
            writes: INVALID_WRITE_PATTERN.find_iter(text).count(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Deduction {
    Measured {
        leak_points: u32,
        invalid_access_points: u32,
    },
    /// Some report was missing, the run can't be vouched for.
    Unverifiable,
    /// The run was not wrapped in memcheck at all.
    Disabled,
}

impl Deduction {
    pub fn from_signals(leak: &LeakSignal, invalid_access: &InvalidAccessSignal) -> Self {
        Deduction::Measured {
            leak_points: leak.penalty_points(),
            invalid_access_points: invalid_access.penalty_points(),
        }
    }

    /// Contribution to the grade, zero or negative.
    pub fn fraction(&self) -> f64 {
        match self {
            Deduction::Measured {
                leak_points,
                invalid_access_points,
            } => -f64::from(leak_points + invalid_access_points) / POINTS_SCALE,
            Deduction::Unverifiable => -UNVERIFIABLE_PENALTY,
            Deduction::Disabled => 0.0,
        }
    }
}

/// Every memcheck report of a run, in execution order.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticTranscript {
    text: String,
    invocations: usize,
    missing: usize,
}

impl DiagnosticTranscript {
    pub fn record(&mut self, log: Option<&str>) {
        self.invocations += 1;
        match log {
            Some(log) => {
                self.text.push_str(log);
                self.text.push_str("\n\n\n");
            }
            None => self.missing += 1,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn deduction(&self) -> Deduction {
        if self.invocations == 0 || self.missing > 0 {
            warn!(
                "⚠️  {} of {} memcheck reports missing, applying the fixed penalty",
                self.missing, self.invocations
            );
            return Deduction::Unverifiable;
        }
        let leak = LeakDetector.detect(&self.text);
        let invalid_access = InvalidAccessDetector.detect(&self.text);
        debug!("{}: {leak:?}", LeakDetector.name());
        debug!("{}: {invalid_access:?}", InvalidAccessDetector.name());
        let deduction = Deduction::from_signals(&leak, &invalid_access);
        info!("Memcheck deduction: {}", deduction.fraction());
        deduction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript_of(logs: &[&str]) -> DiagnosticTranscript {
        let mut t = DiagnosticTranscript::default();
        for log in logs {
            t.record(Some(log));
        }
        t
    }

    #[test]
    fn should_detect_leaks() {
        assert!(LeakDetector.detect("==12==    definitely lost: 24 bytes in 1 blocks").detected());
        assert!(
            LeakDetector
                .detect("==12==    indirectly lost: 1,024 bytes in 2 blocks")
                .detected()
        );
        assert_eq!(
            LeakDetector
                .detect("definitely lost: 8 bytes\nindirectly lost: 16 bytes\n")
                .findings,
            2
        );
    }

    #[test]
    fn should_ignore_empty_leak_summaries() {
        let clean = "==12==    definitely lost: 0 bytes in 0 blocks
==12==    indirectly lost: 0 bytes in 0 blocks
==12==      possibly lost: 40 bytes in 1 blocks";
        assert!(!LeakDetector.detect(clean).detected());
        assert_eq!(LeakDetector.detect(clean).penalty_points(), 0);
    }

    #[test]
    fn should_count_invalid_accesses() {
        let text = "==1== Invalid read of size 4
==1== invalid write of size 8
==1== invalid read of size 1";
        let signal = InvalidAccessDetector.detect(text);
        assert_eq!(signal, InvalidAccessSignal { reads: 2, writes: 1 });
        assert_eq!(signal.penalty_points(), 3);
    }

    #[test]
    fn should_deduct_a_fixed_amount_for_leaks() {
        let deduction = transcript_of(&["definitely lost: 24"]).deduction();
        assert_eq!(
            deduction,
            Deduction::Measured {
                leak_points: 8,
                invalid_access_points: 0
            }
        );
        assert_eq!(deduction.fraction(), -0.08);

        let many = transcript_of(&[
            "definitely lost: 24",
            "indirectly lost: 3",
            "definitely lost: 9",
        ]);
        assert_eq!(many.deduction().fraction(), -0.08);
    }

    #[test]
    fn should_cap_invalid_access_deduction() {
        let log = "invalid read of size 4\n".repeat(7);
        let deduction = transcript_of(&[&log]).deduction();
        assert_eq!(
            deduction,
            Deduction::Measured {
                leak_points: 0,
                invalid_access_points: 5
            }
        );
        assert_eq!(deduction.fraction(), -0.05);
    }

    #[test]
    fn should_add_both_penalties() {
        let deduction =
            transcript_of(&["definitely lost: 1 bytes", "invalid write of size 2"]).deduction();
        assert_eq!(deduction.fraction(), -0.09);
    }

    #[test]
    fn should_accumulate_signals_across_invocations() {
        let logs: Vec<String> = (0..3).map(|_| "invalid read of size 4\n".repeat(2)).collect();
        let logs: Vec<&str> = logs.iter().map(String::as_str).collect();
        assert_eq!(transcript_of(&logs).deduction().fraction(), -0.05);
    }

    #[test]
    fn should_not_deduct_for_a_clean_run() {
        let deduction = transcript_of(&["All heap blocks were freed -- no leaks are possible"])
            .deduction();
        assert_eq!(deduction.fraction(), 0.0);
    }

    #[test]
    fn should_fall_back_when_a_log_is_missing() {
        let mut t = transcript_of(&["definitely lost: 0 bytes"]);
        t.record(None);
        assert_eq!(t.deduction(), Deduction::Unverifiable);
        assert_eq!(t.deduction().fraction(), -0.2);

        assert_eq!(DiagnosticTranscript::default().deduction(), Deduction::Unverifiable);
    }

    #[test]
    fn should_not_deduct_when_disabled() {
        assert_eq!(Deduction::Disabled.fraction(), 0.0);
    }
}
