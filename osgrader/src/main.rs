use clap::{Parser, Subcommand};
use os_grader::{
    LoggingMode, MemcheckWrapper, ProcessRunner, ReportEmitter, SchedulerPlan, ShellSuite, Target,
    TargetProgram, TestSuite,
};
use std::{io, path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(
    name = "osgrader",
    version,
    about = "Grade course assignment executables",
    long_about = "Grade TARGET by running it against its test cases and print the report, \
                  ending with a `GRADE:{<value>}` line."
)]
struct Cli {
    /// Amount of log output on stderr. RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "normal")]
    logging_mode: LoggingMode,

    #[command(subcommand)]
    target: TargetCommand,
}

#[derive(Subcommand, Debug)]
enum TargetCommand {
    /// Grade a line-oriented program (the shell) against a YAML/JSON test suite.
    Shell {
        #[arg(long, default_value = "autograder_config.yaml")]
        suite: PathBuf,
        #[arg(long, default_value = "../src/shell")]
        target: PathBuf,
        /// Time budget of each case, in seconds.
        #[arg(long, default_value_t = 10)]
        timeout: u64,
        /// Memory-diagnostic wrapper; `--log-file=<path>` and the target are appended.
        #[arg(long, default_value = MemcheckWrapper::DEFAULT_COMMAND)]
        memcheck: String,
        /// Run the target directly, without memory diagnostics nor deductions.
        #[arg(long)]
        no_memcheck: bool,
    },
    /// Grade the scheduler: ready queue unit tests, then a quick and a full workload.
    Scheduler {
        #[arg(long, default_value = "./ready_queue_tests")]
        unit_tests: PathBuf,
        #[arg(long, default_value = "../src/scheduler")]
        scheduler: PathBuf,
        #[arg(long, default_value = "test_quick.csv")]
        quick: String,
        #[arg(long, default_value = "test_grader.csv")]
        full: String,
    },
}

fn build_target(command: TargetCommand) -> Result<Target, Box<dyn std::error::Error>> {
    let target = match command {
        TargetCommand::Shell {
            suite,
            target,
            timeout,
            memcheck,
            no_memcheck,
        } => {
            let suite = TestSuite::load(&suite)?;
            let mut runner = ProcessRunner::new(TargetProgram::new(target));
            if !no_memcheck {
                runner = runner.with_memcheck(MemcheckWrapper::parse(&memcheck)?)?;
            }
            Target::Shell(
                ShellSuite::new(suite, runner).with_case_timeout(Duration::from_secs(timeout)),
            )
        }
        TargetCommand::Scheduler {
            unit_tests,
            scheduler,
            quick,
            full,
        } => Target::Scheduler(SchedulerPlan::new(
            TargetProgram::new(unit_tests),
            TargetProgram::new(scheduler),
            quick,
            full,
        )),
    };
    Ok(target)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.logging_mode.level_filter())
        .parse_default_env()
        .init();

    let mut target = build_target(cli.target)?;
    let outcome = target.grade();
    log::info!("Final grade: {}", outcome.total());

    ReportEmitter::new(io::stdout().lock()).emit(&outcome)?;
    Ok(())
}
