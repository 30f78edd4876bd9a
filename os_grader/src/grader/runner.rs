//! Process runner: executes a target under a time budget and captures what it prints.
//!
//! Failures never escape as errors. A timeout or a spawn failure turns into a textual output
//! (and an `ExecutionStatus`) that simply won't match anything expected, so a broken case
//! costs points instead of aborting the run.

use crate::error::GraderError;
use crate::input::TargetProgram;
use log::{debug, error, info, warn};
use shlex::Shlex;
use std::{
    fs::{self, File},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    process::{self, Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};
use tempfile::TempDir;

/// Output reported in place of the real one when a case runs out of time.
pub const TIMEOUT_OUTPUT: &str = "Error: Command timed out";

const EXIT_COMMAND: &str = "exit";
const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DIAGNOSTIC_LOG_NAME: &str = "memcheck.log";

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExecutionStatus {
    Success,
    FailureWithStatus(i32),
    FailureWithSignalTermination,
    FailureBeforeExecution,
    FailureBeforeWait,
    TimedOut,
}

impl From<ExitStatus> for ExecutionStatus {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return ExecutionStatus::Success;
        }
        match status.code() {
            Some(code) => ExecutionStatus::FailureWithStatus(code),
            None => ExecutionStatus::FailureWithSignalTermination,
        }
    }
}

/// One run of a target: arguments, optional stdin script and time budget.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Invocation {
    args: Vec<String>,
    stdin: Option<String>,
    timeout: Duration,
}

impl Invocation {
    pub fn new(timeout: Duration) -> Self {
        Self {
            args: vec![],
            stdin: None,
            timeout,
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_stdin(mut self, stdin: String) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// Line-oriented input for an interactive target: `input` verbatim, then an `exit`
    /// line so the target always gets a chance to leave on its own.
    pub fn shell_script(input: &str, timeout: Duration) -> Self {
        let mut script = String::with_capacity(input.len() + EXIT_COMMAND.len() + 2);
        script.push_str(input);
        if !script.is_empty() && !script.ends_with('\n') {
            script.push('\n');
        }
        script.push_str(EXIT_COMMAND);
        script.push('\n');
        Self::new(timeout).with_stdin(script)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// The memory-diagnostic wrapper put in front of the target, e.g. `valgrind`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MemcheckWrapper {
    program: String,
    args: Vec<String>,
}

impl MemcheckWrapper {
    pub const DEFAULT_COMMAND: &'static str = "valgrind --leak-check=full --leak-resolution=med \
        --trace-children=no --track-origins=yes --vgdb=no";

    /// Splits a command line the way a POSIX shell would.
    pub fn parse(command: &str) -> Result<Self, GraderError> {
        let mut lex = Shlex::new(command);
        let words: Vec<String> = lex.by_ref().collect();
        if lex.had_error {
            return Err(GraderError::InvalidMemcheckCommand("unbalanced quotes"));
        }
        let mut words = words.into_iter();
        let program = words
            .next()
            .ok_or(GraderError::InvalidMemcheckCommand("empty command"))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    fn wrap(&self, log_path: &Path, target: &TargetProgram) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(format!("--log-file={}", log_path.display()))
            .arg(target.path());
        cmd
    }
}

impl Default for MemcheckWrapper {
    fn default() -> Self {
        Self {
            program: "valgrind".to_string(),
            args: [
                "--leak-check=full",
                "--leak-resolution=med",
                "--trace-children=no",
                "--track-origins=yes",
                "--vgdb=no",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Sole owner of the file the memcheck wrapper writes to.
///
/// The file lives in a private temporary directory. `take` reads and removes it, so each
/// invocation starts without a log and a stale report is never read twice.
#[derive(Debug)]
pub struct DiagnosticLog {
    _dir: TempDir,
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DIAGNOSTIC_LOG_NAME);
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents of the log left by the last invocation, `None` if there is none.
    pub fn take(&mut self) -> Option<String> {
        let content = match fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                warn!("⚠️  No diagnostic log available");
                debug!("💥 Error: '{err:?}'");
                return None;
            }
        };
        if let Err(err) = fs::remove_file(&self.path) {
            debug!("unable to remove the diagnostic log: {err:?}");
        }
        Some(content)
    }

    /// Removes whatever the previous invocation left behind. `false` when a log is still
    /// in place afterwards, in which case the next report can't be told apart from it.
    fn clear(&mut self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) if err.kind() == io::ErrorKind::NotFound => true,
            Err(err) => {
                error!("❌ Unable to remove the previous diagnostic log");
                debug!("💥 Error: '{err:?}'");
                false
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Execution {
    /// stdout and stderr, interleaved as the target produced them.
    pub output: String,
    pub status: ExecutionStatus,
    /// Memcheck report of this invocation. Always `None` when memcheck is disabled.
    pub diagnostics: Option<String>,
}

#[derive(Debug)]
pub struct ProcessRunner {
    program: TargetProgram,
    memcheck: Option<(MemcheckWrapper, DiagnosticLog)>,
}

impl ProcessRunner {
    pub fn new(program: TargetProgram) -> Self {
        if !program.is_runnable() {
            warn!(
                "⚠️  '{}' is not an executable, every execution will fail",
                program.path().display()
            );
        }
        Self {
            program,
            memcheck: None,
        }
    }

    pub fn with_memcheck(mut self, wrapper: MemcheckWrapper) -> Result<Self, GraderError> {
        let log = DiagnosticLog::new().map_err(GraderError::DiagnosticLog)?;
        self.memcheck = Some((wrapper, log));
        Ok(self)
    }

    pub fn has_memcheck(&self) -> bool {
        self.memcheck.is_some()
    }

    pub fn program(&self) -> &TargetProgram {
        &self.program
    }

    /// Runs the target once. Blocks for at most the invocation timeout, plus the time
    /// needed to reap a killed process.
    pub fn run(&mut self, invocation: &Invocation) -> Execution {
        let mut log_is_fresh = true;
        let mut cmd = match self.memcheck.as_mut() {
            Some((wrapper, log)) => {
                log_is_fresh = log.clear();
                wrapper.wrap(log.path(), &self.program)
            }
            None => self.program.new_cmd(),
        };
        cmd.args(&invocation.args);

        info!("🚀 Executing '{}'", self.program.path().display());
        let (output, status) = self.spawn_and_wait(cmd, invocation);
        debug!("- OUTPUT: '{}'", output.replace('\n', "\\n"));
        debug!("- STATUS: {status:?}");

        let diagnostics = match self.memcheck.as_mut() {
            Some((_, log)) if log_is_fresh => log.take(),
            Some(_) => {
                warn!("⚠️  Diagnostic log of this run is not trusted");
                None
            }
            None => None,
        };
        Execution {
            output,
            status,
            diagnostics,
        }
    }

    fn spawn_and_wait(
        &self,
        mut cmd: Command,
        invocation: &Invocation,
    ) -> (String, ExecutionStatus) {
        // stdout and stderr share one file so their interleaving is kept, and a target that
        // floods its output can't block on a full pipe while we poll.
        let (mut capture, stdout, stderr) = match capture_file() {
            Ok(files) => files,
            Err(err) => {
                warn!("❌ Unable to prepare the output capture");
                return (err.to_string(), ExecutionStatus::FailureBeforeExecution);
            }
        };
        cmd.stdout(stdout).stderr(stderr).stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        // Own process group, so whatever the target forks can be killed along with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!("❌ Unable to execute the command");
                debug!("💥 Error: '{err:?}'");
                return (err.to_string(), ExecutionStatus::FailureBeforeExecution);
            }
        };

        if let Some(ref stdin_content) = invocation.stdin
            && let Some(mut stdin) = child.stdin.take()
        {
            debug!("📝 stdin: '{}'", stdin_content.replace('\n', "\\n"));
            let stdin_content = stdin_content.clone();
            thread::spawn(move || stdin.write_all(stdin_content.as_bytes()));
        }

        let status = match wait_with_timeout(&mut child, invocation.timeout) {
            Ok(Some(status)) => ExecutionStatus::from(status),
            Ok(None) => {
                warn!(
                    "⏱️  '{}' did not finish within {:?}",
                    self.program.name(),
                    invocation.timeout
                );
                self.kill(&mut child);
                return (TIMEOUT_OUTPUT.to_string(), ExecutionStatus::TimedOut);
            }
            Err(err) => {
                warn!("⏱️  Unable to wait the command finish");
                debug!("💥 Error: '{err:?}'");
                self.kill(&mut child);
                return (err.to_string(), ExecutionStatus::FailureBeforeWait);
            }
        };

        match read_capture(&mut capture) {
            Ok(output) => (output, status),
            Err(err) => (err.to_string(), status),
        }
    }

    /// Kills the child and, best effort, everything that may still be running the target:
    /// the child's process group, processes carrying the target's name, and processes whose
    /// command line names the target (a memcheck wrapper runs it under its own name). The
    /// direct child may only be a front for the process actually running.
    fn kill(&self, child: &mut Child) {
        send_sigkill(&[format!("-{}", child.id())]);
        if let Err(err) = child.kill() {
            debug!("unable to kill the child: {err:?}");
        }
        match Command::new("pkill")
            .arg("-x")
            .arg(self.program.process_name())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => debug!("pkill -x {}: {status}", self.program.process_name()),
            Err(err) => debug!("unable to run pkill: {err:?}"),
        }
        let survivors = self.processes_naming_target();
        if !survivors.is_empty() {
            debug!("killing processes still running the target: {survivors:?}");
            send_sigkill(&survivors);
        }
        if let Err(err) = child.wait() {
            debug!("unable to reap the child: {err:?}");
        }
    }

    /// Pids of the processes whose command line contains the target path, the grader and
    /// its parent excluded (their own arguments may name the target).
    fn processes_naming_target(&self) -> Vec<String> {
        let pattern = extended_regex_escape(&self.program.path().to_string_lossy());
        let output = match Command::new("pgrep")
            .arg("-f")
            .arg(&pattern)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                debug!("unable to run pgrep: {err:?}");
                return vec![];
            }
        };
        let own = [process::id(), parent_id()];
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(|line| line.trim().parse::<u32>().ok())
            .filter(|pid| !own.contains(pid))
            .map(|pid| pid.to_string())
            .collect()
    }
}

#[cfg(unix)]
fn parent_id() -> u32 {
    std::os::unix::process::parent_id()
}

#[cfg(not(unix))]
fn parent_id() -> u32 {
    process::id()
}

/// `targets` are pids, or `-<pgid>` for a whole process group.
fn send_sigkill(targets: &[String]) {
    match Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .args(targets)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => debug!("kill -KILL {targets:?}: {status}"),
        Err(err) => debug!("unable to run kill: {err:?}"),
    }
}

/// Escapes `text` for use as a POSIX extended regex, the syntax `pgrep` expects.
fn extended_regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn capture_file() -> io::Result<(File, File, File)> {
    let capture = tempfile::tempfile()?;
    let stdout = capture.try_clone()?;
    let stderr = capture.try_clone()?;
    Ok((capture, stdout, stderr))
}

fn read_capture(capture: &mut File) -> io::Result<String> {
    capture.seek(SeekFrom::Start(0))?;
    let mut bytes = vec![];
    capture.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// `Ok(None)` when the child is still running once `timeout` has elapsed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let started_at = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started_at.elapsed() >= timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
