//! The interface between the program being graded and the grader.
//!
//! A `TargetProgram` only knows where the executable lives and how to turn it into a
//! `std::process::Command`. Whether it actually runs is found out case by case: a missing
//! executable makes every case fail, it does not abort the run.

use is_executable::is_executable;
use std::{
    path::{Path, PathBuf},
    process::Command,
};

/// Longest process name the kernel keeps (`comm`), which is what `pkill -x` matches on.
const MAX_PROCESS_NAME_LEN: usize = 15;

#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct TargetProgram {
    name: String,
    path: PathBuf,
}

impl TargetProgram {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { name, path }
    }

    /// Whether the path currently points to something we are allowed to execute.
    pub fn is_runnable(&self) -> bool {
        is_executable(&self.path)
    }

    pub fn new_cmd(&self) -> Command {
        Command::new(&self.path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The name as it shows up in the process table.
    pub fn process_name(&self) -> &str {
        let mut end = self.name.len().min(MAX_PROCESS_NAME_LEN);
        while !self.name.is_char_boundary(end) {
            end -= 1;
        }
        &self.name[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils;

    #[test]
    fn should_recognize_a_runnable_program() {
        let path = utils::create_script("#!/bin/sh\nexit 0\n");
        assert!(TargetProgram::new(path).is_runnable());
    }

    #[test]
    fn should_not_fail_on_a_missing_program() {
        let program = TargetProgram::new("./____missing_shell");
        assert!(!program.is_runnable());
        assert_eq!(program.name(), "____missing_shell");
    }

    #[test]
    fn should_truncate_the_process_name() {
        let program = TargetProgram::new("../src/ready_queue_tests");
        assert_eq!(program.name(), "ready_queue_tests");
        assert_eq!(program.process_name(), "ready_queue_tes");

        let program = TargetProgram::new("../src/shell");
        assert_eq!(program.process_name(), "shell");
    }
}
