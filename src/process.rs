//! External tool launching.
//!
//! The probe fallback shells out to `ffprobe`. Launching goes through the
//! [`ProcessLauncher`] trait so tests can substitute canned output, and every
//! child is passed through a [`ProcessContainment`] before it starts so it
//! does not outlive this process.

use std::{path::PathBuf, process::Command, process::Stdio};

use crate::error::SegmuxError;

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if the child was killed by a signal.
    pub code: Option<i32>,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl ProcessOutput {
    /// Whether the child exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion and captures its output.
pub trait ProcessLauncher: Send + Sync {
    /// Run `program` with `args`.
    ///
    /// A non-zero exit is reported through [`ProcessOutput::code`], not as
    /// an error.
    fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput, SegmuxError>;
}

/// Ties a child process's lifetime to this process.
///
/// Applying containment is best effort and never fails the launch.
pub trait ProcessContainment: Send + Sync {
    /// Prepare `command` before it is spawned.
    fn apply(&self, command: &mut Command);
}

/// Containment that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContainment;

impl ProcessContainment for NoContainment {
    fn apply(&self, _command: &mut Command) {}
}

/// Kill the child when its parent goes away.
///
/// On Linux the child receives `SIGKILL` when the thread that spawned it
/// exits. Other platforms have no equivalent here and the child is left
/// alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillOnParentExit;

impl ProcessContainment for KillOnParentExit {
    #[cfg(target_os = "linux")]
    fn apply(&self, command: &mut Command) {
        use std::os::unix::process::CommandExt;

        // SAFETY: the closure runs between fork and exec and only calls
        // prctl, which is async-signal-safe. Its result is ignored.
        unsafe {
            command.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL as libc::c_ulong);
                Ok(())
            });
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn apply(&self, _command: &mut Command) {
        log::trace!("Process containment is not available on this platform");
    }
}

/// [`ProcessLauncher`] backed by [`std::process::Command`].
pub struct SystemLauncher {
    containment: Box<dyn ProcessContainment>,
    working_directory: Option<PathBuf>,
}

impl std::fmt::Debug for SystemLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLauncher")
            .field("working_directory", &self.working_directory)
            .finish_non_exhaustive()
    }
}

impl Default for SystemLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLauncher {
    /// Launcher whose children die with this process where supported.
    pub fn new() -> Self {
        Self {
            containment: Box::new(KillOnParentExit),
            working_directory: None,
        }
    }

    /// Replace the containment applied to every child.
    #[must_use]
    pub fn with_containment(mut self, containment: Box<dyn ProcessContainment>) -> Self {
        self.containment = containment;
        self
    }

    /// Run children in `directory`.
    #[must_use]
    pub fn with_working_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(directory.into());
        self
    }
}

impl ProcessLauncher for SystemLauncher {
    fn run(&self, program: &str, args: &[String]) -> Result<ProcessOutput, SegmuxError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(directory) = &self.working_directory {
            command.current_dir(directory);
        }
        self.containment.apply(&mut command);

        log::debug!("Running {program} {}", args.join(" "));
        let output = command.output()?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let launcher = SystemLauncher::new();
        let output = launcher
            .run("sh", &["-c".to_string(), "echo hello; exit 3".to_string()])
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
    }

    #[test]
    fn children_run_in_the_working_directory() {
        let directory = tempfile::tempdir().unwrap();
        let launcher = SystemLauncher::new().with_working_directory(directory.path());
        let output = launcher
            .run("sh", &["-c".to_string(), "pwd -P".to_string()])
            .unwrap();
        assert!(output.success());
        assert_eq!(
            PathBuf::from(output.stdout.trim()),
            std::fs::canonicalize(directory.path()).unwrap(),
        );
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let launcher = SystemLauncher::new().with_containment(Box::new(NoContainment));
        let result = launcher.run("nonexistent_tool_xyz_12345", &[]);
        assert!(matches!(result, Err(SegmuxError::IoError(_))));
    }
}
