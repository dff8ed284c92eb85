//! Subprocess execution with deadlines and cooperative cancellation.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// How often a running child is polled for exit, cancellation, or deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation flag shared by every job of one run.
///
/// Cloning yields a handle to the same flag. Cancellation is observed
/// between steps and while polling a running child process.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncanceled token.
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same underlying flag.
    pub fn same(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// How a polled child process finished.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The child exited on its own.
    Exited(std::process::ExitStatus),
    /// The deadline passed; the child was killed.
    TimedOut,
    /// Cancellation was requested; the child was killed.
    Canceled,
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set multiple environment variables.
    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Spawn with stdout and stderr appended to `log`, then poll the child
    /// until it exits, the deadline passes, or cancellation is requested.
    ///
    /// The child is killed (and reaped) on deadline or cancellation, so a
    /// runaway step cannot outlive its job.
    pub fn exec_logged(
        &self,
        log: &Path,
        deadline: Instant,
        cancel: &CancelToken,
    ) -> Result<WaitOutcome> {
        let stdout = File::create(log)
            .with_context(|| format!("failed to create log file: {}", log.display()))?;
        let stderr = stdout
            .try_clone()
            .with_context(|| format!("failed to clone log handle: {}", log.display()))?;

        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                return Ok(WaitOutcome::Exited(status));
            }

            if cancel.is_canceled() {
                kill_and_reap(&mut child);
                return Ok(WaitOutcome::Canceled);
            }

            if Instant::now() >= deadline {
                kill_and_reap(&mut child);
                return Ok(WaitOutcome::TimedOut);
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn kill_and_reap(child: &mut std::process::Child) {
    if let Err(e) = child.kill() {
        tracing::warn!("failed to kill child process: {}", e);
    }
    // Reap so the pid is not leaked; the exit status is irrelevant here.
    let _ = child.wait();
}

/// Resolve a step program to an executable path.
///
/// Programs containing a path separator are taken relative to `base`
/// (absolute paths pass through); bare names are looked up in PATH.
pub fn resolve_program(program: &str, base: &Path) -> Result<PathBuf> {
    if program.contains('/') || program.contains(std::path::MAIN_SEPARATOR) {
        let path = Path::new(program);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(base.join(path))
        }
    } else {
        which::which(program)
            .with_context(|| format!("program `{}` not found in PATH", program))
    }
}
