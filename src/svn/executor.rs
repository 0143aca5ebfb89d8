//! Running the `svn` command line client.
//!
//! [`CommandRunner`] starts a child process, drains stdout and stderr on two
//! threads so neither pipe can fill up, and waits for the exit while polling
//! a [`CancelHandle`] and an optional timeout. [`ProcessSvnExecutor`] builds
//! the svn argument lists on top of it.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ModelError;
use crate::model::User;

/// Executes one svn sub-command against a working copy path.
///
/// `params` go between the sub-command (plus credentials) and the path; the
/// path is always the last argument. Returns stdout.
pub trait SvnExecutor: Send + Sync {
    fn execute(
        &self,
        user: Option<&User>,
        command: &str,
        path: &Path,
        params: &[&str],
    ) -> Result<String, ModelError>;
}

impl<E: SvnExecutor + ?Sized> SvnExecutor for Arc<E> {
    fn execute(
        &self,
        user: Option<&User>,
        command: &str,
        path: &Path,
        params: &[&str],
    ) -> Result<String, ModelError> {
        (**self).execute(user, command, path, params)
    }
}

/// Cancels the commands of a runner from another thread.
///
/// Cancellation is sticky: once cancelled, every later command of the same
/// runner is refused until [`CancelHandle::reset`].
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Runs external commands to completion.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Option<Duration>,
    poll_interval: Duration,
    cancel: CancelHandle,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(10),
            cancel: CancelHandle::new(),
        }
    }
}

type Drain = JoinHandle<std::io::Result<Vec<u8>>>;

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Share an existing cancellation handle.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `command` and return its stdout. A non-zero exit becomes
    /// [`ModelError::Command`] carrying stderr.
    pub fn run(&self, mut command: Command) -> Result<String, ModelError> {
        let label = describe(&command);
        if self.cancel.is_cancelled() {
            return Err(ModelError::Cancelled {
                command: label,
                reason: "cancelled before start".into(),
            });
        }

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ModelError::io(format!("could not start `{}`", label), e))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.wait(&mut child, &label) {
            Ok(status) => status,
            Err(e) => {
                let _ = join(stdout);
                let _ = join(stderr);
                return Err(e);
            }
        };

        let out = join(stdout).map_err(|e| ModelError::io(format!("stdout of `{}`", label), e))?;
        let err = join(stderr).map_err(|e| ModelError::io(format!("stderr of `{}`", label), e))?;
        let out = String::from_utf8_lossy(&out).into_owned();
        let err = String::from_utf8_lossy(&err).into_owned();

        if !status.success() {
            debug!(command = %label, code = ?status.code(), stderr = %err.trim(), "command failed");
            return Err(ModelError::Command {
                command: label,
                code: status.code(),
                stderr: err.trim().to_string(),
            });
        }
        debug!(command = %label, stdout = %out, "command finished");
        Ok(out)
    }

    fn wait(&self, child: &mut Child, label: &str) -> Result<ExitStatus, ModelError> {
        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    kill(child);
                    return Err(ModelError::io(format!("waiting for `{}`", label), e));
                }
            }

            let reason = if self.cancel.is_cancelled() {
                Some("cancelled".to_string())
            } else {
                self.timeout
                    .filter(|timeout| started.elapsed() >= *timeout)
                    .map(|timeout| format!("timed out after {:?}", timeout))
            };
            if let Some(reason) = reason {
                kill(child);
                return Err(ModelError::Cancelled {
                    command: label.to_string(),
                    reason,
                });
            }

            thread::sleep(self.poll_interval);
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Drain> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join(handle: Option<Drain>) -> std::io::Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::new(std::io::ErrorKind::Other, "drain thread panicked"))),
        None => Ok(Vec::new()),
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    let mut hide_next = false;
    for arg in command.get_args() {
        let arg = arg.to_string_lossy();
        if hide_next {
            parts.push("****".into());
            hide_next = false;
        } else {
            hide_next = arg == "--password";
            parts.push(arg.into_owned());
        }
    }
    parts.join(" ")
}

/// [`SvnExecutor`] spawning the `svn` binary.
#[derive(Debug, Clone)]
pub struct ProcessSvnExecutor {
    program: PathBuf,
    runner: CommandRunner,
    credentials: Option<User>,
}

impl Default for ProcessSvnExecutor {
    fn default() -> Self {
        Self::new("svn")
    }
}

impl ProcessSvnExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            runner: CommandRunner::new(),
            credentials: None,
        }
    }

    pub fn with_runner(mut self, runner: CommandRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Credentials used when a call does not name a user.
    pub fn with_credentials(mut self, credentials: User) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// The full argument list for one invocation.
    pub fn arguments(
        &self,
        user: Option<&User>,
        command: &str,
        path: &Path,
        params: &[&str],
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![command.into(), "--non-interactive".into()];
        if let Some(user) = user.or(self.credentials.as_ref()) {
            args.push("--username".into());
            args.push(user.id.clone().into());
            if let Some(password) = &user.password {
                args.push("--password".into());
                args.push(password.into());
            }
        }
        args.extend(params.iter().map(OsString::from));
        args.push(path.as_os_str().to_os_string());
        args
    }
}

impl SvnExecutor for ProcessSvnExecutor {
    fn execute(
        &self,
        user: Option<&User>,
        command: &str,
        path: &Path,
        params: &[&str],
    ) -> Result<String, ModelError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.arguments(user, command, path, params));
        self.runner.run(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_last_and_credentials_follow_command() {
        let svn = ProcessSvnExecutor::default();
        let user = User::new("alice").with_password("secret");
        let args = svn.arguments(
            Some(&user),
            "commit",
            Path::new("/wc/bpmn/order.json"),
            &["--message", "first"],
        );
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "commit",
                "--non-interactive",
                "--username",
                "alice",
                "--password",
                "secret",
                "--message",
                "first",
                "/wc/bpmn/order.json"
            ]
        );
    }

    #[test]
    fn default_credentials_apply_without_user() {
        let svn = ProcessSvnExecutor::default().with_credentials(User::new("robot"));
        let args = svn.arguments(None, "stat", Path::new("x"), &["--depth", "empty"]);
        assert!(args.contains(&OsString::from("robot")));
        assert_eq!(args.last(), Some(&OsString::from("x")));
    }

    #[test]
    fn passwords_are_masked_in_logs() {
        let mut cmd = Command::new("svn");
        cmd.args(["log", "--password", "secret", "x"]);
        assert_eq!(describe(&cmd), "svn log --password **** x");
    }

    #[test]
    fn cancelled_runner_refuses_to_start() {
        let runner = CommandRunner::new();
        runner.cancel_handle().cancel();
        let err = runner.run(Command::new("svn")).unwrap_err();
        assert!(matches!(err, ModelError::Cancelled { .. }));
    }
}
