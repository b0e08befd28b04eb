//! Spawning and deadline supervision.
//!
//! The [`ProcessControl`] trait is the seam the executor is written against;
//! [`UnixProcess`] is the real implementation. Children are spawned into their
//! own process group via `setsid`, so a timeout can reclaim the child and every
//! descendant with one `killpg`.

use std::ffi::OsString;
use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use wait_timeout::ChildExt;

use crate::registry;

/// Grace period between SIGTERM and SIGKILL when reclaiming a group.
const KILL_GRACE: Duration = Duration::from_millis(200);

/// Errors from the process layer. Callers usually convert these into per-cell
/// results rather than propagating them.
#[derive(Debug, Error)]
pub enum ProcError {
    /// The child could not be spawned at all.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to launch.
        program: String,
        /// Underlying OS error.
        source: io::Error,
    },

    /// An I/O error occurred while supervising a running child.
    #[error("i/o error while supervising child: {0}")]
    Io(#[from] io::Error),
}

/// A command to execute: program, arguments, and optional working directory.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
    /// Working directory for the child; inherited when `None`.
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    /// Start a spec for `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Display form for diagnostics.
    pub fn display(&self) -> String {
        let mut s = self.program.display().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }
}

/// What happened to a supervised child.
#[derive(Debug)]
pub enum RunOutcome {
    /// The child exited before the deadline. Any stragglers left in its
    /// process group have been killed and the group is gone.
    Exited {
        /// Exit code, if the child exited normally (None when signalled).
        code: Option<i32>,
        /// Whether the exit status was zero.
        success: bool,
        /// Wall-clock time from spawn to exit.
        elapsed: Duration,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The deadline passed; the entire process group was killed and reaped.
    TimedOut,
}

/// Capability to spawn supervised children. The executor is generic over this
/// so scheduling logic can be tested without real processes.
pub trait ProcessControl: Send + Sync {
    /// Spawn `spec` as a new process-group leader.
    fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn SpawnedChild>, ProcError>;
}

/// A live child owned by the caller. Dropping a handle kills its group.
pub trait SpawnedChild: Send {
    /// Wait until exit or deadline. On deadline the whole group is killed and
    /// reaped before this returns; the worker thread is then free for reuse.
    fn wait_deadline(&mut self, timeout: Duration) -> Result<RunOutcome, ProcError>;

    /// Kill the child's entire process group and reap the leader.
    fn kill_tree(&mut self);
}

/// Spawn `spec` and wait with `timeout`, in one call.
pub fn run_with_deadline(
    control: &dyn ProcessControl,
    spec: &ProcessSpec,
    timeout: Duration,
) -> Result<RunOutcome, ProcError> {
    let mut child = control.spawn(spec)?;
    child.wait_deadline(timeout)
}

/// Real process control for Unix hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixProcess;

impl ProcessControl for UnixProcess {
    fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn SpawnedChild>, ProcError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        // New session: the child becomes its own process-group leader, so
        // killpg(child_pid) reaches every descendant.
        unsafe {
            command.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|source| ProcError::Spawn {
            program: spec.program.display().to_string(),
            source,
        })?;

        registry::register(child.id());

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        Ok(Box::new(UnixChild {
            pid: child.id(),
            child,
            started: Instant::now(),
            stdout: Some(drain(stdout)),
            stderr: Some(drain(stderr)),
            reaped: false,
        }))
    }
}

struct UnixChild {
    pid: u32,
    child: Child,
    started: Instant,
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    reaped: bool,
}

/// Drain a pipe on its own thread so a chatty child can never fill the pipe
/// buffer and deadlock against our wait.
fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn kill_group(pid: u32, signal: libc::c_int) {
    // ESRCH just means the group is already gone.
    unsafe {
        libc::killpg(pid as libc::pid_t, signal);
    }
}

impl UnixChild {
    fn join_pipe(handle: &mut Option<JoinHandle<Vec<u8>>>) -> String {
        match handle.take() {
            Some(h) => String::from_utf8_lossy(&h.join().unwrap_or_default()).into_owned(),
            None => String::new(),
        }
    }

    /// Leader exited on its own: sweep any stragglers it forked, then mark the
    /// group reaped.
    fn sweep_group(&mut self) {
        kill_group(self.pid, libc::SIGKILL);
        registry::unregister(self.pid);
        self.reaped = true;
    }
}

impl SpawnedChild for UnixChild {
    fn wait_deadline(&mut self, timeout: Duration) -> Result<RunOutcome, ProcError> {
        match self.child.wait_timeout(timeout)? {
            Some(status) => {
                let elapsed = self.started.elapsed();
                self.sweep_group();
                let stdout = Self::join_pipe(&mut self.stdout);
                let stderr = Self::join_pipe(&mut self.stderr);
                Ok(RunOutcome::Exited {
                    code: status.code(),
                    success: status.success(),
                    elapsed,
                    stdout,
                    stderr,
                })
            }
            None => {
                self.kill_tree();
                // Group is dead, so the pipes are closed and these joins
                // cannot block.
                let _ = Self::join_pipe(&mut self.stdout);
                let _ = Self::join_pipe(&mut self.stderr);
                Ok(RunOutcome::TimedOut)
            }
        }
    }

    fn kill_tree(&mut self) {
        if self.reaped {
            return;
        }

        kill_group(self.pid, libc::SIGTERM);

        let deadline = Instant::now() + KILL_GRACE;
        let mut exited = false;
        while Instant::now() < deadline {
            match self.child.try_wait() {
                Ok(Some(_)) => {
                    exited = true;
                    break;
                }
                Ok(None) => thread::sleep(Duration::from_millis(10)),
                Err(_) => break,
            }
        }

        kill_group(self.pid, libc::SIGKILL);
        if !exited {
            let _ = self.child.wait();
        }

        registry::unregister(self.pid);
        self.reaped = true;
    }
}

impl Drop for UnixChild {
    fn drop(&mut self) {
        if !self.reaped {
            self.kill_tree();
        }
    }
}
